use proptest::prelude::*;
use restsum_catalog::{Normalizer, NormalizerConfig, UnknownMethodPolicy};
use restsum_protocol::{
    Endpoint, EndpointCandidate, HttpMethod, ParamLocation, Parameter, SourceLocation,
};
use std::collections::BTreeSet;

const METHODS: [HttpMethod; 4] = [
    HttpMethod::Get,
    HttpMethod::Post,
    HttpMethod::Delete,
    HttpMethod::Unknown,
];
const PATHS: [&str; 5] = [
    "/users/{id}",
    "/users/{userId}/",
    "//orders",
    "/orders/{orderId}/items/{itemId}",
    "/health",
];
const HINTS: [Option<&str>; 4] = [None, Some("string"), Some("int"), Some("uuid")];

fn build(method: usize, path: usize, hint: usize, file: usize) -> EndpointCandidate {
    let template = PATHS[path];
    let parameters = template
        .split('/')
        .filter_map(|segment| segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')))
        .map(|name| {
            Parameter::new(name, ParamLocation::Path).with_type_hint(HINTS[hint].map(str::to_string))
        })
        .collect();
    EndpointCandidate::new(
        METHODS[method],
        template,
        SourceLocation::new(format!("src/file{file}.js"), Some(file + 1)),
    )
    .with_parameters(parameters)
    .with_handler(Some(format!("handler{file}")))
    .with_context(Some(format!("ctx {file}")))
}

fn candidate_strategy() -> impl Strategy<Value = EndpointCandidate> {
    (0..METHODS.len(), 0..PATHS.len(), 0..HINTS.len(), 0usize..6)
        .prop_map(|(method, path, hint, file)| build(method, path, hint, file))
}

fn by_id(mut endpoints: Vec<Endpoint>) -> Vec<Endpoint> {
    endpoints.sort_by(|a, b| a.id.cmp(&b.id));
    endpoints
}

proptest! {
    #[test]
    fn shuffled_candidates_give_the_same_endpoint_set(
        (candidates, shuffled) in prop::collection::vec(candidate_strategy(), 1..40)
            .prop_flat_map(|candidates| {
                let shuffled = Just(candidates.clone()).prop_shuffle();
                (Just(candidates), shuffled)
            })
    ) {
        let normalizer = Normalizer::default();
        let left = by_id(normalizer.normalize(candidates).endpoints);
        let right = by_id(normalizer.normalize(shuffled).endpoints);
        prop_assert_eq!(left, right);
    }

    #[test]
    fn e_candidates_in_g_groups_give_g_endpoints(
        candidates in prop::collection::vec(candidate_strategy(), 0..60)
    ) {
        let groups: BTreeSet<(HttpMethod, String)> = candidates
            .iter()
            .map(|c| {
                let normalized = restsum_catalog::normalize_path(&c.path_template);
                (c.method, normalized.template)
            })
            .collect();
        let total = candidates.len();

        let catalog = Normalizer::new(NormalizerConfig {
            unknown_methods: UnknownMethodPolicy::Warn,
        })
        .normalize(candidates);

        prop_assert_eq!(catalog.endpoints.len(), groups.len());
        prop_assert_eq!(
            catalog.endpoints.iter().map(|e| e.occurrences).sum::<usize>(),
            total
        );
        prop_assert!(catalog.endpoints.iter().all(|e| e.occurrences >= 1));

        let ids: BTreeSet<&str> = catalog.endpoints.iter().map(|e| e.id.as_str()).collect();
        prop_assert_eq!(ids.len(), catalog.endpoints.len());
    }
}

#[test]
fn users_by_id_and_user_id_collapse_into_one_endpoint() {
    let catalog = Normalizer::default().normalize(vec![build(0, 0, 0, 0), build(0, 1, 0, 1)]);
    assert_eq!(catalog.endpoints.len(), 1);
    let endpoint = &catalog.endpoints[0];
    assert_eq!(endpoint.method, HttpMethod::Get);
    assert_eq!(endpoint.path_template, "/users/{0}");
    assert_eq!(endpoint.occurrences, 2);
    assert_eq!(
        endpoint
            .parameters
            .iter()
            .filter(|p| p.location == ParamLocation::Path)
            .count(),
        1
    );
}
