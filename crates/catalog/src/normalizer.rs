use crate::path::normalize_path;
use crate::policy::UnknownMethodPolicy;
use restsum_protocol::{Endpoint, EndpointCandidate, HttpMethod, ParamLocation, Parameter, SourceLocation};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub const UNKNOWN_METHOD_WARNING: &str = "HTTP method could not be determined from the declaration";

/// Type hints that say nothing beyond "some value".
const GENERIC_HINTS: &[&str] = &["string", "str", "any", "object", "mixed", "unknown"];

#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizerConfig {
    pub unknown_methods: UnknownMethodPolicy,
}

/// Canonical endpoints of one run, in discovery order
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub endpoints: Vec<Endpoint>,
    /// Ids the unknown-method policy marked as skipped
    pub skipped: BTreeSet<String>,
    /// Endpoints removed by the unknown-method policy
    pub dropped: usize,
    /// Raw candidates consumed
    pub candidates: usize,
}

impl Catalog {
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn is_skipped(&self, endpoint_id: &str) -> bool {
        self.skipped.contains(endpoint_id)
    }
}

/// Stable identity of (method, normalized path): first 16 hex chars of SHA-256.
#[must_use]
pub fn endpoint_id(method: HttpMethod, normalized_template: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_str().as_bytes());
    hasher.update(b" ");
    hasher.update(normalized_template.as_bytes());
    let digest = hasher.finalize();
    format!("{digest:x}")[..16].to_string()
}

struct Member {
    candidate: EndpointCandidate,
    placeholders: Vec<String>,
}

struct Group {
    method: HttpMethod,
    template: String,
    members: Vec<Member>,
}

/// Merges raw candidates into canonical endpoints
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    /// Consume the full candidate sequence and produce one endpoint per
    /// (method, normalized path). Endpoint order is first-seen order; every
    /// merged attribute is sorted so the set does not depend on input order.
    pub fn normalize<I>(&self, candidates: I) -> Catalog
    where
        I: IntoIterator<Item = EndpointCandidate>,
    {
        let mut index: HashMap<(HttpMethod, String), usize> = HashMap::new();
        let mut groups: Vec<Group> = Vec::new();
        let mut consumed = 0usize;

        for candidate in candidates {
            consumed += 1;
            let normalized = normalize_path(&candidate.path_template);
            let key = (candidate.method, normalized.template.clone());
            let slot = *index.entry(key).or_insert_with(|| {
                groups.push(Group {
                    method: candidate.method,
                    template: normalized.template.clone(),
                    members: Vec::new(),
                });
                groups.len() - 1
            });
            groups[slot].members.push(Member {
                candidate,
                placeholders: normalized.placeholders,
            });
        }

        let mut catalog = Catalog {
            candidates: consumed,
            ..Default::default()
        };
        for group in groups {
            let endpoint = merge(group);
            if endpoint.method.is_known() {
                catalog.endpoints.push(endpoint);
                continue;
            }
            match self.config.unknown_methods {
                UnknownMethodPolicy::Warn => catalog.endpoints.push(endpoint),
                UnknownMethodPolicy::Skip => {
                    catalog.skipped.insert(endpoint.id.clone());
                    catalog.endpoints.push(endpoint);
                }
                UnknownMethodPolicy::Drop => {
                    log::debug!("Dropping {} (unknown method)", endpoint.display_path);
                    catalog.dropped += 1;
                }
            }
        }

        log::info!(
            "Normalized {} candidates into {} endpoints ({} skipped, {} dropped)",
            catalog.candidates,
            catalog.endpoints.len(),
            catalog.skipped.len(),
            catalog.dropped
        );
        catalog
    }
}

fn merge(group: Group) -> Endpoint {
    let Group {
        method,
        template,
        members,
    } = group;

    let display = members
        .iter()
        .min_by(|a, b| a.candidate.path_template.cmp(&b.candidate.path_template));
    let display_path = display
        .map(|m| m.candidate.path_template.clone())
        .unwrap_or_else(|| template.clone());
    let display_names: Vec<String> = display.map(|m| m.placeholders.clone()).unwrap_or_default();

    let mut positional: BTreeMap<usize, Option<String>> = BTreeMap::new();
    let mut named: BTreeMap<(ParamLocation, String), Option<String>> = BTreeMap::new();
    let mut handlers = BTreeSet::new();
    let mut sources: BTreeSet<SourceLocation> = BTreeSet::new();
    let mut frameworks = BTreeSet::new();
    let mut context: Option<(&SourceLocation, &String)> = None;

    for member in &members {
        for position in 0..member.placeholders.len() {
            positional.entry(position).or_insert(None);
        }
        for param in &member.candidate.parameters {
            let position = (param.location == ParamLocation::Path)
                .then(|| member.placeholders.iter().position(|n| n == &param.name))
                .flatten();
            let slot = match position {
                Some(position) => positional.entry(position).or_insert(None),
                None => named
                    .entry((param.location, param.name.clone()))
                    .or_insert(None),
            };
            *slot = better_hint(slot.take(), param.type_hint.as_deref());
        }

        if let Some(handler) = &member.candidate.handler_name {
            handlers.insert(handler.clone());
        }
        sources.insert(member.candidate.source.clone());
        if let Some(framework) = &member.candidate.framework {
            frameworks.insert(framework.clone());
        }
        if let Some(text) = &member.candidate.context {
            let entry = (&member.candidate.source, text);
            if context.map_or(true, |current| entry < current) {
                context = Some(entry);
            }
        }
    }

    let mut parameters = Vec::with_capacity(positional.len() + named.len());
    for (position, hint) in positional {
        let name = display_names
            .get(position)
            .cloned()
            .unwrap_or_else(|| position.to_string());
        parameters.push(Parameter::new(name, ParamLocation::Path).with_type_hint(hint));
    }
    for ((location, name), hint) in named {
        if location == ParamLocation::Path && display_names.contains(&name) {
            continue;
        }
        parameters.push(Parameter::new(name, location).with_type_hint(hint));
    }

    let mut warnings = Vec::new();
    if !method.is_known() {
        warnings.push(UNKNOWN_METHOD_WARNING.to_string());
    }
    if handlers.len() > 1 {
        warnings.push(format!(
            "{} distinct handlers are bound to this route",
            handlers.len()
        ));
    }

    Endpoint {
        id: endpoint_id(method, &template),
        method,
        path_template: template,
        display_path,
        parameters,
        occurrences: members.len(),
        handlers: handlers.into_iter().collect(),
        sources: sources.into_iter().collect(),
        frameworks: frameworks.into_iter().collect(),
        context: context.map(|(_, text)| text.clone()),
        warnings,
    }
}

fn specificity(hint: Option<&str>) -> u8 {
    match hint {
        None => 0,
        Some(h) if GENERIC_HINTS.contains(&h.trim().to_ascii_lowercase().as_str()) => 1,
        Some(_) => 2,
    }
}

/// Present beats absent, specific beats generic, then lexicographic order.
fn better_hint(current: Option<String>, incoming: Option<&str>) -> Option<String> {
    let incoming = incoming.map(str::trim).filter(|h| !h.is_empty());
    let (current_rank, incoming_rank) = (specificity(current.as_deref()), specificity(incoming));
    let take_incoming = match incoming_rank.cmp(&current_rank) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => match (incoming, current.as_deref()) {
            (Some(new), Some(old)) => new < old,
            _ => false,
        },
    };
    if take_incoming {
        incoming.map(str::to_string)
    } else {
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn candidate(method: HttpMethod, path: &str, file: &str, line: usize) -> EndpointCandidate {
        EndpointCandidate::new(method, path, SourceLocation::new(file, Some(line)))
    }

    fn path_param(name: &str, hint: Option<&str>) -> Parameter {
        Parameter::new(name, ParamLocation::Path).with_type_hint(hint.map(str::to_string))
    }

    #[test]
    fn placeholder_names_do_not_split_endpoints() {
        let catalog = Normalizer::default().normalize(vec![
            candidate(HttpMethod::Get, "/users/{userId}", "b.js", 3)
                .with_parameters(vec![path_param("userId", None)])
                .with_handler(Some("getUser".to_string())),
            candidate(HttpMethod::Get, "/users/{id}", "a.py", 9)
                .with_parameters(vec![path_param("id", Some("int"))])
                .with_handler(Some("get_user".to_string())),
        ]);

        assert_eq!(catalog.len(), 1);
        let endpoint = &catalog.endpoints[0];
        assert_eq!(endpoint.path_template, "/users/{0}");
        assert_eq!(endpoint.display_path, "/users/{id}");
        assert_eq!(endpoint.occurrences, 2);
        assert_eq!(endpoint.parameters, vec![path_param("id", Some("int"))]);
        assert_eq!(
            endpoint.handlers,
            vec!["getUser".to_string(), "get_user".to_string()]
        );
        assert_eq!(endpoint.sources[0].file, "a.py");
        assert_eq!(endpoint.id, endpoint_id(HttpMethod::Get, "/users/{0}"));
        assert_eq!(endpoint.id.len(), 16);
    }

    #[test]
    fn methods_separate_endpoints_and_order_is_first_seen() {
        let catalog = Normalizer::default().normalize(vec![
            candidate(HttpMethod::Post, "/items/", "a.js", 1),
            candidate(HttpMethod::Get, "//items", "a.js", 2),
            candidate(HttpMethod::Post, "/items", "b.js", 1),
        ]);
        let keys: Vec<(HttpMethod, &str, usize)> = catalog
            .endpoints
            .iter()
            .map(|e| (e.method, e.path_template.as_str(), e.occurrences))
            .collect();
        assert_eq!(
            keys,
            vec![
                (HttpMethod::Post, "/items", 2),
                (HttpMethod::Get, "/items", 1)
            ]
        );
        assert_eq!(catalog.candidates, 3);
    }

    #[test]
    fn specific_hints_win_over_generic_ones() {
        assert_eq!(better_hint(None, Some("string")), Some("string".to_string()));
        assert_eq!(
            better_hint(Some("string".to_string()), Some("uuid")),
            Some("uuid".to_string())
        );
        assert_eq!(
            better_hint(Some("uuid".to_string()), Some("any")),
            Some("uuid".to_string())
        );
        assert_eq!(
            better_hint(Some("uuid".to_string()), Some("int")),
            Some("int".to_string())
        );
        assert_eq!(better_hint(Some("int".to_string()), None), Some("int".to_string()));
    }

    #[test]
    fn query_and_body_params_are_unioned() {
        let catalog = Normalizer::default().normalize(vec![
            candidate(HttpMethod::Get, "/search", "a", 1).with_parameters(vec![Parameter::new(
                "q",
                ParamLocation::Query,
            )]),
            candidate(HttpMethod::Get, "/search", "b", 1).with_parameters(vec![
                Parameter::new("q", ParamLocation::Query).with_type_hint(Some("string".into())),
                Parameter::new("page", ParamLocation::Query),
            ]),
        ]);
        assert_eq!(
            catalog.endpoints[0].parameters,
            vec![
                Parameter::new("page", ParamLocation::Query),
                Parameter::new("q", ParamLocation::Query).with_type_hint(Some("string".into())),
            ]
        );
    }

    #[test]
    fn unknown_method_policies() {
        let input = || {
            vec![
                candidate(HttpMethod::Unknown, "/reports", "a.cs", 4),
                candidate(HttpMethod::Get, "/reports", "a.cs", 8),
            ]
        };

        let warn = Normalizer::default().normalize(input());
        assert_eq!(warn.len(), 2);
        assert_eq!(warn.endpoints[0].warnings, vec![UNKNOWN_METHOD_WARNING.to_string()]);
        assert!(warn.skipped.is_empty());

        let skip = Normalizer::new(NormalizerConfig {
            unknown_methods: UnknownMethodPolicy::Skip,
        })
        .normalize(input());
        assert_eq!(skip.len(), 2);
        assert!(skip.is_skipped(&skip.endpoints[0].id));
        assert!(!skip.is_skipped(&skip.endpoints[1].id));

        let drop = Normalizer::new(NormalizerConfig {
            unknown_methods: UnknownMethodPolicy::Drop,
        })
        .normalize(input());
        assert_eq!(drop.len(), 1);
        assert_eq!(drop.dropped, 1);
        assert_eq!(drop.endpoints[0].method, HttpMethod::Get);
    }

    #[test]
    fn context_is_taken_from_the_first_source() {
        let catalog = Normalizer::default().normalize(vec![
            candidate(HttpMethod::Get, "/a", "z.js", 1).with_context(Some("late".into())),
            candidate(HttpMethod::Get, "/a", "b.js", 1).with_context(Some("early".into())),
            candidate(HttpMethod::Get, "/a", "a.js", 1),
        ]);
        assert_eq!(catalog.endpoints[0].context.as_deref(), Some("early"));
    }
}
