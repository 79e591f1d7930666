use super::Extract;
use crate::error::{ExtractError, Result};
use crate::reader::RawFragment;
use crate::template;
use restsum_protocol::{EndpointCandidate, HttpMethod, SourceLocation};

/// Extractor for plain route tables: one `METHOD PATH [handler]` per line.
///
/// Also reads framework route listings such as `rails routes`
/// (`users GET /users(.:format) users#index`) and `artisan route:list`
/// (`GET|HEAD /users ... UserController@index`): the method is the token right
/// before the first token starting with `/`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteTableExtractor;

impl Extract for RouteTableExtractor {
    fn extract(&self, fragment: &RawFragment) -> Result<Vec<EndpointCandidate>> {
        let file = fragment.location.file.as_str();
        let mut candidates = Vec::new();
        let mut route_lines = 0usize;
        let mut content_lines = 0usize;

        for (idx, line) in fragment.text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("//") {
                continue;
            }
            content_lines += 1;

            let tokens: Vec<&str> = trimmed.split_whitespace().collect();
            let Some(path_idx) = tokens.iter().position(|t| t.starts_with('/')) else {
                log::debug!("{file}:{}: no path on line, skipping", idx + 1);
                continue;
            };
            route_lines += 1;

            let methods = if path_idx == 0 {
                vec![HttpMethod::Unknown]
            } else {
                methods_of(tokens[path_idx - 1])
            };
            let handler = tokens[path_idx + 1..]
                .iter()
                .find(|t| !matches!(**t, "->" | "=>" | "to" | "|" | "›"))
                .map(|t| t.to_string());
            let path = tokens[path_idx].replace("(.:format)", "");
            let rewritten = template::rewrite(&path);

            for method in methods {
                candidates.push(
                    EndpointCandidate::new(
                        method,
                        rewritten.template.clone(),
                        SourceLocation::new(file, Some(idx + 1)),
                    )
                    .with_handler(handler.clone())
                    .with_parameters(rewritten.parameters.clone())
                    .with_framework("route-table")
                    .with_context(Some(trimmed.to_string())),
                );
            }
        }

        if content_lines > 0 && route_lines == 0 {
            return Err(ExtractError::malformed(file, "no route lines found"));
        }
        Ok(candidates)
    }
}

/// `GET`, `get`, `GET|HEAD`, `GET,POST`; anything else is a single unknown method.
fn methods_of(token: &str) -> Vec<HttpMethod> {
    let methods: Vec<HttpMethod> = token
        .split(['|', ','])
        .map(HttpMethod::from_token)
        .filter(|m| m.is_known())
        .collect();
    if methods.is_empty() {
        vec![HttpMethod::Unknown]
    } else {
        methods
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::Language;
    use pretty_assertions::assert_eq;

    fn extract(text: &str) -> Result<Vec<EndpointCandidate>> {
        RouteTableExtractor.extract(&RawFragment::new(text, "api.routes", Language::Text))
    }

    #[test]
    fn parses_method_path_handler_lines() {
        let table = "# public api\nGET /users listUsers\n\npost /users/:id -> updateUser\n/health\n";
        let found = extract(table).unwrap();
        let summary: Vec<(HttpMethod, &str, Option<&str>, Option<usize>)> = found
            .iter()
            .map(|c| {
                (
                    c.method,
                    c.path_template.as_str(),
                    c.handler_name.as_deref(),
                    c.source.line,
                )
            })
            .collect();
        assert_eq!(
            summary,
            vec![
                (HttpMethod::Get, "/users", Some("listUsers"), Some(2)),
                (HttpMethod::Post, "/users/{id}", Some("updateUser"), Some(4)),
                (HttpMethod::Unknown, "/health", None, Some(5)),
            ]
        );
        assert_eq!(found[1].parameters.len(), 1);
    }

    #[test]
    fn reads_framework_route_listings() {
        let table = "users GET /users(.:format) users#index\nGET|HEAD /api/posts PostController@index\n";
        let found = extract(table).unwrap();
        let routes: Vec<(HttpMethod, &str)> = found
            .iter()
            .map(|c| (c.method, c.path_template.as_str()))
            .collect();
        assert_eq!(
            routes,
            vec![
                (HttpMethod::Get, "/users"),
                (HttpMethod::Get, "/api/posts"),
                (HttpMethod::Head, "/api/posts"),
            ]
        );
        assert_eq!(found[0].handler_name.as_deref(), Some("users#index"));
    }

    #[test]
    fn text_without_routes_is_malformed() {
        let err = extract("just some notes\nnothing here\n").err().unwrap();
        assert!(matches!(err, ExtractError::MalformedInput { .. }));
        assert!(extract("# only comments\n\n").unwrap().is_empty());
    }
}
