use super::patterns::{
    handler_definition, Expansion, MethodSource, RoutePattern, GENERIC_ROUTE_PATTERN,
    RESOURCE_ROUTES, ROUTE_PATTERNS,
};
use super::Extract;
use crate::config::ExtractOptions;
use crate::error::Result;
use crate::language::Language;
use crate::reader::RawFragment;
use crate::template;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use restsum_protocol::{EndpointCandidate, HttpMethod, ParamLocation, Parameter, SourceLocation};

static ACTION_FILTER: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r#"\b(only|except)\b\s*(?::|=>|\()\s*\[?([^\]\)]*)"#)
        .map_err(|err| log::error!("Action filter pattern failed to compile: {err}"))
        .ok()
});

/// Pattern-based extractor for route declarations in source code
#[derive(Debug, Clone, Default)]
pub struct SourceCodeExtractor {
    options: ExtractOptions,
}

/// A route found on one line, before it becomes a candidate
#[derive(Debug, Clone)]
struct LineMatch {
    method: HttpMethod,
    raw_path: String,
    handler: Option<String>,
    framework: &'static str,
    extra_params: Vec<Parameter>,
}

impl SourceCodeExtractor {
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }

    #[allow(clippy::too_many_arguments)]
    fn match_line(
        &self,
        pattern: &RoutePattern,
        caps: &Captures<'_>,
        line: &str,
        lines: &[&str],
        idx: usize,
        language: Language,
        out: &mut Vec<LineMatch>,
    ) {
        let Some(path) = caps.get(pattern.path_group).map(|m| m.as_str()) else {
            return;
        };

        if pattern.expansion == Expansion::Resources {
            out.extend(expand_resources(pattern, caps, path));
            return;
        }

        let mut handler = pattern.handler_groups.iter().find_map(|alternative| {
            let parts: Option<Vec<&str>> = alternative
                .iter()
                .map(|group| caps.get(*group).map(|m| m.as_str()))
                .collect();
            parts.map(|parts| parts.join("@"))
        });
        if handler.is_none() && pattern.handler_lookahead {
            handler = self.lookahead_handler(lines, idx, language);
        }

        let mut verbs: Vec<(HttpMethod, Option<String>)> = match pattern.method {
            MethodSource::Group(group) => vec![(
                caps.get(group)
                    .map(|m| HttpMethod::from_token(m.as_str()))
                    .unwrap_or(pattern.default_method),
                None,
            )],
            MethodSource::List(group) => {
                let listed = caps
                    .get(group)
                    .map(|m| method_list(m.as_str()))
                    .unwrap_or_default();
                if listed.is_empty() {
                    vec![(pattern.default_method, None)]
                } else {
                    listed.into_iter().map(|method| (method, None)).collect()
                }
            }
            MethodSource::Default => vec![(pattern.default_method, None)],
        };

        if let Expansion::Chain(kind) = pattern.expansion {
            if let (Some(regex), Some(whole)) = (kind.regex(), caps.get(0)) {
                let rest = &line[whole.end()..];
                let mut chained = Vec::new();
                for chain in regex.captures_iter(rest) {
                    let Some(verb) = chain.get(1) else { continue };
                    let chained_handler = chain.get(2).map(|m| m.as_str().to_string());
                    if kind.is_list() {
                        for method in method_list(verb.as_str()) {
                            chained.push((method, chained_handler.clone()));
                        }
                    } else {
                        chained.push((HttpMethod::from_token(verb.as_str()), chained_handler));
                    }
                }
                if !chained.is_empty() {
                    verbs = chained;
                }
            }
        }

        for (method, chained_handler) in verbs {
            out.push(LineMatch {
                method,
                raw_path: path.to_string(),
                handler: chained_handler.or_else(|| handler.clone()),
                framework: pattern.framework,
                extra_params: Vec::new(),
            });
        }
    }

    fn lookahead_handler(&self, lines: &[&str], idx: usize, language: Language) -> Option<String> {
        let regex = handler_definition(language)?;
        lines
            .iter()
            .skip(idx + 1)
            .take(self.options.handler_lookahead)
            .find_map(|line| {
                regex
                    .captures(line)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string())
            })
    }

    /// Code around a declaration with blank and comment lines removed.
    fn context_window(&self, lines: &[&str], idx: usize, language: Language) -> Option<String> {
        if lines.is_empty() {
            return None;
        }
        let start = idx.saturating_sub(self.options.context_before);
        let end = (idx + self.options.context_after).min(lines.len() - 1);

        let kept: Vec<&str> = lines[start..=end]
            .iter()
            .copied()
            .filter(|line| !line.trim().is_empty() && !is_comment(line, language))
            .collect();
        if kept.is_empty() {
            return None;
        }

        let joined = kept.join("\n");
        if joined.chars().count() <= self.options.max_context_chars {
            return Some(joined);
        }
        Some(joined.chars().take(self.options.max_context_chars).collect())
    }
}

impl Extract for SourceCodeExtractor {
    fn extract(&self, fragment: &RawFragment) -> Result<Vec<EndpointCandidate>> {
        let language = fragment.language;
        if !language.has_route_patterns() {
            return Ok(Vec::new());
        }

        let patterns: Vec<&RoutePattern> = ROUTE_PATTERNS
            .iter()
            .filter(|pattern| pattern.languages.contains(&language))
            .collect();
        let lines: Vec<&str> = fragment.text.lines().collect();
        let mut candidates = Vec::new();

        for (idx, line) in lines.iter().enumerate() {
            if is_comment(line, language) {
                continue;
            }

            let mut matches = Vec::new();
            for pattern in &patterns {
                for caps in pattern.regex.captures_iter(line) {
                    self.match_line(pattern, &caps, line, &lines, idx, language, &mut matches);
                }
            }
            if matches.is_empty() {
                if let Some(generic) = GENERIC_ROUTE_PATTERN.as_ref() {
                    for caps in generic.regex.captures_iter(line) {
                        self.match_line(generic, &caps, line, &lines, idx, language, &mut matches);
                    }
                }
            }
            if matches.is_empty() {
                continue;
            }

            let context = self.context_window(&lines, idx, language);
            for found in resolve_line(matches) {
                let rewritten = template::rewrite(&found.raw_path);
                let mut parameters = rewritten.parameters;
                for extra in found.extra_params {
                    if !parameters.iter().any(|p| p.name == extra.name) {
                        parameters.push(extra);
                    }
                }
                candidates.push(
                    EndpointCandidate::new(
                        found.method,
                        rewritten.template,
                        SourceLocation::new(fragment.location.file.clone(), Some(idx + 1)),
                    )
                    .with_handler(found.handler)
                    .with_parameters(parameters)
                    .with_framework(found.framework)
                    .with_context(context.clone()),
                );
            }
        }

        if !candidates.is_empty() {
            log::debug!(
                "Found {} route declarations in {}",
                candidates.len(),
                fragment.location.file
            );
        }
        Ok(candidates)
    }
}

/// Drop duplicate (method, path) matches on one line, and partial matches whose
/// path is already covered by a match with a known method.
fn resolve_line(matches: Vec<LineMatch>) -> Vec<LineMatch> {
    let known_paths: Vec<String> = matches
        .iter()
        .filter(|m| m.method.is_known())
        .map(|m| m.raw_path.clone())
        .collect();

    let mut seen: Vec<(HttpMethod, String)> = Vec::new();
    let mut resolved = Vec::new();
    for found in matches {
        if !found.method.is_known() && known_paths.contains(&found.raw_path) {
            continue;
        }
        let key = (found.method, found.raw_path.clone());
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        resolved.push(found);
    }
    resolved
}

fn expand_resources(pattern: &RoutePattern, caps: &Captures<'_>, name: &str) -> Vec<LineMatch> {
    let keyword = caps.get(1).map(|m| m.as_str()).unwrap_or("resources");
    let rest = caps.get(3).map(|m| m.as_str()).unwrap_or("");
    let rails = pattern.framework == "rails";
    let singular = rails && keyword == "resource";
    let (only, except) = action_filter(rest);

    // Laravel nests with dots: `photos.comments` -> /photos/{photos_id}/comments
    let segments: Vec<&str> = name.split('.').filter(|s| !s.is_empty()).collect();
    let mut base = String::new();
    for (i, segment) in segments.iter().enumerate() {
        base.push('/');
        base.push_str(segment.trim_matches('/'));
        if i + 1 < segments.len() {
            base.push_str(&format!("/{{{segment}_id}}"));
        }
    }
    let leaf = segments.last().copied().unwrap_or(name);

    let mut out = Vec::new();
    for route in RESOURCE_ROUTES {
        if singular && route.action == "index" {
            continue;
        }
        let action = if !rails && route.action == "create" {
            "store"
        } else {
            route.action
        };
        let allowed = |list: &[String]| {
            list.iter()
                .any(|a| a == route.action || a == action)
        };
        if !only.is_empty() && !allowed(&only) {
            continue;
        }
        if allowed(&except) {
            continue;
        }

        let path = if route.member && !singular {
            format!("{base}/{{id}}")
        } else {
            base.clone()
        };
        let handler = if rails {
            format!("{leaf}#{action}")
        } else {
            format!("{leaf}.{action}")
        };
        let extra_params = if route.member && !singular {
            vec![Parameter::new("id", ParamLocation::Path)]
        } else {
            Vec::new()
        };
        out.push(LineMatch {
            method: route.method,
            raw_path: path,
            handler: Some(handler),
            framework: pattern.framework,
            extra_params,
        });
    }
    out
}

/// `only: [:index, :show]`, `except: :destroy`, `->only(['index'])`
fn action_filter(rest: &str) -> (Vec<String>, Vec<String>) {
    let mut only = Vec::new();
    let mut except = Vec::new();
    let Some(regex) = ACTION_FILTER.as_ref() else {
        return (only, except);
    };
    for caps in regex.captures_iter(rest) {
        let (Some(kind), Some(list)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let actions: Vec<String> = list
            .as_str()
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect();
        if kind.as_str() == "only" {
            only.extend(actions);
        } else {
            except.extend(actions);
        }
    }
    (only, except)
}

/// Parse `'GET', "POST"` / `["get", "post"]` / `GET,HEAD` into methods.
fn method_list(raw: &str) -> Vec<HttpMethod> {
    let mut methods = Vec::new();
    for token in raw.split(|c: char| !c.is_ascii_alphabetic()) {
        if token.is_empty() {
            continue;
        }
        let method = HttpMethod::from_token(token);
        if method.is_known() && !methods.contains(&method) {
            methods.push(method);
        }
    }
    methods
}

fn is_comment(line: &str, language: Language) -> bool {
    let trimmed = line.trim_start();
    language
        .comment_prefixes()
        .iter()
        .any(|prefix| trimmed.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn extract(file: &str, text: &str) -> Vec<EndpointCandidate> {
        let fragment = RawFragment::new(text, file, Language::from_path(file));
        SourceCodeExtractor::default().extract(&fragment).unwrap()
    }

    fn routes(candidates: &[EndpointCandidate]) -> Vec<(String, String)> {
        candidates
            .iter()
            .map(|c| (c.method.to_string(), c.path_template.clone()))
            .collect()
    }

    fn pair(method: &str, path: &str) -> (String, String) {
        (method.to_string(), path.to_string())
    }

    #[test]
    fn express_routes_with_handlers() {
        let code = r#"
const router = express.Router();
// router.get('/commented', old)
router.get('/users/:id', auth, getUser);
app.post("/users", createUser);
app.route('/books').get(listBooks).post(addBook);
"#;
        let found = extract("src/routes.js", code);
        assert_eq!(
            routes(&found),
            vec![
                pair("GET", "/users/{id}"),
                pair("POST", "/users"),
                pair("GET", "/books"),
                pair("POST", "/books"),
            ]
        );
        assert_eq!(found[0].handler_name.as_deref(), Some("getUser"));
        assert_eq!(found[0].source.line, Some(4));
        assert_eq!(found[0].parameters.len(), 1);
        assert_eq!(found[2].handler_name.as_deref(), Some("listBooks"));
        assert_eq!(found[3].handler_name.as_deref(), Some("addBook"));
        assert_eq!(found[0].framework.as_deref(), Some("express"));
    }

    #[test]
    fn express_route_without_verb_is_partial() {
        let code = "app.route('/reports')\n  .get(list)\n";
        let found = extract("app.ts", code);
        assert_eq!(routes(&found), vec![pair("UNKNOWN", "/reports")]);
    }

    #[test]
    fn flask_defaults_to_get_and_reads_method_lists() {
        let code = r#"
@app.route('/items/<int:item_id>')
def get_item(item_id):
    return {}

@bp.route("/items", methods=["GET", "POST"])
@login_required
def items():
    pass
"#;
        let found = extract("app/views.py", code);
        assert_eq!(
            routes(&found),
            vec![
                pair("GET", "/items/{item_id}"),
                pair("GET", "/items"),
                pair("POST", "/items"),
            ]
        );
        assert_eq!(found[0].handler_name.as_deref(), Some("get_item"));
        assert_eq!(
            found[0].parameters[0].type_hint.as_deref(),
            Some("int")
        );
        assert_eq!(found[2].handler_name.as_deref(), Some("items"));
    }

    #[test]
    fn fastapi_decorators() {
        let code = r#"
@router.get("/orders/{order_id}")
async def read_order(order_id: int):
    ...
@router.delete("/orders/{order_id}")
async def delete_order(order_id: int):
    ...
"#;
        let found = extract("api.py", code);
        assert_eq!(
            routes(&found),
            vec![
                pair("GET", "/orders/{order_id}"),
                pair("DELETE", "/orders/{order_id}"),
            ]
        );
        assert_eq!(found[1].handler_name.as_deref(), Some("delete_order"));
        assert_eq!(found[0].framework.as_deref(), Some("fastapi"));
    }

    #[test]
    fn spring_mappings_and_partial_request_mapping() {
        let code = r#"
@RestController
@RequestMapping("/api/users")
public class UserController {
    @GetMapping("/{id}")
    public ResponseEntity<User> getUser(@PathVariable Long id) {
        return null;
    }

    @RequestMapping(value = "/search", method = RequestMethod.POST)
    public List<User> search(@RequestBody Query q) { return null; }
}
"#;
        let found = extract("UserController.java", code);
        assert_eq!(
            routes(&found),
            vec![
                pair("UNKNOWN", "/api/users"),
                pair("GET", "/{id}"),
                pair("POST", "/search"),
            ]
        );
        assert_eq!(found[1].handler_name.as_deref(), Some("getUser"));
        assert_eq!(found[2].handler_name.as_deref(), Some("search"));
    }

    #[test]
    fn go_frameworks() {
        let code = r#"
r.GET("/ping", pingHandler)
e.POST("/users/:id", handlers.UpdateUser)
r.Get("/articles/{slug}", getArticle)
mux.HandleFunc("/health", health).Methods("GET", "HEAD")
http.HandleFunc("DELETE /items/{id}", deleteItem)
http.Get("https://example.com")
"#;
        let found = extract("main.go", code);
        assert_eq!(
            routes(&found),
            vec![
                pair("GET", "/ping"),
                pair("POST", "/users/{id}"),
                pair("GET", "/articles/{slug}"),
                pair("GET", "/health"),
                pair("HEAD", "/health"),
                pair("DELETE", "/items/{id}"),
            ]
        );
        assert_eq!(found[1].handler_name.as_deref(), Some("handlers.UpdateUser"));
        assert_eq!(found[3].handler_name.as_deref(), Some("health"));
    }

    #[test]
    fn rails_routes_and_resources() {
        let code = r#"
Rails.application.routes.draw do
  get '/status', to: 'health#show'
  resources :photos, only: [:index, :show]
  resource :profile
end
"#;
        let found = extract("config/routes.rb", code);
        assert_eq!(
            routes(&found),
            vec![
                pair("GET", "/status"),
                pair("GET", "/photos"),
                pair("GET", "/photos/{id}"),
                pair("POST", "/profile"),
                pair("GET", "/profile"),
                pair("PATCH", "/profile"),
                pair("PUT", "/profile"),
                pair("DELETE", "/profile"),
            ]
        );
        assert_eq!(found[0].handler_name.as_deref(), Some("health#show"));
        assert_eq!(found[2].handler_name.as_deref(), Some("photos#show"));
        assert_eq!(found[2].parameters.len(), 1);
    }

    #[test]
    fn full_rails_resources_expand_to_conventional_routes() {
        let found = extract("routes.rb", "  resources :users\n");
        assert_eq!(
            routes(&found),
            vec![
                pair("GET", "/users"),
                pair("POST", "/users"),
                pair("GET", "/users/{id}"),
                pair("PATCH", "/users/{id}"),
                pair("PUT", "/users/{id}"),
                pair("DELETE", "/users/{id}"),
            ]
        );
    }

    #[test]
    fn aspnet_attributes_and_minimal_apis() {
        let code = r#"
[ApiController]
[Route("api/[controller]")]
public class OrdersController : ControllerBase
{
    [HttpGet("{id:int}")]
    public async Task<IActionResult> GetOrder(int id)
    {
        return Ok();
    }
}
app.MapPost("/orders", CreateOrder);
"#;
        let found = extract("OrdersController.cs", code);
        assert_eq!(
            routes(&found),
            vec![
                pair("UNKNOWN", "/api/[controller]"),
                pair("GET", "/{id}"),
                pair("POST", "/orders"),
            ]
        );
        assert_eq!(found[1].handler_name.as_deref(), Some("GetOrder"));
        assert_eq!(found[1].parameters[0].type_hint.as_deref(), Some("int"));
        assert_eq!(found[2].handler_name.as_deref(), Some("CreateOrder"));
    }

    #[test]
    fn laravel_routes() {
        let code = r#"<?php
Route::get('/users/{user}', [UserController::class, 'show']);
Route::post('/login', 'AuthController@login');
Route::match(['get', 'post'], '/search', $handler);
Route::apiResource('photos', PhotoController::class)->only(['index', 'store']);
"#;
        let found = extract("routes/api.php", code);
        assert_eq!(
            routes(&found),
            vec![
                pair("GET", "/users/{user}"),
                pair("POST", "/login"),
                pair("GET", "/search"),
                pair("POST", "/search"),
                pair("GET", "/photos"),
                pair("POST", "/photos"),
            ]
        );
        assert_eq!(found[0].handler_name.as_deref(), Some("UserController@show"));
        assert_eq!(found[1].handler_name.as_deref(), Some("AuthController@login"));
        assert_eq!(found[5].handler_name.as_deref(), Some("photos.store"));
    }

    #[test]
    fn axum_and_actix() {
        let code = r#"
let app = Router::new()
    .route("/users", get(list_users).post(create_user))
    .route("/users/:id", delete(remove_user));

#[get("/health")]
async fn health() -> impl Responder { "ok" }

App::new().service(web::resource("/items").route(web::put().to(put_item)));
"#;
        let found = extract("src/main.rs", code);
        assert_eq!(
            routes(&found),
            vec![
                pair("GET", "/users"),
                pair("POST", "/users"),
                pair("DELETE", "/users/{id}"),
                pair("GET", "/health"),
                pair("PUT", "/items"),
            ]
        );
        assert_eq!(found[1].handler_name.as_deref(), Some("create_user"));
        assert_eq!(found[3].handler_name.as_deref(), Some("health"));
        assert_eq!(found[4].handler_name.as_deref(), Some("put_item"));
    }

    #[test]
    fn context_skips_blank_and_comment_lines() {
        let code = "// users\n\napp.get('/users', list);\n# not js but kept\nfunction list() {}\n";
        let found = extract("a.js", code);
        let context = found[0].context.clone().unwrap();
        assert!(context.contains("app.get('/users', list);"));
        assert!(context.contains("function list() {}"));
        assert!(!context.contains("// users"));
        assert!(!context.lines().any(|l| l.trim().is_empty()));
    }

    #[test]
    fn files_without_routes_yield_nothing() {
        assert!(extract("util.py", "def helper():\n    return 1\n").is_empty());
        assert!(extract("README", "app.get('/x')").is_empty());
    }
}
