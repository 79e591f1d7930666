//! Route-declaration patterns per framework.
//!
//! Each pattern is line oriented. A pattern yields the path from one capture
//! group and the method either from a capture group, from a method list, from
//! chained calls later on the same line, or from its default. Patterns whose
//! default method is `Unknown` describe partial matches: the path is known,
//! the verb is not.

use crate::language::Language;
use once_cell::sync::Lazy;
use regex::Regex;
use restsum_protocol::HttpMethod;

/// How the HTTP method of a match is determined
#[derive(Debug, Clone, Copy)]
pub(crate) enum MethodSource {
    /// A single verb in this capture group
    Group(usize),
    /// A list such as `methods=['GET', 'POST']` in this capture group
    List(usize),
    /// Nothing in the match names the verb; the pattern default applies
    Default,
}

/// Post-processing applied to a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Expansion {
    None,
    /// Verbs come from chained calls after the match (`.get(h).post(h)`,
    /// `.Methods("GET")`); group 1 of the chain regex holds the verb(s),
    /// group 2 the optional handler.
    Chain(ChainKind),
    /// `resources :users` / `Route::resource('users', ...)`
    Resources,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChainKind {
    Express,
    GorillaMethods,
    Axum,
    ActixRoute,
    ActixAttribute,
}

#[derive(Debug)]
pub(crate) struct RoutePattern {
    pub framework: &'static str,
    pub languages: &'static [Language],
    pub regex: Regex,
    pub method: MethodSource,
    pub default_method: HttpMethod,
    pub path_group: usize,
    /// Capture groups naming the handler; the first alternative whose groups all
    /// matched wins and its groups are joined with `@`.
    pub handler_groups: &'static [&'static [usize]],
    /// Look for a function definition on the following lines (decorators, attributes).
    pub handler_lookahead: bool,
    pub expansion: Expansion,
}

const JS: &[Language] = &[Language::JavaScript, Language::TypeScript];
const PY: &[Language] = &[Language::Python];
const JVM: &[Language] = &[Language::Java, Language::Kotlin];
const GO: &[Language] = &[Language::Go];
const RB: &[Language] = &[Language::Ruby];
const CS: &[Language] = &[Language::CSharp];
const PHP: &[Language] = &[Language::Php];
const RS: &[Language] = &[Language::Rust];

struct Spec {
    framework: &'static str,
    languages: &'static [Language],
    regex: &'static str,
    method: MethodSource,
    default_method: HttpMethod,
    path_group: usize,
    handler_groups: &'static [&'static [usize]],
    handler_lookahead: bool,
    expansion: Expansion,
}

impl Spec {
    const fn new(
        framework: &'static str,
        languages: &'static [Language],
        regex: &'static str,
        method: MethodSource,
        path_group: usize,
    ) -> Self {
        Self {
            framework,
            languages,
            regex,
            method,
            default_method: HttpMethod::Unknown,
            path_group,
            handler_groups: &[],
            handler_lookahead: false,
            expansion: Expansion::None,
        }
    }

    const fn default_method(mut self, method: HttpMethod) -> Self {
        self.default_method = method;
        self
    }

    const fn handler(mut self, groups: &'static [&'static [usize]]) -> Self {
        self.handler_groups = groups;
        self
    }

    const fn lookahead(mut self) -> Self {
        self.handler_lookahead = true;
        self
    }

    const fn expand(mut self, expansion: Expansion) -> Self {
        self.expansion = expansion;
        self
    }
}

const SPECS: &[Spec] = &[
    // Express / Node: app.get('/path', auth, handler)
    Spec::new(
        "express",
        JS,
        r#"\b(?:app|router|server|api|routes?|fastify|\w+Router)\.(get|post|put|delete|patch|options|head|all)\s*\(\s*['"`]([^'"`]+)['"`](?:\s*,\s*(?:[\w.$]+\s*,\s*)*([A-Za-z_$][\w.$]*)\s*\))?"#,
        MethodSource::Group(1),
        2,
    )
    .handler(&[&[3]]),
    // app.route('/path').get(h).post(h)
    Spec::new(
        "express",
        JS,
        r#"\b(?:app|router|\w+Router)\.route\s*\(\s*['"`]([^'"`]+)['"`]\s*\)"#,
        MethodSource::Default,
        1,
    )
    .expand(Expansion::Chain(ChainKind::Express)),
    // Flask: @app.route('/path', methods=['GET', 'POST'])
    Spec::new(
        "flask",
        PY,
        r#"@\w+\.route\s*\(\s*['"]([^'"]+)['"](?:[^)]*?methods\s*=\s*[\[(]([^\])]*)[\])])?"#,
        MethodSource::List(2),
        1,
    )
    .default_method(HttpMethod::Get)
    .lookahead(),
    // FastAPI (and Flask 2 shortcuts): @router.get("/path")
    Spec::new(
        "fastapi",
        PY,
        r#"@\w+\.(get|post|put|delete|patch|options|head|trace)\s*\(\s*['"]([^'"]*)['"]"#,
        MethodSource::Group(1),
        2,
    )
    .lookahead(),
    // @router.api_route("/path", methods=["GET"])
    Spec::new(
        "fastapi",
        PY,
        r#"@\w+\.api_route\s*\(\s*['"]([^'"]+)['"](?:[^)]*?methods\s*=\s*[\[(]([^\])]*)[\])])?"#,
        MethodSource::List(2),
        1,
    )
    .lookahead(),
    // Spring: @GetMapping("/path"), @PostMapping(value = "/path")
    Spec::new(
        "spring",
        JVM,
        r#"@(Get|Post|Put|Delete|Patch)Mapping\s*\(\s*(?:(?:value|path)\s*=\s*)?[\[{]?\s*"([^"]*)""#,
        MethodSource::Group(1),
        2,
    )
    .lookahead(),
    // @RequestMapping(value = "/path", method = RequestMethod.GET)
    Spec::new(
        "spring",
        JVM,
        r#"@RequestMapping\s*\(\s*(?:(?:value|path)\s*=\s*)?[\[{]?\s*"([^"]+)"[^)]*?method\s*=\s*[\[{]?\s*RequestMethod\.(\w+)"#,
        MethodSource::Group(2),
        1,
    )
    .lookahead(),
    // @RequestMapping("/path") without a method
    Spec::new(
        "spring",
        JVM,
        r#"@RequestMapping\s*\(\s*(?:(?:value|path)\s*=\s*)?[\[{]?\s*"([^"]+)""#,
        MethodSource::Default,
        1,
    )
    .lookahead(),
    // Gin / Echo: r.GET("/path", mw, handler)
    Spec::new(
        "gin",
        GO,
        r#"\b\w+\.(GET|POST|PUT|DELETE|PATCH|OPTIONS|HEAD|Any)\s*\(\s*["`]([^"`]+)["`](?:\s*,\s*(?:[\w.]+\s*,\s*)*([\w.]+)\s*\))?"#,
        MethodSource::Group(1),
        2,
    )
    .handler(&[&[3]]),
    // chi: r.Get("/path", handler)
    Spec::new(
        "chi",
        GO,
        r#"\b\w+\.(Get|Post|Put|Delete|Patch|Options|Head)\s*\(\s*"(/[^"]*)"(?:\s*,\s*([\w.]+)\s*\))?"#,
        MethodSource::Group(1),
        2,
    )
    .handler(&[&[3]]),
    // net/http and gorilla/mux: HandleFunc("GET /path", h) / HandleFunc("/path", h).Methods("GET")
    Spec::new(
        "net/http",
        GO,
        r#"\.Handle(?:Func)?\s*\(\s*"(?:(GET|POST|PUT|DELETE|PATCH|HEAD|OPTIONS)\s+)?(/[^"]*)"(?:\s*,\s*([\w.]+))?"#,
        MethodSource::Group(1),
        2,
    )
    .handler(&[&[3]])
    .expand(Expansion::Chain(ChainKind::GorillaMethods)),
    // Rails: get '/path', to: 'users#index'
    Spec::new(
        "rails",
        RB,
        r#"^\s*(get|post|put|patch|delete|match)\s*\(?\s*['"]([^'"]+)['"](?:.*?(?:\bto:\s*|=>\s*)['"]([\w/]+#\w+)['"])?"#,
        MethodSource::Group(1),
        2,
    )
    .handler(&[&[3]]),
    // resources :users, only: [:index, :show]
    Spec::new(
        "rails",
        RB,
        r#"^\s*(resources?)\s*\(?\s*:(\w+)(.*)$"#,
        MethodSource::Default,
        2,
    )
    .expand(Expansion::Resources),
    // ASP.NET Core: [HttpGet("{id}")]
    Spec::new(
        "aspnet",
        CS,
        r#"\[Http(Get|Post|Put|Delete|Patch|Head|Options)\s*\(\s*(?:template:\s*)?"([^"]*)""#,
        MethodSource::Group(1),
        2,
    )
    .lookahead(),
    // [Route("api/[controller]")]
    Spec::new(
        "aspnet",
        CS,
        r#"\[Route\s*\(\s*"([^"]+)"\s*\)"#,
        MethodSource::Default,
        1,
    )
    .lookahead(),
    // Minimal APIs: app.MapGet("/path", handler)
    Spec::new(
        "aspnet",
        CS,
        r#"\b\w+\.Map(Get|Post|Put|Delete|Patch)\s*\(\s*"([^"]+)"(?:\s*,\s*([A-Za-z_][\w.]*)\s*\))?"#,
        MethodSource::Group(1),
        2,
    )
    .handler(&[&[3]]),
    // Laravel: Route::get('/path', [UserController::class, 'show'])
    Spec::new(
        "laravel",
        PHP,
        r#"Route::(get|post|put|patch|delete|options|any)\s*\(\s*['"]([^'"]+)['"](?:\s*,\s*\[\s*([\w\\]+)::class\s*,\s*['"](\w+)['"]|\s*,\s*['"]([\w\\]+@\w+)['"])?"#,
        MethodSource::Group(1),
        2,
    )
    .handler(&[&[3, 4], &[5]]),
    // Route::match(['get', 'post'], '/path', ...)
    Spec::new(
        "laravel",
        PHP,
        r#"Route::match\s*\(\s*\[([^\]]*)\]\s*,\s*['"]([^'"]+)['"]"#,
        MethodSource::List(1),
        2,
    ),
    // Route::resource('photos', PhotoController::class)
    Spec::new(
        "laravel",
        PHP,
        r#"Route::(?:api)?([Rr]esources?)\s*\(\s*['"]([\w./-]+)['"](.*)$"#,
        MethodSource::Default,
        2,
    )
    .expand(Expansion::Resources),
    // Axum: .route("/path", get(list).post(create))
    Spec::new(
        "axum",
        RS,
        r#"\.route\s*\(\s*"([^"]+)"\s*,"#,
        MethodSource::Default,
        1,
    )
    .expand(Expansion::Chain(ChainKind::Axum)),
    // Actix: #[get("/path")]
    Spec::new(
        "actix",
        RS,
        r#"#\[(get|post|put|delete|patch|head|options|trace)\s*\(\s*"([^"]+)""#,
        MethodSource::Group(1),
        2,
    )
    .lookahead(),
    // #[route("/path", method = "GET", method = "POST")]
    Spec::new(
        "actix",
        RS,
        r#"#\[route\s*\(\s*"([^"]+)""#,
        MethodSource::Default,
        1,
    )
    .lookahead()
    .expand(Expansion::Chain(ChainKind::ActixAttribute)),
    // web::resource("/path").route(web::get().to(handler))
    Spec::new(
        "actix",
        RS,
        r#"web::resource\s*\(\s*"([^"]+)"\s*\)"#,
        MethodSource::Default,
        1,
    )
    .expand(Expansion::Chain(ChainKind::ActixRoute)),
];

/// Last resort for any code language: `.route("/path")` with no recognised verb.
const GENERIC_ROUTE: &str = r#"\.route\s*\(\s*['"`](/[^'"`]*)['"`]"#;

fn compile(source: &str) -> Option<Regex> {
    match Regex::new(source) {
        Ok(regex) => Some(regex),
        Err(err) => {
            log::error!("Route pattern failed to compile ({err}): {source}");
            None
        }
    }
}

pub(crate) static ROUTE_PATTERNS: Lazy<Vec<RoutePattern>> = Lazy::new(|| {
    SPECS
        .iter()
        .filter_map(|spec| {
            compile(spec.regex).map(|regex| RoutePattern {
                framework: spec.framework,
                languages: spec.languages,
                regex,
                method: spec.method,
                default_method: spec.default_method,
                path_group: spec.path_group,
                handler_groups: spec.handler_groups,
                handler_lookahead: spec.handler_lookahead,
                expansion: spec.expansion,
            })
        })
        .collect()
});

pub(crate) static GENERIC_ROUTE_PATTERN: Lazy<Option<RoutePattern>> = Lazy::new(|| {
    compile(GENERIC_ROUTE).map(|regex| RoutePattern {
        framework: "generic",
        languages: &[],
        regex,
        method: MethodSource::Default,
        default_method: HttpMethod::Unknown,
        path_group: 1,
        handler_groups: &[],
        handler_lookahead: false,
        expansion: Expansion::None,
    })
});

static EXPRESS_CHAIN: Lazy<Option<Regex>> = Lazy::new(|| {
    compile(r"\.(get|post|put|delete|patch|options|head|all)\s*\(\s*(?:[\w.$]+\s*,\s*)*([A-Za-z_$][\w.$]*)?")
});
static GORILLA_CHAIN: Lazy<Option<Regex>> = Lazy::new(|| compile(r"\.Methods\s*\(([^)]*)\)"));
static AXUM_CHAIN: Lazy<Option<Regex>> = Lazy::new(|| {
    compile(r"\b(get|post|put|delete|patch|head|options|trace|any)\s*\(\s*([\w:]+)?")
});
static ACTIX_ROUTE_CHAIN: Lazy<Option<Regex>> = Lazy::new(|| {
    compile(r"web::(get|post|put|delete|patch|head|trace)\s*\(\s*\)(?:\s*\.to\s*\(\s*([\w:]+))?")
});
static ACTIX_ATTRIBUTE_CHAIN: Lazy<Option<Regex>> =
    Lazy::new(|| compile(r#"method\s*=\s*"(\w+)""#));

impl ChainKind {
    pub(crate) fn regex(self) -> Option<&'static Regex> {
        let lazy = match self {
            ChainKind::Express => &EXPRESS_CHAIN,
            ChainKind::GorillaMethods => &GORILLA_CHAIN,
            ChainKind::Axum => &AXUM_CHAIN,
            ChainKind::ActixRoute => &ACTIX_ROUTE_CHAIN,
            ChainKind::ActixAttribute => &ACTIX_ATTRIBUTE_CHAIN,
        };
        lazy.as_ref()
    }

    /// Whether group 1 is a list of verbs rather than a single verb.
    pub(crate) fn is_list(self) -> bool {
        matches!(self, ChainKind::GorillaMethods)
    }
}

static PYTHON_DEF: Lazy<Option<Regex>> =
    Lazy::new(|| compile(r"^\s*(?:async\s+)?def\s+(\w+)\s*\("));
static JAVA_METHOD: Lazy<Option<Regex>> = Lazy::new(|| {
    compile(r"^\s*(?:(?:public|private|protected|static|final|synchronized|abstract)\s+)*[\w<>\[\],.?\s]+?\s+(\w+)\s*\(")
});
static KOTLIN_FUN: Lazy<Option<Regex>> =
    Lazy::new(|| compile(r"^\s*(?:(?:public|private|internal|protected|suspend|override)\s+)*fun\s+(\w+)\s*\("));
static CSHARP_METHOD: Lazy<Option<Regex>> = Lazy::new(|| {
    compile(r"^\s*(?:(?:public|private|protected|internal|static|async|virtual|override)\s+)+[\w<>\[\],.?\s]*?\s(\w+)\s*\(")
});
static RUST_FN: Lazy<Option<Regex>> =
    Lazy::new(|| compile(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?fn\s+(\w+)"));

/// Function-definition regex used to find the handler below a decorator or attribute.
pub(crate) fn handler_definition(language: Language) -> Option<&'static Regex> {
    let lazy = match language {
        Language::Python => &PYTHON_DEF,
        Language::Java => &JAVA_METHOD,
        Language::Kotlin => &KOTLIN_FUN,
        Language::CSharp => &CSHARP_METHOD,
        Language::Rust => &RUST_FN,
        _ => return None,
    };
    lazy.as_ref()
}

/// One route of a conventional resource expansion.
pub(crate) struct ResourceRoute {
    pub action: &'static str,
    pub method: HttpMethod,
    pub member: bool,
}

pub(crate) const RESOURCE_ROUTES: &[ResourceRoute] = &[
    ResourceRoute {
        action: "index",
        method: HttpMethod::Get,
        member: false,
    },
    ResourceRoute {
        action: "create",
        method: HttpMethod::Post,
        member: false,
    },
    ResourceRoute {
        action: "show",
        method: HttpMethod::Get,
        member: true,
    },
    ResourceRoute {
        action: "update",
        method: HttpMethod::Patch,
        member: true,
    },
    ResourceRoute {
        action: "update",
        method: HttpMethod::Put,
        member: true,
    },
    ResourceRoute {
        action: "destroy",
        method: HttpMethod::Delete,
        member: true,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_pattern_compiles() {
        assert_eq!(ROUTE_PATTERNS.len(), SPECS.len());
        assert!(GENERIC_ROUTE_PATTERN.is_some());
        for kind in [
            ChainKind::Express,
            ChainKind::GorillaMethods,
            ChainKind::Axum,
            ChainKind::ActixRoute,
            ChainKind::ActixAttribute,
        ] {
            assert!(kind.regex().is_some(), "{kind:?}");
        }
        for language in [
            Language::Python,
            Language::Java,
            Language::Kotlin,
            Language::CSharp,
            Language::Rust,
        ] {
            assert!(handler_definition(language).is_some(), "{language:?}");
        }
    }

    #[test]
    fn every_pattern_names_a_code_language() {
        for pattern in ROUTE_PATTERNS.iter() {
            assert!(!pattern.languages.is_empty(), "{}", pattern.framework);
            assert!(pattern
                .languages
                .iter()
                .all(|language| language.has_route_patterns()));
        }
    }
}
