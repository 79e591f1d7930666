//! Rewriting of framework placeholder syntaxes into `{name}` form.

use restsum_protocol::{ParamLocation, Parameter};

/// A route path with placeholders rewritten to `{name}` plus the path parameters they declare
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    pub template: String,
    pub parameters: Vec<Parameter>,
}

/// Rewrite `:id`, `<int:id>`, `{id:int}`, `{*rest}`, `{id?}`, `*glob` and `:id(\d+)`
/// placeholders to `{name}`, collecting one path parameter per placeholder.
///
/// Absolute URLs lose their scheme and host, query strings are dropped and the
/// result always starts with a single `/`.
pub fn rewrite(raw: &str) -> PathTemplate {
    let path = strip_origin(raw.trim());
    let path = strip_query(path);
    let path = path.strip_prefix('~').unwrap_or(path);

    let chars: Vec<char> = path.chars().collect();
    let mut template = String::with_capacity(path.len() + 1);
    let mut parameters: Vec<Parameter> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let at_segment_start = i == 0 || matches!(chars[i - 1], '/' | '-' | '.');

        match c {
            '{' => {
                if let Some(end) = matching_close(&chars, i, '{', '}') {
                    let inner: String = chars[i + 1..end].iter().collect();
                    if let Some((name, hint)) = parse_brace(&inner) {
                        push_param(&mut template, &mut parameters, name, hint);
                        i = end + 1;
                        continue;
                    }
                }
                template.push(c);
                i += 1;
            }
            '<' => {
                if let Some(end) = chars[i..].iter().position(|&ch| ch == '>').map(|p| p + i) {
                    let inner: String = chars[i + 1..end].iter().collect();
                    if let Some((name, hint)) = parse_angle(&inner) {
                        push_param(&mut template, &mut parameters, name, hint);
                        i = end + 1;
                        continue;
                    }
                }
                template.push(c);
                i += 1;
            }
            ':' | '*' if at_segment_start && chars.get(i + 1).is_some_and(|ch| is_ident_start(*ch)) => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && is_ident_char(chars[end]) {
                    end += 1;
                }
                let name: String = chars[start..end].iter().collect();
                let mut hint = if c == '*' { Some("path".to_string()) } else { None };

                // `:id(\d+)` carries an inline constraint.
                if c == ':' && chars.get(end) == Some(&'(') {
                    if let Some(close) = matching_close(&chars, end, '(', ')') {
                        let constraint: String = chars[end + 1..close].iter().collect();
                        hint = hint_for_constraint(&constraint);
                        end = close + 1;
                    }
                }
                if matches!(chars.get(end), Some('?' | '*' | '+')) {
                    end += 1;
                }

                push_param(&mut template, &mut parameters, name, hint);
                i = end;
            }
            _ => {
                template.push(c);
                i += 1;
            }
        }
    }

    if !template.starts_with('/') {
        template.insert(0, '/');
    }

    PathTemplate {
        template,
        parameters,
    }
}

/// Join a prefix (Swagger `basePath`, router mount point) with a route path.
pub fn join(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim().trim_end_matches('/');
    let path = path.trim();
    if prefix.is_empty() || prefix == "/" {
        return path.to_string();
    }
    if path.is_empty() || path == "/" {
        return prefix.to_string();
    }
    format!("{prefix}/{}", path.trim_start_matches('/'))
}

fn push_param(
    template: &mut String,
    parameters: &mut Vec<Parameter>,
    name: String,
    hint: Option<String>,
) {
    template.push('{');
    template.push_str(&name);
    template.push('}');
    if !parameters.iter().any(|p| p.name == name) {
        parameters.push(Parameter::new(name, ParamLocation::Path).with_type_hint(hint));
    }
}

/// `{id}`, `{id:int}`, `{id:[0-9]+}`, `{*rest}`, `{id?}`, `{file_path:path}`
fn parse_brace(inner: &str) -> Option<(String, Option<String>)> {
    let inner = inner.trim();
    let (wildcard, inner) = match inner.strip_prefix('*') {
        Some(rest) => (true, rest.trim_start_matches('*')),
        None => (false, inner),
    };
    let (name, constraint) = match inner.split_once(':') {
        Some((name, constraint)) => (name, Some(constraint)),
        None => (inner, None),
    };
    let name = name.trim().trim_end_matches('?').trim_start_matches('$');
    if name.is_empty() || !name.chars().all(is_ident_char) {
        return None;
    }

    let hint = match constraint {
        Some(constraint) => {
            let constraint = constraint.trim_end_matches('?');
            hint_for_constraint(constraint)
        }
        None if wildcard => Some("path".to_string()),
        None => None,
    };
    Some((name.to_string(), hint))
}

/// Flask/Werkzeug converters: `<id>`, `<int:id>`, `<path:rest>`
fn parse_angle(inner: &str) -> Option<(String, Option<String>)> {
    let (converter, name) = match inner.split_once(':') {
        Some((converter, name)) => (Some(converter.trim()), name.trim()),
        None => (None, inner.trim()),
    };
    if name.is_empty() || !name.chars().all(is_ident_char) {
        return None;
    }
    if let Some(converter) = converter {
        if converter.is_empty() || !converter.chars().all(is_ident_char) {
            return None;
        }
    }
    Some((name.to_string(), converter.map(str::to_ascii_lowercase)))
}

/// Type hint implied by a placeholder constraint. Named constraints (`int`, `guid`)
/// are kept; numeric regexes map to `int`; other regexes carry no hint.
fn hint_for_constraint(constraint: &str) -> Option<String> {
    let constraint = constraint.trim();
    if constraint.is_empty() {
        return None;
    }
    if constraint.chars().all(is_ident_char) {
        return Some(constraint.to_ascii_lowercase());
    }
    // `int:min(1)` style chains: the first named constraint decides.
    if let Some((head, _)) = constraint.split_once(':') {
        if !head.is_empty() && head.chars().all(is_ident_char) {
            return Some(head.to_ascii_lowercase());
        }
    }
    let numeric = constraint
        .trim_start_matches('^')
        .trim_end_matches('$')
        .replace("\\\\", "\\");
    if matches!(
        numeric.as_str(),
        "\\d+" | "[0-9]+" | "\\d*" | "[0-9]*" | "[\\d]+" | "[1-9][0-9]*" | "[1-9]\\d*"
    ) {
        return Some("int".to_string());
    }
    None
}

fn strip_origin(path: &str) -> &str {
    for scheme in ["https://", "http://"] {
        if let Some(rest) = path.strip_prefix(scheme) {
            return match rest.find('/') {
                Some(idx) => &rest[idx..],
                None => "/",
            };
        }
    }
    path
}

/// Drop `?a=b` query strings but keep optional markers such as `:id?` and `{id?}`.
fn strip_query(path: &str) -> &str {
    let mut depth = 0usize;
    for (idx, ch) in path.char_indices() {
        match ch {
            '{' | '(' | '<' => depth += 1,
            '}' | ')' | '>' => depth = depth.saturating_sub(1),
            '?' if depth == 0 => {
                let rest = &path[idx + 1..];
                if rest.contains('=') || (!rest.is_empty() && !rest.starts_with('/')) {
                    return &path[..idx];
                }
            }
            _ => {}
        }
    }
    path
}

fn matching_close(chars: &[char], open_at: usize, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, &ch) in chars[open_at..].iter().enumerate() {
        if ch == open {
            depth += 1;
        } else if ch == close {
            depth -= 1;
            if depth == 0 {
                return Some(open_at + offset);
            }
        }
    }
    None
}

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn hints(t: &PathTemplate) -> Vec<(String, Option<String>)> {
        t.parameters
            .iter()
            .map(|p| (p.name.clone(), p.type_hint.clone()))
            .collect()
    }

    #[test]
    fn express_colon_params() {
        let t = rewrite("/users/:id/posts/:postId?");
        assert_eq!(t.template, "/users/{id}/posts/{postId}");
        assert_eq!(
            hints(&t),
            vec![("id".to_string(), None), ("postId".to_string(), None)]
        );
    }

    #[test]
    fn express_inline_regex_becomes_int_hint() {
        let t = rewrite(r"/orders/:id(\d+)");
        assert_eq!(t.template, "/orders/{id}");
        assert_eq!(hints(&t), vec![("id".to_string(), Some("int".to_string()))]);
    }

    #[test]
    fn flask_converters() {
        let t = rewrite("/files/<path:name>/<int:rev>");
        assert_eq!(t.template, "/files/{name}/{rev}");
        assert_eq!(
            hints(&t),
            vec![
                ("name".to_string(), Some("path".to_string())),
                ("rev".to_string(), Some("int".to_string()))
            ]
        );
    }

    #[test]
    fn brace_constraints_and_wildcards() {
        let t = rewrite("api/items/{id:int}/{*rest}");
        assert_eq!(t.template, "/api/items/{id}/{rest}");
        assert_eq!(
            hints(&t),
            vec![
                ("id".to_string(), Some("int".to_string())),
                ("rest".to_string(), Some("path".to_string()))
            ]
        );

        let chi = rewrite("/articles/{slug:[a-z-]+}");
        assert_eq!(chi.template, "/articles/{slug}");
        assert_eq!(hints(&chi), vec![("slug".to_string(), None)]);
    }

    #[test]
    fn rails_and_gin_globs() {
        let t = rewrite("/static/*filepath");
        assert_eq!(t.template, "/static/{filepath}");
        assert_eq!(
            hints(&t),
            vec![("filepath".to_string(), Some("path".to_string()))]
        );
    }

    #[test]
    fn optional_brace_params_keep_their_name() {
        let t = rewrite("/posts/{page?}");
        assert_eq!(t.template, "/posts/{page}");
    }

    #[test]
    fn urls_and_queries_are_stripped() {
        assert_eq!(rewrite("https://api.example.com/v1/users?limit=10").template, "/v1/users");
        assert_eq!(rewrite("").template, "/");
        assert_eq!(rewrite("~/health").template, "/health");
    }

    #[test]
    fn literal_text_is_kept() {
        let t = rewrite("/time:now/a*b");
        assert_eq!(t.template, "/time:now/a*b");
        assert!(t.parameters.is_empty());
    }

    #[test]
    fn join_handles_slashes() {
        assert_eq!(join("/v2/", "/pets"), "/v2/pets");
        assert_eq!(join("/", "/pets"), "/pets");
        assert_eq!(join("/api", ""), "/api");
    }
}
