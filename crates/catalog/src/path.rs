/// A path template in canonical form plus the placeholder names it replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPath {
    /// `/users/{0}/posts/{1}`
    pub template: String,
    /// Original placeholder names by position: `["id", "postId"]`
    pub placeholders: Vec<String>,
}

/// Collapse duplicate slashes, trim trailing slashes, ensure a single leading
/// slash and replace each `{name}` placeholder with its position.
pub fn normalize_path(raw: &str) -> NormalizedPath {
    let segments: Vec<&str> = raw.trim().split('/').filter(|s| !s.is_empty()).collect();
    let collapsed = format!("/{}", segments.join("/"));

    let mut template = String::with_capacity(collapsed.len());
    let mut placeholders = Vec::new();
    let mut rest = collapsed.as_str();

    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}').map(|c| c + open) else {
            break;
        };
        template.push_str(&rest[..open]);
        let name = rest[open + 1..close].trim();
        if name.is_empty() {
            template.push_str("{}");
        } else {
            template.push_str(&format!("{{{}}}", placeholders.len()));
            placeholders.push(name.to_string());
        }
        rest = &rest[close + 1..];
    }
    template.push_str(rest);

    NormalizedPath {
        template,
        placeholders,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn placeholders_become_positional() {
        let a = normalize_path("/users/{id}");
        let b = normalize_path("users/{userId}/");
        assert_eq!(a.template, "/users/{0}");
        assert_eq!(a.template, b.template);
        assert_eq!(b.placeholders, vec!["userId".to_string()]);
    }

    #[test]
    fn slashes_are_collapsed_and_trimmed() {
        assert_eq!(normalize_path("//api///v1//items//").template, "/api/v1/items");
        assert_eq!(normalize_path("").template, "/");
        assert_eq!(normalize_path("///").template, "/");
    }

    #[test]
    fn several_placeholders_in_one_segment() {
        let n = normalize_path("/files/{name}.{ext}/{rev}");
        assert_eq!(n.template, "/files/{0}.{1}/{2}");
        assert_eq!(
            n.placeholders,
            vec!["name".to_string(), "ext".to_string(), "rev".to_string()]
        );
    }

    #[test]
    fn unbalanced_braces_are_left_alone() {
        assert_eq!(normalize_path("/odd/{x").template, "/odd/{x");
    }
}
