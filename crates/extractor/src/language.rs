use std::path::Path;

/// Language of a fragment, detected from its file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    JavaScript,
    TypeScript,
    Python,
    Java,
    Kotlin,
    Go,
    Ruby,
    CSharp,
    Php,
    Rust,
    Json,
    Yaml,
    Text,
    Unknown,
}

impl Language {
    /// Detect language from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "js" | "mjs" | "cjs" | "jsx" => Language::JavaScript,
            "ts" | "tsx" | "mts" | "cts" => Language::TypeScript,
            "py" | "pyw" => Language::Python,
            "java" => Language::Java,
            "kt" | "kts" => Language::Kotlin,
            "go" => Language::Go,
            "rb" => Language::Ruby,
            "cs" => Language::CSharp,
            "php" => Language::Php,
            "rs" => Language::Rust,
            "json" => Language::Json,
            "yaml" | "yml" => Language::Yaml,
            "routes" | "txt" => Language::Text,
            _ => Language::Unknown,
        }
    }

    /// Detect language from file path
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Language::Unknown)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Python => "python",
            Language::Java => "java",
            Language::Kotlin => "kotlin",
            Language::Go => "go",
            Language::Ruby => "ruby",
            Language::CSharp => "csharp",
            Language::Php => "php",
            Language::Rust => "rust",
            Language::Json => "json",
            Language::Yaml => "yaml",
            Language::Text => "text",
            Language::Unknown => "unknown",
        }
    }

    /// Whether the source-code extractor has route patterns for this language
    pub fn has_route_patterns(self) -> bool {
        matches!(
            self,
            Language::JavaScript
                | Language::TypeScript
                | Language::Python
                | Language::Java
                | Language::Kotlin
                | Language::Go
                | Language::Ruby
                | Language::CSharp
                | Language::Php
                | Language::Rust
        )
    }

    pub fn is_structured_document(self) -> bool {
        matches!(self, Language::Json | Language::Yaml)
    }

    /// Line comment prefixes, used to strip noise from context windows
    pub fn comment_prefixes(self) -> &'static [&'static str] {
        match self {
            Language::JavaScript
            | Language::TypeScript
            | Language::Java
            | Language::Kotlin
            | Language::Go
            | Language::CSharp
            | Language::Rust => &["//", "/*", "*"],
            Language::Php => &["//", "#", "/*", "*"],
            Language::Python | Language::Ruby | Language::Yaml | Language::Text => &["#"],
            Language::Json | Language::Unknown => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_languages_from_paths() {
        assert_eq!(Language::from_path("src/app.mjs"), Language::JavaScript);
        assert_eq!(Language::from_path("api/views.py"), Language::Python);
        assert_eq!(Language::from_path("Controllers/Users.cs"), Language::CSharp);
        assert_eq!(Language::from_path("openapi.YAML"), Language::Yaml);
        assert_eq!(Language::from_path("Makefile"), Language::Unknown);
    }

    #[test]
    fn only_code_languages_have_route_patterns() {
        assert!(Language::Go.has_route_patterns());
        assert!(Language::Rust.has_route_patterns());
        assert!(!Language::Json.has_route_patterns());
        assert!(!Language::Unknown.has_route_patterns());
    }
}
