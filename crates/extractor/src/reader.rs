use crate::config::ScanOptions;
use crate::error::{ExtractError, Result};
use crate::language::Language;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use restsum_protocol::{InputKind, SourceLocation};
use std::path::{Component, Path, PathBuf};

/// One chunk of input handed to an extractor: the text of a file plus where it came from.
#[derive(Debug, Clone)]
pub struct RawFragment {
    pub text: String,
    pub location: SourceLocation,
    pub language: Language,
}

impl RawFragment {
    pub fn new(text: impl Into<String>, file: impl Into<String>, language: Language) -> Self {
        Self {
            text: text.into(),
            location: SourceLocation::new(file, None),
            language,
        }
    }
}

/// Reads fragments of one declared kind from a root directory or file
pub struct SourceReader {
    root: PathBuf,
    kind: InputKind,
    options: ScanOptions,
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
}

impl SourceReader {
    /// Parse the kind selector, then open the root.
    pub fn open(root: impl AsRef<Path>, kind: &str, options: ScanOptions) -> Result<Self> {
        let kind = InputKind::parse(kind)
            .ok_or_else(|| ExtractError::UnsupportedInputKind(kind.trim().to_string()))?;
        Self::new(root, kind, options)
    }

    /// Fails with `Io` when the root cannot be read.
    pub fn new(root: impl AsRef<Path>, kind: InputKind, options: ScanOptions) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let meta = std::fs::metadata(&root).map_err(|err| ExtractError::io(&root, err))?;
        if meta.is_dir() {
            std::fs::read_dir(&root).map_err(|err| ExtractError::io(&root, err))?;
        } else {
            std::fs::File::open(&root).map_err(|err| ExtractError::io(&root, err))?;
        }

        let include = build_globset(&options.include)?;
        let exclude = build_globset(&options.exclude)?;
        Ok(Self {
            root,
            kind,
            options,
            include,
            exclude,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn kind(&self) -> InputKind {
        self.kind
    }

    /// Start a fresh pass over the input. Each call walks the root again, so the
    /// sequence is restartable; file contents are read only when the iterator
    /// reaches them.
    pub fn fragments(&self) -> Fragments {
        let base = if self.root.is_file() {
            self.root
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.root.clone())
        } else {
            self.root.clone()
        };
        Fragments {
            base,
            paths: self.collect_paths().into_iter(),
        }
    }

    fn collect_paths(&self) -> Vec<PathBuf> {
        if self.root.is_file() {
            let language = Language::from_path(&self.root);
            if self.kind == InputKind::SourceTree && !language.has_route_patterns() {
                log::warn!(
                    "{} has no known route patterns ({})",
                    self.root.display(),
                    language.as_str()
                );
                return Vec::new();
            }
            return vec![self.root.clone()];
        }

        let respect = self.options.respect_gitignore;
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(true)
            .ignore(respect)
            .git_ignore(respect)
            .git_global(respect)
            .git_exclude(respect)
            .parents(respect);

        let root = self.root.clone();
        let kind = self.kind;
        builder.filter_entry(move |entry| !is_ignored_scope(entry.path(), &root, kind));

        let mut files = Vec::new();
        for result in builder.build() {
            let entry = match result {
                Ok(entry) => entry,
                Err(err) => {
                    log::warn!("Failed to read entry: {err}");
                    continue;
                }
            };
            let Some(file_type) = entry.file_type() else {
                continue;
            };
            if !file_type.is_file() {
                continue;
            }

            let path = entry.path();
            if let Ok(meta) = entry.metadata() {
                if meta.len() > self.options.max_file_bytes {
                    log::debug!(
                        "Skipping large file {} ({} bytes > {})",
                        path.display(),
                        meta.len(),
                        self.options.max_file_bytes
                    );
                    continue;
                }
            }

            if is_noise_file(path) {
                log::debug!("Skipping noisy artifact {}", path.display());
                continue;
            }

            if !self.accepts_kind(path) {
                continue;
            }

            let rel = relative_display(path, &self.root);
            if let Some(include) = &self.include {
                if !include.is_match(&rel) {
                    continue;
                }
            }
            if let Some(exclude) = &self.exclude {
                if exclude.is_match(&rel) {
                    continue;
                }
            }

            files.push(path.to_path_buf());
        }

        files.sort();
        log::info!(
            "Found {} {} files under {}",
            files.len(),
            self.kind,
            self.root.display()
        );
        files
    }

    fn accepts_kind(&self, path: &Path) -> bool {
        let language = Language::from_path(path);
        match self.kind {
            InputKind::SourceTree => language.has_route_patterns(),
            InputKind::ApiDocument => language.is_structured_document(),
            InputKind::RouteTable => language == Language::Text,
        }
    }
}

/// Lazy, finite sequence of fragments produced by [`SourceReader::fragments`]
pub struct Fragments {
    base: PathBuf,
    paths: std::vec::IntoIter<PathBuf>,
}

impl Iterator for Fragments {
    type Item = Result<RawFragment>;

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.paths.next()?;
        let rel = relative_display(&path, &self.base);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) => return Some(Err(ExtractError::io(path, err))),
        };
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => {
                return Some(Err(ExtractError::malformed(
                    rel,
                    format!("not valid UTF-8 ({err})"),
                )))
            }
        };
        Some(Ok(RawFragment::new(text, rel, Language::from_path(&path))))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.paths.size_hint()
    }
}

fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>> {
    let patterns: Vec<&str> = patterns
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect();
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|err| ExtractError::InvalidGlob {
            pattern: pattern.to_string(),
            reason: err.to_string(),
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map(Some)
        .map_err(|err| ExtractError::InvalidGlob {
            pattern: "<set>".to_string(),
            reason: err.to_string(),
        })
}

fn relative_display(path: &Path, base: &Path) -> String {
    let rel = path.strip_prefix(base).unwrap_or(path);
    let text = rel.to_string_lossy().replace('\\', "/");
    if text.is_empty() {
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    } else {
        text
    }
}

fn is_ignored_scope(path: &Path, root: &Path, kind: InputKind) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };
    for component in relative.components() {
        if let Component::Normal(name) = component {
            let lowered = name.to_string_lossy().to_lowercase();
            if IGNORED_SCOPES.iter().any(|ignored| ignored == &lowered) {
                return true;
            }
            if kind == InputKind::SourceTree
                && SOURCE_ONLY_IGNORED_SCOPES
                    .iter()
                    .any(|ignored| ignored == &lowered)
            {
                return true;
            }
        }
    }
    false
}

fn is_noise_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.contains(".min.") {
        return true;
    }
    NOISE_FILE_NAMES
        .iter()
        .any(|candidate| name.eq_ignore_ascii_case(candidate))
}

const IGNORED_SCOPES: &[&str] = &[
    // VCS / tooling
    ".git",
    ".hg",
    ".svn",
    ".idea",
    ".vscode",
    // caches / builds
    ".cache",
    "cache",
    "node_modules",
    ".next",
    ".nuxt",
    ".turbo",
    ".output",
    "build",
    "dist",
    "out",
    "bin",
    "obj",
    "coverage",
    "target",
    "tmp",
    "temp",
    "logs",
    ".venv",
    "venv",
    "__pycache__",
    // vendor
    "vendor",
    "third_party",
    "third-party",
];

/// Scopes that rarely declare live routes but often contain documentation or fixtures.
const SOURCE_ONLY_IGNORED_SCOPES: &[&str] = &[
    "test",
    "tests",
    "__tests__",
    "spec",
    "specs",
    "docs",
    "documentation",
    "examples",
    "migrations",
    "public",
    "static",
    "assets",
];

const NOISE_FILE_NAMES: &[&str] = &[
    "package.json",
    "package-lock.json",
    "pnpm-lock.yaml",
    "yarn.lock",
    "tsconfig.json",
    "composer.json",
    "composer.lock",
    "docker-compose.yml",
    "docker-compose.yaml",
    ".eslintrc.json",
    "requirements.txt",
    "cmakelists.txt",
    "license.txt",
];

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn collect(reader: &SourceReader) -> Vec<String> {
        reader
            .fragments()
            .map(|f| f.unwrap().location.file)
            .collect()
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let temp = tempdir().unwrap();
        let err = SourceReader::open(temp.path(), "graphql", ScanOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, ExtractError::UnsupportedInputKind(ref k) if k == "graphql"));
    }

    #[test]
    fn missing_root_is_an_io_error() {
        let temp = tempdir().unwrap();
        let err = SourceReader::new(
            temp.path().join("nope"),
            InputKind::SourceTree,
            ScanOptions::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, ExtractError::Io { .. }));
    }

    #[test]
    fn source_tree_skips_vendor_tests_and_minified_files() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("node_modules/express")).unwrap();
        fs::create_dir_all(root.join("tests")).unwrap();
        fs::write(root.join("src/app.js"), "app.get('/a', h)").unwrap();
        fs::write(root.join("src/app.min.js"), "app.get('/b', h)").unwrap();
        fs::write(root.join("node_modules/express/index.js"), "x").unwrap();
        fs::write(root.join("tests/app.test.js"), "app.get('/c', h)").unwrap();
        fs::write(root.join("README.md"), "# readme").unwrap();

        let reader =
            SourceReader::new(root, InputKind::SourceTree, ScanOptions::default()).unwrap();
        assert_eq!(collect(&reader), vec!["src/app.js".to_string()]);
    }

    #[test]
    fn fragments_are_sorted_and_restartable() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::write(root.join("b.py"), "x").unwrap();
        fs::write(root.join("a.go"), "x").unwrap();

        let reader =
            SourceReader::new(root, InputKind::SourceTree, ScanOptions::default()).unwrap();
        let first = collect(&reader);
        let second = collect(&reader);
        assert_eq!(first, vec!["a.go".to_string(), "b.py".to_string()]);
        assert_eq!(first, second);
    }

    #[test]
    fn include_and_exclude_globs_apply_to_relative_paths() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("api")).unwrap();
        fs::create_dir_all(root.join("admin")).unwrap();
        fs::write(root.join("api/users.ts"), "x").unwrap();
        fs::write(root.join("api/legacy.ts"), "x").unwrap();
        fs::write(root.join("admin/panel.ts"), "x").unwrap();

        let options = ScanOptions {
            include: vec!["api/**".to_string()],
            exclude: vec!["**/legacy.ts".to_string()],
            ..Default::default()
        };
        let reader = SourceReader::new(root, InputKind::SourceTree, options).unwrap();
        assert_eq!(collect(&reader), vec!["api/users.ts".to_string()]);
    }

    #[test]
    fn invalid_glob_is_reported() {
        let temp = tempdir().unwrap();
        let options = ScanOptions {
            include: vec!["api/[".to_string()],
            ..Default::default()
        };
        let err = SourceReader::new(temp.path(), InputKind::SourceTree, options)
            .err()
            .unwrap();
        assert!(matches!(err, ExtractError::InvalidGlob { .. }));
    }

    #[test]
    fn api_documents_are_read_from_docs_directories() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("docs")).unwrap();
        fs::write(root.join("docs/openapi.yaml"), "openapi: 3.0.0").unwrap();
        fs::write(root.join("package.json"), "{}").unwrap();

        let reader =
            SourceReader::new(root, InputKind::ApiDocument, ScanOptions::default()).unwrap();
        assert_eq!(collect(&reader), vec!["docs/openapi.yaml".to_string()]);
    }

    #[test]
    fn single_file_root_yields_itself() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("petstore.json");
        fs::write(&file, "{}").unwrap();

        let reader =
            SourceReader::new(&file, InputKind::ApiDocument, ScanOptions::default()).unwrap();
        assert_eq!(collect(&reader), vec!["petstore.json".to_string()]);
    }
}
