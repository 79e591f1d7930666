use serde::{Deserialize, Serialize};

/// Controls which files the source reader yields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOptions {
    /// Glob patterns (relative to the root) a file must match; empty = everything
    #[serde(default)]
    pub include: Vec<String>,

    /// Glob patterns (relative to the root) that exclude a file
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Files above this size are skipped
    pub max_file_bytes: u64,

    /// Honour .gitignore / .ignore files while walking
    pub respect_gitignore: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            max_file_bytes: 1_048_576,
            respect_gitignore: true,
        }
    }
}

/// Controls how much surrounding text a candidate carries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractOptions {
    /// Lines of context kept above a route declaration
    pub context_before: usize,

    /// Lines of context kept below a route declaration
    pub context_after: usize,

    /// Hard cap on context length (chars)
    pub max_context_chars: usize,

    /// How many lines below a decorator/attribute to look for the handler definition
    pub handler_lookahead: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            context_before: 2,
            context_after: 5,
            max_context_chars: 600,
            handler_lookahead: 4,
        }
    }
}

impl ExtractOptions {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_context_chars == 0 {
            return Err("max_context_chars must be > 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ExtractOptions::default().validate().is_ok());
        assert_eq!(ScanOptions::default().max_file_bytes, 1_048_576);
    }

    #[test]
    fn zero_context_budget_is_rejected() {
        let options = ExtractOptions {
            max_context_chars: 0,
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }
}
