use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What to do with endpoints whose HTTP method could not be determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownMethodPolicy {
    /// Summarize them and attach a warning
    #[default]
    Warn,
    /// Report them as skipped without calling the backend
    Skip,
    /// Remove them from the catalog
    Drop,
}

impl UnknownMethodPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            UnknownMethodPolicy::Warn => "warn",
            UnknownMethodPolicy::Skip => "skip",
            UnknownMethodPolicy::Drop => "drop",
        }
    }
}

impl FromStr for UnknownMethodPolicy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "warn" => Ok(UnknownMethodPolicy::Warn),
            "skip" => Ok(UnknownMethodPolicy::Skip),
            "drop" => Ok(UnknownMethodPolicy::Drop),
            other => Err(format!(
                "unknown-method policy must be warn, skip or drop (got `{other}`)"
            )),
        }
    }
}

impl fmt::Display for UnknownMethodPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(
            "SKIP".parse::<UnknownMethodPolicy>(),
            Ok(UnknownMethodPolicy::Skip)
        );
        assert_eq!(UnknownMethodPolicy::default(), UnknownMethodPolicy::Warn);
        assert!("ignore".parse::<UnknownMethodPolicy>().is_err());
    }
}
