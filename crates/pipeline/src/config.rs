use crate::error::{PipelineError, Result};
use restsum_cache::CacheConfig;
use restsum_catalog::NormalizerConfig;
use restsum_dispatch::DispatchConfig;
use restsum_extractor::{ExtractOptions, ScanOptions};

/// Every knob of one run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub scan: ScanOptions,
    pub extract: ExtractOptions,
    pub normalizer: NormalizerConfig,
    pub dispatch: DispatchConfig,
    /// `None` runs without a cache.
    pub cache: Option<CacheConfig>,
    /// Above this failed/total ratio the run is `failed`.
    pub max_failure_ratio: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scan: ScanOptions::default(),
            extract: ExtractOptions::default(),
            normalizer: NormalizerConfig::default(),
            dispatch: DispatchConfig::default(),
            cache: None,
            max_failure_ratio: 1.0,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        self.extract.validate().map_err(PipelineError::InvalidConfig)?;
        if !(0.0..=1.0).contains(&self.max_failure_ratio) {
            return Err(PipelineError::InvalidConfig(format!(
                "max_failure_ratio must be within 0..=1, got {}",
                self.max_failure_ratio
            )));
        }
        if self.dispatch.max_summary_chars < 4 {
            return Err(PipelineError::InvalidConfig(
                "max_summary_chars must be at least 4".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tolerates_any_failure_ratio() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.max_failure_ratio - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn out_of_range_ratio_is_rejected() {
        let config = PipelineConfig {
            max_failure_ratio: 1.5,
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(PipelineError::InvalidConfig(_))));
    }
}
