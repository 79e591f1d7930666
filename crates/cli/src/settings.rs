//! Layered configuration: defaults, then the TOML file, then environment,
//! then command-line flags.

use crate::{DiscoveryArgs, SumArgs};
use anyhow::{anyhow, Context, Result};
use restsum_cache::{CacheBackend, CacheConfig};
use restsum_catalog::{NormalizerConfig, UnknownMethodPolicy};
use restsum_dispatch::{
    parse_concurrency, BackendConfig, BackendKind, DispatchConfig, RetryPolicy,
    DEFAULT_CONCURRENCY, DEFAULT_MAX_SUMMARY_CHARS,
};
use restsum_extractor::{ExtractOptions, ScanOptions};
use restsum_pipeline::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub(crate) const CONFIG_ENV: &str = "RESTSUM_CONFIG";
const API_KEY_ENV: &str = "RESTSUM_API_KEY";
const GEMINI_KEY_ENV: &str = "GEMINI_API_KEY";
const OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";

const DEFAULT_RUN_TIMEOUT_SECS: u64 = 300;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CACHE_TTL_SECS: u64 = 86_400;

/// Contents of `config.toml`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct FileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gemini_api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_initial_delay_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_request_interval_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_summary_chars: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unknown_methods: Option<UnknownMethodPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_failure_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
    #[serde(skip_serializing_if = "CacheSection::is_empty")]
    pub cache: CacheSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct CacheSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<CacheBackend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,
}

impl CacheSection {
    fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl FileConfig {
    /// `$RESTSUM_CONFIG`, else `<config_dir>/restsum/config.toml`.
    pub(crate) fn path() -> Result<PathBuf> {
        if let Some(path) = env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(path));
        }
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("restsum").join("config.toml"))
    }

    pub(crate) fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    pub(crate) fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub(crate) fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config {}", path.display()))
    }

    pub(crate) fn api_key_for(&self, kind: BackendKind) -> Option<&str> {
        match kind {
            BackendKind::Gemini => self.gemini_api_key.as_deref(),
            BackendKind::OpenAi => self.openai_api_key.as_deref(),
            BackendKind::Stub => None,
        }
    }

    pub(crate) fn set_api_key(&mut self, kind: BackendKind, key: String) -> Result<()> {
        match kind {
            BackendKind::Gemini => self.gemini_api_key = Some(key),
            BackendKind::OpenAi => self.openai_api_key = Some(key),
            BackendKind::Stub => return Err(anyhow!("The stub backend takes no API key")),
        }
        Ok(())
    }

    pub(crate) fn backend_kind(&self) -> Result<Option<BackendKind>> {
        self.backend
            .as_deref()
            .map(|raw| raw.parse::<BackendKind>().map_err(|err| anyhow!(err)))
            .transpose()
    }
}

/// `abcd...wxyz`; keys of 8 characters or fewer are fully hidden.
pub(crate) fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Environment first, then the config file.
pub(crate) fn resolve_api_key(file: &FileConfig, kind: BackendKind) -> Option<String> {
    let specific = match kind {
        BackendKind::Gemini => Some(GEMINI_KEY_ENV),
        BackendKind::OpenAi => Some(OPENAI_KEY_ENV),
        BackendKind::Stub => None,
    };
    std::iter::once(API_KEY_ENV)
        .chain(specific)
        .filter_map(|name| env::var(name).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .or_else(|| {
            file.api_key_for(kind)
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
        })
}

pub(crate) fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("restsum"))
        .unwrap_or_else(|| PathBuf::from(".restsum").join("cache"))
}

pub(crate) fn resolve_cache(file: &FileConfig, args: &SumArgs) -> Option<CacheConfig> {
    if args.no_cache || file.cache.enabled == Some(false) {
        return None;
    }
    Some(cache_config(file, args.cache_dir.clone(), args.cache_backend.map(|b| b.as_domain())))
}

pub(crate) fn cache_config(
    file: &FileConfig,
    dir: Option<PathBuf>,
    backend: Option<CacheBackend>,
) -> CacheConfig {
    let dir = dir
        .or_else(|| file.cache.dir.clone())
        .unwrap_or_else(default_cache_dir);
    let backend = backend.or(file.cache.backend).unwrap_or_default();
    let ttl = Duration::from_secs(file.cache.ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS));
    let mut config = match backend {
        CacheBackend::File => CacheConfig::file(dir),
        CacheBackend::Memory => CacheConfig::memory(),
    };
    config.ttl = ttl;
    config
}

pub(crate) fn resolve_discovery(file: &FileConfig, args: &DiscoveryArgs) -> PipelineConfig {
    let scan = ScanOptions {
        include: if args.include.is_empty() {
            file.include.clone()
        } else {
            args.include.clone()
        },
        exclude: file.exclude.iter().chain(&args.exclude).cloned().collect(),
        ..ScanOptions::default()
    };
    let unknown_methods = args
        .unknown_methods
        .map(|flag| flag.as_domain())
        .or(file.unknown_methods)
        .unwrap_or_default();
    PipelineConfig {
        scan,
        extract: ExtractOptions::default(),
        normalizer: NormalizerConfig { unknown_methods },
        ..PipelineConfig::default()
    }
}

/// Everything a `sum` run needs.
pub(crate) struct Resolved {
    pub pipeline: PipelineConfig,
    pub backend: BackendConfig,
}

pub(crate) fn resolve_sum(file: &FileConfig, args: &SumArgs) -> Result<Resolved> {
    let kind = match args.backend {
        Some(flag) => flag.as_domain(),
        None => file.backend_kind()?.unwrap_or_default(),
    };
    let backend = BackendConfig {
        kind,
        model: args.model.clone().or_else(|| file.model.clone()),
        api_key: resolve_api_key(file, kind),
        base_url: args.base_url.clone().or_else(|| file.base_url.clone()),
        stub_latency: Duration::from_millis(args.stub_latency_ms.unwrap_or(0)),
        ..BackendConfig::default()
    };

    let concurrency_raw = args
        .concurrency
        .clone()
        .or_else(|| file.concurrency.map(|n| n.to_string()));
    let run_timeout_secs = args
        .timeout
        .or(file.timeout_seconds)
        .unwrap_or(DEFAULT_RUN_TIMEOUT_SECS);
    let request_timeout_secs = args
        .request_timeout
        .or(file.request_timeout_seconds)
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

    let mut retry = RetryPolicy::default();
    if let Some(retries) = args.retries.or(file.retries) {
        retry = retry.with_max_retries(retries);
    }
    if let Some(ms) = file.retry_initial_delay_ms {
        retry = retry.with_initial_delay(Duration::from_millis(ms));
    }

    let dispatch = DispatchConfig {
        concurrency: parse_concurrency(concurrency_raw.as_deref(), DEFAULT_CONCURRENCY),
        request_timeout: Duration::from_secs(request_timeout_secs),
        run_timeout: Some(run_timeout_secs)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs),
        min_request_interval: Duration::from_millis(
            args.min_request_interval_ms
                .or(file.min_request_interval_ms)
                .unwrap_or(0),
        ),
        max_summary_chars: file.max_summary_chars.unwrap_or(DEFAULT_MAX_SUMMARY_CHARS),
        retry,
    };

    let pipeline = PipelineConfig {
        dispatch,
        cache: resolve_cache(file, args),
        max_failure_ratio: args
            .max_failure_ratio
            .or(file.max_failure_ratio)
            .unwrap_or(1.0),
        ..resolve_discovery(file, &args.discovery)
    };
    Ok(Resolved { pipeline, backend })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn masks_keys_like_the_config_command_prints_them() {
        assert_eq!(mask_api_key("short"), "****");
        assert_eq!(mask_api_key("12345678"), "****");
        assert_eq!(mask_api_key("AIzaSyExampleKey1234"), "AIza...1234");
    }

    #[test]
    fn config_round_trips_through_toml() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");
        let mut config = FileConfig {
            backend: Some("openai".into()),
            concurrency: Some(8),
            unknown_methods: Some(UnknownMethodPolicy::Skip),
            ..FileConfig::default()
        };
        config.cache.ttl_seconds = Some(60);
        config
            .set_api_key(BackendKind::OpenAi, "sk-test-123456789".into())
            .expect("set key");
        config.save_to(&path).expect("save");

        let loaded = FileConfig::load_from(&path).expect("load");
        assert_eq!(loaded, config);
        assert_eq!(loaded.backend_kind().expect("kind"), Some(BackendKind::OpenAi));
        assert_eq!(
            loaded.api_key_for(BackendKind::OpenAi),
            Some("sk-test-123456789")
        );
    }

    #[test]
    fn missing_file_is_default() {
        let dir = TempDir::new().expect("tempdir");
        let loaded = FileConfig::load_from(&dir.path().join("absent.toml")).expect("load");
        assert_eq!(loaded, FileConfig::default());
    }

    #[test]
    fn stub_takes_no_key() {
        let mut config = FileConfig::default();
        assert!(config.set_api_key(BackendKind::Stub, "x".into()).is_err());
    }
}
