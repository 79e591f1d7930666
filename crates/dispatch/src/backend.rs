use crate::error::{BackendError, Result};
use crate::gemini::GeminiBackend;
use crate::openai::OpenAiBackend;
use crate::prompt::{build_prompt, PROMPT_VERSION};
use crate::stub::StubBackend;
use async_trait::async_trait;
use restsum_protocol::{Endpoint, HttpMethod};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// One summarization request handed to a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRequest {
    pub endpoint_id: String,
    pub method: HttpMethod,
    pub path: String,
    pub prompt: String,
    /// Upper bound for the answer, in characters.
    pub max_chars: usize,
}

impl SummaryRequest {
    pub fn for_endpoint(endpoint: &Endpoint, max_chars: usize) -> Self {
        Self {
            endpoint_id: endpoint.id.clone(),
            method: endpoint.method,
            path: endpoint.display_path.clone(),
            prompt: build_prompt(endpoint, max_chars),
            max_chars,
        }
    }
}

/// External AI service turning a request into a short summary.
#[async_trait]
pub trait SummaryBackend: Send + Sync {
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    /// `<backend>:<model>:p<prompt version>`, folded into every cache
    /// fingerprint so model or prompt changes never reuse old entries.
    fn version_tag(&self) -> String {
        format!("{}:{}:p{PROMPT_VERSION}", self.name(), self.model())
    }

    async fn summarize(&self, request: &SummaryRequest) -> Result<String>;
}

/// Backends selectable from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BackendKind {
    #[default]
    Gemini,
    OpenAi,
    Stub,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::Stub => "stub",
        }
    }

    pub fn needs_api_key(self) -> bool {
        !matches!(self, Self::Stub)
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "openai" | "openai-compatible" => Ok(Self::OpenAi),
            "stub" => Ok(Self::Stub),
            other => Err(format!(
                "Unsupported backend '{other}' (expected 'gemini', 'openai' or 'stub')"
            )),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to construct a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Artificial latency of the stub backend.
    pub stub_latency: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            model: None,
            api_key: None,
            base_url: None,
            temperature: 0.2,
            max_output_tokens: 100,
            stub_latency: Duration::ZERO,
        }
    }
}

pub fn build_backend(config: &BackendConfig) -> Result<Arc<dyn SummaryBackend>> {
    let api_key = || {
        config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                BackendError::permanent(format!(
                    "no API key configured for the {} backend",
                    config.kind
                ))
            })
    };
    let backend: Arc<dyn SummaryBackend> = match config.kind {
        BackendKind::Gemini => Arc::new(GeminiBackend::new(
            api_key()?,
            config.base_url.as_deref(),
            config.model.as_deref(),
            config.temperature,
            config.max_output_tokens,
        )?),
        BackendKind::OpenAi => Arc::new(OpenAiBackend::new(
            api_key()?,
            config.base_url.as_deref(),
            config.model.as_deref(),
            config.temperature,
            config.max_output_tokens,
        )?),
        BackendKind::Stub => Arc::new(StubBackend::new().with_latency(config.stub_latency)),
    };
    Ok(backend)
}
