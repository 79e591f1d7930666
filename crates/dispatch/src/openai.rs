//! OpenAI-compatible `/chat/completions` backend.

use crate::backend::{SummaryBackend, SummaryRequest};
use crate::error::{BackendError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

const SYSTEM_PROMPT: &str =
    "You summarize REST API endpoints in one short line. Never add explanations or numbering.";

pub struct OpenAiBackend {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiBackend {
    pub fn new(
        api_key: &str,
        base_url: Option<&str>,
        model: Option<&str>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(BackendError::permanent("missing OpenAI API key"));
        }
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| BackendError::permanent("invalid OpenAI API key"))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|err| BackendError::permanent(format!("failed to build HTTP client: {err}")))?;

        let base = base_url.unwrap_or(DEFAULT_OPENAI_BASE_URL).trim_end_matches('/');
        Ok(Self {
            client,
            endpoint: format!("{base}/chat/completions"),
            model: model
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(DEFAULT_OPENAI_MODEL)
                .to_string(),
            temperature,
            max_tokens,
        })
    }
}

#[async_trait]
impl SummaryBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn summarize(&self, request: &SummaryRequest) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
        };

        let resp = self.client.post(&self.endpoint).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(BackendError::from_status(status, &text));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|err| BackendError::permanent(format!("unreadable OpenAI response: {err}")))?;
        let answer = parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .unwrap_or_default();
        if answer.trim().is_empty() {
            return Err(BackendError::permanent("empty answer"));
        }
        Ok(answer)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let backend = OpenAiBackend::new("sk-test", Some("http://localhost:8080/v1/"), None, 0.2, 100)
            .expect("backend");
        assert_eq!(backend.endpoint, "http://localhost:8080/v1/chat/completions");
        assert_eq!(backend.version_tag(), "openai:gpt-4o-mini:p1");
    }

    #[test]
    fn null_content_parses_as_missing() {
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).expect("parse");
        assert!(parsed.choices[0].message.content.is_none());
    }
}
