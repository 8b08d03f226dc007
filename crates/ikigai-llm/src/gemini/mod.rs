//! Google Gemini provider (spec §4.3 "C3 Stream Adapter").
//!
//! Generalizes the Anthropic SSE shape this crate is modeled on
//! (`event:`/`data:` pairs) to Gemini's flatter `alt=sse` stream, which
//! sends only `data: {json}` lines with no `event:` framing at all.

mod ids;
mod non_streaming;
mod stream;
mod wire;

use std::time::Duration;

use async_stream::stream as async_stream_ready;
use bytes::Bytes;
use futures::StreamExt;
use ikigai_types::{Request, Response, StreamEvent};
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::error::{LlmError, Result};
use crate::provider::{with_cancellation, EventStream, Provider};
pub use stream::StreamContext;

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| LlmError::Config("GEMINI_API_KEY environment variable not set".to_string()))?;
        Ok(Self::new(api_key))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

pub struct GeminiProvider {
    client: Client,
    config: GeminiConfig,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(LlmError::Transport)?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(GeminiConfig::from_env()?)
    }

    fn generate_url(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.config.base_url, model, self.config.api_key
        )
    }

    fn stream_url(&self, model: &str) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse&key={}",
            self.config.base_url, model, self.config.api_key
        )
    }
}

#[async_trait::async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, request: Request) -> Result<Response> {
        let body = wire::to_gemini_request(&request);
        let response = self
            .client
            .post(self.generate_url(&request.model))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let value: serde_json::Value = response.json().await?;
        if !status.is_success() && value.get("error").is_none() {
            return Err(LlmError::provider(
                ikigai_types::ErrorCategory::from_http_status(status.as_u16()),
                format!("HTTP {status}"),
            ));
        }
        non_streaming::parse_response(&value)
    }

    fn stream(&self, request: Request) -> (EventStream, CancellationToken) {
        let token = CancellationToken::new();
        let body = wire::to_gemini_request(&request);
        let url = self.stream_url(&request.model);
        let client = self.client.clone();

        let inner: EventStream = Box::pin(async_stream_ready! {
            let send_result = client.post(url).json(&body).send().await;
            let response = match send_result {
                Ok(r) => r,
                Err(e) => {
                    yield StreamEvent::Error {
                        category: ikigai_types::ErrorCategory::Network,
                        message: e.to_string(),
                    };
                    return;
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let body_text = response.text().await.unwrap_or_default();
                yield StreamEvent::Error {
                    category: ikigai_types::ErrorCategory::from_http_status(status.as_u16()),
                    message: format!("HTTP {status}: {body_text}"),
                };
                return;
            }

            let mut ctx = StreamContext::new();
            let mut buffer = String::new();
            let mut byte_stream = response.bytes_stream();

            while let Some(chunk) = byte_stream.next().await {
                let bytes: Bytes = match chunk {
                    Ok(b) => b,
                    Err(e) => {
                        yield StreamEvent::Error {
                            category: ikigai_types::ErrorCategory::Network,
                            message: e.to_string(),
                        };
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&bytes));

                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim_end_matches('\r').to_string();
                    buffer.drain(..=line_end);
                    if let Some(data) = line.strip_prefix("data:") {
                        for event in ctx.process_chunk(data.trim()) {
                            yield event;
                        }
                    }
                }
            }
        });

        (with_cancellation(token.clone(), inner), token)
    }
}
