//! Backend for OpenAI-compatible chat-completion APIs.
//!
//! Covers every provider the pipeline targets (DeepSeek, Gemini's OpenAI
//! compatibility layer, OpenRouter): all expose `POST {base}/chat/completions`
//! with SSE streaming.

use super::sse::DeltaDecoder;
use super::{BackendError, ChatBackend, ChatRequest, MAX_OUTPUT_TOKENS};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;

/// Streaming client for any OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct OpenAiBackend {
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redacted = if self.api_key.len() > 6 {
            format!("{}***", &self.api_key[..6])
        } else {
            "***".to_string()
        };
        f.debug_struct("OpenAiBackend")
            .field("base_url", &self.base_url)
            .field("api_key", &redacted)
            .finish()
    }
}

impl OpenAiBackend {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn build_body(request: &ChatRequest) -> serde_json::Value {
        json!({
            "model": request.model,
            "messages": request.messages,
            "stream": true,
            "max_tokens": MAX_OUTPUT_TOKENS,
        })
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    async fn stream_chat(
        &self,
        http: &reqwest::Client,
        request: &ChatRequest,
        on_delta: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> std::result::Result<String, BackendError> {
        let resp = http
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&Self::build_body(request))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status.as_u16(), body));
        }

        // The stream (and the underlying connection) is dropped on every
        // exit path, including mid-stream transport errors.
        let mut stream = resp.bytes_stream();
        let mut decoder = DeltaDecoder::new();
        let mut accumulated = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(BackendError::Transport)?;
            for delta in decoder.decode(&chunk) {
                accumulated.push_str(&delta);
                on_delta(&delta);
            }
        }
        for delta in decoder.finish() {
            accumulated.push_str(&delta);
            on_delta(&delta);
        }

        Ok(accumulated)
    }

    fn name(&self) -> &'static str {
        "openai-compatible"
    }
}
