//! The caching, retrying LLM client.
//!
//! [`Client::ask`] is the single entry point every prompt goes through. It
//! consults the response cache, opens a streaming completion, reports
//! line-grained progress, classifies failures, and applies the retry policy:
//! rate limits back off exponentially with jitter, transport faults and
//! empty streams retry after a fixed pause, and provider rejections fail the
//! item immediately. After ten attempts the item gets a timeout error.
//!
//! Both the cache-hit path and the live path produce the same
//! [`LlmResponse`] record, so callers never see where an answer came from.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{BackendError, ChatBackend, ChatRequest, OpenAiBackend};
use crate::cache::{cache_key, Cache};
use crate::config::{CacheMode, Config};
use crate::error::{PhaseError, Result};
use crate::progress::PhaseProgress;
use crate::tokens::TokenCounter;
use crate::types::Message;

/// Total attempts per request before giving up.
const MAX_ATTEMPTS: u32 = 10;

/// A completed LLM answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmResponse {
    pub content: String,
}

/// Shared handle to the LLM backend, response cache, and token counter.
pub struct Client {
    http: reqwest::Client,
    backend: Arc<dyn ChatBackend>,
    cache: Option<Cache>,
    counter: Arc<TokenCounter>,
    config: Config,
}

impl Client {
    /// Build a client for the configured provider, opening the default
    /// on-disk cache unless caching is disabled.
    pub fn new(config: Config) -> Result<Self> {
        let backend = Arc::new(OpenAiBackend::new(
            config.provider.base_url(),
            config.api_key.clone(),
        ));
        let cache = match config.cache_mode {
            CacheMode::None => None,
            _ => Some(Cache::open_default()?),
        };
        let counter = Arc::new(TokenCounter::new()?);
        tracing::info!("using {} API", config.provider.name());
        Ok(Self::with_backend(config, backend, cache, counter))
    }

    /// Assemble a client from explicit parts. This is how tests substitute
    /// a [`MockBackend`](crate::backend::MockBackend) or a temp-file cache.
    pub fn with_backend(
        config: Config,
        backend: Arc<dyn ChatBackend>,
        cache: Option<Cache>,
        counter: Arc<TokenCounter>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            backend,
            cache,
            counter,
            config,
        }
    }

    /// Per-request input ceiling for the selected provider.
    pub fn max_tokens(&self) -> usize {
        self.config.max_tokens()
    }

    pub fn analyze_model(&self) -> &str {
        &self.config.analyze_model
    }

    pub fn refine_model(&self) -> &str {
        &self.config.refine_model
    }

    /// The token counter shared with collation and chunking.
    pub fn token_counter(&self) -> Arc<TokenCounter> {
        Arc::clone(&self.counter)
    }

    /// Send a chat completion, with caching, streaming progress, and retry.
    ///
    /// `file_path` attributes any failure to the file being worked on.
    /// Streaming deltas report their newline counts to `progress`.
    pub async fn ask(
        &self,
        messages: Vec<Message>,
        model: &str,
        file_path: Option<&str>,
        progress: &dyn PhaseProgress,
    ) -> Result<LlmResponse> {
        let prompt_tokens: usize = messages
            .iter()
            .map(|m| self.counter.count(&m.content))
            .sum();
        if prompt_tokens > self.max_tokens() {
            return Err(PhaseError::request(
                format!(
                    "prompt of {prompt_tokens} tokens exceeds the {} token ceiling",
                    self.max_tokens()
                ),
                file_path.map(String::from),
                None,
            )
            .into());
        }

        let key = cache_key(&messages, model)?;
        if self.config.cache_mode.reads() {
            if let Some(cache) = &self.cache {
                if let Some(entry) = cache.get(&key).await? {
                    return Ok(LlmResponse {
                        content: entry.answer,
                    });
                }
            }
        }

        let request = ChatRequest {
            model: model.to_string(),
            messages,
        };

        for attempt in 0..MAX_ATTEMPTS {
            let mut on_delta = |delta: &str| {
                let lines = delta.bytes().filter(|b| *b == b'\n').count();
                if lines > 0 {
                    progress.lines_received(lines);
                }
            };

            match self
                .backend
                .stream_chat(&self.http, &request, &mut on_delta)
                .await
            {
                Ok(content) => {
                    if content.trim().is_empty() {
                        // Providers occasionally close a 200 stream without
                        // any content; treat like a transient server fault.
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        continue;
                    }
                    if self.config.verbose {
                        eprintln!("{content}");
                    }
                    if self.config.cache_mode.writes() {
                        if let Some(cache) = &self.cache {
                            cache.set(&key, &content).await?;
                        }
                    }
                    return Ok(LlmResponse { content });
                }
                Err(err) if err.is_fatal() => {
                    self.log_rejected_request(&request, &err);
                    return Err(PhaseError::request(
                        "error evaluating source code",
                        file_path.map(String::from),
                        Some(err),
                    )
                    .into());
                }
                Err(BackendError::RateLimit) => {
                    let delay = 2f64.powi(attempt as i32) + fastrand::f64() * 5.0;
                    tracing::debug!(attempt, "rate limited, backing off {delay:.1}s");
                    tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                }
                Err(err) => {
                    tracing::debug!(attempt, "transient backend error: {err}");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }

        Err(PhaseError::timeout(
            "repeated timeouts evaluating source code",
            file_path.map(String::from),
        )
        .into())
    }

    /// Append the rejected request body to a diagnostic log for post-mortem.
    fn log_rejected_request(&self, request: &ChatRequest, err: &BackendError) {
        let path = std::env::temp_dir().join("llmap_request_errors.log");
        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut f| {
                let body = serde_json::to_string(&request.messages).unwrap_or_default();
                writeln!(f, "{body}\n\n-> {err}\n")
            });
        if let Err(io_err) = result {
            tracing::warn!("could not write request diagnostics to {path:?}: {io_err}");
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("backend", &self.backend.name())
            .field("cache_mode", &self.config.cache_mode)
            .field("analyze_model", &self.config.analyze_model)
            .field("refine_model", &self.config.refine_model)
            .finish_non_exhaustive()
    }
}
