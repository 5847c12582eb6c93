//! Scripted backend for testing without a live provider.
//!
//! [`MockBackend`] answers from a canned reply script (cycling when
//! exhausted) or from a handler that inspects the request, and records every
//! request it sees so tests can assert on token budgets, call counts, and
//! message contents.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{BackendError, ChatBackend, ChatRequest};

/// One scripted outcome of a mock call.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Successful completion with this content.
    Content(String),
    /// `429` from the provider.
    RateLimited,
    /// Generic retryable server error.
    ServerError,
    /// Non-retryable rejection.
    BadRequest(String),
    /// Stream completes with no content.
    Empty,
}

impl MockReply {
    fn into_result(self) -> std::result::Result<String, BackendError> {
        match self {
            MockReply::Content(text) => Ok(text),
            MockReply::RateLimited => Err(BackendError::RateLimit),
            MockReply::ServerError => Err(BackendError::Api {
                status: 500,
                body: "internal server error".into(),
            }),
            MockReply::BadRequest(body) => Err(BackendError::BadRequest(body)),
            MockReply::Empty => Ok(String::new()),
        }
    }
}

type Handler = dyn Fn(&ChatRequest) -> MockReply + Send + Sync;

/// A test backend with scripted replies and request recording.
pub struct MockBackend {
    script: Vec<MockReply>,
    handler: Option<Box<Handler>>,
    requests: Mutex<Vec<ChatRequest>>,
    calls: AtomicUsize,
}

impl MockBackend {
    /// Replies are played in order, cycling when exhausted.
    pub fn sequence(script: Vec<MockReply>) -> Self {
        assert!(!script.is_empty(), "MockBackend requires at least one reply");
        Self {
            script,
            handler: None,
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always return the same content.
    pub fn fixed(content: impl Into<String>) -> Self {
        Self::sequence(vec![MockReply::Content(content.into())])
    }

    /// Route every call through `handler`; useful when concurrent phases
    /// make arrival order nondeterministic.
    pub fn with_handler(handler: impl Fn(&ChatRequest) -> MockReply + Send + Sync + 'static) -> Self {
        Self {
            script: Vec::new(),
            handler: Some(Box::new(handler)),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Total calls made against this backend.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    /// Every request received, in arrival order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn reply_for(&self, request: &ChatRequest, call_index: usize) -> MockReply {
        if let Some(handler) = &self.handler {
            handler(request)
        } else {
            self.script[call_index % self.script.len()].clone()
        }
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn stream_chat(
        &self,
        _http: &reqwest::Client,
        request: &ChatRequest,
        on_delta: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> std::result::Result<String, BackendError> {
        let call_index = self.calls.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let content = self.reply_for(request, call_index).into_result()?;
        if !content.is_empty() {
            on_delta(&content);
        }
        Ok(content)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
