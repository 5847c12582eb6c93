//! Transport layer: the [`ChatBackend`] trait and its failure taxonomy.
//!
//! A backend turns a [`ChatRequest`] into a streamed completion, surfacing
//! deltas through a callback and returning the accumulated text. The
//! [`Client`](crate::client::Client) layers caching and the retry policy on
//! top; backends only classify failures.
//!
//! ```text
//! Client::ask ──► ChatRequest ──► ChatBackend::stream_chat ──► String
//!                                        │
//!                              ┌─────────┴─────────┐
//!                         OpenAiBackend        MockBackend
//!                     /chat/completions SSE   scripted replies
//! ```

pub mod mock;
pub mod openai;
pub mod sse;

pub use mock::MockBackend;
pub use openai::OpenAiBackend;

use crate::types::Message;
use async_trait::async_trait;
use thiserror::Error;

/// Output budget requested per completion (`max_tokens` in the request
/// body). The pipeline also reserves this much input room wherever a
/// completion is fed back into a follow-up request.
pub const MAX_OUTPUT_TOKENS: u32 = 8_000;

/// A chat-completion request as sent upstream.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Model identifier (e.g. `"deepseek-chat"`).
    pub model: String,
    /// Full conversation, in order.
    pub messages: Vec<Message>,
}

/// How a completion attempt failed.
///
/// The fatal variants (`BadRequest`, `Authentication`, `PermissionDenied`,
/// `UnprocessableEntity`) mean the backend rejected the request itself and
/// retrying is pointless. Everything else is transient.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("unprocessable entity: {0}")]
    UnprocessableEntity(String),

    #[error("rate limited")]
    RateLimit,

    /// Any other non-success status from the provider.
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Connection-level failure (reset, refused, mid-stream drop).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The stream completed but carried no content; treated as a transient
    /// server fault.
    #[error("empty completion stream")]
    EmptyStream,
}

impl BackendError {
    /// True when retrying the same request cannot succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BackendError::BadRequest(_)
                | BackendError::Authentication(_)
                | BackendError::PermissionDenied(_)
                | BackendError::UnprocessableEntity(_)
        )
    }

    /// Classify a non-success HTTP status into the taxonomy.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            400 => BackendError::BadRequest(body),
            401 => BackendError::Authentication(body),
            403 => BackendError::PermissionDenied(body),
            422 => BackendError::UnprocessableEntity(body),
            429 => BackendError::RateLimit,
            _ => BackendError::Api { status, body },
        }
    }
}

/// Abstraction over streaming chat-completion providers.
///
/// Object-safe; used as `Arc<dyn ChatBackend>` so tests can substitute
/// [`MockBackend`].
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Open a streaming completion for `request`, invoking `on_delta` for
    /// each content fragment as it arrives, and return the accumulated
    /// content. Implementations close the stream on all exit paths.
    async fn stream_chat(
        &self,
        http: &reqwest::Client,
        request: &ChatRequest,
        on_delta: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> std::result::Result<String, BackendError>;

    /// Human-readable name for logging.
    fn name(&self) -> &'static str;
}
