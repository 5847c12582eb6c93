//! Error types: fatal errors that abort the run, and per-item phase errors
//! that are collected and reported as warnings.

use crate::backend::BackendError;
use thiserror::Error;

/// A per-file or per-chunk failure collected during a pipeline phase.
///
/// Phase errors never abort the run: the phase driver routes them into a
/// sidecar list and the pipeline keeps draining the remaining items. They
/// are printed to stderr as a block once the pipeline completes.
#[derive(Error, Debug)]
pub enum PhaseError {
    /// The backend rejected the request outright (malformed prompt, auth,
    /// quota-class limit). Never retried.
    #[error("{message}{}", fmt_path(.file_path))]
    Request {
        message: String,
        /// File the failing operation was working on, when known.
        file_path: Option<String>,
        #[source]
        source: Option<BackendError>,
    },

    /// Transient failures (rate limits, transport resets, empty streams)
    /// exhausted the retry budget.
    #[error("{message}{}", fmt_path(.file_path))]
    Timeout {
        message: String,
        file_path: Option<String>,
    },
}

impl PhaseError {
    pub fn request(
        message: impl Into<String>,
        file_path: Option<String>,
        source: Option<BackendError>,
    ) -> Self {
        Self::Request {
            message: message.into(),
            file_path,
            source,
        }
    }

    pub fn timeout(message: impl Into<String>, file_path: Option<String>) -> Self {
        Self::Timeout {
            message: message.into(),
            file_path,
        }
    }

    /// The file this error is attributed to, if any.
    pub fn file_path(&self) -> Option<&str> {
        match self {
            Self::Request { file_path, .. } | Self::Timeout { file_path, .. } => {
                file_path.as_deref()
            }
        }
    }
}

fn fmt_path(file_path: &Option<String>) -> String {
    match file_path {
        Some(p) => format!(" [{p}]"),
        None => String::new(),
    }
}

/// Errors that abort the whole run.
///
/// `Phase` is a carrier used inside phase workers so a single `Result` type
/// flows through the fan-out; the phase driver peels `Phase` off into the
/// sidecar list and propagates everything else.
#[derive(Error, Debug)]
pub enum LlmapError {
    /// Invalid configuration detected at startup.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The response cache failed at the storage level.
    #[error("cache error: {0}")]
    Cache(#[from] rusqlite::Error),

    /// Filesystem failure outside the per-file phase handling.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed (cache keys, diagnostics).
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// A collectable per-item failure; see [`PhaseError`].
    #[error(transparent)]
    Phase(#[from] PhaseError),

    /// Catch-all for other errors.
    #[error("{0}")]
    Internal(String),
}

impl From<anyhow::Error> for LlmapError {
    fn from(err: anyhow::Error) -> Self {
        LlmapError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LlmapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_error_display_includes_path() {
        let err = PhaseError::request(
            "error evaluating source code",
            Some("src/Foo.java".to_string()),
            None,
        );
        let text = err.to_string();
        assert!(text.contains("error evaluating source code"));
        assert!(text.contains("src/Foo.java"));
    }

    #[test]
    fn test_phase_error_display_without_path() {
        let err = PhaseError::timeout("repeated timeouts evaluating source code", None);
        assert_eq!(err.to_string(), "repeated timeouts evaluating source code");
    }

    #[test]
    fn test_phase_error_file_path_accessor() {
        let err = PhaseError::timeout("t", Some("a.py".to_string()));
        assert_eq!(err.file_path(), Some("a.py"));
        let err = PhaseError::timeout("t", None);
        assert_eq!(err.file_path(), None);
    }

    #[test]
    fn test_fatal_error_wraps_phase_transparently() {
        let phase = PhaseError::timeout("gave up", Some("b.py".to_string()));
        let fatal: LlmapError = phase.into();
        assert!(fatal.to_string().contains("gave up"));
        assert!(matches!(fatal, LlmapError::Phase(_)));
    }

    #[test]
    fn test_invalid_config_display() {
        let err = LlmapError::InvalidConfig("LLMAP_CACHE must be one of: none, read, write, read/write".into());
        assert!(err.to_string().starts_with("invalid configuration:"));
    }
}
