//! # llmap
//!
//! Multi-stage LLM relevance search: given a corpus of source files and a
//! natural-language question, decide which fragments of those files actually
//! matter and condense what they say into a context block for a downstream
//! reasoning model.
//!
//! The crate provides the building blocks and the orchestrator:
//!
//! - **[`Cache`]** — SQLite-backed store of prior LLM answers, keyed by a
//!   hash of `(messages, model)`, so retries and reruns are free.
//! - **[`Client`]** — streaming chat-completion client with caching, retry/
//!   backoff across the provider failure taxonomy, and line-grained progress
//!   reporting.
//! - **[`prompts`]** — the triage / analyze / refine message templates.
//! - **[`Pipeline`]** — the fan-out/fan-in dataflow: skeleton triage,
//!   per-chunk analysis, per-file combination, and cross-file refinement,
//!   all under a bounded worker pool with per-file error isolation.
//!
//! ## Quick start
//!
//! ```no_run
//! use llmap::{Client, Config, NoProgress, Pipeline, TreeSitterParser};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Arc::new(Client::new(Config::from_env()?)?);
//!     let parser = Arc::new(TreeSitterParser::new(client.token_counter()));
//!     let pipeline = Pipeline::new(client, parser);
//!
//!     let paths = vec!["src/Foo.java".to_string(), "notes.txt".to_string()];
//!     let out = pipeline
//!         .search("where is the retry logic?", &paths, &NoProgress)
//!         .await?;
//!
//!     for error in &out.errors {
//!         eprintln!("{error}");
//!     }
//!     println!("{}", out.context);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod cache;
pub mod client;
pub mod collate;
pub mod config;
pub mod error;
pub mod parse;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod tokens;
pub mod types;

pub use backend::{BackendError, ChatBackend, MockBackend, OpenAiBackend};
pub use cache::{cache_key, Cache, CacheEntry};
pub use client::{Client, LlmResponse};
pub use collate::{collate, maybe_truncate, Collated};
pub use config::{CacheMode, Config, Provider};
pub use error::{LlmapError, PhaseError, Result};
pub use parse::{SourceParser, TreeSitterParser};
pub use pipeline::{Pipeline, SearchOptions, SearchOutput};
pub use progress::{NoProgress, PhaseProgress, Progress};
pub use tokens::TokenCounter;
pub use types::{Message, Role, SourceText};
