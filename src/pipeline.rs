//! The relevance-search orchestrator.
//!
//! Executes the phases as a bounded-concurrency dataflow:
//!
//! ```text
//! paths ──► partition ──► skeleton triage ──► chunk ──► analyze
//!               │               (batch)         │    (per chunk)
//!               └── raw ────────────────────────┘         │
//!                                                  group by file
//!                                                         │
//!                                     collate ──► refine ──► context
//!                                        └──► large files ────┘
//! ```
//!
//! Each phase fans out over a semaphore-bounded worker pool and fully drains
//! before the next begins. Per-item failures become [`PhaseError`]s in a
//! sidecar list; anything else aborts the outstanding workers and the run.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::backend::MAX_OUTPUT_TOKENS;
use crate::client::Client;
use crate::collate::{collate, maybe_truncate};
use crate::error::{LlmapError, PhaseError, Result};
use crate::parse::SourceParser;
use crate::progress::{PhaseProgress, Progress};
use crate::prompts;
use crate::tokens::TokenCounter;
use crate::types::SourceText;

/// Token ceiling for one batch of skeletons in the triage phase.
const TRIAGE_GROUP_TOKENS: usize = 20_000;

/// Tokens reserved for prompt scaffolding (instructions, file headers)
/// around user content, so packed content plus scaffolding stays under the
/// request ceiling.
const PROMPT_ALLOWANCE: usize = 2_000;

/// Tunables for a search run.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Maximum in-flight work items per phase.
    pub concurrency: usize,
    /// Run the refinement phase (`false` flattens analyses directly).
    pub refine: bool,
    /// Triage parseable files by skeleton before deep analysis.
    pub analyze_skeletons: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            concurrency: 100,
            refine: true,
            analyze_skeletons: true,
        }
    }
}

/// Result of a search run: the condensed context plus all non-fatal errors
/// encountered along the way.
#[derive(Debug)]
pub struct SearchOutput {
    pub errors: Vec<PhaseError>,
    pub context: String,
}

/// Multi-stage relevance search over a set of source files.
pub struct Pipeline {
    client: Arc<Client>,
    parser: Arc<dyn SourceParser>,
    counter: Arc<TokenCounter>,
    options: SearchOptions,
}

impl Pipeline {
    pub fn new(client: Arc<Client>, parser: Arc<dyn SourceParser>) -> Self {
        let counter = client.token_counter();
        Self {
            client,
            parser,
            counter,
            options: SearchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }

    /// Run the full search for `question` over `paths`.
    pub async fn search(
        &self,
        question: &str,
        paths: &[String],
        progress: &dyn Progress,
    ) -> Result<SearchOutput> {
        // Content budget per request: the provider ceiling minus the
        // question and scaffolding, so every packed prompt passes the
        // client's pre-send guard.
        let budget = self
            .client
            .max_tokens()
            .saturating_sub(self.counter.count(question) + PROMPT_ALLOWANCE);
        if budget == 0 {
            return Err(LlmapError::InvalidConfig(
                "question does not leave room for any source content".into(),
            ));
        }

        let mut errors = Vec::new();

        // Phase 0: split into skeleton-triageable and raw files.
        let (parseable, mut raw): (Vec<String>, Vec<String>) = if self.options.analyze_skeletons {
            paths
                .iter()
                .cloned()
                .partition(|p| self.parser.parseable(Path::new(p)))
        } else {
            (Vec::new(), paths.to_vec())
        };

        // Phase 1: batch skeletons and ask which files deserve analysis.
        let mut relevant: Vec<String> = Vec::new();
        if !parseable.is_empty() {
            let mut skeletons = Vec::new();
            for path in parseable {
                match self.parser.extract_skeleton(Path::new(&path)) {
                    Ok(text) => skeletons.push(SourceText::new(path, text)),
                    Err(err) => {
                        tracing::warn!(
                            "skeleton extraction failed for {path}: {err}; analyzing full source"
                        );
                        raw.push(path);
                    }
                }
            }

            let collated = collate(&self.counter, skeletons, TRIAGE_GROUP_TOKENS);
            let mut batches = collated.groups;
            for oversized in collated.large {
                let truncated = maybe_truncate(
                    &self.counter,
                    oversized.text,
                    budget,
                    &oversized.file_path,
                );
                batches.push(vec![SourceText::new(oversized.file_path, truncated)]);
            }

            if !batches.is_empty() {
                let phase = progress.start_phase("Skeleton triage", batches.len());
                let work = batches
                    .into_iter()
                    .map(|batch| {
                        let client = Arc::clone(&self.client);
                        let question = question.to_string();
                        let phase = Arc::clone(&phase);
                        async move {
                            let response = prompts::multi_skeleton_relevance(
                                &client,
                                &batch,
                                &question,
                                phase.as_ref(),
                            )
                            .await?;
                            let matched: Vec<String> = batch
                                .iter()
                                .filter(|s| response_mentions(&response, &s.file_path))
                                .map(|s| s.file_path.clone())
                                .collect();
                            Ok(matched)
                        }
                    })
                    .collect();
                let (batch_results, phase_errors) =
                    run_phase(work, self.options.concurrency, phase).await?;
                errors.extend(phase_errors);
                relevant.extend(batch_results.into_iter().flatten());
            }
        }
        relevant.extend(raw);

        // Phase 2a: chunk every surviving file under the content budget.
        let phase = progress.start_phase("Parsing full source", relevant.len());
        let work = relevant
            .into_iter()
            .map(|path| {
                let parser = Arc::clone(&self.parser);
                async move {
                    match parser.chunk(Path::new(&path), budget) {
                        Ok(chunks) => Ok((path, chunks)),
                        Err(err) => Err(PhaseError::request(
                            format!("failed to chunk source: {err}"),
                            Some(path),
                            None,
                        )
                        .into()),
                    }
                }
            })
            .collect();
        let (file_chunks, phase_errors) = run_phase(work, self.options.concurrency, phase).await?;
        errors.extend(phase_errors);

        // Phase 2b: analyze every (file, chunk) pair.
        let chunk_pairs: Vec<(String, String)> = file_chunks
            .into_iter()
            .flat_map(|(path, chunks)| {
                chunks.into_iter().map(move |chunk| (path.clone(), chunk))
            })
            .collect();
        let phase = progress.start_phase("Analyzing full source", chunk_pairs.len());
        let work = chunk_pairs
            .into_iter()
            .map(|(path, chunk)| {
                let client = Arc::clone(&self.client);
                let question = question.to_string();
                let phase = Arc::clone(&phase);
                async move {
                    prompts::full_source_relevance(&client, &chunk, &question, &path, phase.as_ref())
                        .await
                }
            })
            .collect();
        let (analyses, phase_errors) = run_phase(work, self.options.concurrency, phase).await?;
        errors.extend(phase_errors);

        // Phase 3: merge chunk analyses per file, in sorted order so cache
        // keys stay deterministic across runs, truncating to the absolute
        // request ceiling.
        let mut by_file: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for analysis in analyses {
            by_file.entry(analysis.file_path).or_default().push(analysis.text);
        }
        let mut per_file = Vec::new();
        for (path, mut texts) in by_file {
            texts.sort();
            let combined = texts.join("\n\n");
            let truncated =
                maybe_truncate(&self.counter, combined, self.client.max_tokens(), &path);
            per_file.push(SourceText::new(path, truncated));
        }

        // Phase 4: collate into refine groups. The second refine pass
        // re-sends the first answer as input, so groups must leave room
        // for a full completion on top of the scaffolding reserve.
        // Anything over the ceiling bypasses refinement as a large file.
        let group_ceiling = if self.options.refine {
            budget.saturating_sub(MAX_OUTPUT_TOKENS as usize)
        } else {
            budget
        };
        let collated = collate(&self.counter, per_file, group_ceiling);
        let contexts: Vec<String> = if self.options.refine {
            let phase = progress.start_phase("Refining analysis", collated.groups.len());
            let work = collated
                .groups
                .into_iter()
                .map(|group| {
                    let client = Arc::clone(&self.client);
                    let question = question.to_string();
                    let phase = Arc::clone(&phase);
                    async move {
                        prompts::refine_context(&client, &group, &question, phase.as_ref()).await
                    }
                })
                .collect();
            let (contexts, phase_errors) =
                run_phase(work, self.options.concurrency, phase).await?;
            errors.extend(phase_errors);
            contexts
        } else {
            collated
                .groups
                .iter()
                .map(|group| {
                    group
                        .iter()
                        .map(|s| format!("File: {}\n{}\n\n", s.file_path, s.text))
                        .collect::<String>()
                })
                .collect()
        };

        let mut output = String::new();
        for context in contexts {
            if !context.trim().is_empty() {
                output.push_str(&context);
                output.push_str("\n\n");
            }
        }
        for large in collated.large {
            output.push_str(&format!("{}:\n{}\n\n", large.file_path, large.text));
        }

        Ok(SearchOutput {
            errors,
            context: output,
        })
    }
}

/// Drain one phase: spawn every future under the concurrency gate, collect
/// successes and per-item errors, and on any fatal error abort everything
/// still outstanding.
async fn run_phase<T, F>(
    work: Vec<F>,
    concurrency: usize,
    progress: Arc<dyn PhaseProgress>,
) -> Result<(Vec<T>, Vec<PhaseError>)>
where
    T: Send + 'static,
    F: std::future::Future<Output = Result<T>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut handles: Vec<JoinHandle<Result<T>>> = Vec::with_capacity(work.len());
    for item in work {
        let semaphore = Arc::clone(&semaphore);
        handles.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire()
                .await
                .map_err(|e| LlmapError::Internal(format!("worker pool closed: {e}")))?;
            item.await
        }));
    }

    let mut results = Vec::new();
    let mut errors = Vec::new();
    let mut remaining = handles.into_iter();
    while let Some(handle) = remaining.next() {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(join_err) => {
                abort_all(remaining);
                return Err(LlmapError::Internal(format!(
                    "phase worker panicked: {join_err}"
                )));
            }
        };
        match outcome {
            Ok(value) => results.push(value),
            Err(LlmapError::Phase(phase_error)) => errors.push(phase_error),
            Err(fatal) => {
                abort_all(remaining);
                return Err(fatal);
            }
        }
        progress.item_done();
    }
    progress.finish();
    Ok((results, errors))
}

fn abort_all<T>(handles: impl Iterator<Item = JoinHandle<T>>) {
    for handle in handles {
        handle.abort();
    }
}

/// Whether the triage response names `path`.
///
/// A path counts as mentioned only when it appears on some line with no
/// path character immediately adjacent on either side, so a batch sibling
/// like `src/foo/bar.py` can never satisfy a query for `foo/bar.py`.
fn response_mentions(response: &str, path: &str) -> bool {
    if path.is_empty() {
        return false;
    }
    response.lines().any(|line| line_mentions(line, path))
}

fn line_mentions(line: &str, path: &str) -> bool {
    let first_char_len = path.chars().next().map_or(1, |c| c.len_utf8());
    let mut start = 0;
    while let Some(found) = line[start..].find(path) {
        let begin = start + found;
        let end = begin + path.len();
        let boundary_before = line[..begin]
            .chars()
            .next_back()
            .is_none_or(|c| !is_path_char(c));
        let boundary_after = line[end..].chars().next().is_none_or(|c| !is_path_char(c));
        if boundary_before && boundary_after {
            return true;
        }
        start = begin + first_char_len;
    }
    false
}

fn is_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | '-')
}
