//! Source-parsing seam: skeleton extraction and token-bounded chunking.
//!
//! The pipeline only depends on the [`SourceParser`] trait, so tests can
//! substitute canned skeletons and chunks. [`TreeSitterParser`] is the real
//! implementation: tree-sitter grammars for the structural skeletons, and a
//! greedy line packer for chunking.

pub mod skeleton;

use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::tokens::TokenCounter;

/// Structural access to source files, as consumed by the pipeline.
pub trait SourceParser: Send + Sync {
    /// Whether a structural skeleton can be extracted for this path.
    fn parseable(&self, path: &Path) -> bool;

    /// Structural summary of the file: declarations without bodies,
    /// preserving signatures and nesting.
    fn extract_skeleton(&self, path: &Path) -> Result<String>;

    /// Split the file into non-overlapping chunks, each within
    /// `max_tokens`, which together cover the file's analyzable content.
    fn chunk(&self, path: &Path, max_tokens: usize) -> Result<Vec<String>>;
}

/// Tree-sitter-backed parser for the supported languages (Java, Python).
pub struct TreeSitterParser {
    counter: Arc<TokenCounter>,
}

impl TreeSitterParser {
    pub fn new(counter: Arc<TokenCounter>) -> Self {
        Self { counter }
    }
}

impl SourceParser for TreeSitterParser {
    fn parseable(&self, path: &Path) -> bool {
        matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("java") | Some("py")
        )
    }

    fn extract_skeleton(&self, path: &Path) -> Result<String> {
        let source = std::fs::read_to_string(path)?;
        let lang = match path.extension().and_then(|e| e.to_str()) {
            Some("java") => skeleton::Lang::Java,
            Some("py") => skeleton::Lang::Python,
            _ => {
                return Err(crate::error::LlmapError::Internal(format!(
                    "no skeleton support for {}",
                    path.display()
                )))
            }
        };
        skeleton::extract(&source, lang)
    }

    fn chunk(&self, path: &Path, max_tokens: usize) -> Result<Vec<String>> {
        let text = std::fs::read_to_string(path)?;
        Ok(chunk_text(&self.counter, &text, max_tokens))
    }
}

/// Pack `text` into chunks of at most `max_tokens` tokens, splitting on line
/// boundaries where possible. Single lines over the budget are halved on
/// char boundaries until they fit.
pub fn chunk_text(counter: &TokenCounter, text: &str, max_tokens: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    if counter.count(text) <= max_tokens {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_tokens = 0;
    for line in text.split_inclusive('\n') {
        let line_tokens = counter.count(line);
        if line_tokens > max_tokens {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_tokens = 0;
            }
            chunks.extend(split_oversized_line(counter, line, max_tokens));
            continue;
        }
        if current_tokens + line_tokens > max_tokens && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_tokens = 0;
        }
        current.push_str(line);
        current_tokens += line_tokens;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn split_oversized_line(counter: &TokenCounter, line: &str, max_tokens: usize) -> Vec<String> {
    let mut stack = vec![line.to_string()];
    let mut pieces = Vec::new();
    while let Some(piece) = stack.pop() {
        let char_count = piece.chars().count();
        if counter.count(&piece) <= max_tokens || char_count <= 1 {
            pieces.push(piece);
            continue;
        }
        let mid = piece
            .char_indices()
            .nth(char_count / 2)
            .map(|(i, _)| i)
            .unwrap_or(0);
        let (head, tail) = piece.split_at(mid);
        // Popped in head-first order.
        stack.push(tail.to_string());
        stack.push(head.to_string());
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn counter() -> Arc<TokenCounter> {
        Arc::new(TokenCounter::new().unwrap())
    }

    #[test]
    fn test_parseable_extensions() {
        let parser = TreeSitterParser::new(counter());
        assert!(parser.parseable(Path::new("src/Foo.java")));
        assert!(parser.parseable(Path::new("pkg/mod.py")));
        assert!(!parser.parseable(Path::new("notes.txt")));
        assert!(!parser.parseable(Path::new("main.rs")));
        assert!(!parser.parseable(Path::new("Makefile")));
    }

    #[test]
    fn test_chunk_small_text_is_single_chunk() {
        let counter = counter();
        let text = "fn main() {}\n";
        let chunks = chunk_text(&counter, text, 1_000);
        assert_eq!(chunks, vec![text.to_string()]);
    }

    #[test]
    fn test_chunk_empty_text() {
        let counter = counter();
        assert!(chunk_text(&counter, "", 100).is_empty());
    }

    #[test]
    fn test_chunks_respect_budget_and_cover_text() {
        let counter = counter();
        let text: String = (0..200)
            .map(|i| format!("let value_{i} = compute({i});"))
            .collect::<Vec<_>>()
            .join("\n");
        let budget = 120;
        let chunks = chunk_text(&counter, &text, budget);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(counter.count(chunk) <= budget);
        }
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_oversized_single_line_is_split() {
        let counter = counter();
        let line = "x".repeat(4_000); // no newlines at all
        let chunks = chunk_text(&counter, &line, 50);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(counter.count(chunk) <= 50);
        }
        assert_eq!(chunks.concat(), line);
    }

    #[test]
    fn test_chunk_reads_from_disk() {
        let parser = TreeSitterParser::new(counter());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.py");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "def foo():\n    return 1").unwrap();
        let chunks = parser.chunk(&path, 1_000).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("def foo()"));
    }

    #[test]
    fn test_chunk_missing_file_errors() {
        let parser = TreeSitterParser::new(counter());
        assert!(parser.chunk(Path::new("/no/such/file.py"), 100).is_err());
    }
}
