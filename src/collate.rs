//! Token-bounded grouping of per-file texts.
//!
//! Collation is a greedy single pass, not optimal bin-packing: token counts
//! are already approximate relative to the backend's tokenizer, so packing
//! precision would be wasted effort.

use crate::tokens::TokenCounter;
use crate::types::SourceText;

/// Result of collating texts under a per-group token ceiling.
#[derive(Debug, Default)]
pub struct Collated {
    /// Groups whose summed token counts fit the ceiling.
    pub groups: Vec<Vec<SourceText>>,
    /// Items that individually exceed the ceiling; never grouped.
    pub large: Vec<SourceText>,
}

/// Pack `sources` into groups whose summed token counts stay within
/// `max_tokens_per_group`, preserving arrival order. Items that are
/// individually over the ceiling are segregated into `large`.
pub fn collate(
    counter: &TokenCounter,
    sources: Vec<SourceText>,
    max_tokens_per_group: usize,
) -> Collated {
    let mut large = Vec::new();
    let mut small = Vec::new();
    for source in sources {
        let tokens = counter.count(&source.text);
        if tokens > max_tokens_per_group {
            large.push(source);
        } else {
            small.push((source, tokens));
        }
    }

    let mut groups = Vec::new();
    let mut current = Vec::new();
    let mut current_tokens = 0;
    for (source, tokens) in small {
        if current_tokens + tokens > max_tokens_per_group {
            if !current.is_empty() {
                groups.push(std::mem::take(&mut current));
            }
            current_tokens = 0;
        }
        current.push(source);
        current_tokens += tokens;
    }
    if !current.is_empty() {
        groups.push(current);
    }

    Collated { groups, large }
}

/// Force `text` under `max_tokens` by repeatedly keeping the first half of
/// its lines. Declarations cluster at the top of source files, so cutting
/// from the tail loses the least structure.
pub fn maybe_truncate(
    counter: &TokenCounter,
    text: String,
    max_tokens: usize,
    file_path: &str,
) -> String {
    if counter.count(&text) <= max_tokens {
        return text;
    }

    tracing::warn!("truncating oversized text for {file_path} to fit {max_tokens} tokens");
    let mut text = text;
    while counter.count(&text) > max_tokens {
        let lines: Vec<&str> = text.split('\n').collect();
        text = lines[..lines.len() / 2].join("\n");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> TokenCounter {
        TokenCounter::new().unwrap()
    }

    fn source(path: &str, text: &str) -> SourceText {
        SourceText::new(path, text)
    }

    #[test]
    fn test_single_group_when_everything_fits() {
        let counter = counter();
        let collated = collate(
            &counter,
            vec![source("a", "one two"), source("b", "three four")],
            1_000,
        );
        assert_eq!(collated.groups.len(), 1);
        assert_eq!(collated.groups[0].len(), 2);
        assert!(collated.large.is_empty());
    }

    #[test]
    fn test_groups_respect_token_ceiling() {
        let counter = counter();
        let text = "alpha beta gamma delta epsilon zeta eta theta";
        let per_item = counter.count(text);
        let ceiling = per_item * 2; // room for two items per group

        let sources: Vec<_> = (0..5).map(|i| source(&format!("f{i}"), text)).collect();
        let collated = collate(&counter, sources, ceiling);

        assert!(collated.large.is_empty());
        assert_eq!(collated.groups.len(), 3); // 2 + 2 + 1
        for group in &collated.groups {
            let total: usize = group.iter().map(|s| counter.count(&s.text)).sum();
            assert!(total <= ceiling, "group of {total} tokens exceeds {ceiling}");
        }
    }

    #[test]
    fn test_oversized_items_are_segregated() {
        let counter = counter();
        let big = "word ".repeat(500);
        let collated = collate(
            &counter,
            vec![source("small", "tiny"), source("big", &big)],
            50,
        );
        assert_eq!(collated.groups.len(), 1);
        assert_eq!(collated.groups[0][0].file_path, "small");
        assert_eq!(collated.large.len(), 1);
        assert_eq!(collated.large[0].file_path, "big");
    }

    #[test]
    fn test_arrival_order_preserved() {
        let counter = counter();
        let sources: Vec<_> = (0..4).map(|i| source(&format!("f{i}"), "text")).collect();
        let collated = collate(&counter, sources, 1_000);
        let order: Vec<_> = collated.groups[0]
            .iter()
            .map(|s| s.file_path.as_str())
            .collect();
        assert_eq!(order, vec!["f0", "f1", "f2", "f3"]);
    }

    #[test]
    fn test_empty_input() {
        let counter = counter();
        let collated = collate(&counter, Vec::new(), 100);
        assert!(collated.groups.is_empty());
        assert!(collated.large.is_empty());
    }

    #[test]
    fn test_truncate_no_op_when_under_limit() {
        let counter = counter();
        let text = "short text".to_string();
        assert_eq!(
            maybe_truncate(&counter, text.clone(), 1_000, "f"),
            text
        );
    }

    #[test]
    fn test_truncate_keeps_head_lines() {
        let counter = counter();
        let text: String = (0..64)
            .map(|i| format!("line number {i} with some extra words"))
            .collect::<Vec<_>>()
            .join("\n");
        let limit = counter.count(&text) / 4;
        let truncated = maybe_truncate(&counter, text, limit, "f");
        assert!(counter.count(&truncated) <= limit);
        assert!(truncated.starts_with("line number 0"));
        assert!(!truncated.contains("line number 63"));
    }
}
