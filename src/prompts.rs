//! The three canonical prompt shapes and the operations that invoke them.
//!
//! Each builder produces a fixed message list with the user's question
//! interpolated literally. The output formats are contractual: triage
//! responses are scanned for file paths, analyze output is passed through
//! opaquely, and refine output becomes the final context.

use crate::client::Client;
use crate::error::Result;
use crate::progress::PhaseProgress;
use crate::types::{Message, SourceText};

const ANALYST_PERSONA: &str =
    "You are a helpful assistant designed to analyze and explain source code.";
const COLLATOR_PERSONA: &str =
    "You are a helpful assistant designed to collate source code.";

/// Messages asking which of a batch of skeletons are relevant.
///
/// Skeletons are concatenated under `### FILE: <path>` headers; the model is
/// instructed to answer with one full path per line and to omit irrelevant
/// files entirely.
pub fn triage_messages(skeletons: &[SourceText], question: &str) -> Vec<Message> {
    let combined = skeletons
        .iter()
        .map(|s| format!("### FILE: {}\n{}\n", s.file_path, s.text))
        .collect::<Vec<_>>()
        .join("\n\n");

    let instruction = format!(
        "I have given you multiple file skeletons, each labeled with \"### FILE: path\".\n\
         Evaluate each skeleton for relevance to the following question:\n\
         ```\n\
         {question}\n\
         ```\n\
         \n\
         Think about whether the skeleton provides sufficient information to determine relevance:\n\
         - If the skeleton clearly indicates irrelevance to the question, eliminate it from consideration.\n\
         - If the skeleton clearly shows that the code is relevant to the question,\n\
         \x20 OR if implementation details are needed to determine relevance, output its FULL path.\n\
         List ONLY the file paths that appear relevant to answering the question.\n\
         Output one path per line. If a file is not relevant, do not list it at all."
    );

    vec![
        Message::system(ANALYST_PERSONA),
        Message::user(combined),
        Message::assistant("Thank you for providing your source code skeletons for analysis."),
        Message::user(instruction),
        Message::assistant("Understood."),
    ]
}

/// Messages asking for a relevance analysis of one source chunk.
pub fn analyze_messages(source: &str, question: &str) -> Vec<Message> {
    let instruction = format!(
        "Evaluate the above source code for relevance to the following question:\n\
         ```\n\
         {question}\n\
         ```\n\
         \n\
         Give an overall summary, then give the most relevant section(s) of code, if any.\n\
         Prefer to give relevant code in units of functions, classes, or methods, rather\n\
         than isolated lines."
    );

    vec![
        Message::system(ANALYST_PERSONA),
        Message::user(source),
        Message::assistant("Thank you for providing your source code for analysis."),
        Message::user(instruction),
    ]
}

/// Messages asking the refiner to extract only the relevant context from a
/// group of per-file analyses.
pub fn refine_messages(group: &[SourceText], question: &str) -> Vec<Message> {
    let combined = group
        .iter()
        .map(|analysis| format!("File: {}\n{}", analysis.file_path, analysis.text))
        .collect::<Vec<_>>()
        .join("\n\n");

    let instruction = format!(
        "The above text contains analysis of multiple source files related to this question:\n\
         ```\n\
         {question}\n\
         ```\n\
         \n\
         Extract only the most relevant context and code sections that help answer the question.\n\
         Remove any irrelevant files completely, but preserve file paths for the relevant code fragments.\n\
         Include the relevant code fragments as-is; do not truncate, summarize, or modify them.\n\
         \n\
         DO NOT include additional commentary or analysis of the provided text."
    );

    vec![
        Message::system(COLLATOR_PERSONA),
        Message::user(combined),
        Message::assistant("Thank you for providing your source code fragments."),
        Message::user(instruction),
    ]
}

/// Second refine pass: append the first answer and ask the model to
/// double-check for missed context.
pub fn refine_followup(mut messages: Vec<Message>, first_answer: &str, question: &str) -> Vec<Message> {
    messages.push(Message::assistant(first_answer));
    messages.push(Message::user(format!(
        "Take one more look and make sure you didn't miss anything important for answering\n\
         the question:\n\
         ```\n\
         {question}\n\
         ```"
    )));
    messages
}

/// Triage a batch of skeletons; returns the model's raw path listing.
pub async fn multi_skeleton_relevance(
    client: &Client,
    skeletons: &[SourceText],
    question: &str,
    progress: &dyn PhaseProgress,
) -> Result<String> {
    let messages = triage_messages(skeletons, question);
    let response = client
        .ask(messages, client.analyze_model(), None, progress)
        .await?;
    Ok(response.content)
}

/// Analyze one chunk of source for relevance to the question.
pub async fn full_source_relevance(
    client: &Client,
    source: &str,
    question: &str,
    file_path: &str,
    progress: &dyn PhaseProgress,
) -> Result<SourceText> {
    let messages = analyze_messages(source, question);
    let response = client
        .ask(messages, client.analyze_model(), Some(file_path), progress)
        .await?;
    Ok(SourceText::new(file_path, response.content))
}

/// Refine a group of per-file analyses into final context.
///
/// Runs the two-pass protocol: extract, then ask the model to look again.
/// Returns both answers separated by a blank line; the second pass
/// materially improves recall on the refine model.
pub async fn refine_context(
    client: &Client,
    group: &[SourceText],
    question: &str,
    progress: &dyn PhaseProgress,
) -> Result<String> {
    let messages = refine_messages(group, question);
    let first = client
        .ask(messages.clone(), client.refine_model(), None, progress)
        .await?;

    let followup = refine_followup(messages, &first.content, question);
    let second = client
        .ask(followup, client.refine_model(), None, progress)
        .await?;

    Ok(format!("{}\n\n{}", first.content, second.content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    fn skeletons() -> Vec<SourceText> {
        vec![
            SourceText::new("src/Foo.java", "class Foo { void bar(); }"),
            SourceText::new("src/Baz.java", "class Baz {}"),
        ]
    }

    #[test]
    fn test_triage_layout() {
        let messages = triage_messages(&skeletons(), "what does bar do?");
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[2].role, Role::Assistant);
        assert_eq!(messages[3].role, Role::User);
        assert_eq!(messages[4].role, Role::Assistant);

        assert!(messages[1].content.contains("### FILE: src/Foo.java"));
        assert!(messages[1].content.contains("### FILE: src/Baz.java"));
        assert!(messages[1].content.contains("class Foo { void bar(); }"));
        assert!(messages[3].content.contains("what does bar do?"));
        assert!(messages[3].content.contains("one path per line"));
    }

    #[test]
    fn test_analyze_layout() {
        let messages = analyze_messages("def bar(): pass", "what does bar do?");
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1].content, "def bar(): pass");
        assert!(messages[3].content.contains("what does bar do?"));
        assert!(messages[3].content.contains("functions, classes, or methods"));
    }

    #[test]
    fn test_refine_layout_preserves_paths() {
        let group = vec![
            SourceText::new("a.py", "analysis of a"),
            SourceText::new("b.py", "analysis of b"),
        ];
        let messages = refine_messages(&group, "how is a used?");
        assert_eq!(messages.len(), 4);
        assert!(messages[1].content.contains("File: a.py\nanalysis of a"));
        assert!(messages[1].content.contains("File: b.py\nanalysis of b"));
        assert!(messages[3].content.contains("DO NOT include additional commentary"));
    }

    #[test]
    fn test_refine_followup_appends_two_messages() {
        let group = vec![SourceText::new("a.py", "analysis")];
        let base = refine_messages(&group, "q");
        let followup = refine_followup(base.clone(), "first answer", "q");
        assert_eq!(followup.len(), base.len() + 2);
        assert_eq!(followup[base.len()].role, Role::Assistant);
        assert_eq!(followup[base.len()].content, "first answer");
        assert!(followup[base.len() + 1]
            .content
            .contains("didn't miss anything important"));
    }

    #[test]
    fn test_question_interpolated_literally() {
        let tricky = "does `foo` use {braces} or ```fences```?";
        let messages = analyze_messages("source", tricky);
        assert!(messages[3].content.contains(tricky));
    }
}
