//! Value types shared across pipeline phases.

use serde::{Deserialize, Serialize};

/// A piece of text tied to the source file it came from.
///
/// The `text` field holds whatever the current phase produced for that file:
/// a skeleton before triage, a chunk analysis after analysis, or a combined
/// per-file analysis before refinement. Carrying the path alongside the text
/// is what lets every downstream phase group by file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText {
    /// Path of the originating file, as given on input.
    pub file_path: String,
    /// Phase-dependent text payload.
    pub text: String,
}

impl SourceText {
    pub fn new(file_path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            text: text.into(),
        }
    }
}

/// The role of a chat message author.
///
/// Serializes to the lowercase wire form (`"system"`, `"user"`,
/// `"assistant"`) expected by OpenAI-compatible endpoints. Cache keys hash
/// the serialized form, so the rename is load-bearing for determinism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in a chat-completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = Message::system("hello");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"role":"system","content":"hello"}"#);
    }

    #[test]
    fn test_role_round_trip() {
        for role in [Role::System, Role::User, Role::Assistant] {
            let json = serde_json::to_string(&role).unwrap();
            let back: Role = serde_json::from_str(&json).unwrap();
            assert_eq!(role, back);
        }
    }

    #[test]
    fn test_source_text_new() {
        let st = SourceText::new("src/Foo.java", "class Foo {}");
        assert_eq!(st.file_path, "src/Foo.java");
        assert_eq!(st.text, "class Foo {}");
    }
}
