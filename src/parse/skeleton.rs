//! Structural skeleton extraction via tree-sitter.
//!
//! A skeleton keeps declaration headers (classes, interfaces, enums,
//! methods, fields, decorators) and elides bodies, so triage can judge a
//! file from a fraction of its tokens. Nesting is rendered with two-space
//! indentation per level.

use tree_sitter::{Node, Parser};

use crate::error::{LlmapError, Result};

/// Languages with skeleton support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lang {
    Java,
    Python,
}

/// Extract the structural skeleton of `source`.
pub fn extract(source: &str, lang: Lang) -> Result<String> {
    let language = match lang {
        Lang::Java => tree_sitter_java::LANGUAGE,
        Lang::Python => tree_sitter_python::LANGUAGE,
    };
    let mut parser = Parser::new();
    parser
        .set_language(&language.into())
        .map_err(|e| LlmapError::Internal(format!("failed to load {lang:?} grammar: {e}")))?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| LlmapError::Internal(format!("{lang:?} parse produced no tree")))?;

    let mut lines = Vec::new();
    walk(source, tree.root_node(), 0, lang, &mut lines);
    Ok(lines.join("\n"))
}

fn walk(source: &str, node: Node<'_>, depth: usize, lang: Lang, out: &mut Vec<String>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match lang {
            Lang::Python => python_node(source, child, depth, out),
            Lang::Java => java_node(source, child, depth, out),
        }
    }
}

fn python_node(source: &str, node: Node<'_>, depth: usize, out: &mut Vec<String>) {
    match node.kind() {
        "class_definition" => {
            out.push(format!("{}{}", indent(depth), header(source, node)));
            if let Some(body) = node.child_by_field_name("body") {
                walk(source, body, depth + 1, Lang::Python, out);
            }
        }
        "function_definition" => {
            out.push(format!("{}{} ...", indent(depth), header(source, node)));
        }
        "decorated_definition" => {
            let mut cursor = node.walk();
            for part in node.named_children(&mut cursor) {
                if part.kind() == "decorator" {
                    out.push(format!("{}{}", indent(depth), node_text(source, part)));
                }
            }
            if let Some(definition) = node.child_by_field_name("definition") {
                python_node(source, definition, depth, out);
            }
        }
        _ => {}
    }
}

fn java_node(source: &str, node: Node<'_>, depth: usize, out: &mut Vec<String>) {
    match node.kind() {
        "class_declaration"
        | "interface_declaration"
        | "enum_declaration"
        | "annotation_type_declaration" => {
            out.push(format!("{}{}", indent(depth), header(source, node)));
            if let Some(body) = node.child_by_field_name("body") {
                walk(source, body, depth + 1, Lang::Java, out);
            }
        }
        "method_declaration" | "constructor_declaration" => {
            let line = match node.child_by_field_name("body") {
                Some(body) => format!("{} {{...}}", slice_before(source, node, body)),
                // Abstract and interface methods already end in `;`.
                None => node_text(source, node),
            };
            out.push(format!("{}{}", indent(depth), line));
        }
        "field_declaration" | "constant_declaration" | "enum_constant" => {
            out.push(format!("{}{}", indent(depth), node_text(source, node)));
        }
        // Members of an enum sit under an extra wrapper node.
        "enum_body_declarations" => {
            walk(source, node, depth, Lang::Java, out);
        }
        _ => {}
    }
}

/// Declaration text up to (not including) its body, single-spaced.
fn header(source: &str, node: Node<'_>) -> String {
    match node.child_by_field_name("body") {
        Some(body) => slice_before(source, node, body),
        None => node_text(source, node),
    }
}

fn slice_before(source: &str, node: Node<'_>, body: Node<'_>) -> String {
    source[node.start_byte()..body.start_byte()].trim_end().to_string()
}

fn node_text(source: &str, node: Node<'_>) -> String {
    node.utf8_text(source.as_bytes())
        .unwrap_or_default()
        .to_string()
}

fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_skeleton_elides_bodies() {
        let source = "\
import os

class Foo:
    def bar(self, x):
        return x + 1

    def baz(self):
        secret = 42
        return secret

def top_level():
    pass
";
        let skeleton = extract(source, Lang::Python).unwrap();
        assert!(skeleton.contains("class Foo:"));
        assert!(skeleton.contains("def bar(self, x): ..."));
        assert!(skeleton.contains("def baz(self): ..."));
        assert!(skeleton.contains("def top_level(): ..."));
        assert!(!skeleton.contains("return x + 1"));
        assert!(!skeleton.contains("secret"));
    }

    #[test]
    fn test_python_methods_indented_under_class() {
        let source = "class Foo:\n    def bar(self):\n        pass\n";
        let skeleton = extract(source, Lang::Python).unwrap();
        let method_line = skeleton
            .lines()
            .find(|l| l.contains("def bar"))
            .expect("method line present");
        assert!(method_line.starts_with("  "));
    }

    #[test]
    fn test_python_decorators_kept() {
        let source = "@staticmethod\ndef helper():\n    pass\n";
        let skeleton = extract(source, Lang::Python).unwrap();
        assert!(skeleton.contains("@staticmethod"));
        assert!(skeleton.contains("def helper(): ..."));
    }

    #[test]
    fn test_java_skeleton_keeps_signatures_and_fields() {
        let source = "\
public class Counter {
    private int count;

    public Counter(int start) {
        this.count = start;
    }

    public void increment(int by) {
        count += by;
    }
}
";
        let skeleton = extract(source, Lang::Java).unwrap();
        assert!(skeleton.contains("public class Counter"));
        assert!(skeleton.contains("private int count;"));
        assert!(skeleton.contains("public Counter(int start) {...}"));
        assert!(skeleton.contains("public void increment(int by) {...}"));
        assert!(!skeleton.contains("count += by"));
    }

    #[test]
    fn test_java_interface_methods() {
        let source = "public interface Greeter {\n    String greet(String name);\n}\n";
        let skeleton = extract(source, Lang::Java).unwrap();
        assert!(skeleton.contains("public interface Greeter"));
        assert!(skeleton.contains("String greet(String name);"));
    }

    #[test]
    fn test_java_nested_class_indented() {
        let source = "\
class Outer {
    class Inner {
        void poke() {}
    }
}
";
        let skeleton = extract(source, Lang::Java).unwrap();
        let inner_line = skeleton
            .lines()
            .find(|l| l.contains("class Inner"))
            .expect("inner class present");
        assert!(inner_line.starts_with("  "));
        let poke_line = skeleton
            .lines()
            .find(|l| l.contains("void poke"))
            .expect("method present");
        assert!(poke_line.starts_with("    "));
    }

    #[test]
    fn test_empty_source_gives_empty_skeleton() {
        assert_eq!(extract("", Lang::Python).unwrap(), "");
    }
}
