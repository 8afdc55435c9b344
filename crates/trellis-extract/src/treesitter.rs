//! Tree-sitter plumbing: grammar dispatch, parsing, and node helpers.

use std::path::Path;

use tree_sitter::{Language, Node, Parser, Tree};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),
    #[error("language error: {0}")]
    Language(String),
    #[error("parse failed")]
    ParseFailed,
}

pub struct SourceParser {
    parser: Parser,
}

impl SourceParser {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
        }
    }

    /// Parses one source file with the grammar for `lang_name`.
    pub fn parse(&mut self, lang_name: &str, source: &str) -> Result<Tree, ParseError> {
        let lang = language_for_name(lang_name)?;
        self.parser
            .set_language(&lang)
            .map_err(|e| ParseError::Language(format!("{e}")))?;
        self.parser
            .parse(source.as_bytes(), None)
            .ok_or(ParseError::ParseFailed)
    }
}

impl Default for SourceParser {
    fn default() -> Self {
        Self::new()
    }
}

fn language_for_name(name: &str) -> Result<Language, ParseError> {
    match name {
        "typescript" | "javascript" => Ok(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        "tsx" => Ok(tree_sitter_typescript::LANGUAGE_TSX.into()),
        "python" => Ok(tree_sitter_python::LANGUAGE.into()),
        "go" => Ok(tree_sitter_go::LANGUAGE.into()),
        other => Err(ParseError::UnsupportedLanguage(other.to_string())),
    }
}

/// Maps a file extension to the grammar name used by [`SourceParser`].
pub fn detect_language(path: &Path) -> Option<&'static str> {
    match path.extension()?.to_str()? {
        "ts" | "mts" | "cts" => Some("typescript"),
        "tsx" | "jsx" => Some("tsx"),
        "js" | "mjs" | "cjs" => Some("javascript"),
        "py" | "pyi" => Some("python"),
        "go" => Some("go"),
        _ => None,
    }
}

/// The canonical language name recorded on entities for a grammar name.
pub fn canonical_language(lang_name: &str) -> &'static str {
    match lang_name {
        "typescript" | "tsx" | "javascript" => "typescript",
        "python" => "python",
        "go" => "go",
        _ => "unknown",
    }
}

pub fn node_text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

/// 1-based line of a node's start.
pub fn node_line(node: Node<'_>) -> u32 {
    node.start_position().row as u32 + 1
}

/// 0-based column of a node's start.
pub fn node_col(node: Node<'_>) -> u32 {
    node.start_position().column as u32
}

/// 1-based line of a node's end.
pub fn node_end_line(node: Node<'_>) -> u32 {
    node.end_position().row as u32 + 1
}

/// Depth-first walk calling `visit` on every node. The callback returns
/// false to skip a node's subtree.
pub fn walk_tree<'t, F>(root: Node<'t>, visit: &mut F)
where
    F: FnMut(Node<'t>) -> bool,
{
    if !visit(root) {
        return;
    }
    let mut cursor = root.walk();
    let children: Vec<Node> = root.children(&mut cursor).collect();
    for child in children {
        walk_tree(child, visit);
    }
}

/// Collects ERROR and MISSING nodes as parser errors.
pub fn collect_syntax_errors(root: Node<'_>, source: &str) -> Vec<crate::entities::ParserError> {
    let mut errors = Vec::new();
    walk_tree(root, &mut |node| {
        if node.is_error() || node.is_missing() {
            let snippet: String = node_text(node, source).chars().take(40).collect();
            errors.push(crate::entities::ParserError {
                message: if node.is_missing() {
                    format!("missing {}", node.kind())
                } else {
                    format!("syntax error near {snippet:?}")
                },
                line: node_line(node),
                col: node_col(node),
            });
            return false;
        }
        true
    });
    errors
}
