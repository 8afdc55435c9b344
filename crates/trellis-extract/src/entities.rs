//! Parse-time entity records.
//!
//! The extraction pipeline hands these to the relationship builder: one
//! [`FileRecord`] per source file plus the [`SymbolRecord`]s declared in it.
//! Entity ids follow the prefix discipline used across the graph:
//! `file:<relPath>`, `sym:<relPath>#<name>` (with an `@<line>` qualifier
//! only when the bare id would collide inside the file), `dir:<relPath>`.

use xxhash_rust::xxh64::xxh64;

const BASE62_CHARS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Base62-encoded xxhash64 of source content (11 chars, zero-padded).
/// Used for change detection, not identity.
pub fn content_hash(content: &str) -> String {
    let mut value = xxh64(content.as_bytes(), 0);
    if value == 0 {
        return "0".repeat(11);
    }
    let mut result = Vec::with_capacity(11);
    while value > 0 {
        result.push(BASE62_CHARS[(value % 62) as usize]);
        value /= 62;
    }
    while result.len() < 11 {
        result.push(b'0');
    }
    result.reverse();
    String::from_utf8(result).expect("base62 chars are valid UTF-8")
}

/// What kind of declaration a symbol record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Interface,
    TypeAlias,
    Variable,
    Module,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::TypeAlias => "typeAlias",
            SymbolKind::Variable => "variable",
            SymbolKind::Module => "module",
        }
    }

    /// Symbols whose bodies the builder walks for symbol-level edges.
    pub fn has_walkable_body(&self) -> bool {
        matches!(
            self,
            SymbolKind::Function | SymbolKind::Method | SymbolKind::Class
        )
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed source file.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Project-relative path with POSIX separators.
    pub path: String,
    /// Canonical language name ("typescript", "python", "go").
    pub language: String,
    /// Content hash for change detection.
    pub hash: String,
}

impl FileRecord {
    pub fn new(path: impl Into<String>, language: impl Into<String>, content: &str) -> Self {
        Self {
            path: path.into(),
            language: language.into(),
            hash: content_hash(content),
        }
    }

    pub fn entity_id(&self) -> String {
        format!("file:{}", self.path)
    }

    /// Entity id of the containing directory, when there is one.
    pub fn dir_entity_id(&self) -> Option<String> {
        let parent = std::path::Path::new(&self.path).parent()?;
        let parent = parent.to_str()?;
        if parent.is_empty() {
            return None;
        }
        Some(format!("dir:{}", parent.replace('\\', "/")))
    }
}

/// A declaration extracted from a parsed file.
#[derive(Debug, Clone)]
pub struct SymbolRecord {
    /// Stable entity id (`sym:` prefixed).
    pub id: String,
    /// Simple name of the symbol.
    pub name: String,
    pub kind: SymbolKind,
    /// Project-relative path of the owning file.
    pub file: String,
    /// First line of the declaration (1-based).
    pub line: u32,
    /// Start column (0-based).
    pub col: u32,
    /// Last line of the declaration (1-based, inclusive).
    pub end_line: u32,
    /// Declaration head, when one could be sliced out of the source.
    pub signature: Option<String>,
    /// Content hash of the declaration text.
    pub hash: String,
    pub is_exported: bool,
    /// Name of the enclosing class, for methods and fields.
    pub parent: Option<String>,
}

impl SymbolRecord {
    /// `sym:<relPath>#<name>`, qualified with `@<line>` by the caller when
    /// the bare form collides within the file.
    pub fn bare_id(file: &str, name: &str) -> String {
        format!("sym:{file}#{name}")
    }

    pub fn qualified_id(file: &str, name: &str, line: u32) -> String {
        format!("sym:{file}#{name}@{line}")
    }
}

/// A syntax error attached to a parse result.
#[derive(Debug, Clone)]
pub struct ParserError {
    pub message: String,
    pub line: u32,
    pub col: u32,
}

/// Everything extraction learned about one file.
#[derive(Debug, Clone)]
pub struct ParseOutput {
    pub file: FileRecord,
    pub symbols: Vec<SymbolRecord>,
    pub errors: Vec<ParserError>,
}

impl ParseOutput {
    /// The innermost symbol whose line range covers the given line.
    pub fn enclosing_symbol(&self, line: u32) -> Option<&SymbolRecord> {
        self.symbols
            .iter()
            .filter(|s| s.line <= line && line <= s.end_line)
            .min_by_key(|s| s.end_line - s.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_deterministic() {
        assert_eq!(content_hash("fn main() {}"), content_hash("fn main() {}"));
        assert_ne!(content_hash("a"), content_hash("b"));
        assert_eq!(content_hash("anything").len(), 11);
    }

    #[test]
    fn test_entity_ids() {
        let file = FileRecord::new("src/app/main.ts", "typescript", "export {}");
        assert_eq!(file.entity_id(), "file:src/app/main.ts");
        assert_eq!(file.dir_entity_id().as_deref(), Some("dir:src/app"));

        let root = FileRecord::new("main.ts", "typescript", "");
        assert_eq!(root.dir_entity_id(), None);

        assert_eq!(
            SymbolRecord::bare_id("src/a.ts", "run"),
            "sym:src/a.ts#run"
        );
        assert_eq!(
            SymbolRecord::qualified_id("src/a.ts", "run", 14),
            "sym:src/a.ts#run@14"
        );
    }

    #[test]
    fn test_enclosing_symbol_prefers_innermost() {
        let file = FileRecord::new("a.ts", "typescript", "");
        let mk = |name: &str, line, end_line| SymbolRecord {
            id: SymbolRecord::bare_id("a.ts", name),
            name: name.into(),
            kind: SymbolKind::Function,
            file: "a.ts".into(),
            line,
            col: 0,
            end_line,
            signature: None,
            hash: content_hash(name),
            is_exported: false,
            parent: None,
        };
        let output = ParseOutput {
            file,
            symbols: vec![mk("outer", 1, 20), mk("inner", 5, 10)],
            errors: vec![],
        };
        assert_eq!(output.enclosing_symbol(7).unwrap().name, "inner");
        assert_eq!(output.enclosing_symbol(15).unwrap().name, "outer");
        assert!(output.enclosing_symbol(30).is_none());
    }
}
