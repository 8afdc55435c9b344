//! Language adapter registry.
//!
//! The last normalization step runs one per-language finisher over each
//! edge: refine the `language` field, record syntax hints, and coerce the
//! symbol kind for module-level edges. Adapters are registered once at
//! init, after which the registry is sealed; they are tried in order and
//! the first one whose detection matches finalizes the edge. A panicking
//! adapter is suppressed and logged, never fatal.

use std::panic::{catch_unwind, AssertUnwindSafe};

use serde_json::{Map, Value};

use crate::types::Relationship;

/// A per-language edge finisher.
pub trait LanguageAdapter: Send + Sync {
    /// Canonical language name this adapter emits (e.g. "typescript").
    fn language(&self) -> &'static str;

    /// Whether this adapter recognizes the edge, from its language field or
    /// path hints.
    fn detect(&self, edge: &Relationship) -> bool;

    /// Refine the edge in place.
    fn finalize(&self, edge: &mut Relationship);
}

/// Registry of adapters, sealed after construction.
pub struct AdapterRegistry {
    adapters: Vec<Box<dyn LanguageAdapter>>,
}

impl AdapterRegistry {
    /// Seals the given adapters. Order matters: first match wins.
    pub fn seal(adapters: Vec<Box<dyn LanguageAdapter>>) -> Self {
        Self { adapters }
    }

    /// The default registry: TypeScript, Python, Go.
    pub fn standard() -> Self {
        Self::seal(vec![
            Box::new(TypeScriptAdapter),
            Box::new(PythonAdapter),
            Box::new(GoAdapter),
        ])
    }

    /// An empty registry (edges pass through untouched).
    pub fn empty() -> Self {
        Self::seal(Vec::new())
    }

    pub fn adapter_count(&self) -> usize {
        self.adapters.len()
    }

    /// Runs the first matching adapter. Panics are suppressed; they are
    /// logged at warn when `diagnostics` is set, debug otherwise.
    pub fn apply(&self, edge: &mut Relationship, diagnostics: bool) {
        for adapter in &self.adapters {
            let matched = match catch_unwind(AssertUnwindSafe(|| adapter.detect(edge))) {
                Ok(m) => m,
                Err(_) => {
                    log_adapter_failure(adapter.language(), "detect", diagnostics);
                    continue;
                }
            };
            if !matched {
                continue;
            }
            if catch_unwind(AssertUnwindSafe(|| adapter.finalize(edge))).is_err() {
                log_adapter_failure(adapter.language(), "finalize", diagnostics);
            }
            return;
        }
    }
}

fn log_adapter_failure(language: &str, stage: &str, diagnostics: bool) {
    if diagnostics {
        tracing::warn!(language, stage, "language adapter failed; edge left as-is");
    } else {
        tracing::debug!(language, stage, "language adapter failed; edge left as-is");
    }
}

/// Lowercased language hint from the edge's own field or leftover metadata
/// aliases.
fn language_hint(edge: &Relationship) -> Option<String> {
    if let Some(lang) = edge.language.as_deref() {
        if !lang.is_empty() {
            return Some(lang.to_ascii_lowercase());
        }
    }
    for key in ["language", "lang", "languageId", "language_id"] {
        if let Some(Value::String(s)) = edge.metadata.get(key) {
            if !s.trim().is_empty() {
                return Some(s.trim().to_ascii_lowercase());
            }
        }
    }
    None
}

/// True when any path carried by the edge ends in one of the extensions.
fn path_hint(edge: &Relationship, extensions: &[&str]) -> bool {
    let candidates = [
        edge.module_path.as_deref(),
        Some(edge.from_entity_id.as_str()),
        Some(edge.to_entity_id.as_str()),
    ];
    candidates.into_iter().flatten().any(|path| {
        extensions
            .iter()
            .any(|ext| path.ends_with(ext) || path.contains(&format!("{ext}:")) || path.contains(&format!("{ext}#")))
    })
}

fn set_syntax_hint(edge: &mut Relationship, syntax: &str) {
    let entry = edge
        .metadata
        .entry("languageSpecific".to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(map) = entry {
        map.entry("syntax".to_string())
            .or_insert_with(|| Value::String(syntax.to_string()));
    }
}

/// TypeScript/JavaScript finisher.
pub struct TypeScriptAdapter;

impl LanguageAdapter for TypeScriptAdapter {
    fn language(&self) -> &'static str {
        "typescript"
    }

    fn detect(&self, edge: &Relationship) -> bool {
        if let Some(hint) = language_hint(edge) {
            return matches!(
                hint.as_str(),
                "ts" | "tsx" | "typescript" | "js" | "jsx" | "javascript"
            );
        }
        path_hint(edge, &[".ts", ".tsx", ".js", ".jsx"])
    }

    fn finalize(&self, edge: &mut Relationship) {
        let tsx = language_hint(edge).as_deref() == Some("tsx")
            || path_hint(edge, &[".tsx", ".jsx"]);
        edge.language = Some("typescript".to_string());
        set_syntax_hint(edge, if tsx { "tsx" } else { "ts" });
        if edge.rel_type.is_structural() && edge.symbol_kind.is_none() {
            edge.symbol_kind = Some("module".to_string());
        }
    }
}

/// Python finisher.
pub struct PythonAdapter;

impl LanguageAdapter for PythonAdapter {
    fn language(&self) -> &'static str {
        "python"
    }

    fn detect(&self, edge: &Relationship) -> bool {
        if let Some(hint) = language_hint(edge) {
            return matches!(hint.as_str(), "py" | "python");
        }
        path_hint(edge, &[".py", ".pyi"])
    }

    fn finalize(&self, edge: &mut Relationship) {
        edge.language = Some("python".to_string());
    }
}

/// Go finisher.
pub struct GoAdapter;

impl LanguageAdapter for GoAdapter {
    fn language(&self) -> &'static str {
        "go"
    }

    fn detect(&self, edge: &Relationship) -> bool {
        if let Some(hint) = language_hint(edge) {
            return hint == "go" || hint == "golang";
        }
        path_hint(edge, &[".go"])
    }

    fn finalize(&self, edge: &mut Relationship) {
        edge.language = Some("go".to_string());
    }
}
