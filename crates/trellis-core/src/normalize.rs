//! Relationship normalizer.
//!
//! Takes any edge the builder (or a stored snapshot) produces and puts it
//! into canonical shape: structural fields hoisted out of the metadata bag,
//! strings sanitized, module paths slash-normalized, the resolution
//! tri-state derived and reconciled with the boolean, confidence defaulted
//! and clamped, language adapters applied, and the canonical id recomputed
//! last. Normalization is idempotent: a canonical edge passes through
//! unchanged.

use serde_json::Value;

use crate::adapters::AdapterRegistry;
use crate::ident;
use crate::metadata::{as_bool, as_clean_string, as_confidence, as_uint};
use crate::target::{is_placeholder_id, TargetRef};
use crate::types::{ImportType, Relationship, ResolutionState, Scope};

const MAX_SHORT_FIELD: usize = 512;
const MAX_LONG_FIELD: usize = 1024;
const MAX_TOKEN_FIELD: usize = 64;

/// Metadata keys that are either legacy aliases or duplicates of hoisted
/// structural fields. All are stripped after hoisting; `confidence` is the
/// one field mirrored back.
const STRIPPED_KEYS: &[&str] = &[
    "alias",
    "importAlias",
    "importDepth",
    "importKind",
    "importType",
    "isNamespace",
    "isReExport",
    "lang",
    "language",
    "languageId",
    "language_id",
    "module",
    "modulePath",
    "moduleSpecifier",
    "reExport",
    "reExportTarget",
    "resolutionState",
    "scope",
    "sourceModule",
    "symbolKind",
];

/// Default confidence for an edge whose builder did not score it.
pub fn default_confidence(edge_is_containment: bool, state: Option<ResolutionState>) -> f64 {
    if edge_is_containment {
        return 0.95;
    }
    match state {
        Some(ResolutionState::Resolved) => 0.9,
        Some(ResolutionState::Partial) => 0.6,
        _ => 0.4,
    }
}

/// Canonicalizes one edge. See the module docs for the step order.
pub fn normalize(
    mut edge: Relationship,
    adapters: &AdapterRegistry,
    diagnostics: bool,
) -> Relationship {
    let import_type_hint = hoist_structural_fields(&mut edge);
    sanitize_fields(&mut edge);
    strip_hoisted_metadata(&mut edge);
    derive_import_type(&mut edge, import_type_hint.as_deref());
    enforce_structural_invariants(&mut edge);
    derive_refs(&mut edge);
    infer_resolution_state(&mut edge);
    reconcile_resolved(&mut edge);
    apply_confidence_default(&mut edge);
    adapters.apply(&mut edge, diagnostics);
    edge.id = ident::relationship_id(
        &edge.from_entity_id,
        &edge.to_entity_id,
        edge.to_ref.as_ref(),
        edge.rel_type,
    );
    edge
}

/// Step 1: hoist structural fields out of metadata when the top-level field
/// is absent. Returns the raw import-type hint string when it did not parse
/// to a known kind, for the later derivation step.
fn hoist_structural_fields(edge: &mut Relationship) -> Option<String> {
    if edge.module_path.is_none() {
        edge.module_path = first_string(
            edge,
            &["modulePath", "module", "moduleSpecifier", "sourceModule"],
            MAX_LONG_FIELD,
        );
    }
    if edge.import_alias.is_none() {
        edge.import_alias = first_string(edge, &["importAlias", "alias"], MAX_SHORT_FIELD);
    }
    if edge.re_export_target.is_none() {
        edge.re_export_target = first_string(edge, &["reExportTarget"], MAX_LONG_FIELD);
    }
    if edge.language.is_none() {
        edge.language = first_string(
            edge,
            &["language", "lang", "languageId", "language_id"],
            MAX_TOKEN_FIELD,
        );
    }
    if edge.symbol_kind.is_none() {
        edge.symbol_kind = first_string(edge, &["symbolKind"], MAX_TOKEN_FIELD);
    }
    if edge.is_namespace.is_none() {
        edge.is_namespace = edge.metadata.get("isNamespace").and_then(as_bool);
    }
    if edge.is_re_export.is_none() {
        edge.is_re_export = edge
            .metadata
            .get("isReExport")
            .or_else(|| edge.metadata.get("reExport"))
            .and_then(as_bool);
    }
    if edge.import_depth.is_none() {
        edge.import_depth = edge.metadata.get("importDepth").and_then(as_uint);
    }
    if edge.confidence.is_none() {
        edge.confidence = edge.metadata.get("confidence").and_then(as_confidence);
    }
    if edge.resolution_state.is_none() {
        edge.resolution_state = edge
            .metadata
            .get("resolutionState")
            .and_then(|v| v.as_str())
            .and_then(ResolutionState::parse);
    }
    if edge.scope.is_none() {
        edge.scope = edge
            .metadata
            .get("scope")
            .and_then(|v| v.as_str())
            .and_then(Scope::parse);
    }

    let mut hint = None;
    if edge.import_type.is_none() {
        for key in ["importType", "importKind"] {
            if let Some(raw) = edge.metadata.get(key).and_then(|v| v.as_str()) {
                match ImportType::parse(raw) {
                    Some(kind) => {
                        edge.import_type = Some(kind);
                        break;
                    }
                    None => hint = Some(raw.to_string()),
                }
            }
        }
    }
    hint
}

fn first_string(edge: &Relationship, keys: &[&str], cap: usize) -> Option<String> {
    keys.iter()
        .filter_map(|key| edge.metadata.get(*key))
        .find_map(|value| as_clean_string(value, cap))
}

/// Steps 2-4: trim and cap strings, normalize module-path separators,
/// lowercase token fields.
fn sanitize_fields(edge: &mut Relationship) {
    edge.import_alias = edge
        .import_alias
        .take()
        .and_then(|s| clean_owned(s, MAX_SHORT_FIELD));
    edge.re_export_target = edge
        .re_export_target
        .take()
        .and_then(|s| clean_owned(s, MAX_LONG_FIELD));
    edge.module_path = edge
        .module_path
        .take()
        .and_then(|s| clean_owned(s, MAX_LONG_FIELD))
        .map(|s| normalize_module_path(&s));
    edge.language = edge.language.take().and_then(|s| clean_token(&s));
    edge.symbol_kind = edge.symbol_kind.take().and_then(|s| clean_token(&s));
    if let Some(conf) = edge.confidence {
        if conf.is_finite() {
            edge.confidence = Some(conf.clamp(0.0, 1.0));
        } else {
            edge.confidence = None;
        }
    }
}

fn clean_owned(s: String, cap: usize) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.chars().count() > cap {
        Some(trimmed.chars().take(cap).collect())
    } else {
        Some(trimmed.to_string())
    }
}

/// Lowercased single token, capped at 64 chars.
fn clean_token(s: &str) -> Option<String> {
    let token = s.split_whitespace().next()?;
    let lowered = token.to_ascii_lowercase();
    if lowered.is_empty() {
        return None;
    }
    Some(lowered.chars().take(MAX_TOKEN_FIELD).collect())
}

/// Forward slashes, no runs, no trailing slash except the literal root.
fn normalize_module_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut last_was_slash = false;
    for ch in path.chars() {
        let ch = if ch == '\\' { '/' } else { ch };
        if ch == '/' {
            if last_was_slash {
                continue;
            }
            last_was_slash = true;
        } else {
            last_was_slash = false;
        }
        out.push(ch);
    }
    while out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

fn strip_hoisted_metadata(edge: &mut Relationship) {
    for key in STRIPPED_KEYS {
        edge.metadata.remove(*key);
    }
}

/// Step 5: derive a missing import type from hints.
fn derive_import_type(edge: &mut Relationship, hint: Option<&str>) {
    if edge.import_type.is_some() || !edge.rel_type.is_structural() {
        return;
    }
    if let Some(module) = edge.module_path.as_deref() {
        if module == "*" {
            edge.import_type = Some(ImportType::Wildcard);
            return;
        }
        if module.ends_with("/*") {
            edge.import_type = Some(ImportType::Namespace);
            return;
        }
    }
    if let Some(hint) = hint {
        edge.import_type = ImportType::from_hint(hint);
    }
}

/// A namespace import is a namespace binding; a re-export target implies a
/// re-export.
fn enforce_structural_invariants(edge: &mut Relationship) {
    if edge.import_type == Some(ImportType::Namespace) {
        edge.is_namespace = Some(true);
    }
    if edge.rel_type == crate::types::RelationType::Exports
        && edge.re_export_target.is_some()
        && edge.is_re_export.is_none()
    {
        edge.is_re_export = Some(true);
    }
}

/// Populate structured refs so the canonical key survives concretization.
fn derive_refs(edge: &mut Relationship) {
    if edge.to_ref.is_none() {
        edge.to_ref = Some(TargetRef::parse(&edge.to_entity_id));
    }
    if edge.from_ref.is_none() {
        edge.from_ref = Some(TargetRef::Entity {
            id: edge.from_entity_id.clone(),
        });
    }
}

/// Step 6: infer the tri-state when absent.
fn infer_resolution_state(edge: &mut Relationship) {
    if edge.resolution_state.is_some() {
        return;
    }
    if edge.rel_type.is_containment() {
        edge.resolution_state = Some(ResolutionState::Resolved);
        return;
    }
    if let Some(state) = classify_target(&edge.to_entity_id) {
        edge.resolution_state = Some(state);
        return;
    }
    edge.resolution_state = match edge.resolved {
        Some(true) => Some(ResolutionState::Resolved),
        _ => Some(ResolutionState::Unresolved),
    };
}

/// Classifies a target id as concrete, placeholder, or unknown.
fn classify_target(to_entity_id: &str) -> Option<ResolutionState> {
    if is_placeholder_id(to_entity_id) {
        return Some(ResolutionState::Unresolved);
    }
    for prefix in ["module:", "package:", "import:"] {
        if to_entity_id.starts_with(prefix) {
            return Some(ResolutionState::Unresolved);
        }
    }
    for prefix in ["file:", "sym:", "dir:", "entity:"] {
        if to_entity_id.starts_with(prefix) {
            return Some(ResolutionState::Resolved);
        }
    }
    None
}

/// Step 7: the tri-state wins; the boolean is its projection.
fn reconcile_resolved(edge: &mut Relationship) {
    if let Some(state) = edge.resolution_state {
        edge.resolved = Some(state == ResolutionState::Resolved);
    }
}

/// Step 8: fill missing confidence from the (type, state) defaults and
/// mirror the final value into metadata.
fn apply_confidence_default(edge: &mut Relationship) {
    let conf = edge.confidence.unwrap_or_else(|| {
        default_confidence(edge.rel_type.is_containment(), edge.resolution_state)
    });
    edge.confidence = Some(conf);
    if let Some(number) = serde_json::Number::from_f64(conf) {
        edge.metadata
            .insert("confidence".to_string(), Value::Number(number));
    }
}
