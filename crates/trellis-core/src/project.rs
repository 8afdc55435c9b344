//! Structural persistence projector.
//!
//! Flattens a normalized edge into the row shape the persistence layer
//! stores, and answers the one question that makes re-ingestion idempotent:
//! does this snapshot need a write? `compute_backfill_update` re-normalizes
//! the stored snapshot, projects both sides, and diffs field by field;
//! metadata is compared through its stable stringification.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adapters::AdapterRegistry;
use crate::metadata::{stable_stringify, Metadata};
use crate::normalize::normalize;
use crate::types::{ImportType, RelationType, Relationship, ResolutionState, Scope};

/// Flat persistence row for a structural (or any) edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralRow {
    pub id: String,
    pub from_entity_id: String,
    pub to_entity_id: String,
    #[serde(rename = "type")]
    pub rel_type: String,
    pub import_alias: Option<String>,
    pub import_type: Option<String>,
    pub is_namespace: Option<bool>,
    pub is_re_export: Option<bool>,
    pub re_export_target: Option<String>,
    pub language: Option<String>,
    pub symbol_kind: Option<String>,
    pub module_path: Option<String>,
    pub resolution_state: Option<String>,
    pub import_depth: Option<u32>,
    pub confidence: Option<f64>,
    pub scope: Option<String>,
    pub first_seen_at: Option<String>,
    pub last_seen_at: Option<String>,
    /// Stable-stringified metadata JSON.
    pub metadata: String,
}

/// A pending write: the full payload plus the fields that changed.
#[derive(Debug, Clone, PartialEq)]
pub struct BackfillUpdate {
    pub payload: StructuralRow,
    pub changed_fields: Vec<&'static str>,
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Projects a normalized edge to its flat row.
pub fn project_row(edge: &Relationship) -> StructuralRow {
    StructuralRow {
        id: edge.id.clone(),
        from_entity_id: edge.from_entity_id.clone(),
        to_entity_id: edge.to_entity_id.clone(),
        rel_type: edge.rel_type.as_str().to_string(),
        import_alias: edge.import_alias.clone(),
        import_type: edge.import_type.map(|t| t.as_str().to_string()),
        is_namespace: edge.is_namespace,
        is_re_export: edge.is_re_export,
        re_export_target: edge.re_export_target.clone(),
        language: edge.language.clone(),
        symbol_kind: edge.symbol_kind.clone(),
        module_path: edge.module_path.clone(),
        resolution_state: edge.resolution_state.map(|s| s.as_str().to_string()),
        import_depth: edge.import_depth,
        confidence: edge.confidence,
        scope: edge.scope.map(|s| s.as_str().to_string()),
        first_seen_at: edge.first_seen_at.map(format_timestamp),
        last_seen_at: edge.last_seen_at.map(format_timestamp),
        metadata: stable_stringify(&Value::Object(edge.metadata.clone())),
    }
}

/// Reconstructs the minimal edge a snapshot describes. `None` when the
/// stored type tag is unrecognized; the caller treats that as "no write".
fn snapshot_to_edge(row: &StructuralRow) -> Option<Relationship> {
    let rel_type = RelationType::parse(&row.rel_type)?;
    let mut edge = Relationship::new(
        row.from_entity_id.clone(),
        row.to_entity_id.clone(),
        rel_type,
        DateTime::UNIX_EPOCH,
    );
    edge.id = row.id.clone();
    edge.import_alias = row.import_alias.clone();
    edge.import_type = row.import_type.as_deref().and_then(ImportType::parse);
    edge.is_namespace = row.is_namespace;
    edge.is_re_export = row.is_re_export;
    edge.re_export_target = row.re_export_target.clone();
    edge.language = row.language.clone();
    edge.symbol_kind = row.symbol_kind.clone();
    edge.module_path = row.module_path.clone();
    edge.resolution_state = row
        .resolution_state
        .as_deref()
        .and_then(ResolutionState::parse);
    edge.import_depth = row.import_depth;
    edge.confidence = row.confidence;
    edge.scope = row.scope.as_deref().and_then(Scope::parse);
    edge.first_seen_at = parse_timestamp(row.first_seen_at.as_deref());
    edge.last_seen_at = parse_timestamp(row.last_seen_at.as_deref());
    edge.metadata = parse_metadata(&row.metadata);
    Some(edge)
}

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_metadata(raw: &str) -> Metadata {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        _ => Metadata::new(),
    }
}

/// Puts a raw snapshot into comparable form without re-deriving anything:
/// metadata re-strung stably, timestamps re-formatted when parseable.
fn canonical_snapshot(row: &StructuralRow) -> StructuralRow {
    let mut out = row.clone();
    out.metadata = stable_stringify(&Value::Object(parse_metadata(&row.metadata)));
    if let Some(ts) = parse_timestamp(row.first_seen_at.as_deref()) {
        out.first_seen_at = Some(format_timestamp(ts));
    }
    if let Some(ts) = parse_timestamp(row.last_seen_at.as_deref()) {
        out.last_seen_at = Some(format_timestamp(ts));
    }
    out
}

/// Field-by-field row diff. Metadata strings are assumed already stable.
pub fn diff_rows(expected: &StructuralRow, existing: &StructuralRow) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if expected.id != existing.id {
        changed.push("id");
    }
    if expected.from_entity_id != existing.from_entity_id {
        changed.push("fromEntityId");
    }
    if expected.to_entity_id != existing.to_entity_id {
        changed.push("toEntityId");
    }
    if expected.rel_type != existing.rel_type {
        changed.push("type");
    }
    if expected.import_alias != existing.import_alias {
        changed.push("importAlias");
    }
    if expected.import_type != existing.import_type {
        changed.push("importType");
    }
    if expected.is_namespace != existing.is_namespace {
        changed.push("isNamespace");
    }
    if expected.is_re_export != existing.is_re_export {
        changed.push("isReExport");
    }
    if expected.re_export_target != existing.re_export_target {
        changed.push("reExportTarget");
    }
    if expected.language != existing.language {
        changed.push("language");
    }
    if expected.symbol_kind != existing.symbol_kind {
        changed.push("symbolKind");
    }
    if expected.module_path != existing.module_path {
        changed.push("modulePath");
    }
    if expected.resolution_state != existing.resolution_state {
        changed.push("resolutionState");
    }
    if expected.import_depth != existing.import_depth {
        changed.push("importDepth");
    }
    if expected.confidence != existing.confidence {
        changed.push("confidence");
    }
    if expected.scope != existing.scope {
        changed.push("scope");
    }
    if expected.first_seen_at != existing.first_seen_at {
        changed.push("firstSeenAt");
    }
    if expected.last_seen_at != existing.last_seen_at {
        changed.push("lastSeenAt");
    }
    if expected.metadata != existing.metadata {
        changed.push("metadata");
    }
    changed
}

/// Decides whether a stored snapshot needs a write. Returns `None` when the
/// snapshot already matches its normalized projection, or when it cannot be
/// interpreted at all.
pub fn compute_backfill_update(
    snapshot: &StructuralRow,
    adapters: &AdapterRegistry,
) -> Option<BackfillUpdate> {
    let edge = snapshot_to_edge(snapshot)?;
    let normalized = normalize(edge, adapters, false);
    let expected = project_row(&normalized);
    let existing = canonical_snapshot(snapshot);
    let changed_fields = diff_rows(&expected, &existing);
    if changed_fields.is_empty() {
        return None;
    }
    Some(BackfillUpdate {
        payload: expected,
        changed_fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn registry() -> AdapterRegistry {
        AdapterRegistry::standard()
    }

    fn normalized_import() -> Relationship {
        let mut e = Relationship::new(
            "file:src/a.ts",
            "file:src/c.ts:default",
            RelationType::Imports,
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        );
        e.module_path = Some("./b".to_string());
        e.import_type = Some(ImportType::Default);
        e.import_depth = Some(2);
        e.resolution_state = Some(ResolutionState::Resolved);
        e.first_seen_at = Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        e.last_seen_at = Some(Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap());
        normalize(e, &registry(), false)
    }

    #[test]
    fn test_project_row_shape() {
        let edge = normalized_import();
        let row = project_row(&edge);
        assert!(row.id.starts_with("time-rel_"));
        assert_eq!(row.rel_type, "IMPORTS");
        assert_eq!(row.import_type.as_deref(), Some("default"));
        assert_eq!(row.resolution_state.as_deref(), Some("resolved"));
        assert_eq!(
            row.first_seen_at.as_deref(),
            Some("2024-05-01T12:00:00.000Z")
        );
        // Metadata is stable JSON, parseable back into an object.
        let meta: Value = serde_json::from_str(&row.metadata).unwrap();
        assert!(meta.is_object());
    }

    #[test]
    fn test_backfill_is_null_for_canonical_snapshot() {
        let row = project_row(&normalized_import());
        assert_eq!(compute_backfill_update(&row, &registry()), None);
    }

    #[test]
    fn test_backfill_detects_drifted_fields() {
        let mut row = project_row(&normalized_import());
        row.import_type = None;
        row.language = Some("TS".to_string());
        let update = compute_backfill_update(&row, &registry()).expect("drift needs a write");
        assert!(update.changed_fields.contains(&"importType"));
        assert!(update.changed_fields.contains(&"language"));
        assert_eq!(update.payload.import_type.as_deref(), Some("default"));
        assert_eq!(update.payload.language.as_deref(), Some("typescript"));
    }

    #[test]
    fn test_backfill_reorders_metadata_without_write() {
        let mut row = project_row(&normalized_import());
        // Same contents, scrambled key order: must not trigger a write.
        let value: Value = serde_json::from_str(&row.metadata).unwrap();
        let mut pairs: Vec<(String, Value)> = value.as_object().unwrap().clone().into_iter().collect();
        pairs.reverse();
        let mut scrambled = String::from("{");
        for (i, (k, v)) in pairs.iter().enumerate() {
            if i > 0 {
                scrambled.push(',');
            }
            scrambled.push_str(&format!("{}:{}", Value::String(k.clone()), v));
        }
        scrambled.push('}');
        row.metadata = scrambled;
        assert_eq!(compute_backfill_update(&row, &registry()), None);
    }

    #[test]
    fn test_backfill_unknown_type_is_no_write() {
        let mut row = project_row(&normalized_import());
        row.rel_type = "SPARKLES".to_string();
        assert_eq!(compute_backfill_update(&row, &registry()), None);
    }

    #[test]
    fn test_backfill_rekeys_stale_id() {
        let mut row = project_row(&normalized_import());
        row.id = "rel_0000".to_string();
        let update = compute_backfill_update(&row, &registry()).unwrap();
        assert!(update.changed_fields.contains(&"id"));
        assert!(update.payload.id.starts_with("time-rel_"));
    }
}
