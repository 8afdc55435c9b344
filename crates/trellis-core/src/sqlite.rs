//! SQLite-backed reference implementation of the [`RowStore`] contract.
//!
//! One table, one row per canonical edge id. `apply` diffs the incoming row
//! against the stored one and skips the write entirely when nothing
//! changed, so repeated ingestion of the same sources leaves the database
//! byte-identical. `backfill` re-normalizes every stored snapshot through
//! the projector, repairing rows written by older pipeline versions.

use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult};

use crate::adapters::AdapterRegistry;
use crate::project::{compute_backfill_update, diff_rows, StructuralRow};
use crate::store::{RowStore, StoreError, WriteOutcome};

const SCHEMA_VERSION: u32 = 1;

pub struct SqliteRowStore {
    conn: Connection,
}

/// Counts from one backfill sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackfillStats {
    pub scanned: usize,
    pub rewritten: usize,
}

impl SqliteRowStore {
    /// Open or create a relationship database at the given path.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = SqliteRowStore { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = SqliteRowStore { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS trellis_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS relationships (
                id TEXT PRIMARY KEY,
                from_entity_id TEXT NOT NULL,
                to_entity_id TEXT NOT NULL,
                type TEXT NOT NULL,
                import_alias TEXT,
                import_type TEXT,
                is_namespace INTEGER,
                is_re_export INTEGER,
                re_export_target TEXT,
                language TEXT,
                symbol_kind TEXT,
                module_path TEXT,
                resolution_state TEXT,
                import_depth INTEGER,
                confidence REAL,
                scope TEXT,
                first_seen_at TEXT,
                last_seen_at TEXT,
                metadata TEXT NOT NULL DEFAULT '{}'
            );
            CREATE INDEX IF NOT EXISTS idx_relationships_from ON relationships(from_entity_id);
            CREATE INDEX IF NOT EXISTS idx_relationships_to ON relationships(to_entity_id);
            CREATE INDEX IF NOT EXISTS idx_relationships_type ON relationships(type);
            ",
        )?;

        self.conn.execute(
            "INSERT OR IGNORE INTO trellis_meta (key, value) VALUES ('schema_version', ?1)",
            params![SCHEMA_VERSION.to_string()],
        )?;

        Ok(())
    }

    /// Get the current schema version.
    pub fn schema_version(&self) -> Result<u32, StoreError> {
        let version: String = self.conn.query_row(
            "SELECT value FROM trellis_meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )?;
        version
            .parse()
            .map_err(|e| StoreError::Internal(format!("invalid schema version: {e}")))
    }

    fn row_from_sql(row: &rusqlite::Row) -> SqlResult<StructuralRow> {
        Ok(StructuralRow {
            id: row.get("id")?,
            from_entity_id: row.get("from_entity_id")?,
            to_entity_id: row.get("to_entity_id")?,
            rel_type: row.get("type")?,
            import_alias: row.get("import_alias")?,
            import_type: row.get("import_type")?,
            is_namespace: row
                .get::<_, Option<i64>>("is_namespace")?
                .map(|v| v != 0),
            is_re_export: row
                .get::<_, Option<i64>>("is_re_export")?
                .map(|v| v != 0),
            re_export_target: row.get("re_export_target")?,
            language: row.get("language")?,
            symbol_kind: row.get("symbol_kind")?,
            module_path: row.get("module_path")?,
            resolution_state: row.get("resolution_state")?,
            import_depth: row.get("import_depth")?,
            confidence: row.get("confidence")?,
            scope: row.get("scope")?,
            first_seen_at: row.get("first_seen_at")?,
            last_seen_at: row.get("last_seen_at")?,
            metadata: row.get("metadata")?,
        })
    }

    fn write_row(&self, row: &StructuralRow) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO relationships (
                id, from_entity_id, to_entity_id, type,
                import_alias, import_type, is_namespace, is_re_export,
                re_export_target, language, symbol_kind, module_path,
                resolution_state, import_depth, confidence, scope,
                first_seen_at, last_seen_at, metadata
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
            params![
                row.id,
                row.from_entity_id,
                row.to_entity_id,
                row.rel_type,
                row.import_alias,
                row.import_type,
                row.is_namespace.map(|b| b as i64),
                row.is_re_export.map(|b| b as i64),
                row.re_export_target,
                row.language,
                row.symbol_kind,
                row.module_path,
                row.resolution_state,
                row.import_depth,
                row.confidence,
                row.scope,
                row.first_seen_at,
                row.last_seen_at,
                row.metadata,
            ],
        )?;
        Ok(())
    }

    /// Re-normalize every stored snapshot, rewriting the ones that drifted
    /// from their canonical projection.
    pub fn backfill(&mut self, adapters: &AdapterRegistry) -> Result<BackfillStats, StoreError> {
        let snapshots = self.list(None, None);
        let mut stats = BackfillStats {
            scanned: snapshots.len(),
            rewritten: 0,
        };
        for snapshot in snapshots {
            if let Some(update) = compute_backfill_update(&snapshot, adapters) {
                if update.payload.id != snapshot.id {
                    self.conn.execute(
                        "DELETE FROM relationships WHERE id = ?1",
                        params![snapshot.id],
                    )?;
                }
                self.write_row(&update.payload)?;
                stats.rewritten += 1;
            }
        }
        Ok(stats)
    }
}

impl RowStore for SqliteRowStore {
    fn get(&self, id: &str) -> Option<StructuralRow> {
        self.conn
            .query_row(
                "SELECT * FROM relationships WHERE id = ?1",
                params![id],
                Self::row_from_sql,
            )
            .optional()
            .ok()
            .flatten()
    }

    fn apply(&mut self, row: &StructuralRow) -> Result<WriteOutcome, StoreError> {
        match self.get(&row.id) {
            None => {
                self.write_row(row)?;
                Ok(WriteOutcome::Created)
            }
            Some(existing) => {
                let changed = diff_rows(row, &existing);
                if changed.is_empty() {
                    Ok(WriteOutcome::Unchanged)
                } else {
                    self.write_row(row)?;
                    Ok(WriteOutcome::Updated(changed))
                }
            }
        }
    }

    fn list(&self, rel_type: Option<&str>, limit: Option<usize>) -> Vec<StructuralRow> {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let result: SqlResult<Vec<StructuralRow>> = match rel_type {
            Some(t) => self
                .conn
                .prepare("SELECT * FROM relationships WHERE type = ?1 ORDER BY id LIMIT ?2")
                .and_then(|mut stmt| {
                    stmt.query_map(params![t, limit], Self::row_from_sql)?
                        .collect()
                }),
            None => self
                .conn
                .prepare("SELECT * FROM relationships ORDER BY id LIMIT ?1")
                .and_then(|mut stmt| {
                    stmt.query_map(params![limit], Self::row_from_sql)?
                        .collect()
                }),
        };
        result.unwrap_or_default()
    }

    fn count(&self) -> usize {
        self.conn
            .query_row("SELECT COUNT(*) FROM relationships", [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| n as usize)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::project::project_row;
    use crate::types::{RelationType, Relationship};
    use chrono::Utc;

    fn sample_row() -> StructuralRow {
        let edge = Relationship::new(
            "file:src/a.ts",
            "file:src/b.ts:helper",
            RelationType::Imports,
            Utc::now(),
        );
        project_row(&normalize(edge, &AdapterRegistry::standard(), false))
    }

    #[test]
    fn test_apply_create_then_unchanged() {
        let mut store = SqliteRowStore::in_memory().unwrap();
        let row = sample_row();
        assert_eq!(store.apply(&row).unwrap(), WriteOutcome::Created);
        assert_eq!(store.apply(&row).unwrap(), WriteOutcome::Unchanged);
        assert_eq!(store.count(), 1);
        assert_eq!(store.get(&row.id).unwrap(), row);
    }

    #[test]
    fn test_apply_updates_changed_fields() {
        let mut store = SqliteRowStore::in_memory().unwrap();
        let mut row = sample_row();
        store.apply(&row).unwrap();
        row.confidence = Some(0.75);
        match store.apply(&row).unwrap() {
            WriteOutcome::Updated(fields) => assert_eq!(fields, vec!["confidence"]),
            other => panic!("expected update, got {other:?}"),
        }
        assert_eq!(store.get(&row.id).unwrap().confidence, Some(0.75));
    }

    #[test]
    fn test_list_filters_by_type() {
        let mut store = SqliteRowStore::in_memory().unwrap();
        store.apply(&sample_row()).unwrap();
        assert_eq!(store.list(Some("IMPORTS"), None).len(), 1);
        assert_eq!(store.list(Some("CALLS"), None).len(), 0);
        assert_eq!(store.list(None, Some(10)).len(), 1);
    }

    #[test]
    fn test_backfill_repairs_drifted_rows() {
        let mut store = SqliteRowStore::in_memory().unwrap();
        let mut row = sample_row();
        // Simulate a row written before language adapters existed.
        row.language = None;
        row.symbol_kind = None;
        store.apply(&row).unwrap();

        let stats = store.backfill(&AdapterRegistry::standard()).unwrap();
        assert_eq!(stats.scanned, 1);
        assert_eq!(stats.rewritten, 1);
        let repaired = store.get(&row.id).unwrap();
        assert_eq!(repaired.language.as_deref(), Some("typescript"));
        assert_eq!(repaired.symbol_kind.as_deref(), Some("module"));

        // A second sweep finds nothing to do.
        let stats = store.backfill(&AdapterRegistry::standard()).unwrap();
        assert_eq!(stats.rewritten, 0);
    }

    #[test]
    fn test_schema_version() {
        let store = SqliteRowStore::in_memory().unwrap();
        assert_eq!(store.schema_version().unwrap(), 1);
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rel.db");
        let mut store = SqliteRowStore::open(path.to_str().unwrap()).unwrap();
        let row = sample_row();
        store.apply(&row).unwrap();
        drop(store);

        let store = SqliteRowStore::open(path.to_str().unwrap()).unwrap();
        assert_eq!(store.count(), 1);
    }
}
