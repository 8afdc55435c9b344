use crate::project::StructuralRow;

/// Outcome of handing one row to a writer.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// No stored row existed; one was inserted.
    Created,
    /// A stored row existed and differed; the listed fields were updated.
    Updated(Vec<&'static str>),
    /// The stored row already matched; nothing was written.
    Unchanged,
}

/// Errors from a row writer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// The writer contract the projector's outputs feed. Writers must be
/// idempotent; the diff computed by the projector guarantees re-ingestion
/// of unchanged data performs no writes.
pub trait RowStore {
    /// Look up a stored row by its canonical id.
    fn get(&self, id: &str) -> Option<StructuralRow>;

    /// Insert or update a row, writing only when something changed.
    fn apply(&mut self, row: &StructuralRow) -> Result<WriteOutcome, StoreError>;

    /// All stored rows, optionally filtered by relation type wire name.
    fn list(&self, rel_type: Option<&str>, limit: Option<usize>) -> Vec<StructuralRow>;

    /// Number of stored rows.
    fn count(&self) -> usize;
}
