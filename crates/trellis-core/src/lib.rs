//! Core edge model, normalization, and structural persistence for trellis.
//!
//! This crate holds everything downstream of extraction:
//! - [`types`] — The [`Relationship`](types::Relationship) edge model and enums
//! - [`target`] — Structured target references and the placeholder grammar
//! - [`ident`] — Deterministic relationship and dataflow ids
//! - [`metadata`] — The metadata bag, coercions, and stable stringification
//! - [`normalize`] — The relationship normalizer
//! - [`adapters`] — The sealed per-language adapter registry
//! - [`project`] — Flat persistence rows and idempotent backfill diffs
//! - [`policy`] — Noise thresholds loaded from `.trellis/trellis.json`
//! - [`store`] / [`sqlite`] — The row-writer contract and its SQLite reference

pub mod adapters;
pub mod ident;
pub mod metadata;
pub mod normalize;
pub mod policy;
pub mod project;
pub mod sqlite;
pub mod store;
pub mod target;
pub mod types;
