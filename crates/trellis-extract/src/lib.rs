//! Extraction pipeline for trellis: parsing, symbol resolution, and
//! relationship building.
//!
//! The flow per file: tree-sitter parse → symbol extraction → import/export
//! maps → the relationship builder's two AST walks → normalization in
//! `trellis-core`. Resolution inside the builder runs a tier ladder —
//! direct local, import/deep-export, bounded type checker — and anything
//! unresolved degrades to a placeholder target instead of failing.
//!
//! - [`treesitter`] / [`symbols`] — Grammar dispatch and declaration extraction
//! - [`entities`] — Parse-time file/symbol records
//! - [`index`] — The shared symbol index
//! - [`exports`] — Export maps and deep re-export resolution
//! - [`checker`] — The type-checker facade, budget, and default implementation
//! - [`confidence`] — Edge confidence scoring
//! - [`builder`] — The relationship builder
//! - [`pipeline`] — The parallel per-file ingest
//! - [`walker`] — Source file discovery

pub mod builder;
pub mod checker;
pub mod confidence;
pub mod entities;
pub mod exports;
pub mod index;
pub mod pipeline;
pub mod symbols;
pub mod treesitter;
pub mod walker;
