//! Shared fixture helpers for the integration suites.
#![allow(dead_code)]

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use trellis_core::policy::NoisePolicy;
use trellis_core::types::{RelationType, Relationship};
use trellis_extract::pipeline::{Extractor, IngestReport};

/// Writes a set of (relative path, content) files into a fresh temp
/// project and ingests it.
pub fn ingest_project(files: &[(&str, &str)]) -> (TempDir, IngestReport) {
    let dir = tempfile::tempdir().expect("temp project dir");
    for (rel, content) in files {
        let path = dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
    let extractor = Extractor::new(dir.path(), NoisePolicy::default());
    let report = extractor.ingest(dir.path());
    (dir, report)
}

/// Re-ingests an existing fixture directory with a fresh extractor.
pub fn reingest(root: &Path) -> IngestReport {
    let extractor = Extractor::new(root, NoisePolicy::default());
    extractor.ingest(root)
}

/// All edges of one type.
pub fn edges_of(report: &IngestReport, rel_type: RelationType) -> Vec<&Relationship> {
    report
        .edges
        .iter()
        .filter(|e| e.rel_type == rel_type)
        .collect()
}

/// The single edge of a type between two entities; panics with context when
/// it is missing.
pub fn edge_between<'r>(
    report: &'r IngestReport,
    rel_type: RelationType,
    from: &str,
    to: &str,
) -> &'r Relationship {
    report
        .edges
        .iter()
        .find(|e| e.rel_type == rel_type && e.from_entity_id == from && e.to_entity_id == to)
        .unwrap_or_else(|| {
            let near: Vec<String> = report
                .edges
                .iter()
                .filter(|e| e.rel_type == rel_type)
                .map(|e| format!("{} -> {}", e.from_entity_id, e.to_entity_id))
                .collect();
            panic!("no {rel_type} edge {from} -> {to}; have: {near:#?}")
        })
}
