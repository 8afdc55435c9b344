use std::path::Path;

use serde_json::json;

use trellis_core::policy::NoisePolicy;
use trellis_core::sqlite::SqliteRowStore;
use trellis_core::store::{RowStore, WriteOutcome};
use trellis_extract::pipeline::Extractor;

pub(crate) fn run(root: &str, db: Option<&str>, json_output: bool) -> i32 {
    let root = Path::new(root);
    if !root.is_dir() {
        eprintln!("trellis: error: {} is not a directory", root.display());
        return 2;
    }

    let policy = NoisePolicy::load(&root.join(".trellis"));
    let extractor = Extractor::new(root, policy);
    let report = extractor.ingest(root);
    if report.cancelled {
        eprintln!("trellis: ingest cancelled");
        return 130;
    }

    let (mut created, mut updated, mut unchanged) = (0usize, 0usize, 0usize);
    if let Some(db_path) = db {
        let mut store = match SqliteRowStore::open(db_path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("trellis: error: cannot open {db_path}: {e}");
                return 2;
            }
        };
        for row in &report.rows {
            match store.apply(row) {
                Ok(WriteOutcome::Created) => created += 1,
                Ok(WriteOutcome::Updated(_)) => updated += 1,
                Ok(WriteOutcome::Unchanged) => unchanged += 1,
                Err(e) => {
                    eprintln!("trellis: error: write failed for {}: {e}", row.id);
                    return 1;
                }
            }
        }
    }

    if json_output {
        let summary = json!({
            "files": report.files.len(),
            "edges": report.edges.len(),
            "dropped": report.total_dropped(),
            "created": created,
            "updated": updated,
            "unchanged": unchanged,
        });
        println!("{summary}");
    } else {
        println!(
            "ingested {} files: {} edges ({} dropped below confidence floor)",
            report.files.len(),
            report.edges.len(),
            report.total_dropped()
        );
        if db.is_some() {
            println!("store: {created} created, {updated} updated, {unchanged} unchanged");
        }
        for file in &report.files {
            if file.parser_errors > 0 {
                println!(
                    "  {}: {} parser errors (recorded as hints)",
                    file.path, file.parser_errors
                );
            }
        }
    }
    0
}
