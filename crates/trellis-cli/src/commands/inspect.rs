use trellis_core::sqlite::SqliteRowStore;
use trellis_core::store::RowStore;

pub(crate) fn run(db: &str, rel_type: Option<&str>, limit: usize, json_output: bool) -> i32 {
    let store = match SqliteRowStore::open(db) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("trellis: error: cannot open {db}: {e}");
            return 2;
        }
    };

    let rows = store.list(rel_type, Some(limit));
    if json_output {
        match serde_json::to_string_pretty(&rows) {
            Ok(out) => println!("{out}"),
            Err(e) => {
                eprintln!("trellis: error: {e}");
                return 1;
            }
        }
        return 0;
    }

    for row in &rows {
        println!(
            "{}  {}  {} -> {}  conf={}",
            row.id,
            row.rel_type,
            row.from_entity_id,
            row.to_entity_id,
            row.confidence
                .map(|c| format!("{c:.2}"))
                .unwrap_or_else(|| "-".to_string()),
        );
    }
    println!("{} of {} rows", rows.len(), store.count());
    0
}
