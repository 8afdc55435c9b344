use trellis_core::adapters::AdapterRegistry;
use trellis_core::sqlite::SqliteRowStore;

pub(crate) fn run(db: &str) -> i32 {
    let mut store = match SqliteRowStore::open(db) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("trellis: error: cannot open {db}: {e}");
            return 2;
        }
    };

    match store.backfill(&AdapterRegistry::standard()) {
        Ok(stats) => {
            println!(
                "backfill: {} rows scanned, {} rewritten",
                stats.scanned, stats.rewritten
            );
            0
        }
        Err(e) => {
            eprintln!("trellis: error: backfill failed: {e}");
            1
        }
    }
}
