//! trellis CLI — structural relationship extraction for code knowledge
//! graphs.
//!
//! This binary provides the `trellis` command: `ingest` runs the full
//! pipeline over a source tree and writes persistence rows, `inspect`
//! dumps stored rows, `backfill` re-normalizes stored snapshots. See
//! `trellis --help` for usage.

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli_args;
mod commands;

use cli_args::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new(if cli.verbose { "debug" } else { "warn" })
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    let exit_code = match cli.command {
        Commands::Ingest { root, db, json } => commands::ingest::run(&root, db.as_deref(), json),
        Commands::Inspect {
            db,
            rel_type,
            limit,
            json,
        } => commands::inspect::run(&db, rel_type.as_deref(), limit, json),
        Commands::Backfill { db } => commands::backfill::run(&db),
    };

    std::process::exit(exit_code);
}
