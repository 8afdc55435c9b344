use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "trellis",
    version,
    about = "Structural relationship extraction for code knowledge graphs"
)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Parse a source tree and extract its relationship edges
    Ingest {
        /// Root directory to ingest
        root: String,
        /// SQLite database to write rows into (omit for a dry run)
        #[arg(long)]
        db: Option<String>,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Dump stored relationship rows
    Inspect {
        /// SQLite database to read
        db: String,
        /// Filter by relation type (e.g. IMPORTS, CALLS)
        #[arg(long = "type")]
        rel_type: Option<String>,
        /// Maximum number of rows to print
        #[arg(long, default_value = "50")]
        limit: usize,
        /// Print rows as JSON
        #[arg(long)]
        json: bool,
    },

    /// Re-normalize stored snapshots, rewriting rows that drifted
    Backfill {
        /// SQLite database to repair
        db: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_args() {
        let cli = Cli::parse_from(["trellis", "ingest", "src", "--db", "out.db", "--json"]);
        match cli.command {
            Commands::Ingest { root, db, json } => {
                assert_eq!(root, "src");
                assert_eq!(db.as_deref(), Some("out.db"));
                assert!(json);
            }
            other => panic!("expected ingest, got {other:?}"),
        }
    }

    #[test]
    fn test_inspect_defaults() {
        let cli = Cli::parse_from(["trellis", "inspect", "rel.db", "--type", "IMPORTS"]);
        match cli.command {
            Commands::Inspect {
                db,
                rel_type,
                limit,
                json,
            } => {
                assert_eq!(db, "rel.db");
                assert_eq!(rel_type.as_deref(), Some("IMPORTS"));
                assert_eq!(limit, 50);
                assert!(!json);
            }
            other => panic!("expected inspect, got {other:?}"),
        }
    }

    #[test]
    fn test_verbose_is_global() {
        let cli = Cli::parse_from(["trellis", "backfill", "rel.db", "--verbose"]);
        assert!(cli.verbose);
    }
}
