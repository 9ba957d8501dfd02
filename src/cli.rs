//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Enrich a drug catalog with classification codes and reconcile it against a
/// remote tabular store.
#[derive(Parser, Debug)]
#[command(name = "atcsync")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Remote store table endpoint URL
    #[arg(long, env = "ATCSYNC_STORE_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    /// Minimum delay between requests to the same domain in milliseconds (0 to disable, max 60000)
    #[arg(long, default_value_t = 500, value_parser = clap::value_parser!(u64).range(0..=60000), global = true)]
    pub pacing_ms: u64,

    /// Maximum attempts for transient store failures (1-10)
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u32).range(1..=10), global = true)]
    pub max_retries: u32,

    /// Records per store mutation batch (1-10)
    #[arg(long, default_value_t = 10, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..=10), global = true)]
    pub batch_size: usize,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rebuild the catalog from the registry sources and reconcile the store
    Reconcile {
        /// Compute and print the diff without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Resolve classification codes for store rows missing one
    Enrich {
        /// Process at most N records
        #[arg(long)]
        limit: Option<usize>,

        /// Document pages text-extracted per candidate (0 = all)
        #[arg(long, default_value_t = 0, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(0..=500))]
        max_pages: usize,

        /// Append per-record diagnostics to this semicolon-delimited file
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_reconcile_parses_with_defaults() {
        let args = Args::try_parse_from(["atcsync", "reconcile"]).unwrap();
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert_eq!(args.pacing_ms, 500);
        assert_eq!(args.max_retries, 5);
        assert_eq!(args.batch_size, 10);
        assert!(matches!(args.command, Command::Reconcile { dry_run: false }));
    }

    #[test]
    fn test_cli_reconcile_dry_run_flag() {
        let args = Args::try_parse_from(["atcsync", "reconcile", "--dry-run"]).unwrap();
        assert!(matches!(args.command, Command::Reconcile { dry_run: true }));
    }

    #[test]
    fn test_cli_enrich_options() {
        let args = Args::try_parse_from([
            "atcsync",
            "enrich",
            "--limit",
            "25",
            "--max-pages",
            "10",
            "--report",
            "out.csv",
        ])
        .unwrap();
        match args.command {
            Command::Enrich {
                limit,
                max_pages,
                report,
            } => {
                assert_eq!(limit, Some(25));
                assert_eq!(max_pages, 10);
                assert_eq!(report.unwrap().to_str().unwrap(), "out.csv");
            }
            Command::Reconcile { .. } => panic!("expected enrich"),
        }
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["atcsync", "enrich", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_batch_size_rejects_platform_ceiling_excess() {
        let result = Args::try_parse_from(["atcsync", "reconcile", "--batch-size", "11"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_requires_a_subcommand() {
        let result = Args::try_parse_from(["atcsync"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let result = Args::try_parse_from(["atcsync", "--help"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
