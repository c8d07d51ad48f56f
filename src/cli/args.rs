use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "wx-ingest")]
#[command(about = "Weather observation ingestion and yearly statistics")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Hide progress bars")]
    pub quiet: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,

    #[arg(long, global = true, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[arg(short, long, global = true, help = "Configuration file (TOML)")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load per-station observation files into the raw store
    Ingest {
        #[arg(
            short,
            long,
            help = "Directory of station files [default: ingestion.source_dir]"
        )]
        input_dir: Option<PathBuf>,

        #[arg(long)]
        max_workers: Option<usize>,

        #[arg(long, help = "Rows per bulk insert statement")]
        batch_size: Option<usize>,

        #[arg(long, help = "Read files through memory mapping")]
        mmap: bool,

        #[arg(long, help = "Create the tables before ingesting")]
        init_schema: bool,

        #[arg(long, help = "Parse and count without touching the database")]
        dry_run: bool,
    },

    /// Compute yearly per-station statistics from the raw store
    Aggregate {
        #[arg(
            long,
            help = "Divide temperatures by 10 and precipitation by 100 during aggregation"
        )]
        legacy_scaling: bool,
    },

    /// Create the observation and statistics tables if missing
    InitSchema,

    /// Page through stored observations or statistics as JSON
    Query {
        #[command(subcommand)]
        target: QueryTarget,
    },
}

#[derive(Subcommand)]
pub enum QueryTarget {
    /// Raw daily observations
    Weather {
        #[arg(short, long)]
        station_id: Option<String>,

        #[arg(long, help = "Inclusive lower bound (YYYY-MM-DD)")]
        start_date: Option<NaiveDate>,

        #[arg(long, help = "Inclusive upper bound (YYYY-MM-DD)")]
        end_date: Option<NaiveDate>,

        #[arg(long, default_value = "1")]
        page: u32,

        #[arg(long, default_value = "10")]
        per_page: u32,
    },

    /// Yearly statistics
    Stats {
        #[arg(short, long)]
        station_id: Option<String>,

        #[arg(short, long)]
        year: Option<i32>,

        #[arg(long, default_value = "1")]
        page: u32,

        #[arg(long, default_value = "10")]
        per_page: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_query_weather() {
        let cli = Cli::try_parse_from([
            "wx-ingest",
            "query",
            "weather",
            "--station-id",
            "USC00110072",
            "--start-date",
            "1985-01-01",
            "--per-page",
            "25",
        ])
        .unwrap();

        match cli.command {
            Commands::Query {
                target:
                    QueryTarget::Weather {
                        station_id,
                        start_date,
                        end_date,
                        page,
                        per_page,
                    },
            } => {
                assert_eq!(station_id.as_deref(), Some("USC00110072"));
                assert_eq!(start_date, NaiveDate::from_ymd_opt(1985, 1, 1));
                assert_eq!(end_date, None);
                assert_eq!(page, 1);
                assert_eq!(per_page, 25);
            }
            _ => panic!("expected query weather"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["wx-ingest", "aggregate", "--legacy-scaling", "-v", "-q"])
            .unwrap();
        assert!(cli.verbose);
        assert!(cli.quiet);
        assert!(matches!(
            cli.command,
            Commands::Aggregate {
                legacy_scaling: true
            }
        ));
    }
}
