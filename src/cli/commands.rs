use crate::cli::args::{Cli, Commands, QueryTarget};
use crate::config::AppConfig;
use crate::logging::init_tracing;
use crate::models::{ObservationRecord, YearlyStatistic};
use crate::processors::{AggregationEngine, AggregationScale, IngestionEngine};
use crate::storage::{
    MemoryStore, ObservationFilter, Page, PageRequest, PostgresStore, StatisticsFilter,
    WeatherStore,
};
use crate::utils::progress::ProgressReporter;
use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

pub fn run(cli: Cli) -> Result<()> {
    let mut config =
        AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    if cli.verbose {
        config.logging.filter = "debug".to_string();
    }
    if let Some(path) = cli.log_file {
        config.logging.file = Some(path);
    }
    if cli.json_logs {
        config.logging.json = true;
    }
    init_tracing(&config.logging)?;

    match cli.command {
        Commands::Ingest {
            input_dir,
            max_workers,
            batch_size,
            mmap,
            init_schema,
            dry_run,
        } => {
            if let Some(dir) = input_dir {
                config.ingestion.source_dir = dir;
            }
            if let Some(workers) = max_workers {
                config.ingestion.max_workers = workers;
            }
            if let Some(size) = batch_size {
                config.database.batch_size = size;
            }
            if mmap {
                config.ingestion.use_mmap = true;
            }
            config.validate().context("Invalid ingestion options")?;

            let store: Arc<dyn WeatherStore> = if dry_run {
                info!("Dry run: records are parsed and counted but not persisted");
                Arc::new(MemoryStore::new())
            } else {
                let store = open_store(&config)?;
                if init_schema {
                    store.ensure_schema().context("Failed to create tables")?;
                }
                store
            };

            let progress = ProgressReporter::new(0, "Ingesting station files...", cli.quiet);
            let engine = IngestionEngine::new(store, &config.ingestion);
            let report = engine
                .run(&config.ingestion.source_dir, Some(&progress))
                .context("Ingestion failed")?;

            println!("\n{}", report.summary());
        }

        Commands::Aggregate { legacy_scaling } => {
            if legacy_scaling {
                config.aggregation.legacy_scaling = true;
            }

            let store = open_store(&config)?;
            let progress = ProgressReporter::new_spinner("Aggregating...", cli.quiet);
            let engine =
                AggregationEngine::new(store, AggregationScale::from_config(&config.aggregation));
            let report = engine.run(Some(&progress)).context("Aggregation failed")?;

            println!("\n{}", report.summary());
        }

        Commands::InitSchema => {
            let store = open_store(&config)?;
            store.ensure_schema().context("Failed to create tables")?;
            info!("Schema ready");
        }

        Commands::Query { target } => {
            let store = open_store(&config)?;
            let output = match target {
                QueryTarget::Weather {
                    station_id,
                    start_date,
                    end_date,
                    page,
                    per_page,
                } => {
                    let filter = ObservationFilter {
                        station_id,
                        start_date,
                        end_date,
                    };
                    let request = PageRequest::new(page, per_page)?;
                    observations_json(&store.query_observations(&filter, &request)?)
                }
                QueryTarget::Stats {
                    station_id,
                    year,
                    page,
                    per_page,
                } => {
                    let filter = StatisticsFilter { station_id, year };
                    let request = PageRequest::new(page, per_page)?;
                    statistics_json(&store.query_yearly_statistics(&filter, &request)?)
                }
            };

            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

fn open_store(config: &AppConfig) -> Result<Arc<PostgresStore>> {
    let store = PostgresStore::connect(&config.database).context("Failed to connect to database")?;
    Ok(Arc::new(store))
}

pub fn observations_json(page: &Page<ObservationRecord>) -> Value {
    let rows: Vec<Value> = page
        .items
        .iter()
        .map(|r| {
            json!({
                "station_id": r.station_id,
                "date": r.date,
                "max_temp": r.max_temperature,
                "min_temp": r.min_temperature,
                "precipitation": r.precipitation,
            })
        })
        .collect();

    json!({
        "weather_data": rows,
        "total": page.total,
        "pages": page.pages,
        "current_page": page.current_page,
    })
}

pub fn statistics_json(page: &Page<YearlyStatistic>) -> Value {
    let rows: Vec<Value> = page
        .items
        .iter()
        .map(|s| {
            json!({
                "station_id": s.station_id,
                "year": s.year,
                "avg_max_temp": s.avg_max_temperature,
                "avg_min_temp": s.avg_min_temperature,
                "total_precipitation": s.total_precipitation,
            })
        })
        .collect();

    json!({
        "weather_stats": rows,
        "total": page.total,
        "pages": page.pages,
        "current_page": page.current_page,
    })
}
