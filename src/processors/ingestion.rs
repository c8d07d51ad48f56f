use crate::config::IngestionConfig;
use crate::error::{ProcessingError, Result};
use crate::readers::{find_source_files, ObservationReader};
use crate::storage::WeatherStore;
use crate::utils::progress::ProgressReporter;
use chrono::{DateTime, Local};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Result of ingesting one station file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub station_id: String,
    pub rows_parsed: usize,
    pub rows_rejected: usize,
    pub records_inserted: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct IngestionReport {
    pub source_dir: PathBuf,
    pub started_at: DateTime<Local>,
    pub files_found: usize,
    pub files: Vec<FileOutcome>,
    pub failures: Vec<FileFailure>,
    pub total_records: u64,
    pub rows_parsed: usize,
    pub rows_rejected: usize,
    pub elapsed: Duration,
}

impl IngestionReport {
    fn new(source_dir: &Path, started_at: DateTime<Local>, files_found: usize) -> Self {
        Self {
            source_dir: source_dir.to_path_buf(),
            started_at,
            files_found,
            files: Vec::new(),
            failures: Vec::new(),
            total_records: 0,
            rows_parsed: 0,
            rows_rejected: 0,
            elapsed: Duration::ZERO,
        }
    }

    fn record(&mut self, outcome: FileOutcome) {
        self.total_records += outcome.records_inserted;
        self.rows_parsed += outcome.rows_parsed;
        self.rows_rejected += outcome.rows_rejected;
        self.files.push(outcome);
    }

    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Ingestion Summary:\n\
             - Source directory: {}\n\
             - Started at: {}\n\
             - Files found: {}\n\
             - Files ingested: {}\n\
             - Files failed: {}\n\
             - Rows parsed: {}\n\
             - Rows rejected: {}\n\
             - Records inserted: {}\n\
             - Time taken: {:.2?}",
            self.source_dir.display(),
            self.started_at.format("%Y-%m-%d %H:%M:%S"),
            self.files_found,
            self.files.len(),
            self.failures.len(),
            self.rows_parsed,
            self.rows_rejected,
            self.total_records,
            self.elapsed,
        );

        for failure in &self.failures {
            summary.push_str(&format!(
                "\n  ! {}: {}",
                failure.path.display(),
                failure.error
            ));
        }

        summary
    }
}

/// Loads every station file of a directory into the raw observation store.
pub struct IngestionEngine {
    store: Arc<dyn WeatherStore>,
    extensions: Vec<String>,
    max_workers: usize,
    use_mmap: bool,
}

impl IngestionEngine {
    pub fn new(store: Arc<dyn WeatherStore>, config: &IngestionConfig) -> Self {
        Self {
            store,
            extensions: config.extensions.clone(),
            max_workers: config.max_workers.max(1),
            use_mmap: config.use_mmap,
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    /// Ingest every matching file in `source_dir`. A file that cannot be read
    /// or stored is reported and skipped; losing the store aborts the run.
    pub fn run(
        &self,
        source_dir: &Path,
        progress: Option<&ProgressReporter>,
    ) -> Result<IngestionReport> {
        let started_at = Local::now();
        let timer = Instant::now();
        info!(
            source_dir = %source_dir.display(),
            started_at = %started_at.to_rfc3339(),
            "Starting ingestion of weather data"
        );

        let files = find_source_files(source_dir, &self.extensions)?;
        let mut report = IngestionReport::new(source_dir, started_at, files.len());

        if let Some(p) = progress {
            p.set_length(files.len() as u64);
            p.set_message(&format!("Ingesting {} station files...", files.len()));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_workers)
            .build()
            .map_err(|e| ProcessingError::Config(e.to_string()))?;

        let abort = AtomicBool::new(false);

        let results: Vec<(PathBuf, Option<Result<FileOutcome>>)> = pool.install(|| {
            files
                .par_iter()
                .map(|path| {
                    if abort.load(Ordering::Relaxed) {
                        return (path.clone(), None);
                    }

                    let result = self.ingest_file(path);
                    if let Err(e) = &result {
                        if e.is_fatal() {
                            abort.store(true, Ordering::Relaxed);
                        } else {
                            warn!(path = %path.display(), error = %e, "Skipping file");
                        }
                    }

                    if let Some(p) = progress {
                        p.increment(1);
                    }

                    (path.clone(), Some(result))
                })
                .collect()
        });

        let mut fatal = None;
        let mut skipped = 0;
        for (path, result) in results {
            match result {
                Some(Ok(outcome)) => report.record(outcome),
                Some(Err(e)) if e.is_fatal() => {
                    fatal.get_or_insert(e);
                }
                Some(Err(e)) => report.failures.push(FileFailure {
                    path,
                    error: e.to_string(),
                }),
                None => skipped += 1,
            }
        }

        report.elapsed = timer.elapsed();

        if let Some(e) = fatal {
            error!(
                error = %e,
                files_ingested = report.files.len(),
                files_skipped = skipped,
                records_inserted = report.total_records,
                "Ingestion aborted"
            );
            return Err(e);
        }

        info!(
            total_records = report.total_records,
            files_ingested = report.files.len(),
            files_failed = report.failures.len(),
            rows_rejected = report.rows_rejected,
            "Finished ingestion. Total records ingested: {}",
            report.total_records
        );
        info!("Time taken: {:.2?}", report.elapsed);

        if let Some(p) = progress {
            p.finish_with_message(&format!("Ingested {} records", report.total_records));
        }

        Ok(report)
    }

    /// Parse one station file and store it in a single transaction.
    pub fn ingest_file(&self, path: &Path) -> Result<FileOutcome> {
        info!(path = %path.display(), "Starting ingestion for file");

        let reader = ObservationReader::with_mmap(self.use_mmap);
        let parsed = reader.read_file(path)?;

        if !parsed.rejected.is_empty() {
            warn!(
                path = %path.display(),
                rejected = parsed.rejected.len(),
                "Skipped malformed rows"
            );
            for row in &parsed.rejected {
                debug!(path = %path.display(), line = row.line, reason = %row.reason, "Rejected row");
            }
        }

        let records_inserted = self.store.insert_observations(&parsed.records)?;

        info!(
            path = %path.display(),
            station_id = %parsed.station_id,
            rows_read = parsed.rows_read(),
            records_inserted,
            "Finished ingestion for file"
        );

        Ok(FileOutcome {
            path: path.to_path_buf(),
            rows_parsed: parsed.records.len(),
            rows_rejected: parsed.rejected.len(),
            station_id: parsed.station_id,
            records_inserted,
        })
    }
}
