use crate::config::AggregationConfig;
use crate::error::Result;
use crate::models::{ObservationRecord, YearlyStatistic};
use crate::storage::WeatherStore;
use crate::utils::progress::ProgressReporter;
use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Divisors applied to the yearly mean temperatures and precipitation total.
///
/// The raw store already holds degrees Celsius and millimetres, so the
/// canonical scale leaves temperatures alone and reports precipitation in
/// centimetres. `LEGACY` repeats the tenths conversion on top of that.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregationScale {
    pub temperature_divisor: f64,
    pub precipitation_divisor: f64,
}

impl AggregationScale {
    pub const CANONICAL: Self = Self {
        temperature_divisor: 1.0,
        precipitation_divisor: 10.0,
    };

    pub const LEGACY: Self = Self {
        temperature_divisor: 10.0,
        precipitation_divisor: 100.0,
    };

    pub fn from_config(config: &AggregationConfig) -> Self {
        if config.legacy_scaling {
            Self::LEGACY
        } else {
            Self::CANONICAL
        }
    }
}

impl Default for AggregationScale {
    fn default() -> Self {
        Self::CANONICAL
    }
}

#[derive(Debug, Clone)]
pub struct AggregationReport {
    pub started_at: DateTime<Local>,
    pub rows_scanned: usize,
    pub groups_computed: usize,
    pub records_inserted: u64,
    pub elapsed: Duration,
}

impl AggregationReport {
    pub fn summary(&self) -> String {
        format!(
            "Aggregation Summary:\n\
             - Started at: {}\n\
             - Observations scanned: {}\n\
             - Station-years computed: {}\n\
             - Records inserted: {}\n\
             - Time taken: {:.2?}",
            self.started_at.format("%Y-%m-%d %H:%M:%S"),
            self.rows_scanned,
            self.groups_computed,
            self.records_inserted,
            self.elapsed,
        )
    }
}

#[derive(Debug, Default)]
struct Accumulator {
    max_sum: f64,
    max_count: u32,
    min_sum: f64,
    min_count: u32,
    precip_sum: f64,
    precip_count: u32,
}

impl Accumulator {
    fn add(&mut self, record: &ObservationRecord) {
        if let Some(v) = record.max_temperature {
            self.max_sum += v;
            self.max_count += 1;
        }
        if let Some(v) = record.min_temperature {
            self.min_sum += v;
            self.min_count += 1;
        }
        if let Some(v) = record.precipitation {
            self.precip_sum += v;
            self.precip_count += 1;
        }
    }

    fn finish(&self, station_id: &str, year: i32, scale: AggregationScale) -> YearlyStatistic {
        YearlyStatistic::new(
            station_id,
            year,
            mean(self.max_sum, self.max_count).map(|v| v / scale.temperature_divisor),
            mean(self.min_sum, self.min_count).map(|v| v / scale.temperature_divisor),
            (self.precip_count > 0).then(|| self.precip_sum / scale.precipitation_divisor),
        )
    }
}

fn mean(sum: f64, count: u32) -> Option<f64> {
    (count > 0).then(|| sum / f64::from(count))
}

/// Recomputes yearly statistics from the whole raw store and merges them
/// into the statistics table.
pub struct AggregationEngine {
    store: Arc<dyn WeatherStore>,
    scale: AggregationScale,
}

impl AggregationEngine {
    pub fn new(store: Arc<dyn WeatherStore>, scale: AggregationScale) -> Self {
        Self { store, scale }
    }

    pub fn run(&self, progress: Option<&ProgressReporter>) -> Result<AggregationReport> {
        let started_at = Local::now();
        let timer = Instant::now();
        info!(
            started_at = %started_at.to_rfc3339(),
            temperature_divisor = self.scale.temperature_divisor,
            precipitation_divisor = self.scale.precipitation_divisor,
            "Starting yearly statistics calculation"
        );

        if let Some(p) = progress {
            p.set_message("Reading observations...");
        }
        let observations = self.store.observations_for_aggregation()?;

        if let Some(p) = progress {
            p.set_message(&format!("Aggregating {} observations...", observations.len()));
        }
        let statistics = self.compute(&observations);

        if let Some(p) = progress {
            p.set_message(&format!("Storing {} station-years...", statistics.len()));
        }
        let records_inserted = self.store.insert_yearly_statistics(&statistics)?;

        let report = AggregationReport {
            started_at,
            rows_scanned: observations.len(),
            groups_computed: statistics.len(),
            records_inserted,
            elapsed: timer.elapsed(),
        };

        info!(
            rows_scanned = report.rows_scanned,
            groups_computed = report.groups_computed,
            "Yearly statistics calculated and stored. Records inserted: {}",
            report.records_inserted
        );
        info!("Time taken: {:.2?}", report.elapsed);

        if let Some(p) = progress {
            p.finish_with_message(&format!(
                "Inserted {} yearly statistics",
                report.records_inserted
            ));
        }

        Ok(report)
    }

    /// Group by (station, year) and reduce. Rows without any measurement are
    /// ignored, so a station-year made only of such rows produces nothing.
    pub fn compute(&self, observations: &[ObservationRecord]) -> Vec<YearlyStatistic> {
        let mut groups: BTreeMap<(&str, i32), Accumulator> = BTreeMap::new();

        for record in observations.iter().filter(|r| r.has_any_value()) {
            groups
                .entry((record.station_id.as_str(), record.year()))
                .or_default()
                .add(record);
        }

        groups
            .iter()
            .map(|((station_id, year), acc)| acc.finish(station_id, *year, self.scale))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn obs(
        station: &str,
        (y, m, d): (i32, u32, u32),
        max: Option<f64>,
        min: Option<f64>,
        precip: Option<f64>,
    ) -> ObservationRecord {
        ObservationRecord::new(
            station,
            NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            max,
            min,
            precip,
        )
    }

    fn canonical(store: Arc<dyn WeatherStore>) -> AggregationEngine {
        AggregationEngine::new(store, AggregationScale::CANONICAL)
    }

    #[test]
    fn test_mean_and_total_per_station_year() {
        let engine = canonical(Arc::new(MemoryStore::new()));
        let stats = engine.compute(&[
            obs("USC00110072", (1990, 1, 1), Some(10.0), Some(-2.0), Some(3.0)),
            obs("USC00110072", (1990, 7, 1), Some(30.0), Some(14.0), Some(7.0)),
            obs("USC00110072", (1991, 1, 1), Some(5.0), None, None),
        ]);

        assert_eq!(
            stats,
            vec![
                YearlyStatistic::new("USC00110072", 1990, Some(20.0), Some(6.0), Some(1.0)),
                YearlyStatistic::new("USC00110072", 1991, Some(5.0), None, None),
            ]
        );
    }

    #[test]
    fn test_all_null_field_yields_none() {
        let engine = canonical(Arc::new(MemoryStore::new()));
        let stats = engine.compute(&[
            obs("USC00339312", (2001, 3, 1), None, Some(1.0), Some(0.0)),
            obs("USC00339312", (2001, 3, 2), None, Some(3.0), None),
        ]);

        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].avg_max_temperature, None);
        assert_eq!(stats[0].avg_min_temperature, Some(2.0));
        assert_eq!(stats[0].total_precipitation, Some(0.0));
    }

    #[test]
    fn test_fully_null_rows_excluded() {
        let engine = canonical(Arc::new(MemoryStore::new()));
        let stats = engine.compute(&[
            obs("EMPTY", (2001, 1, 1), None, None, None),
            obs("USC00339312", (2001, 1, 1), Some(4.0), None, None),
            obs("USC00339312", (2001, 1, 2), None, None, None),
        ]);

        assert_eq!(
            stats,
            vec![YearlyStatistic::new("USC00339312", 2001, Some(4.0), None, None)]
        );
    }

    #[test]
    fn test_scale_factors() {
        let rows = [obs("USC00257715", (2023, 1, 1), Some(15.0), Some(-5.0), Some(3.0))];

        let canonical = canonical(Arc::new(MemoryStore::new())).compute(&rows);
        assert_eq!(canonical[0].avg_max_temperature, Some(15.0));
        assert_eq!(canonical[0].avg_min_temperature, Some(-5.0));
        assert_eq!(canonical[0].total_precipitation, Some(0.3));

        let legacy = AggregationEngine::new(Arc::new(MemoryStore::new()), AggregationScale::LEGACY)
            .compute(&rows);
        assert_eq!(legacy[0].avg_max_temperature, Some(1.5));
        assert_eq!(legacy[0].avg_min_temperature, Some(-0.5));
        assert_eq!(legacy[0].total_precipitation, Some(0.03));
    }

    #[test]
    fn test_scale_from_config() {
        let legacy = AggregationConfig {
            legacy_scaling: true,
        };
        assert_eq!(AggregationScale::from_config(&legacy), AggregationScale::LEGACY);
        assert_eq!(
            AggregationScale::from_config(&AggregationConfig::default()),
            AggregationScale::CANONICAL
        );
    }

    #[test]
    fn test_rerun_is_idempotent() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        store.insert_observations(&[
            obs("USC00110072", (1990, 1, 1), Some(10.0), Some(0.0), Some(1.0)),
            obs("USC00110072", (1991, 1, 1), Some(12.0), Some(2.0), Some(2.0)),
            obs("USC00339312", (1990, 1, 1), None, None, None),
        ])?;

        let engine = canonical(store.clone());

        let first = engine.run(None)?;
        assert_eq!(first.rows_scanned, 2);
        assert_eq!(first.records_inserted, 2);
        let after_first = store.statistic("USC00110072", 1990)?;

        let second = engine.run(None)?;
        assert_eq!(second.records_inserted, 0);
        assert_eq!(store.statistic_count()?, 2);
        assert_eq!(store.statistic("USC00110072", 1990)?, after_first);
        assert_eq!(store.statistic("USC00339312", 1990)?, None);
        Ok(())
    }

    #[test]
    fn test_existing_statistics_never_recomputed() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        store.insert_observations(&[obs("USC00110072", (1990, 1, 1), Some(10.0), None, None)])?;

        let engine = canonical(store.clone());
        engine.run(None)?;

        // New data for an already aggregated year does not change the stored row
        store.insert_observations(&[obs("USC00110072", (1990, 1, 2), Some(20.0), None, None)])?;
        let report = engine.run(None)?;

        assert_eq!(report.records_inserted, 0);
        let stored = store.statistic("USC00110072", 1990)?.unwrap();
        assert_eq!(stored.avg_max_temperature, Some(10.0));
        Ok(())
    }
}
