use crate::error::{ProcessingError, Result};
use crate::models::{ObservationRecord, YearlyStatistic};
use crate::storage::query::{ObservationFilter, Page, PageRequest, StatisticsFilter};
use crate::storage::WeatherStore;
use chrono::NaiveDate;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

type ObservationKey = (String, NaiveDate);
type StatisticKey = (String, i32);

/// Process-local store with the same insert-if-absent semantics as the
/// relational one. Used for dry runs, tests and benchmarks.
#[derive(Debug, Default)]
pub struct MemoryStore {
    observations: RwLock<BTreeMap<ObservationKey, ObservationRecord>>,
    statistics: RwLock<BTreeMap<StatisticKey, YearlyStatistic>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observation_count(&self) -> Result<usize> {
        Ok(read(&self.observations)?.len())
    }

    pub fn statistic_count(&self) -> Result<usize> {
        Ok(read(&self.statistics)?.len())
    }

    pub fn observation(&self, station_id: &str, date: NaiveDate) -> Result<Option<ObservationRecord>> {
        Ok(read(&self.observations)?
            .get(&(station_id.to_string(), date))
            .cloned())
    }

    pub fn statistic(&self, station_id: &str, year: i32) -> Result<Option<YearlyStatistic>> {
        Ok(read(&self.statistics)?
            .get(&(station_id.to_string(), year))
            .cloned())
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| ProcessingError::storage_unavailable("in-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| ProcessingError::storage_unavailable("in-memory store lock poisoned"))
}

impl WeatherStore for MemoryStore {
    fn insert_observations(&self, records: &[ObservationRecord]) -> Result<u64> {
        let mut table = write(&self.observations)?;
        let mut inserted = 0;
        for record in records {
            if let Entry::Vacant(slot) = table.entry(record.key()) {
                slot.insert(record.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn observations_for_aggregation(&self) -> Result<Vec<ObservationRecord>> {
        Ok(read(&self.observations)?
            .values()
            .filter(|r| r.has_any_value())
            .cloned()
            .collect())
    }

    fn insert_yearly_statistics(&self, statistics: &[YearlyStatistic]) -> Result<u64> {
        let mut table = write(&self.statistics)?;
        let mut inserted = 0;
        for statistic in statistics {
            if let Entry::Vacant(slot) = table.entry(statistic.key()) {
                slot.insert(statistic.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn query_observations(
        &self,
        filter: &ObservationFilter,
        page: &PageRequest,
    ) -> Result<Page<ObservationRecord>> {
        let table = read(&self.observations)?;
        let matching = table.values().filter(|r| filter.matches(r)).cloned();
        Ok(Page::from_sorted(matching, page))
    }

    fn query_yearly_statistics(
        &self,
        filter: &StatisticsFilter,
        page: &PageRequest,
    ) -> Result<Page<YearlyStatistic>> {
        let table = read(&self.statistics)?;
        let matching = table.values().filter(|s| filter.matches(s)).cloned();
        Ok(Page::from_sorted(matching, page))
    }
}
