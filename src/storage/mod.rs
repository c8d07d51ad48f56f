//! Storage access for raw observations and yearly statistics.
//!
//! Every writer goes through insert-if-absent: a row whose primary key
//! already exists is left untouched and contributes nothing to the
//! returned count.

pub mod memory;
pub mod postgres_store;
pub mod query;
pub mod schema;

pub use memory::MemoryStore;
pub use postgres_store::PostgresStore;
pub use query::{ObservationFilter, Page, PageRequest, StatisticsFilter};

use crate::error::Result;
use crate::models::{ObservationRecord, YearlyStatistic};

pub trait WeatherStore: Send + Sync {
    /// Insert records whose `(station_id, date)` is not stored yet, as one
    /// atomic unit. Returns the number of rows actually inserted.
    fn insert_observations(&self, records: &[ObservationRecord]) -> Result<u64>;

    /// All observations with at least one non-null measurement.
    fn observations_for_aggregation(&self) -> Result<Vec<ObservationRecord>>;

    /// Insert statistics whose `(station_id, year)` is not stored yet, as one
    /// atomic unit. Returns the number of rows actually inserted.
    fn insert_yearly_statistics(&self, statistics: &[YearlyStatistic]) -> Result<u64>;

    fn query_observations(
        &self,
        filter: &ObservationFilter,
        page: &PageRequest,
    ) -> Result<Page<ObservationRecord>>;

    fn query_yearly_statistics(
        &self,
        filter: &StatisticsFilter,
        page: &PageRequest,
    ) -> Result<Page<YearlyStatistic>>;
}
