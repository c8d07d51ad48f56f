use crate::config::DatabaseConfig;
use crate::error::{ProcessingError, Result};
use crate::models::{ObservationRecord, YearlyStatistic};
use crate::storage::query::{ObservationFilter, Page, PageRequest, StatisticsFilter};
use crate::storage::{schema, WeatherStore};
use chrono::NaiveDate;
use crossbeam::queue::ArrayQueue;
use postgres::{Client, IsolationLevel, NoTls, Row};
use std::time::Duration;
use tracing::{debug, info, warn};

/// PostgreSQL-backed store. Connections are opened lazily and parked in a
/// bounded queue, so every rayon worker gets a client of its own.
pub struct PostgresStore {
    pg_config: postgres::Config,
    idle: ArrayQueue<Client>,
    connect_retries: u32,
    retry_backoff: Duration,
    batch_size: usize,
}

impl PostgresStore {
    /// Build the store and verify the database is reachable.
    pub fn connect(config: &DatabaseConfig) -> Result<Self> {
        let store = Self {
            pg_config: pg_config(config),
            idle: ArrayQueue::new(config.pool_size.max(1)),
            connect_retries: config.connect_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            batch_size: config.batch_size.max(1),
        };

        let client = store.open_connection()?;
        store.check_in(client);
        info!(
            host = %config.host,
            port = config.port,
            database = %config.name,
            "Connected to PostgreSQL"
        );

        Ok(store)
    }

    /// Create both tables if they do not exist yet.
    pub fn ensure_schema(&self) -> Result<()> {
        self.with_client(|client| client.batch_execute(schema::CREATE_TABLES))
    }

    fn open_connection(&self) -> Result<Client> {
        let mut attempt = 0;
        loop {
            match self.pg_config.connect(NoTls) {
                Ok(client) => return Ok(client),
                Err(e) if attempt < self.connect_retries => {
                    attempt += 1;
                    let delay = self.retry_backoff * attempt;
                    warn!(
                        attempt,
                        max_retries = self.connect_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Database connection failed, retrying"
                    );
                    std::thread::sleep(delay);
                }
                Err(e) => {
                    return Err(ProcessingError::storage_unavailable(format!(
                        "could not connect after {} attempt(s): {}",
                        attempt + 1,
                        e
                    )))
                }
            }
        }
    }

    fn check_out(&self) -> Result<Client> {
        while let Some(client) = self.idle.pop() {
            if !client.is_closed() {
                return Ok(client);
            }
            debug!("Discarding closed pooled connection");
        }
        self.open_connection()
    }

    fn check_in(&self, client: Client) {
        if !client.is_closed() {
            // A full queue just drops the surplus connection
            let _ = self.idle.push(client);
        }
    }

    fn with_client<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Client) -> std::result::Result<T, postgres::Error>,
    {
        let mut client = self.check_out()?;
        let result = f(&mut client);
        let closed = client.is_closed();
        self.check_in(client);
        result.map_err(|e| classify(e, closed))
    }
}

fn pg_config(config: &DatabaseConfig) -> postgres::Config {
    let mut pg = postgres::Config::new();
    pg.host(&config.host)
        .port(config.port)
        .dbname(&config.name)
        .user(&config.user)
        .application_name(env!("CARGO_PKG_NAME"))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs));

    if !config.password.is_empty() {
        pg.password(&config.password);
    }
    if config.statement_timeout_secs > 0 {
        pg.options(&format!(
            "-c statement_timeout={}",
            config.statement_timeout_secs * 1000
        ));
    }
    pg
}

/// Lost connections end the run; everything else is scoped to the caller's unit of work.
fn classify(error: postgres::Error, connection_closed: bool) -> ProcessingError {
    let io_failure = std::error::Error::source(&error).is_some_and(|s| s.is::<std::io::Error>());
    if connection_closed || error.is_closed() || io_failure {
        ProcessingError::storage_unavailable(error.to_string())
    } else {
        ProcessingError::Database(error)
    }
}

fn observation_from_row(row: &Row) -> std::result::Result<ObservationRecord, postgres::Error> {
    Ok(ObservationRecord {
        station_id: row.try_get(0)?,
        date: row.try_get(1)?,
        max_temperature: row.try_get(2)?,
        min_temperature: row.try_get(3)?,
        precipitation: row.try_get(4)?,
    })
}

fn statistic_from_row(row: &Row) -> std::result::Result<YearlyStatistic, postgres::Error> {
    Ok(YearlyStatistic {
        station_id: row.try_get(0)?,
        year: row.try_get(1)?,
        avg_max_temperature: row.try_get(2)?,
        avg_min_temperature: row.try_get(3)?,
        total_precipitation: row.try_get(4)?,
    })
}

fn count_from_row(row: &Row) -> std::result::Result<u64, postgres::Error> {
    let count: i64 = row.try_get(0)?;
    Ok(u64::try_from(count).unwrap_or(0))
}

impl WeatherStore for PostgresStore {
    fn insert_observations(&self, records: &[ObservationRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        self.with_client(|client| {
            let mut tx = client.transaction()?;
            let statement = tx.prepare(schema::INSERT_OBSERVATIONS)?;
            let mut inserted = 0;

            for chunk in records.chunks(self.batch_size) {
                let station_ids: Vec<&str> = chunk.iter().map(|r| r.station_id.as_str()).collect();
                let dates: Vec<NaiveDate> = chunk.iter().map(|r| r.date).collect();
                let max_temps: Vec<Option<f64>> = chunk.iter().map(|r| r.max_temperature).collect();
                let min_temps: Vec<Option<f64>> = chunk.iter().map(|r| r.min_temperature).collect();
                let precip: Vec<Option<f64>> = chunk.iter().map(|r| r.precipitation).collect();

                inserted += tx.execute(
                    &statement,
                    &[&station_ids, &dates, &max_temps, &min_temps, &precip],
                )?;
            }

            tx.commit()?;
            Ok(inserted)
        })
    }

    fn observations_for_aggregation(&self) -> Result<Vec<ObservationRecord>> {
        self.with_client(|client| {
            client
                .query(schema::SELECT_AGGREGATION_INPUT, &[])?
                .iter()
                .map(observation_from_row)
                .collect()
        })
    }

    fn insert_yearly_statistics(&self, statistics: &[YearlyStatistic]) -> Result<u64> {
        if statistics.is_empty() {
            return Ok(0);
        }

        self.with_client(|client| {
            let mut tx = client.transaction()?;
            let statement = tx.prepare(schema::INSERT_STATISTICS)?;
            let mut inserted = 0;

            for chunk in statistics.chunks(self.batch_size) {
                let station_ids: Vec<&str> = chunk.iter().map(|s| s.station_id.as_str()).collect();
                let years: Vec<i32> = chunk.iter().map(|s| s.year).collect();
                let avg_max: Vec<Option<f64>> = chunk.iter().map(|s| s.avg_max_temperature).collect();
                let avg_min: Vec<Option<f64>> = chunk.iter().map(|s| s.avg_min_temperature).collect();
                let totals: Vec<Option<f64>> = chunk.iter().map(|s| s.total_precipitation).collect();

                inserted += tx.execute(
                    &statement,
                    &[&station_ids, &years, &avg_max, &avg_min, &totals],
                )?;
            }

            tx.commit()?;
            Ok(inserted)
        })
    }

    fn query_observations(
        &self,
        filter: &ObservationFilter,
        page: &PageRequest,
    ) -> Result<Page<ObservationRecord>> {
        let station_id = filter.station_id.as_deref();
        let limit = page.limit() as i64;
        let offset = page.offset() as i64;

        self.with_client(|client| {
            let mut tx = client
                .build_transaction()
                .isolation_level(IsolationLevel::RepeatableRead)
                .read_only(true)
                .start()?;

            let total = count_from_row(&tx.query_one(
                schema::count_observations().as_str(),
                &[&station_id, &filter.start_date, &filter.end_date],
            )?)?;

            let items = tx
                .query(
                    schema::page_observations().as_str(),
                    &[&station_id, &filter.start_date, &filter.end_date, &limit, &offset],
                )?
                .iter()
                .map(observation_from_row)
                .collect::<std::result::Result<Vec<_>, _>>()?;

            tx.commit()?;
            Ok(Page::new(items, total, page))
        })
    }

    fn query_yearly_statistics(
        &self,
        filter: &StatisticsFilter,
        page: &PageRequest,
    ) -> Result<Page<YearlyStatistic>> {
        let station_id = filter.station_id.as_deref();
        let limit = page.limit() as i64;
        let offset = page.offset() as i64;

        self.with_client(|client| {
            let mut tx = client
                .build_transaction()
                .isolation_level(IsolationLevel::RepeatableRead)
                .read_only(true)
                .start()?;

            let total = count_from_row(
                &tx.query_one(schema::count_statistics().as_str(), &[&station_id, &filter.year])?,
            )?;

            let items = tx
                .query(
                    schema::page_statistics().as_str(),
                    &[&station_id, &filter.year, &limit, &offset],
                )?
                .iter()
                .map(statistic_from_row)
                .collect::<std::result::Result<Vec<_>, _>>()?;

            tx.commit()?;
            Ok(Page::new(items, total, page))
        })
    }
}
