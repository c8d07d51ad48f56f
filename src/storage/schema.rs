//! Table definitions and the statements run against them.

/// Bootstrap DDL. Safe to run repeatedly.
pub const CREATE_TABLES: &str = "
    CREATE TABLE IF NOT EXISTS weather_data (
        station_id      TEXT             NOT NULL,
        record_date     DATE             NOT NULL,
        max_temperature DOUBLE PRECISION,
        min_temperature DOUBLE PRECISION,
        precipitation   DOUBLE PRECISION,
        PRIMARY KEY (station_id, record_date)
    );

    CREATE TABLE IF NOT EXISTS weather_yearly_statistics (
        station_id          TEXT    NOT NULL,
        year                INTEGER NOT NULL,
        avg_max_temperature DOUBLE PRECISION,
        avg_min_temperature DOUBLE PRECISION,
        total_precipitation DOUBLE PRECISION,
        PRIMARY KEY (station_id, year)
    );
";

pub const INSERT_OBSERVATIONS: &str = "
    INSERT INTO weather_data
        (station_id, record_date, max_temperature, min_temperature, precipitation)
    SELECT * FROM UNNEST($1::text[], $2::date[], $3::float8[], $4::float8[], $5::float8[])
    ON CONFLICT (station_id, record_date) DO NOTHING
";

pub const INSERT_STATISTICS: &str = "
    INSERT INTO weather_yearly_statistics
        (station_id, year, avg_max_temperature, avg_min_temperature, total_precipitation)
    SELECT * FROM UNNEST($1::text[], $2::int4[], $3::float8[], $4::float8[], $5::float8[])
    ON CONFLICT (station_id, year) DO NOTHING
";

pub const SELECT_AGGREGATION_INPUT: &str = "
    SELECT station_id, record_date, max_temperature, min_temperature, precipitation
    FROM weather_data
    WHERE max_temperature IS NOT NULL
       OR min_temperature IS NOT NULL
       OR precipitation IS NOT NULL
    ORDER BY station_id, record_date
";

const OBSERVATION_PREDICATE: &str = "
    ($1::text IS NULL OR station_id = $1)
    AND ($2::date IS NULL OR record_date >= $2)
    AND ($3::date IS NULL OR record_date <= $3)
";

const STATISTICS_PREDICATE: &str = "
    ($1::text IS NULL OR station_id = $1)
    AND ($2::int4 IS NULL OR year = $2)
";

pub fn count_observations() -> String {
    format!("SELECT COUNT(*) FROM weather_data WHERE {}", OBSERVATION_PREDICATE)
}

pub fn page_observations() -> String {
    format!(
        "SELECT station_id, record_date, max_temperature, min_temperature, precipitation
         FROM weather_data WHERE {}
         ORDER BY station_id, record_date
         LIMIT $4 OFFSET $5",
        OBSERVATION_PREDICATE
    )
}

pub fn count_statistics() -> String {
    format!(
        "SELECT COUNT(*) FROM weather_yearly_statistics WHERE {}",
        STATISTICS_PREDICATE
    )
}

pub fn page_statistics() -> String {
    format!(
        "SELECT station_id, year, avg_max_temperature, avg_min_temperature, total_precipitation
         FROM weather_yearly_statistics WHERE {}
         ORDER BY station_id, year
         LIMIT $3 OFFSET $4",
        STATISTICS_PREDICATE
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inserts_never_overwrite() {
        assert!(INSERT_OBSERVATIONS.contains("ON CONFLICT (station_id, record_date) DO NOTHING"));
        assert!(INSERT_STATISTICS.contains("ON CONFLICT (station_id, year) DO NOTHING"));
    }

    #[test]
    fn test_page_queries_bind_limit_after_filters() {
        assert!(page_observations().contains("LIMIT $4 OFFSET $5"));
        assert!(page_statistics().contains("LIMIT $3 OFFSET $4"));
    }
}
