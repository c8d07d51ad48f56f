use serde::{Deserialize, Serialize};

/// Per-station, per-year summary derived from the raw observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyStatistic {
    pub station_id: String,
    pub year: i32,
    pub avg_max_temperature: Option<f64>,
    pub avg_min_temperature: Option<f64>,
    pub total_precipitation: Option<f64>,
}

impl YearlyStatistic {
    pub fn new(
        station_id: impl Into<String>,
        year: i32,
        avg_max_temperature: Option<f64>,
        avg_min_temperature: Option<f64>,
        total_precipitation: Option<f64>,
    ) -> Self {
        Self {
            station_id: station_id.into(),
            year,
            avg_max_temperature,
            avg_min_temperature,
            total_precipitation,
        }
    }

    pub fn key(&self) -> (String, i32) {
        (self.station_id.clone(), self.year)
    }
}
