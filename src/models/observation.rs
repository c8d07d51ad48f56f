use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// One station's measurements for one day, in physical units
/// (degrees Celsius, millimetres). Keyed by `(station_id, date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub station_id: String,
    pub date: NaiveDate,
    pub max_temperature: Option<f64>,
    pub min_temperature: Option<f64>,
    pub precipitation: Option<f64>,
}

impl ObservationRecord {
    pub fn new(
        station_id: impl Into<String>,
        date: NaiveDate,
        max_temperature: Option<f64>,
        min_temperature: Option<f64>,
        precipitation: Option<f64>,
    ) -> Self {
        Self {
            station_id: station_id.into(),
            date,
            max_temperature,
            min_temperature,
            precipitation,
        }
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }

    /// Rows with every measurement missing carry no information for aggregation.
    pub fn has_any_value(&self) -> bool {
        self.max_temperature.is_some()
            || self.min_temperature.is_some()
            || self.precipitation.is_some()
    }

    pub fn key(&self) -> (String, NaiveDate) {
        (self.station_id.clone(), self.date)
    }
}
