pub mod observation;
pub mod statistic;

pub use observation::ObservationRecord;
pub use statistic::YearlyStatistic;
