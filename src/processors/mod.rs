pub mod aggregation;
pub mod ingestion;

pub use aggregation::{AggregationEngine, AggregationReport, AggregationScale};
pub use ingestion::{FileFailure, FileOutcome, IngestionEngine, IngestionReport};
