use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProcessingError>;

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Storage unavailable: {message}")]
    StorageUnavailable { message: String },

    #[error("Database error: {0}")]
    Database(#[from] postgres::Error),

    #[error("Source directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("Source file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Malformed record at line {line}: {message}")]
    MalformedRecord { line: u64, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),
}

impl ProcessingError {
    pub fn storage_unavailable(message: impl Into<String>) -> Self {
        Self::StorageUnavailable {
            message: message.into(),
        }
    }

    pub fn malformed(line: u64, message: impl Into<String>) -> Self {
        Self::MalformedRecord {
            line,
            message: message.into(),
        }
    }

    /// Errors that must abort the whole batch run rather than a single file.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProcessingError::StorageUnavailable { .. } | ProcessingError::DirectoryNotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(ProcessingError::storage_unavailable("connection refused").is_fatal());
        assert!(ProcessingError::DirectoryNotFound(PathBuf::from("wx_data")).is_fatal());
        assert!(!ProcessingError::FileNotFound(PathBuf::from("USC001.txt")).is_fatal());
        assert!(!ProcessingError::malformed(3, "bad date").is_fatal());
    }

    #[test]
    fn test_malformed_message() {
        let err = ProcessingError::malformed(12, "invalid date '20231301'");
        assert_eq!(
            err.to_string(),
            "Malformed record at line 12: invalid date '20231301'"
        );
    }
}
