use chrono::NaiveDate;
use thiserror::Error;

use crate::health::DataType;

/// Errors produced while planning a query, fetching health data, or
/// reading and writing the cache.
#[derive(Error, Debug)]
pub enum HealthError {
    /// The structured planning response could not be split into pairs.
    #[error("Invalid structured response: {0}")]
    InvalidResponse(String),

    /// A pair's day count is not a positive integer.
    #[error("Invalid look-back days: {0}")]
    InvalidLookback(String),

    /// A pair named a data type outside the allow-list or one with no
    /// registered source.
    #[error("Unknown data type: {0}")]
    UnknownDataType(String),

    #[error("Could not compute a date {days} days before {from}")]
    DateComputation { from: NaiveDate, days: u64 },

    /// The data source failed or timed out.
    #[error("Fetching {data_type} failed: {message}")]
    SourceFetch { data_type: DataType, message: String },

    #[error("Cache store error: {0}")]
    Store(#[from] tokio_rusqlite::Error),

    #[error("LLM request failed: {0}")]
    Llm(String),

    #[error("Prompt rendering failed: {0}")]
    Prompt(String),
}

pub type Result<T> = std::result::Result<T, HealthError>;

impl HealthError {
    pub fn source_fetch(data_type: DataType, msg: impl ToString) -> Self {
        Self::SourceFetch {
            data_type,
            message: msg.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_source_fetch() {
        let err = HealthError::source_fetch(DataType::HeartRate, "connection refused");
        assert_eq!(
            err.to_string(),
            "Fetching HeartRateData failed: connection refused"
        );
    }

    #[test]
    fn test_error_display_date_computation() {
        let from = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let err = HealthError::DateComputation { from, days: 5 };
        assert_eq!(
            err.to_string(),
            "Could not compute a date 5 days before 2024-07-01"
        );
    }

    #[test]
    fn test_error_from_store() {
        let err: HealthError = tokio_rusqlite::Error::ConnectionClosed.into();
        assert!(err.to_string().starts_with("Cache store error"));
    }
}
