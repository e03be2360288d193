//! Domain error types.

use crate::domain::series::{BarIssue, SeriesError};
use chrono::NaiveDate;

/// Errors raised by the ratio analytics before or during computation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalyticsError {
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("invalid bar for {code} on {date}: {issue}")]
    InvalidBar {
        code: String,
        date: NaiveDate,
        issue: BarIssue,
    },

    #[error(transparent)]
    Series(#[from] SeriesError),
}

/// Top-level error type for rangeratio.
#[derive(Debug, thiserror::Error)]
pub enum RangeRatioError {
    #[error("data source error: {reason}")]
    Data { reason: String },

    #[error("data query error: {reason}")]
    DataQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no data for {code}")]
    NoData { code: String },

    #[error(transparent)]
    Analytics(#[from] AnalyticsError),

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&RangeRatioError> for std::process::ExitCode {
    fn from(err: &RangeRatioError) -> Self {
        let code: u8 = match err {
            RangeRatioError::Io(_) | RangeRatioError::Report { .. } => 1,
            RangeRatioError::ConfigParse { .. }
            | RangeRatioError::ConfigMissing { .. }
            | RangeRatioError::ConfigInvalid { .. } => 2,
            RangeRatioError::Data { .. } | RangeRatioError::DataQuery { .. } => 3,
            RangeRatioError::Analytics(_) => 4,
            RangeRatioError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
