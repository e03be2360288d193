//! Configuration validation.
//!
//! Validates all config fields before an analysis runs.

use crate::domain::analytics::{MAX_WINDOW, MIN_WINDOW};
use crate::domain::error::RangeRatioError;
use crate::domain::series::BarPolicy;
use crate::domain::universe::parse_codes;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub const DEFAULT_WINDOW: usize = 14;

pub fn validate_analysis_config(config: &dyn ConfigPort) -> Result<(), RangeRatioError> {
    validate_window(config)?;
    validate_dates(config)?;
    validate_codes(config)?;
    validate_bar_policy(config)?;
    validate_data_source(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> RangeRatioError {
    RangeRatioError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Reads `[analysis] window`, defaulting to [`DEFAULT_WINDOW`].
pub fn parse_window(config: &dyn ConfigPort) -> Result<usize, RangeRatioError> {
    let Some(raw) = config.get_string("analysis", "window") else {
        return Ok(DEFAULT_WINDOW);
    };
    let window: usize = raw
        .trim()
        .parse()
        .map_err(|_| invalid("analysis", "window", "window must be a whole number"))?;
    check_window_bounds(window)?;
    Ok(window)
}

pub fn check_window_bounds(window: usize) -> Result<(), RangeRatioError> {
    if !(MIN_WINDOW..=MAX_WINDOW).contains(&window) {
        return Err(invalid(
            "analysis",
            "window",
            format!("window must be between {MIN_WINDOW} and {MAX_WINDOW}"),
        ));
    }
    Ok(())
}

fn validate_window(config: &dyn ConfigPort) -> Result<(), RangeRatioError> {
    parse_window(config).map(|_| ())
}

pub fn parse_date(value: &str, field: &str) -> Result<NaiveDate, RangeRatioError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        invalid(
            "analysis",
            field,
            format!("invalid {} format, expected YYYY-MM-DD", field),
        )
    })
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), RangeRatioError> {
    let start_str =
        config
            .get_string("analysis", "start_date")
            .ok_or_else(|| RangeRatioError::ConfigMissing {
                section: "analysis".to_string(),
                key: "start_date".to_string(),
            })?;
    let start_date = parse_date(&start_str, "start_date")?;

    if let Some(end_str) = config.get_string("analysis", "end_date") {
        let end_date = parse_date(&end_str, "end_date")?;
        if start_date > end_date {
            return Err(invalid(
                "analysis",
                "start_date",
                "start_date must not be after end_date",
            ));
        }
    }
    Ok(())
}

fn validate_codes(config: &dyn ConfigPort) -> Result<(), RangeRatioError> {
    let raw = config
        .get_string("analysis", "codes")
        .filter(|c| !c.trim().is_empty())
        .or_else(|| config.get_string("analysis", "code"))
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| RangeRatioError::ConfigMissing {
            section: "analysis".to_string(),
            key: "code".to_string(),
        })?;

    parse_codes(&raw)
        .map(|_| ())
        .map_err(|e| invalid("analysis", "codes", e.to_string()))
}

fn validate_bar_policy(config: &dyn ConfigPort) -> Result<(), RangeRatioError> {
    if let Some(raw) = config.get_string("analysis", "bar_policy") {
        raw.parse::<BarPolicy>()
            .map_err(|reason| invalid("analysis", "bar_policy", reason))?;
    }
    Ok(())
}

fn validate_data_source(config: &dyn ConfigPort) -> Result<(), RangeRatioError> {
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string());

    let (section, key) = match source.trim().to_lowercase().as_str() {
        "csv" => ("data", "csv_dir"),
        "sqlite" => ("sqlite", "path"),
        other => {
            return Err(invalid(
                "data",
                "source",
                format!("unknown data source '{other}' (expected csv or sqlite)"),
            ));
        }
    };

    match config.get_string(section, key) {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(RangeRatioError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}
