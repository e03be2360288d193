//! Multi-instrument analysis.
//!
//! Parses code lists from configuration, fetches one series per code and runs
//! the ratio analytics on each series independently. Series are computed in
//! parallel; results keep the order of the input codes.

use crate::domain::analytics::{self, RatioAnalysis};
use crate::domain::error::{AnalyticsError, RangeRatioError};
use crate::domain::ohlcv::PriceBar;
use crate::domain::series::{self, BarPolicy};
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use rayon::prelude::*;
use std::collections::HashSet;
use tracing::{info, warn};

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in code list")]
    EmptyToken,

    #[error("duplicate code: {0}")]
    DuplicateCode(String),

    #[error("invalid code '{0}': use letters, digits and . - _ ^ = only")]
    InvalidCode(String),
}

/// Codes become file names in the CSV source and reports, so path
/// separators and a leading dot are rejected.
fn is_valid_code(code: &str) -> bool {
    !code.starts_with('.')
        && code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '^' | '='))
}

pub fn parse_codes(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut codes = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let code = trimmed.to_uppercase();
        if !is_valid_code(&code) {
            return Err(UniverseError::InvalidCode(code));
        }
        if !seen.insert(code.clone()) {
            return Err(UniverseError::DuplicateCode(code));
        }
        codes.push(code);
    }

    Ok(codes)
}

/// Parameters shared by every series of one run.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub window: usize,
    pub bar_policy: BarPolicy,
    pub fold_daily: bool,
}

#[derive(Debug, Clone)]
pub struct SeriesReport {
    pub code: String,
    pub bars: usize,
    pub analysis: RatioAnalysis,
}

#[derive(Debug, Clone)]
pub struct SkippedCode {
    pub code: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone)]
pub enum SkipReason {
    NoData,
    FetchFailed(String),
}

#[derive(Debug, Clone)]
pub struct UniverseAnalysis {
    pub reports: Vec<SeriesReport>,
    pub skipped: Vec<SkippedCode>,
}

/// Prepares one series and runs the analytics on it.
pub fn analyze_series(
    code: &str,
    bars: Vec<PriceBar>,
    request: &AnalysisRequest,
) -> Result<SeriesReport, AnalyticsError> {
    let bars = series::prepare(bars, request.fold_daily, request.bar_policy)?;
    let analysis = analytics::compute(&bars, request.window)?;
    Ok(SeriesReport {
        code: code.to_string(),
        bars: bars.len(),
        analysis,
    })
}

pub fn analyze_universe(
    data_port: &dyn DataPort,
    codes: &[String],
    request: &AnalysisRequest,
) -> Result<UniverseAnalysis, RangeRatioError> {
    analytics::validate_window(request.window)?;

    let mut fetched: Vec<(String, Vec<PriceBar>)> = Vec::with_capacity(codes.len());
    let mut skipped = Vec::new();

    for code in codes {
        match data_port.fetch_bars(code, request.start_date, request.end_date) {
            Ok(bars) if bars.is_empty() => {
                warn!("skipping {} (no data found)", code);
                skipped.push(SkippedCode {
                    code: code.clone(),
                    reason: SkipReason::NoData,
                });
            }
            Ok(bars) => {
                info!("{}: {} bars", code, bars.len());
                fetched.push((code.clone(), bars));
            }
            Err(e) => {
                warn!("skipping {} ({})", code, e);
                skipped.push(SkippedCode {
                    code: code.clone(),
                    reason: SkipReason::FetchFailed(e.to_string()),
                });
            }
        }
    }

    if fetched.is_empty() {
        return Err(RangeRatioError::NoData {
            code: codes.join(","),
        });
    }

    let reports = fetched
        .into_par_iter()
        .map(|(code, bars)| analyze_series(&code, bars, request))
        .collect::<Result<Vec<_>, _>>()?;

    if !skipped.is_empty() {
        info!(
            "analyzed {} of {} codes",
            reports.len(),
            reports.len() + skipped.len()
        );
    }

    Ok(UniverseAnalysis { reports, skipped })
}
