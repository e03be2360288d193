//! Series normalisation and bar validation.
//!
//! Providers hand back bars as they store them. Before the analytics runs, a
//! series is folded to one bar per calendar date, checked for ordering, and
//! screened for malformed bars according to a [`BarPolicy`].

use crate::domain::error::AnalyticsError;
use crate::domain::ohlcv::PriceBar;
use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Why a bar is considered malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BarIssue {
    #[error("price is not a finite number")]
    NonFinite,

    #[error("price is not positive")]
    NonPositivePrice,

    #[error("high is below low")]
    HighBelowLow,

    #[error("open or close lies outside the high/low range")]
    OpenCloseOutsideRange,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SeriesError {
    #[error("duplicate bar date {0}")]
    DuplicateDate(NaiveDate),

    #[error("bars out of order: {next} follows {prev}")]
    Unordered { prev: NaiveDate, next: NaiveDate },
}

/// What to do with a bar flagged by [`inspect_bar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BarPolicy {
    #[default]
    Drop,
    Abort,
    Keep,
}

impl FromStr for BarPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drop" => Ok(BarPolicy::Drop),
            "abort" => Ok(BarPolicy::Abort),
            "keep" => Ok(BarPolicy::Keep),
            other => Err(format!(
                "unknown bar policy '{other}' (expected drop, abort or keep)"
            )),
        }
    }
}

impl fmt::Display for BarPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BarPolicy::Drop => write!(f, "drop"),
            BarPolicy::Abort => write!(f, "abort"),
            BarPolicy::Keep => write!(f, "keep"),
        }
    }
}

/// Flags a malformed bar. A low of exactly zero is not flagged: the bar is
/// well formed, its ratio is simply undefined.
pub fn inspect_bar(bar: &PriceBar) -> Option<BarIssue> {
    let prices = [bar.open, bar.high, bar.low, bar.close];
    if prices.iter().any(|p| !p.is_finite()) {
        return Some(BarIssue::NonFinite);
    }
    if bar.low < 0.0 || bar.open <= 0.0 || bar.high <= 0.0 || bar.close <= 0.0 {
        return Some(BarIssue::NonPositivePrice);
    }
    if bar.high < bar.low {
        return Some(BarIssue::HighBelowLow);
    }
    let in_range = |p: f64| p >= bar.low && p <= bar.high;
    if !in_range(bar.open) || !in_range(bar.close) {
        return Some(BarIssue::OpenCloseOutsideRange);
    }
    None
}

/// Folds bars sharing a code and calendar date into a single daily bar:
/// first open, highest high, lowest low, last close, summed volume.
///
/// The input is stably sorted by code then date first, so intraday order
/// within a day is preserved.
pub fn fold_daily(mut bars: Vec<PriceBar>) -> Vec<PriceBar> {
    bars.sort_by(|a, b| a.code.cmp(&b.code).then(a.date.cmp(&b.date)));
    let input_len = bars.len();

    let mut daily: Vec<PriceBar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match daily.last_mut() {
            Some(day) if day.date == bar.date && day.code == bar.code => {
                day.high = day.high.max(bar.high);
                day.low = day.low.min(bar.low);
                day.close = bar.close;
                day.volume += bar.volume;
            }
            _ => daily.push(bar),
        }
    }

    if daily.len() < input_len {
        debug!(
            "folded {} bars into {} daily bars",
            input_len,
            daily.len()
        );
    }
    daily
}

/// Checks that dates are strictly ascending.
pub fn check_order(bars: &[PriceBar]) -> Result<(), SeriesError> {
    for pair in bars.windows(2) {
        let (prev, next) = (pair[0].date, pair[1].date);
        if next == prev {
            return Err(SeriesError::DuplicateDate(next));
        }
        if next < prev {
            return Err(SeriesError::Unordered { prev, next });
        }
    }
    Ok(())
}

/// Applies `policy` to every malformed bar in `bars`.
pub fn apply_policy(
    bars: Vec<PriceBar>,
    policy: BarPolicy,
) -> Result<Vec<PriceBar>, AnalyticsError> {
    match policy {
        BarPolicy::Keep => Ok(bars),
        BarPolicy::Abort => {
            for bar in &bars {
                if let Some(issue) = inspect_bar(bar) {
                    return Err(AnalyticsError::InvalidBar {
                        code: bar.code.clone(),
                        date: bar.date,
                        issue,
                    });
                }
            }
            Ok(bars)
        }
        BarPolicy::Drop => Ok(bars
            .into_iter()
            .filter(|bar| match inspect_bar(bar) {
                Some(issue) => {
                    warn!("dropping {} bar on {}: {}", bar.code, bar.date, issue);
                    false
                }
                None => true,
            })
            .collect()),
    }
}

/// Full preparation pipeline: optional daily fold, ordering check, then the
/// malformed-bar policy.
pub fn prepare(
    bars: Vec<PriceBar>,
    fold: bool,
    policy: BarPolicy,
) -> Result<Vec<PriceBar>, AnalyticsError> {
    let bars = if fold { fold_daily(bars) } else { bars };
    check_order(&bars)?;
    apply_policy(bars, policy)
}
