//! Daily price bar representation.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub code: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl PriceBar {
    /// high / low, or `None` when low is not strictly positive.
    pub fn range_ratio(&self) -> Option<f64> {
        if self.low <= 0.0 || !self.low.is_finite() {
            return None;
        }
        let ratio = self.high / self.low;
        ratio.is_finite().then_some(ratio)
    }
}
