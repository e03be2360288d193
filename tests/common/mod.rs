#![allow(dead_code)]

use chrono::NaiveDate;
use rangeratio::domain::error::RangeRatioError;
pub use rangeratio::domain::ohlcv::PriceBar;
use rangeratio::domain::series::BarPolicy;
use rangeratio::domain::universe::AnalysisRequest;
use rangeratio::ports::data_port::DataPort;
use std::cell::RefCell;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<PriceBar>>,
    pub errors: HashMap<String, String>,
    pub calls: RefCell<Vec<String>>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn with_bars(mut self, code: &str, bars: Vec<PriceBar>) -> Self {
        self.data.insert(code.to_string(), bars);
        self
    }

    pub fn with_error(mut self, code: &str, reason: &str) -> Self {
        self.errors.insert(code.to_string(), reason.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, RangeRatioError> {
        self.calls.borrow_mut().push(code.to_string());
        if let Some(reason) = self.errors.get(code) {
            return Err(RangeRatioError::Data {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(code)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start_date && b.date <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_symbols(&self) -> Result<Vec<String>, RangeRatioError> {
        let mut codes: Vec<String> = self.data.keys().cloned().collect();
        codes.sort();
        Ok(codes)
    }

    fn get_data_range(
        &self,
        code: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, RangeRatioError> {
        match self.data.get(code) {
            Some(bars) if !bars.is_empty() => {
                let min = bars.iter().map(|b| b.date).min().unwrap();
                let max = bars.iter().map(|b| b.date).max().unwrap();
                Ok(Some((min, max, bars.len())))
            }
            _ => Ok(None),
        }
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// A bar whose ratio is exactly `high / low`, with open and close at the low.
pub fn make_bar(code: &str, date: &str, high: f64, low: f64) -> PriceBar {
    PriceBar {
        code: code.to_string(),
        date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        open: low,
        high,
        low,
        close: low,
        volume: 1000,
    }
}

/// Consecutive daily bars with low = 1, so each ratio equals the given value.
pub fn ratio_series(code: &str, start_date: &str, ratios: &[f64]) -> Vec<PriceBar> {
    let start = NaiveDate::parse_from_str(start_date, "%Y-%m-%d").unwrap();
    ratios
        .iter()
        .enumerate()
        .map(|(i, &r)| PriceBar {
            code: code.to_string(),
            date: start + chrono::Duration::days(i as i64),
            open: 1.0,
            high: r,
            low: 1.0,
            close: r,
            volume: 1000,
        })
        .collect()
}

pub fn generate_bars(code: &str, start_date: &str, count: usize, start_price: f64) -> Vec<PriceBar> {
    let start = NaiveDate::parse_from_str(start_date, "%Y-%m-%d").unwrap();
    (0..count)
        .map(|i| {
            let base = start_price + i as f64;
            PriceBar {
                code: code.to_string(),
                date: start + chrono::Duration::days(i as i64),
                open: base,
                high: base + 1.0 + (i % 3) as f64,
                low: base - 1.0,
                close: base + 0.5,
                volume: 1000,
            }
        })
        .collect()
}

pub fn sample_request(window: usize) -> AnalysisRequest {
    AnalysisRequest {
        start_date: date(2024, 1, 1),
        end_date: date(2024, 12, 31),
        window,
        bar_policy: BarPolicy::Drop,
        fold_daily: true,
    }
}
