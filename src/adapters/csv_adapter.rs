//! CSV file data adapter.
//!
//! One file per instrument, `<base_path>/<CODE>.csv`, with a header row.
//! Columns are located by name (case-insensitive): `date`, `open`, `high`,
//! `low`, `close` and an optional `volume`. Extra columns such as
//! `adj close` are ignored. The date column may carry a time component
//! (`2024-01-02 15:30:00`). Rows are ordered by the full timestamp, then only
//! the calendar date is kept.

use crate::domain::error::RangeRatioError;
use crate::domain::ohlcv::PriceBar;
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

pub struct CsvAdapter {
    base_path: PathBuf,
}

struct Columns {
    date: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, RangeRatioError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let require = |name: &str| {
            find(name).ok_or_else(|| RangeRatioError::Data {
                reason: format!("missing {} column", name),
            })
        };

        Ok(Self {
            date: require("date")?,
            open: require("open")?,
            high: require("high")?,
            low: require("low")?,
            close: require("close")?,
            volume: find("volume"),
        })
    }
}

fn parse_price(record: &csv::StringRecord, idx: usize, name: &str) -> Result<f64, RangeRatioError> {
    record
        .get(idx)
        .ok_or_else(|| RangeRatioError::Data {
            reason: format!("missing {} value", name),
        })?
        .trim()
        .parse()
        .map_err(|e| RangeRatioError::Data {
            reason: format!("invalid {} value: {}", name, e),
        })
}

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parses a date or timestamp. A bare date, or a time part in an
/// unrecognised format, maps to midnight.
fn parse_timestamp(value: &str) -> Result<NaiveDateTime, RangeRatioError> {
    let value = value.trim();
    if value.len() > 10 {
        for fmt in TIMESTAMP_FORMATS {
            if let Ok(ts) = NaiveDateTime::parse_from_str(value, fmt) {
                return Ok(ts);
            }
        }
    }
    let day = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map(|d| d.and_time(NaiveTime::MIN))
        .map_err(|e| RangeRatioError::Data {
            reason: format!("invalid date format '{}': {}", value, e),
        })
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, code: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", code))
    }
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, RangeRatioError> {
        let path = self.csv_path(code);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no csv file for {} at {}", code, path.display());
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(RangeRatioError::Data {
                    reason: format!("failed to read {}: {}", path.display(), e),
                });
            }
        };

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr.headers().map_err(|e| RangeRatioError::Data {
            reason: format!("CSV header error: {}", e),
        })?;
        let cols = Columns::from_headers(headers)?;
        let mut rows: Vec<(NaiveDateTime, PriceBar)> = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| RangeRatioError::Data {
                reason: format!("CSV parse error: {}", e),
            })?;

            let date_str = record.get(cols.date).ok_or_else(|| RangeRatioError::Data {
                reason: "missing date value".into(),
            })?;
            let timestamp = parse_timestamp(date_str)?;
            let date = timestamp.date();

            if date < start_date || date > end_date {
                continue;
            }

            let volume = match cols.volume.and_then(|idx| record.get(idx)) {
                Some(v) if !v.trim().is_empty() => {
                    // some exports write volume as a float
                    v.trim()
                        .parse::<f64>()
                        .map_err(|e| RangeRatioError::Data {
                            reason: format!("invalid volume value: {}", e),
                        })? as i64
                }
                _ => 0,
            };

            rows.push((
                timestamp,
                PriceBar {
                    code: code.to_string(),
                    date,
                    open: parse_price(&record, cols.open, "open")?,
                    high: parse_price(&record, cols.high, "high")?,
                    low: parse_price(&record, cols.low, "low")?,
                    close: parse_price(&record, cols.close, "close")?,
                    volume,
                },
            ));
        }

        rows.sort_by_key(|(timestamp, _)| *timestamp);
        Ok(rows.into_iter().map(|(_, bar)| bar).collect())
    }

    fn list_symbols(&self) -> Result<Vec<String>, RangeRatioError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| RangeRatioError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| RangeRatioError::Data {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            if let Some(code) = name_str.strip_suffix(".csv") {
                symbols.push(code.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        code: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, RangeRatioError> {
        let bars = self.fetch_bars(code, NaiveDate::MIN, NaiveDate::MAX)?;
        match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Ok(Some((first.date, last.date, bars.len()))),
            _ => Ok(None),
        }
    }
}
