//! CSV report adapter implementing ReportPort.
//!
//! Writes one `<CODE>.csv` per analysed series plus a `summary.csv` with one
//! row per series, into an output directory. Undefined values are written as
//! empty cells.

use std::fs;
use std::path::Path;

use crate::domain::error::RangeRatioError;
use crate::domain::universe::SeriesReport;
use crate::ports::report_port::ReportPort;
use tracing::info;

const SERIES_HEADER: [&str; 6] = [
    "date",
    "close",
    "ratio",
    "sma_ratio",
    "sma_price",
    "price_over_sma",
];

const SUMMARY_FILE: &str = "summary.csv";

const SUMMARY_HEADER: [&str; 8] = [
    "code",
    "bars",
    "window",
    "mean_ratio",
    "last_ratio",
    "last_sma_ratio",
    "last_price_over_sma",
    "undefined_ratios",
];

pub struct CsvReportAdapter;

fn cell(value: Option<f64>) -> String {
    value.map(|v| format!("{:.6}", v)).unwrap_or_default()
}

fn report_err(path: &Path, e: impl std::fmt::Display) -> RangeRatioError {
    RangeRatioError::Report {
        reason: format!("failed to write {}: {}", path.display(), e),
    }
}

fn write_series(report: &SeriesReport, path: &Path) -> Result<(), RangeRatioError> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| report_err(path, e))?;
    wtr.write_record(SERIES_HEADER)
        .map_err(|e| report_err(path, e))?;

    for p in &report.analysis.points {
        wtr.write_record([
            p.date.format("%Y-%m-%d").to_string(),
            format!("{:.6}", p.close),
            cell(p.ratio),
            cell(p.sma_ratio),
            cell(p.sma_price),
            cell(p.price_over_sma),
        ])
        .map_err(|e| report_err(path, e))?;
    }

    wtr.flush().map_err(|e| report_err(path, e))?;
    Ok(())
}

fn write_summary(reports: &[SeriesReport], path: &Path) -> Result<(), RangeRatioError> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| report_err(path, e))?;
    wtr.write_record(SUMMARY_HEADER)
        .map_err(|e| report_err(path, e))?;

    for r in reports {
        let last = r.analysis.last();
        wtr.write_record([
            r.code.clone(),
            r.bars.to_string(),
            r.analysis.window.to_string(),
            cell(r.analysis.mean_ratio),
            cell(last.and_then(|p| p.ratio)),
            cell(last.and_then(|p| p.sma_ratio)),
            cell(last.and_then(|p| p.price_over_sma)),
            r.analysis.undefined_ratios.to_string(),
        ])
        .map_err(|e| report_err(path, e))?;
    }

    wtr.flush().map_err(|e| report_err(path, e))?;
    Ok(())
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, reports: &[SeriesReport], output: &Path) -> Result<(), RangeRatioError> {
        // SUMMARY.csv and summary.csv are the same file on case-insensitive
        // filesystems.
        if let Some(r) = reports
            .iter()
            .find(|r| format!("{}.csv", r.code).eq_ignore_ascii_case(SUMMARY_FILE))
        {
            return Err(RangeRatioError::Report {
                reason: format!("code {} clashes with {}", r.code, SUMMARY_FILE),
            });
        }

        fs::create_dir_all(output)?;

        for report in reports {
            let path = output.join(format!("{}.csv", report.code));
            write_series(report, &path)?;
        }

        let summary = output.join(SUMMARY_FILE);
        write_summary(reports, &summary)?;
        info!(
            "wrote {} series and summary to {}",
            reports.len(),
            output.display()
        );
        Ok(())
    }
}
