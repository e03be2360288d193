//! CLI definition and dispatch.

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};

use crate::adapters::cached_data_port::CachedDataPort;
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{
    check_window_bounds, parse_date, parse_window, validate_analysis_config,
};
use crate::domain::error::RangeRatioError;
use crate::domain::series::BarPolicy;
use crate::domain::universe::{
    analyze_universe, parse_codes, AnalysisRequest, SeriesReport, SkipReason, UniverseAnalysis,
};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(
    name = "rangeratio",
    about = "High/low range ratio and moving-average analytics for daily price series"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compute ratio analytics for one or more codes
    Analyze {
        #[arg(short, long)]
        config: PathBuf,
        /// Comma-separated codes, overrides the config
        #[arg(long)]
        code: Option<String>,
        /// SMA window; repeat to compare several windows
        #[arg(short, long)]
        window: Vec<usize>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        /// Output directory for CSV reports
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// What to do with malformed bars: drop, abort or keep
        #[arg(long)]
        bar_policy: Option<BarPolicy>,
    },
    /// List codes available from the configured data source
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show data range for code(s)
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        code: Option<String>,
    },
    /// Validate an analysis configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Load CSV files into the configured SQLite database
    Import {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory holding <CODE>.csv files
        #[arg(long)]
        csv_dir: PathBuf,
        /// Comma-separated codes; defaults to every CSV file in the directory
        #[arg(long)]
        code: Option<String>,
    },
}

/// Command-line overrides applied on top of the `[analysis]` section.
#[derive(Debug, Default, Clone)]
pub struct AnalysisOverrides {
    pub start: Option<String>,
    pub end: Option<String>,
    pub window: Option<usize>,
    pub bar_policy: Option<BarPolicy>,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Analyze {
            config,
            code,
            window,
            start,
            end,
            output,
            bar_policy,
        } => run_analyze(
            &config,
            code.as_deref(),
            &window,
            AnalysisOverrides {
                start,
                end,
                window: None,
                bar_policy,
            },
            output.as_deref(),
        ),
        Command::ListSymbols { config } => run_list_symbols(&config),
        Command::Info { config, code } => run_info(&config, code.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::Import {
            config,
            csv_dir,
            code,
        } => run_import(&config, &csv_dir, code.as_deref()),
    }
}

fn fail(err: RangeRatioError) -> ExitCode {
    error!("{err}");
    (&err).into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, RangeRatioError> {
    FileConfigAdapter::from_file(path).map_err(|e| RangeRatioError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

pub fn build_analysis_request(
    config: &dyn ConfigPort,
    overrides: &AnalysisOverrides,
) -> Result<AnalysisRequest, RangeRatioError> {
    let start_str = overrides
        .start
        .clone()
        .or_else(|| config.get_string("analysis", "start_date"))
        .ok_or_else(|| RangeRatioError::ConfigMissing {
            section: "analysis".into(),
            key: "start_date".into(),
        })?;
    let start_date = parse_date(&start_str, "start_date")?;

    let end_date = match overrides
        .end
        .clone()
        .or_else(|| config.get_string("analysis", "end_date"))
    {
        Some(end_str) => parse_date(&end_str, "end_date")?,
        None => Local::now().date_naive(),
    };

    if start_date > end_date {
        return Err(RangeRatioError::ConfigInvalid {
            section: "analysis".into(),
            key: "start_date".into(),
            reason: "start_date must not be after end_date".into(),
        });
    }

    let window = match overrides.window {
        Some(w) => {
            check_window_bounds(w)?;
            w
        }
        None => parse_window(config)?,
    };

    let bar_policy = match overrides.bar_policy {
        Some(p) => p,
        None => match config.get_string("analysis", "bar_policy") {
            Some(raw) => raw
                .parse()
                .map_err(|reason| RangeRatioError::ConfigInvalid {
                    section: "analysis".into(),
                    key: "bar_policy".into(),
                    reason,
                })?,
            None => BarPolicy::default(),
        },
    };

    Ok(AnalysisRequest {
        start_date,
        end_date,
        window,
        bar_policy,
        fold_daily: config.get_bool("analysis", "fold_daily", true),
    })
}

pub fn resolve_codes(
    code_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<Vec<String>, RangeRatioError> {
    let (key, raw) = match code_override {
        Some(c) => ("code", Some(c.to_string())),
        None => match config.get_string("analysis", "codes") {
            Some(c) if !c.trim().is_empty() => ("codes", Some(c)),
            _ => ("code", config.get_string("analysis", "code")),
        },
    };

    let raw = raw
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| RangeRatioError::ConfigMissing {
            section: "analysis".into(),
            key: key.into(),
        })?;

    parse_codes(&raw).map_err(|e| RangeRatioError::ConfigInvalid {
        section: "analysis".into(),
        key: key.into(),
        reason: e.to_string(),
    })
}

/// Opens the data source named by `[data] source`, wrapped in the fetch cache.
pub fn open_data_port(
    config: &dyn ConfigPort,
) -> Result<CachedDataPort<Box<dyn DataPort + Send + Sync>>, RangeRatioError> {
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string());

    let inner: Box<dyn DataPort + Send + Sync> = match source.trim().to_lowercase().as_str() {
        "csv" => {
            let dir = config
                .get_string("data", "csv_dir")
                .ok_or_else(|| RangeRatioError::ConfigMissing {
                    section: "data".into(),
                    key: "csv_dir".into(),
                })?;
            Box::new(CsvAdapter::new(PathBuf::from(dir)))
        }
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            use crate::adapters::sqlite_adapter::SqliteAdapter;
            let adapter = SqliteAdapter::from_config(config)?;
            adapter.initialize_schema()?;
            Box::new(adapter)
        }
        other => {
            return Err(RangeRatioError::ConfigInvalid {
                section: "data".into(),
                key: "source".into(),
                reason: format!("unsupported data source '{other}'"),
            });
        }
    };

    Ok(CachedDataPort::from_config(inner, config))
}

fn run_analyze(
    config_path: &Path,
    code_override: Option<&str>,
    windows: &[usize],
    overrides: AnalysisOverrides,
    output: Option<&Path>,
) -> ExitCode {
    info!("loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    let codes = match resolve_codes(code_override, &config) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    let data_port = match open_data_port(&config) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    let output_dir = output
        .map(Path::to_path_buf)
        .or_else(|| config.get_string("report", "output_dir").map(PathBuf::from));

    // With no --window, run once using the configured window.
    let window_overrides: Vec<Option<usize>> = if windows.is_empty() {
        vec![None]
    } else {
        windows.iter().copied().map(Some).collect()
    };
    let multi = window_overrides.len() > 1;

    for window in window_overrides {
        let overrides = AnalysisOverrides {
            window,
            ..overrides.clone()
        };
        let request = match build_analysis_request(&config, &overrides) {
            Ok(r) => r,
            Err(e) => return fail(e),
        };

        let out = output_dir.as_ref().map(|dir| {
            if multi {
                dir.join(format!("window_{}", request.window))
            } else {
                dir.clone()
            }
        });

        match run_analysis_pipeline(&data_port, &codes, &request, out.as_deref()) {
            Ok(_) => {}
            Err(RangeRatioError::NoData { code }) => {
                warn!(
                    "no data for {} between {} and {}",
                    code, request.start_date, request.end_date
                );
                return ExitCode::from(5);
            }
            Err(e) => return fail(e),
        }
    }

    let stats = data_port.stats();
    info!(
        "cache: {} hits, {} misses, {} series held",
        stats.hits, stats.misses, stats.entries
    );
    ExitCode::SUCCESS
}

/// Runs one analysis over `codes`, prints the console summary and, when
/// `output` is set, writes the CSV reports there.
pub fn run_analysis_pipeline(
    data_port: &dyn DataPort,
    codes: &[String],
    request: &AnalysisRequest,
    output: Option<&Path>,
) -> Result<UniverseAnalysis, RangeRatioError> {
    info!(
        "analyzing {} codes, {} to {}, window {}",
        codes.len(),
        request.start_date,
        request.end_date,
        request.window
    );

    let result = analyze_universe(data_port, codes, request)?;

    for skipped in &result.skipped {
        match &skipped.reason {
            SkipReason::NoData => warn!("{}: no data", skipped.code),
            SkipReason::FetchFailed(reason) => {
                warn!("{}: fetch failed ({})", skipped.code, reason)
            }
        }
    }

    print!("{}", format_summary(&result.reports, request.window));

    if let Some(dir) = output {
        CsvReportAdapter.write(&result.reports, dir)?;
    }

    Ok(result)
}

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", precision, v),
        None => "-".to_string(),
    }
}

/// Fixed-width console table, one row per series.
pub fn format_summary(reports: &[SeriesReport], window: usize) -> String {
    let mut out = format!(
        "{:<10} {:>6} {:>11} {:>11} {:>11} {:>11}\n",
        "code",
        "bars",
        "mean ratio",
        "last ratio",
        format!("sma({window})"),
        "px/sma",
    );
    for r in reports {
        let last = r.analysis.last();
        out.push_str(&format!(
            "{:<10} {:>6} {:>11} {:>11} {:>11} {:>11}\n",
            r.code,
            r.bars,
            fmt_opt(r.analysis.mean_ratio, 4),
            fmt_opt(last.and_then(|p| p.ratio), 4),
            fmt_opt(last.and_then(|p| p.sma_ratio), 4),
            fmt_opt(last.and_then(|p| p.price_over_sma), 4),
        ));
    }
    out
}

fn run_list_symbols(config_path: &Path) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    let data_port = match open_data_port(&config) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    let symbols = match data_port.list_symbols() {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    if symbols.is_empty() {
        warn!("no symbols found");
    } else {
        for symbol in &symbols {
            println!("{}", symbol);
        }
        info!("{} symbols found", symbols.len());
    }
    ExitCode::SUCCESS
}

fn run_info(config_path: &Path, code: Option<&str>) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    let codes = match resolve_codes(code, &config) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    let data_port = match open_data_port(&config) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    for c in &codes {
        match data_port.get_data_range(c) {
            Ok(Some((min_date, max_date, count))) => {
                println!("{}: {} bars, {} to {}", c, count, min_date, max_date);
            }
            Ok(None) => warn!("{}: no data found", c),
            Err(e) => error!("error querying {}: {}", c, e),
        }
    }
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    info!("validating config: {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    if let Err(e) = validate_analysis_config(&config) {
        return fail(e);
    }

    let request = match build_analysis_request(&config, &AnalysisOverrides::default()) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };
    let codes = match resolve_codes(None, &config) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    println!("codes:      {}", codes.join(", "));
    println!("range:      {} to {}", request.start_date, request.end_date);
    println!("window:     {}", request.window);
    println!("bar policy: {}", request.bar_policy);
    println!("fold daily: {}", request.fold_daily);
    println!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_import(config_path: &Path, csv_dir: &Path, code: Option<&str>) -> ExitCode {
    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteAdapter;

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => return fail(e),
        };
        let db = match SqliteAdapter::from_config(&config) {
            Ok(db) => db,
            Err(e) => return fail(e),
        };
        if let Err(e) = db.initialize_schema() {
            return fail(e);
        }

        let source = CsvAdapter::new(csv_dir.to_path_buf());
        let codes = match code {
            Some(c) => match parse_codes(c) {
                Ok(codes) => codes,
                Err(e) => {
                    return fail(RangeRatioError::ConfigInvalid {
                        section: "import".into(),
                        key: "code".into(),
                        reason: e.to_string(),
                    })
                }
            },
            None => match source.list_symbols() {
                Ok(codes) => codes,
                Err(e) => return fail(e),
            },
        };

        let mut total = 0;
        for c in &codes {
            let bars = match source.fetch_bars(c, NaiveDate::MIN, NaiveDate::MAX) {
                Ok(b) => b,
                Err(e) => {
                    warn!("skipping {} ({})", c, e);
                    continue;
                }
            };
            match db.insert_bars(&bars) {
                Ok(n) => {
                    info!("{}: imported {} bars", c, n);
                    total += n;
                }
                Err(e) => return fail(e),
            }
        }
        println!("imported {} bars for {} codes", total, codes.len());
        ExitCode::SUCCESS
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config_path, csv_dir, code);
        error!("sqlite feature is required for import");
        ExitCode::from(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analytics::{DerivedPoint, RatioAnalysis};

    #[test]
    fn format_summary_marks_undefined_values() {
        let report = SeriesReport {
            code: "AAPL".into(),
            bars: 1,
            analysis: RatioAnalysis {
                window: 5,
                points: vec![DerivedPoint {
                    date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                    close: 10.0,
                    ratio: Some(1.25),
                    sma_ratio: None,
                    sma_price: None,
                    price_over_sma: None,
                }],
                mean_ratio: Some(1.25),
                undefined_ratios: 0,
            },
        };

        let table = format_summary(&[report], 5);
        let lines: Vec<&str> = table.lines().collect();

        assert!(lines[0].contains("sma(5)"));
        assert!(lines[1].starts_with("AAPL"));
        assert!(lines[1].contains("1.2500"));
        assert!(lines[1].trim_end().ends_with('-'));
    }
}
