//! Report generation port trait.

use crate::domain::error::RangeRatioError;
use crate::domain::universe::SeriesReport;
use std::path::Path;

/// Port for handing analysed series to a presentation layer.
pub trait ReportPort {
    fn write(&self, reports: &[SeriesReport], output: &Path) -> Result<(), RangeRatioError>;
}
