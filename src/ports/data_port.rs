//! Price data access port trait.
//!
//! Implementations return bars for one instrument between two dates
//! (inclusive), ascending by date. An unknown instrument yields an empty
//! series rather than an error.

use crate::domain::error::RangeRatioError;
use crate::domain::ohlcv::PriceBar;
use chrono::NaiveDate;

pub trait DataPort {
    fn fetch_bars(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, RangeRatioError>;

    fn list_symbols(&self) -> Result<Vec<String>, RangeRatioError>;

    fn get_data_range(
        &self,
        code: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, RangeRatioError>;
}

impl<T: DataPort + ?Sized> DataPort for Box<T> {
    fn fetch_bars(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, RangeRatioError> {
        (**self).fetch_bars(code, start_date, end_date)
    }

    fn list_symbols(&self) -> Result<Vec<String>, RangeRatioError> {
        (**self).list_symbols()
    }

    fn get_data_range(
        &self,
        code: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, RangeRatioError> {
        (**self).get_data_range(code)
    }
}
