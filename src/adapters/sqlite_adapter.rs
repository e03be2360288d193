//! SQLite data adapter.
//!
//! Bars live in a single `price_bars` table keyed by (code, date). Dates are
//! stored as `YYYY-MM-DD` text so range queries compare lexicographically.

use crate::domain::error::RangeRatioError;
use crate::domain::ohlcv::PriceBar;
use crate::domain::series::fold_daily;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use tracing::debug;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn query_err(e: rusqlite::Error) -> RangeRatioError {
    RangeRatioError::DataQuery {
        reason: e.to_string(),
    }
}

fn pool_err(e: r2d2::Error) -> RangeRatioError {
    RangeRatioError::Data {
        reason: e.to_string(),
    }
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, RangeRatioError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| RangeRatioError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).clamp(1, 64) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, RangeRatioError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, RangeRatioError> {
        self.pool.get().map_err(pool_err)
    }

    pub fn initialize_schema(&self) -> Result<(), RangeRatioError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS price_bars (
                    code TEXT NOT NULL,
                    date TEXT NOT NULL,
                    open REAL NOT NULL,
                    high REAL NOT NULL,
                    low REAL NOT NULL,
                    close REAL NOT NULL,
                    volume INTEGER NOT NULL DEFAULT 0,
                    PRIMARY KEY (code, date)
                );
                CREATE INDEX IF NOT EXISTS idx_price_bars_date ON price_bars(date);",
            )
            .map_err(query_err)
    }

    /// Upserts bars in a single transaction. Rows sharing a code and date
    /// (intraday data) are folded into one daily bar first, since the table
    /// holds one row per day. Returns the number of rows written.
    pub fn insert_bars(&self, bars: &[PriceBar]) -> Result<usize, RangeRatioError> {
        let daily = fold_daily(bars.to_vec());
        if daily.len() < bars.len() {
            debug!("folded {} rows into {} daily bars", bars.len(), daily.len());
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        let mut written = 0;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO price_bars (code, date, open, high, low, close, volume)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )
                .map_err(query_err)?;

            for bar in &daily {
                written += stmt
                    .execute(params![
                        bar.code,
                        bar.date.format(DATE_FORMAT).to_string(),
                        bar.open,
                        bar.high,
                        bar.low,
                        bar.close,
                        bar.volume
                    ])
                    .map_err(query_err)?;
            }
        }

        tx.commit().map_err(query_err)?;
        Ok(written)
    }
}

fn parse_stored_date(date_str: String) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(&date_str, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            date_str.len(),
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })
}

impl DataPort for SqliteAdapter {
    fn fetch_bars(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, RangeRatioError> {
        let conn = self.conn()?;

        let start_str = start_date.format(DATE_FORMAT).to_string();
        let end_str = end_date.format(DATE_FORMAT).to_string();

        let mut stmt = conn
            .prepare(
                "SELECT code, date, open, high, low, close, volume
                 FROM price_bars
                 WHERE code = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![code, start_str, end_str], |row| {
                Ok(PriceBar {
                    code: row.get(0)?,
                    date: parse_stored_date(row.get(1)?)?,
                    open: row.get(2)?,
                    high: row.get(3)?,
                    low: row.get(4)?,
                    close: row.get(5)?,
                    volume: row.get(6)?,
                })
            })
            .map_err(query_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }

    fn list_symbols(&self) -> Result<Vec<String>, RangeRatioError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT code FROM price_bars ORDER BY code")
            .map_err(query_err)?;

        let rows = stmt.query_map([], |row| row.get(0)).map_err(query_err)?;
        rows.collect::<Result<Vec<String>, _>>().map_err(query_err)
    }

    fn get_data_range(
        &self,
        code: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, RangeRatioError> {
        let conn = self.conn()?;

        let result: (Option<String>, Option<String>, i64) = conn
            .query_row(
                "SELECT MIN(date), MAX(date), COUNT(*) FROM price_bars WHERE code = ?1",
                params![code],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(query_err)?;

        match result {
            (Some(min_str), Some(max_str), count) if count > 0 => {
                let min = parse_stored_date(min_str).map_err(query_err)?;
                let max = parse_stored_date(max_str).map_err(query_err)?;
                Ok(Some((min, max, count as usize)))
            }
            _ => Ok(None),
        }
    }
}
