//! Caching wrapper around any [`DataPort`].
//!
//! Fetched series are cached per `(code, start_date, end_date)`.
//!
//! # Eviction
//! - Least recently used: when `capacity` entries are held, inserting a new
//!   series evicts the entry that was read or written longest ago.
//! - Optional time-to-live: entries older than `ttl` are treated as misses and
//!   refetched.
//! - `capacity == 0` disables caching entirely.
//!
//! Errors are never cached. Symbol listings and data ranges pass straight
//! through to the inner port.

use crate::domain::error::RangeRatioError;
use crate::domain::ohlcv::PriceBar;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_CAPACITY: usize = 32;

type CacheKey = (String, NaiveDate, NaiveDate);

struct Entry {
    bars: Arc<Vec<PriceBar>>,
    inserted: Instant,
    last_used: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, Entry>,
    tick: u64,
    hits: u64,
    misses: u64,
}

/// Hit/miss counters, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

pub struct CachedDataPort<P: DataPort> {
    inner: P,
    capacity: usize,
    ttl: Option<Duration>,
    state: Mutex<CacheState>,
}

impl<P: DataPort> CachedDataPort<P> {
    pub fn new(inner: P, capacity: usize, ttl: Option<Duration>) -> Self {
        Self {
            inner,
            capacity,
            ttl,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Reads `[cache] capacity` and `[cache] ttl_secs` (0 = no expiry).
    pub fn from_config(inner: P, config: &dyn ConfigPort) -> Self {
        let capacity = config
            .get_int("cache", "capacity", DEFAULT_CAPACITY as i64)
            .max(0) as usize;
        let ttl_secs = config.get_int("cache", "ttl_secs", 0).max(0) as u64;
        let ttl = (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs));
        Self::new(inner, capacity, ttl)
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            entries: state.entries.len(),
        }
    }

    fn lookup(&self, key: &CacheKey) -> Option<Arc<Vec<PriceBar>>> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.tick += 1;
        let tick = state.tick;

        let expired = match state.entries.get_mut(key) {
            Some(entry) if self.ttl.is_some_and(|ttl| entry.inserted.elapsed() >= ttl) => true,
            Some(entry) => {
                entry.last_used = tick;
                let bars = Arc::clone(&entry.bars);
                state.hits += 1;
                return Some(bars);
            }
            None => false,
        };

        if expired {
            state.entries.remove(key);
        }
        state.misses += 1;
        None
    }

    fn store(&self, key: CacheKey, bars: Arc<Vec<PriceBar>>) {
        let mut state = self.state.lock();
        state.tick += 1;
        let tick = state.tick;

        if !state.entries.contains_key(&key) && state.entries.len() >= self.capacity {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                debug!("evicting cached series {} {}..{}", oldest.0, oldest.1, oldest.2);
                state.entries.remove(&oldest);
            }
        }

        state.entries.insert(
            key,
            Entry {
                bars,
                inserted: Instant::now(),
                last_used: tick,
            },
        );
    }
}

impl<P: DataPort> DataPort for CachedDataPort<P> {
    fn fetch_bars(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, RangeRatioError> {
        if self.capacity == 0 {
            return self.inner.fetch_bars(code, start_date, end_date);
        }

        let key = (code.to_string(), start_date, end_date);
        if let Some(bars) = self.lookup(&key) {
            debug!("cache hit for {} {}..{}", code, start_date, end_date);
            return Ok(bars.as_ref().clone());
        }

        // The lock is not held across the fetch; two concurrent misses on the
        // same key both fetch and the later store wins.
        let bars = Arc::new(self.inner.fetch_bars(code, start_date, end_date)?);
        self.store(key, Arc::clone(&bars));
        Ok(Arc::unwrap_or_clone(bars))
    }

    fn list_symbols(&self) -> Result<Vec<String>, RangeRatioError> {
        self.inner.list_symbols()
    }

    fn get_data_range(
        &self,
        code: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, RangeRatioError> {
        self.inner.get_data_range(code)
    }
}
