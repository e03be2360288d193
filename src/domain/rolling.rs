//! Trailing simple moving average over a stream of optional samples.
//!
//! SMA(n)[i] = (x[i-n+1] + ... + x[i]) / n
//! Warmup: first (n-1) samples produce no value. A window holding an
//! undefined sample produces no value either. Non-finite samples count as
//! undefined.
//!
//! O(1) amortized per sample using a running window sum. The sum is
//! re-accumulated from the buffer every `RESYNC_INTERVAL` samples so rounding
//! error from repeated add/subtract does not build up on long series.

use std::collections::VecDeque;

const RESYNC_INTERVAL: usize = 1024;

#[derive(Debug, Clone)]
pub struct RollingMean {
    window: usize,
    buffer: VecDeque<Option<f64>>,
    sum: f64,
    undefined: usize,
    since_resync: usize,
}

impl RollingMean {
    /// A zero window never yields a value.
    pub fn new(window: usize) -> Self {
        Self {
            window,
            buffer: VecDeque::with_capacity(window + 1),
            sum: 0.0,
            undefined: 0,
            since_resync: 0,
        }
    }

    /// Adds a sample and returns the mean of the trailing window, if defined.
    pub fn push(&mut self, sample: Option<f64>) -> Option<f64> {
        if self.window == 0 {
            return None;
        }

        // NaN or infinity would poison the running sum after it leaves the window
        let sample = sample.filter(|v| v.is_finite());
        self.buffer.push_back(sample);
        match sample {
            Some(v) => self.sum += v,
            None => self.undefined += 1,
        }

        if self.buffer.len() > self.window {
            match self.buffer.pop_front().flatten() {
                Some(v) => self.sum -= v,
                None => self.undefined -= 1,
            }
        }

        self.since_resync += 1;
        if self.since_resync >= RESYNC_INTERVAL {
            self.sum = self.buffer.iter().flatten().sum();
            self.since_resync = 0;
        }

        self.current()
    }

    /// Mean of the current window, if full and fully defined.
    pub fn current(&self) -> Option<f64> {
        if self.window == 0 || self.buffer.len() < self.window || self.undefined > 0 {
            return None;
        }
        Some(self.sum / self.window as f64)
    }
}

/// Rolling mean of a whole slice of samples.
pub fn rolling_mean(samples: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let mut sma = RollingMean::new(window);
    samples.iter().map(|&s| sma.push(s)).collect()
}
