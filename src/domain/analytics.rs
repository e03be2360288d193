//! Rolling high/low ratio analytics.
//!
//! For every bar of an ascending daily series:
//! - ratio          = high / low
//! - sma_ratio      = SMA(window) of ratio
//! - sma_price      = SMA(window) of close
//! - price_over_sma = close / sma_price
//!
//! plus one scalar: the mean ratio over the whole series.
//!
//! Undefined values are `None`. A bar with a non-positive low has no ratio,
//! is left out of the scalar mean, and leaves every rolling window that
//! covers it undefined.

use crate::domain::error::AnalyticsError;
use crate::domain::ohlcv::PriceBar;
use crate::domain::rolling::RollingMean;
use chrono::NaiveDate;

pub const MIN_WINDOW: usize = 1;
pub const MAX_WINDOW: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct DerivedPoint {
    pub date: NaiveDate,
    pub close: f64,
    pub ratio: Option<f64>,
    pub sma_ratio: Option<f64>,
    pub sma_price: Option<f64>,
    pub price_over_sma: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RatioAnalysis {
    pub window: usize,
    pub points: Vec<DerivedPoint>,
    pub mean_ratio: Option<f64>,
    pub undefined_ratios: usize,
}

impl RatioAnalysis {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Most recent point, if any.
    pub fn last(&self) -> Option<&DerivedPoint> {
        self.points.last()
    }
}

pub fn validate_window(window: usize) -> Result<(), AnalyticsError> {
    if window < MIN_WINDOW {
        return Err(AnalyticsError::InvalidParameter {
            name: "window".into(),
            reason: format!("must be at least {MIN_WINDOW}"),
        });
    }
    Ok(())
}

pub fn compute(series: &[PriceBar], window: usize) -> Result<RatioAnalysis, AnalyticsError> {
    validate_window(window)?;

    let mut ratio_sma = RollingMean::new(window);
    let mut price_sma = RollingMean::new(window);
    let mut points = Vec::with_capacity(series.len());
    let mut ratio_sum = 0.0;
    let mut defined = 0usize;

    for bar in series {
        let ratio = bar.range_ratio();
        if let Some(r) = ratio {
            ratio_sum += r;
            defined += 1;
        }

        let close = Some(bar.close).filter(|c| c.is_finite());
        let sma_ratio = ratio_sma.push(ratio);
        let sma_price = price_sma.push(close);
        let price_over_sma = sma_price
            .filter(|&sma| sma != 0.0)
            .zip(close)
            .map(|(sma, close)| close / sma);

        points.push(DerivedPoint {
            date: bar.date,
            close: bar.close,
            ratio,
            sma_ratio,
            sma_price,
            price_over_sma,
        });
    }

    let mean_ratio = (defined > 0).then(|| ratio_sum / defined as f64);

    Ok(RatioAnalysis {
        window,
        points,
        mean_ratio,
        undefined_ratios: series.len() - defined,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn make_bars(ranges: &[(f64, f64, f64)]) -> Vec<PriceBar> {
        ranges
            .iter()
            .enumerate()
            .map(|(i, &(high, low, close))| PriceBar {
                code: "TEST".into(),
                date: NaiveDate::from_ymd_opt(2024, 1, (i + 1) as u32).unwrap(),
                open: close,
                high,
                low,
                close,
                volume: 1000,
            })
            .collect()
    }

    /// Bars with low = 1 so the ratio equals the high.
    fn ratio_bars(ratios: &[f64]) -> Vec<PriceBar> {
        let ranges: Vec<_> = ratios.iter().map(|&r| (r, 1.0, 1.0)).collect();
        make_bars(&ranges)
    }

    #[test]
    fn zero_window_is_rejected() {
        let err = compute(&ratio_bars(&[2.0]), 0).unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidParameter { name, .. } if name == "window"));
    }

    #[test]
    fn empty_series_gives_empty_result() {
        let analysis = compute(&[], 3).unwrap();
        assert!(analysis.is_empty());
        assert_eq!(analysis.mean_ratio, None);
        assert_eq!(analysis.undefined_ratios, 0);
    }

    #[test]
    fn sma_ratio_known_values() {
        let analysis = compute(&ratio_bars(&[2.0, 4.0, 6.0, 8.0, 10.0]), 3).unwrap();
        let sma: Vec<_> = analysis.points.iter().map(|p| p.sma_ratio).collect();

        assert_eq!(sma[0], None);
        assert_eq!(sma[1], None);
        assert_relative_eq!(sma[2].unwrap(), 4.0);
        assert_relative_eq!(sma[3].unwrap(), 6.0);
        assert_relative_eq!(sma[4].unwrap(), 8.0);
    }

    #[test]
    fn window_one_matches_ratio() {
        let analysis = compute(&ratio_bars(&[1.5, 1.2, 1.8]), 1).unwrap();
        for p in &analysis.points {
            assert_eq!(p.sma_ratio, p.ratio);
        }
    }

    #[test]
    fn window_longer_than_series_leaves_rolling_fields_undefined() {
        let analysis = compute(&ratio_bars(&[1.5, 1.2, 1.8]), 5).unwrap();
        assert_eq!(analysis.points.len(), 3);
        for p in &analysis.points {
            assert!(p.ratio.is_some());
            assert_eq!(p.sma_ratio, None);
            assert_eq!(p.sma_price, None);
            assert_eq!(p.price_over_sma, None);
        }
    }

    #[test]
    fn single_bar_series() {
        let analysis = compute(&make_bars(&[(12.0, 10.0, 11.0)]), 1).unwrap();
        let p = &analysis.points[0];
        assert_relative_eq!(p.ratio.unwrap(), 1.2);
        assert_relative_eq!(analysis.mean_ratio.unwrap(), 1.2);
        assert_relative_eq!(p.sma_price.unwrap(), 11.0);
        assert_relative_eq!(p.price_over_sma.unwrap(), 1.0);
    }

    #[test]
    fn sma_price_and_price_over_sma() {
        let bars = make_bars(&[(11.0, 9.0, 10.0), (21.0, 19.0, 20.0), (31.0, 29.0, 30.0)]);
        let analysis = compute(&bars, 2).unwrap();

        assert_eq!(analysis.points[0].sma_price, None);
        assert_relative_eq!(analysis.points[1].sma_price.unwrap(), 15.0);
        assert_relative_eq!(analysis.points[2].sma_price.unwrap(), 25.0);
        assert_relative_eq!(analysis.points[2].price_over_sma.unwrap(), 30.0 / 25.0);
    }

    #[test]
    fn mean_ratio_independent_of_window() {
        let bars = ratio_bars(&[2.0, 4.0, 6.0, 8.0, 10.0]);
        for window in 1..=7 {
            let analysis = compute(&bars, window).unwrap();
            assert_relative_eq!(analysis.mean_ratio.unwrap(), 6.0);
        }
    }

    #[test]
    fn zero_low_ratio_is_undefined_and_excluded() {
        let bars = make_bars(&[
            (2.0, 1.0, 1.5),
            (4.0, 1.0, 2.0),
            (3.0, 0.0, 2.0),
            (8.0, 1.0, 4.0),
            (10.0, 1.0, 5.0),
            (12.0, 1.0, 6.0),
        ]);
        let analysis = compute(&bars, 2).unwrap();
        let p = &analysis.points;

        assert_eq!(p[2].ratio, None);
        assert_eq!(analysis.undefined_ratios, 1);
        assert_relative_eq!(p[1].sma_ratio.unwrap(), 3.0);
        assert_eq!(p[2].sma_ratio, None);
        assert_eq!(p[3].sma_ratio, None);
        assert_relative_eq!(p[4].sma_ratio.unwrap(), 9.0);
        assert_relative_eq!(p[5].sma_ratio.unwrap(), 11.0);
        // close is still defined, so the price SMA is unaffected
        assert_relative_eq!(p[3].sma_price.unwrap(), 3.0);
        // (2 + 4 + 8 + 10 + 12) / 5
        assert_relative_eq!(analysis.mean_ratio.unwrap(), 7.2);
        for point in p {
            if let Some(r) = point.ratio {
                assert!(r.is_finite());
            }
        }
    }

    #[test]
    fn non_finite_close_recovers_after_window() {
        let mut bars = make_bars(&[(11.0, 9.0, 10.0); 10]);
        bars[2].close = f64::NAN;
        let analysis = compute(&bars, 2).unwrap();
        let p = &analysis.points;

        assert_relative_eq!(p[1].sma_price.unwrap(), 10.0);
        assert_eq!(p[2].sma_price, None);
        assert_eq!(p[2].price_over_sma, None);
        assert_eq!(p[3].sma_price, None);
        assert_relative_eq!(p[4].sma_price.unwrap(), 10.0);
        assert_relative_eq!(p[9].sma_price.unwrap(), 10.0);
        assert_relative_eq!(p[9].price_over_sma.unwrap(), 1.0);
        for point in p {
            assert!(point.sma_price.is_none_or(f64::is_finite));
            assert!(point.price_over_sma.is_none_or(f64::is_finite));
        }
    }

    #[test]
    fn all_zero_lows_have_no_mean() {
        let analysis = compute(&make_bars(&[(2.0, 0.0, 1.0), (3.0, 0.0, 2.0)]), 1).unwrap();
        assert_eq!(analysis.mean_ratio, None);
        assert_eq!(analysis.undefined_ratios, 2);
    }

    #[test]
    fn ratio_at_least_one_for_well_formed_bars() {
        let bars = make_bars(&[(11.0, 9.0, 10.0), (10.0, 10.0, 10.0), (50.0, 1.0, 20.0)]);
        let analysis = compute(&bars, 2).unwrap();
        for p in &analysis.points {
            assert!(p.ratio.unwrap() >= 1.0);
        }
    }

    #[test]
    fn last_returns_final_point() {
        let analysis = compute(&ratio_bars(&[2.0, 3.0]), 1).unwrap();
        assert_eq!(
            analysis.last().unwrap().date,
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
        );
    }

    #[test]
    fn validate_window_bounds() {
        assert!(validate_window(0).is_err());
        assert!(validate_window(1).is_ok());
        assert!(validate_window(MAX_WINDOW).is_ok());
    }
}
