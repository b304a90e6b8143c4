//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: fast=12, slow=26, signal=9
//! Warmup: max(fast, slow) - 1 + signal - 1 candles.

use crate::domain::candle::Candle;
use crate::domain::indicator::ema::ema_of;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

pub fn calculate_macd(
    candles: &[Candle],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Macd {
        fast,
        slow,
        signal: signal_period,
    };
    let mut values: Vec<IndicatorPoint> = candles
        .iter()
        .map(|c| IndicatorPoint {
            time: c.time,
            valid: false,
            value: IndicatorValue::Macd {
                line: 0.0,
                signal: 0.0,
                histogram: 0.0,
            },
        })
        .collect();

    if fast == 0 || slow == 0 || signal_period == 0 {
        return IndicatorSeries {
            indicator_type,
            values,
        };
    }

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let ema_fast = ema_of(&closes, fast);
    let ema_slow = ema_of(&closes, slow);

    let line_start = fast.max(slow) - 1;
    if candles.len() <= line_start {
        return IndicatorSeries {
            indicator_type,
            values,
        };
    }

    let macd_line: Vec<f64> = (line_start..candles.len())
        .map(|i| match (ema_fast[i], ema_slow[i]) {
            (Some(f), Some(s)) => f - s,
            _ => 0.0,
        })
        .collect();
    let signal_line = ema_of(&macd_line, signal_period);

    for (offset, (line, signal)) in macd_line.iter().zip(signal_line).enumerate() {
        if let Some(signal) = signal {
            let point = &mut values[line_start + offset];
            point.valid = true;
            point.value = IndicatorValue::Macd {
                line: *line,
                signal,
                histogram: line - signal,
            };
        }
    }

    IndicatorSeries {
        indicator_type,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration};

    fn make_candles(closes: &[f64]) -> Vec<Candle> {
        let start = DateTime::from_timestamp(1_704_067_200, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                time: start + Duration::days(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn macd_warmup_matches_lookback() {
        let closes: Vec<f64> = (0..50).map(|i| 100.0 + i as f64).collect();
        let series = calculate_macd(&make_candles(&closes), DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL);
        let warmup = series.indicator_type.lookback();

        assert_eq!(series.values.len(), 50);
        assert!(!series.values[warmup - 1].valid);
        assert!(series.values[warmup].valid);
    }

    #[test]
    fn macd_positive_in_uptrend() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 * 1.01_f64.powi(i)).collect();
        let series = calculate_macd(&make_candles(&closes), DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL);
        match series.values[59].value {
            IndicatorValue::Macd { line, .. } => assert!(line > 0.0),
            _ => panic!("expected Macd value"),
        }
    }

    #[test]
    fn macd_histogram_is_line_minus_signal() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        let series = calculate_macd(&make_candles(&closes), 3, 6, 4);
        for point in series.values.iter().filter(|p| p.valid) {
            if let IndicatorValue::Macd {
                line,
                signal,
                histogram,
            } = point.value
            {
                assert!((histogram - (line - signal)).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn macd_short_series_all_invalid() {
        let series = calculate_macd(&make_candles(&[1.0, 2.0, 3.0]), DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL);
        assert_eq!(series.values.len(), 3);
        assert!(series.values.iter().all(|p| !p.valid));
    }
}
