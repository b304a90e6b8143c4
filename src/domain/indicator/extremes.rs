//! N-period highest / lowest close.
//!
//! HIGHEST(n)[i] = max(close[i-n+1..=i]), LOWEST(n)[i] = min(close[i-n+1..=i]).
//! Warmup: first (n-1) candles are invalid.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub fn calculate_highest(candles: &[Candle], period: usize) -> IndicatorSeries {
    rolling_extreme(candles, period, IndicatorType::Highest(period), f64::max)
}

pub fn calculate_lowest(candles: &[Candle], period: usize) -> IndicatorSeries {
    rolling_extreme(candles, period, IndicatorType::Lowest(period), f64::min)
}

fn rolling_extreme(
    candles: &[Candle],
    period: usize,
    indicator_type: IndicatorType,
    pick: fn(f64, f64) -> f64,
) -> IndicatorSeries {
    let values = candles
        .iter()
        .enumerate()
        .map(|(i, candle)| {
            let valid = period > 0 && i + 1 >= period;
            let value = if valid {
                candles[i + 1 - period..=i]
                    .iter()
                    .map(|c| c.close)
                    .reduce(pick)
                    .unwrap_or(candle.close)
            } else {
                0.0
            };
            IndicatorPoint {
                time: candle.time,
                valid,
                value: IndicatorValue::Simple(value),
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}
