//! Built-in indicator provider and warmup helpers.

use crate::domain::candle::Candle;
use crate::domain::indicator::{
    calculate_adx, calculate_bollinger, calculate_ema, calculate_highest, calculate_lowest,
    calculate_macd, calculate_rsi, IndicatorSeries, IndicatorSet, IndicatorType,
};
use crate::ports::indicator_port::IndicatorPort;

/// The default [`IndicatorPort`], backed by the indicator functions in this crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardIndicators;

impl IndicatorPort for StandardIndicators {
    fn compute(&self, candles: &[Candle], indicators: &[IndicatorType]) -> IndicatorSet {
        compute_indicators(candles, indicators)
    }
}

pub fn compute_indicators(candles: &[Candle], indicators: &[IndicatorType]) -> IndicatorSet {
    let mut set = IndicatorSet::with_capacity(indicators.len());
    for indicator in indicators {
        if !set.contains_key(indicator) {
            set.insert(*indicator, calculate(candles, *indicator));
        }
    }
    set
}

fn calculate(candles: &[Candle], indicator: IndicatorType) -> IndicatorSeries {
    match indicator {
        IndicatorType::Rsi(period) => calculate_rsi(candles, period),
        IndicatorType::Ema(period) => calculate_ema(candles, period),
        IndicatorType::Macd { fast, slow, signal } => calculate_macd(candles, fast, slow, signal),
        IndicatorType::Bollinger {
            period,
            stddev_mult_x100,
        } => calculate_bollinger(candles, period, stddev_mult_x100),
        IndicatorType::Adx(period) => calculate_adx(candles, period),
        IndicatorType::Highest(period) => calculate_highest(candles, period),
        IndicatorType::Lowest(period) => calculate_lowest(candles, period),
    }
}

/// Longest warmup across `indicators`; 0 when none are needed.
pub fn max_lookback(indicators: &[IndicatorType]) -> usize {
    indicators.iter().map(IndicatorType::lookback).max().unwrap_or(0)
}
