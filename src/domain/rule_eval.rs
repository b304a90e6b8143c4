//! Condition evaluation engine.
//!
//! Evaluates condition trees against candles and pre-computed indicator series.
//!
//! # Evaluation Semantics
//!
//! - Any operand that cannot be resolved at the index (indicator missing,
//!   still warming up, index out of range) makes its condition `false`
//! - `CROSS_ABOVE`/`CROSS_BELOW`: Require `index >= 1`, return `false` at index 0
//! - `BREAKOUT_HIGH(n)`: close above the highest close of the previous `n` candles
//! - `AND`: Short-circuits on first `false`
//! - `OR`: Short-circuits on first `true`
//!
//! Only data at or before `bar_index` is read.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorSet, IndicatorType, IndicatorValue};
use crate::domain::rule::{
    BreakoutSide, ConditionExpr, IndicatorField, IndicatorRef, LogicalOp, Operand,
};

pub fn evaluate(
    expr: &ConditionExpr,
    candles: &[Candle],
    indicators: &IndicatorSet,
    bar_index: usize,
) -> bool {
    if bar_index >= candles.len() {
        return false;
    }
    match expr {
        ConditionExpr::IndicatorCompare {
            indicator,
            op,
            threshold,
        } => {
            match (
                resolve_operand(indicator, candles, indicators, bar_index),
                resolve_operand(threshold, candles, indicators, bar_index),
            ) {
                (Some(left), Some(right)) => op.apply(left, right),
                _ => false,
            }
        }
        ConditionExpr::CrossAbove { a, b } => crossed(a, b, candles, indicators, bar_index)
            .is_some_and(|(prev, curr)| prev <= 0.0 && curr > 0.0),
        ConditionExpr::CrossBelow { a, b } => crossed(a, b, candles, indicators, bar_index)
            .is_some_and(|(prev, curr)| prev >= 0.0 && curr < 0.0),
        ConditionExpr::Breakout {
            direction,
            lookback_period,
        } => {
            if bar_index == 0 {
                return false;
            }
            let close = candles[bar_index].close;
            match direction {
                BreakoutSide::High => series_value(
                    IndicatorType::Highest(*lookback_period),
                    IndicatorField::Value,
                    indicators,
                    bar_index - 1,
                )
                .is_some_and(|highest| close > highest),
                BreakoutSide::Low => series_value(
                    IndicatorType::Lowest(*lookback_period),
                    IndicatorField::Value,
                    indicators,
                    bar_index - 1,
                )
                .is_some_and(|lowest| close < lowest),
            }
        }
        ConditionExpr::Composite { op, children } => match op {
            LogicalOp::And => {
                !children.is_empty()
                    && children
                        .iter()
                        .all(|c| evaluate(c, candles, indicators, bar_index))
            }
            LogicalOp::Or => children
                .iter()
                .any(|c| evaluate(c, candles, indicators, bar_index)),
        },
        ConditionExpr::Always => true,
        ConditionExpr::Never => false,
    }
}

/// `(a - b)` at the previous and current index, when both resolve.
fn crossed(
    a: &Operand,
    b: &Operand,
    candles: &[Candle],
    indicators: &IndicatorSet,
    bar_index: usize,
) -> Option<(f64, f64)> {
    if bar_index == 0 {
        return None;
    }
    let diff = |i| -> Option<f64> {
        Some(resolve_operand(a, candles, indicators, i)? - resolve_operand(b, candles, indicators, i)?)
    };
    Some((diff(bar_index - 1)?, diff(bar_index)?))
}

fn resolve_operand(
    operand: &Operand,
    candles: &[Candle],
    indicators: &IndicatorSet,
    bar_index: usize,
) -> Option<f64> {
    let candle = candles.get(bar_index)?;
    match operand {
        Operand::Close => Some(candle.close),
        Operand::High => Some(candle.high),
        Operand::Low => Some(candle.low),
        Operand::Constant(v) => Some(*v),
        Operand::Indicator(IndicatorRef {
            indicator_type,
            field,
        }) => series_value(*indicator_type, *field, indicators, bar_index),
    }
}

fn series_value(
    indicator_type: IndicatorType,
    field: IndicatorField,
    indicators: &IndicatorSet,
    bar_index: usize,
) -> Option<f64> {
    let point = indicators.get(&indicator_type)?.values.get(bar_index)?;
    if !point.valid {
        return None;
    }
    extract_field(&point.value, field).filter(|v| v.is_finite())
}

fn extract_field(value: &IndicatorValue, field: IndicatorField) -> Option<f64> {
    match (value, field) {
        (IndicatorValue::Simple(v), IndicatorField::Value) => Some(*v),
        (IndicatorValue::Macd { line, .. }, IndicatorField::Value | IndicatorField::MacdLine) => {
            Some(*line)
        }
        (IndicatorValue::Macd { signal, .. }, IndicatorField::MacdSignal) => Some(*signal),
        (IndicatorValue::Macd { histogram, .. }, IndicatorField::MacdHistogram) => {
            Some(*histogram)
        }
        (IndicatorValue::Bollinger { upper, .. }, IndicatorField::BollingerUpper) => Some(*upper),
        (
            IndicatorValue::Bollinger { middle, .. },
            IndicatorField::Value | IndicatorField::BollingerMiddle,
        ) => Some(*middle),
        (IndicatorValue::Bollinger { lower, .. }, IndicatorField::BollingerLower) => Some(*lower),
        _ => None,
    }
}
