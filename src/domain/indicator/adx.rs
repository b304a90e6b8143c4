//! ADX (Average Directional Index, Wilder).
//!
//! 1. +DM / -DM and true range from consecutive candles
//! 2. Wilder-smooth +DM, -DM and TR over `period`
//! 3. +DI = 100 * sm(+DM) / sm(TR), -DI = 100 * sm(-DM) / sm(TR)
//! 4. DX = 100 * |+DI - -DI| / (+DI + -DI)
//! 5. ADX = Wilder-smoothed DX
//!
//! Warmup: 2 * period - 1 candles.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub const DEFAULT_PERIOD: usize = 14;

pub fn calculate_adx(candles: &[Candle], period: usize) -> IndicatorSeries {
    let n = candles.len();
    let mut plus_dm = vec![None; n];
    let mut minus_dm = vec![None; n];
    let mut tr = vec![None; n];

    for i in 1..n {
        let up = candles[i].high - candles[i - 1].high;
        let down = candles[i - 1].low - candles[i].low;
        plus_dm[i] = Some(if up > down && up > 0.0 { up } else { 0.0 });
        minus_dm[i] = Some(if down > up && down > 0.0 { down } else { 0.0 });
        tr[i] = Some(candles[i].true_range(candles[i - 1].close));
    }

    let smooth_tr = wilder_smooth(&tr, period);
    let smooth_plus = wilder_smooth(&plus_dm, period);
    let smooth_minus = wilder_smooth(&minus_dm, period);

    let dx: Vec<Option<f64>> = (0..n)
        .map(|i| match (smooth_tr[i], smooth_plus[i], smooth_minus[i]) {
            (Some(tr), Some(p), Some(m)) if tr > 0.0 => {
                let plus_di = 100.0 * p / tr;
                let minus_di = 100.0 * m / tr;
                let sum = plus_di + minus_di;
                Some(if sum == 0.0 {
                    0.0
                } else {
                    100.0 * (plus_di - minus_di).abs() / sum
                })
            }
            (Some(_), Some(_), Some(_)) => Some(0.0),
            _ => None,
        })
        .collect();

    let adx = wilder_smooth(&dx, period);

    let values = candles
        .iter()
        .zip(adx)
        .map(|(c, v)| IndicatorPoint {
            time: c.time,
            valid: v.is_some(),
            value: IndicatorValue::Simple(v.unwrap_or(0.0)),
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Adx(period),
        values,
    }
}

/// Wilder smoothing: seed with the mean of the first `period` defined values,
/// then avg = (prev * (n-1) + x) / n.
fn wilder_smooth(input: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; input.len()];
    if period == 0 {
        return out;
    }
    let Some(start) = input.iter().position(Option::is_some) else {
        return out;
    };
    let seed_end = start + period;
    if seed_end > input.len() {
        return out;
    }

    let mut avg = input[start..seed_end].iter().flatten().sum::<f64>() / period as f64;
    out[seed_end - 1] = Some(avg);
    for i in seed_end..input.len() {
        if let Some(x) = input[i] {
            avg = (avg * (period - 1) as f64 + x) / period as f64;
        }
        out[i] = Some(avg);
    }
    out
}
