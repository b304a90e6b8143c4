#![allow(dead_code)]

use btcstrat::domain::candle::Candle;
use btcstrat::domain::error::BacktestError;
use btcstrat::ports::data_port::DataPort;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Candle>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_candles(mut self, source: &str, candles: Vec<Candle>) -> Self {
        self.data.insert(source.to_string(), candles);
        self
    }

    pub fn with_error(mut self, source: &str, reason: &str) -> Self {
        self.errors.insert(source.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_candles(&self, source: &str) -> Result<Vec<Candle>, BacktestError> {
        if let Some(reason) = self.errors.get(source) {
            return Err(BacktestError::DataLoad {
                source_name: source.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(source).cloned().unwrap_or_default())
    }
}

pub fn start_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_704_067_200, 0).unwrap()
}

/// Hourly candle `i` hours after [`start_time`], with a 0.2% range around
/// `close`.
pub fn make_candle(i: usize, close: f64) -> Candle {
    Candle {
        time: start_time() + Duration::hours(i as i64),
        open: close,
        high: close * 1.002,
        low: close * 0.998,
        close,
        volume: 10.0,
    }
}

pub fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_candle(i, c))
        .collect()
}

/// `close[i] = 100 * 1.01^i`
pub fn rising_series(count: usize) -> Vec<Candle> {
    let closes: Vec<f64> = (0..count).map(|i| 100.0 * 1.01_f64.powi(i as i32)).collect();
    candles_from_closes(&closes)
}

/// Falls 1% a bar for `down` bars, then rises 1% a bar for `up` bars.
pub fn decline_then_rise(down: usize, up: usize) -> Vec<Candle> {
    let mut closes = Vec::with_capacity(down + up);
    let mut price = 100.0;
    for _ in 0..down {
        price *= 0.99;
        closes.push(price);
    }
    for _ in 0..up {
        price *= 1.01;
        closes.push(price);
    }
    candles_from_closes(&closes)
}

/// Oscillating series with a slow drift, enough to trigger RSI and
/// crossover rules in both directions.
pub fn choppy_series(count: usize) -> Vec<Candle> {
    let closes: Vec<f64> = (0..count)
        .map(|i| {
            let t = i as f64;
            40_000.0 + 3_000.0 * (t / 9.0).sin() + 1_200.0 * (t / 2.5).cos() + 5.0 * t
        })
        .collect();
    candles_from_closes(&closes)
}

pub fn candles_to_csv(candles: &[Candle]) -> String {
    let mut out = String::from("time,open,high,low,close,volume\n");
    for c in candles {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            c.time.to_rfc3339(),
            c.open,
            c.high,
            c.low,
            c.close,
            c.volume
        ));
    }
    out
}
