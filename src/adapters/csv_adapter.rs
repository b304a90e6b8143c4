//! CSV candle file adapter.
//!
//! Expects a header row `time,open,high,low,close,volume`. Times are RFC 3339
//! or unix seconds. Rows must be strictly increasing in time.

use crate::domain::candle::Candle;
use crate::domain::error::BacktestError;
use crate::ports::data_port::DataPort;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    /// Sources passed to [`DataPort::fetch_candles`] are resolved relative to
    /// `base_path`; absolute sources are used as-is.
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, source: &str) -> PathBuf {
        self.base_path.join(source)
    }

    /// Parse candles from CSV text. `source_name` only labels errors.
    pub fn parse_candles(content: &str, source_name: &str) -> Result<Vec<Candle>, BacktestError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut candles: Vec<Candle> = Vec::new();

        for (idx, result) in rdr.records().enumerate() {
            // Row numbers are 1-based and count the header.
            let row = idx + 2;
            let record = result.map_err(|e| BacktestError::DataLoad {
                source_name: source_name.to_string(),
                reason: format!("CSV parse error: {e}"),
            })?;

            let time = parse_time(field(&record, row, 0, "time")?).ok_or_else(|| {
                BacktestError::CandleInvalid {
                    row,
                    reason: "time must be RFC 3339 or unix seconds".into(),
                }
            })?;

            let candle = Candle {
                time,
                open: number(&record, row, 1, "open")?,
                high: number(&record, row, 2, "high")?,
                low: number(&record, row, 3, "low")?,
                close: number(&record, row, 4, "close")?,
                volume: number(&record, row, 5, "volume")?,
            };

            if !candle.is_well_formed() {
                return Err(BacktestError::CandleInvalid {
                    row,
                    reason: "prices must be positive with low <= open, close <= high".into(),
                });
            }
            if let Some(prev) = candles.last() {
                if candle.time <= prev.time {
                    return Err(BacktestError::CandleInvalid {
                        row,
                        reason: format!("time {} is not after {}", candle.time, prev.time),
                    });
                }
            }
            candles.push(candle);
        }

        tracing::debug!(source = source_name, candles = candles.len(), "parsed candles");
        Ok(candles)
    }
}

fn field<'r>(
    record: &'r csv::StringRecord,
    row: usize,
    i: usize,
    name: &str,
) -> Result<&'r str, BacktestError> {
    record
        .get(i)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| BacktestError::CandleInvalid {
            row,
            reason: format!("missing {name} column"),
        })
}

fn number(
    record: &csv::StringRecord,
    row: usize,
    i: usize,
    name: &str,
) -> Result<f64, BacktestError> {
    let raw = field(record, row, i, name)?;
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(BacktestError::CandleInvalid {
            row,
            reason: format!("invalid {name} value '{raw}'"),
        }),
    }
}

fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

impl DataPort for CsvAdapter {
    fn fetch_candles(&self, source: &str) -> Result<Vec<Candle>, BacktestError> {
        let path = self.csv_path(source);
        let content = fs::read_to_string(&path).map_err(|e| BacktestError::DataLoad {
            source_name: path.display().to_string(),
            reason: format!("failed to read file: {e}"),
        })?;
        Self::parse_candles(&content, &path.display().to_string())
    }
}
