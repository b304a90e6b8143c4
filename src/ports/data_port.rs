//! Market data port trait.

use crate::domain::candle::Candle;
use crate::domain::error::BacktestError;

pub trait DataPort {
    /// Ordered candle series for `source` (a file path, symbol or feed name,
    /// depending on the adapter). Times are strictly increasing.
    fn fetch_candles(&self, source: &str) -> Result<Vec<Candle>, BacktestError>;
}
