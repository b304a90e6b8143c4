//! Indicator provider port trait.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorSet, IndicatorType};

/// Computes indicator series aligned by candle index.
///
/// Every returned series must hold exactly one point per candle; points
/// without enough history are marked invalid rather than omitted.
pub trait IndicatorPort {
    fn compute(&self, candles: &[Candle], indicators: &[IndicatorType]) -> IndicatorSet;
}
