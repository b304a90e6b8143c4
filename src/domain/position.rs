//! Open position state and closed trade records.
//!
//! A simulation holds at most one [`Position`]. It is created on entry,
//! mutated only through its trailing anchor, and consumed into an immutable
//! [`Trade`] on exit.

use crate::domain::candle::Candle;
use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Long,
    Short,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    TrailingStop,
    SignalExit,
    EndOfData,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::SignalExit => "signal",
            ExitReason::EndOfData => "end_of_data",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub side: Side,
    pub entry_time: DateTime<Utc>,
    /// Fill price after slippage.
    pub entry_price: f64,
    /// Notional value at entry.
    pub size: f64,
    pub units: f64,
    pub entry_fee: f64,
    pub stop_loss_price: f64,
    pub take_profit_price: Option<f64>,
    pub trailing_stop_pct: Option<f64>,
    pub trailing_anchor: Option<f64>,
}

impl Position {
    /// Move the anchor to the most favorable close seen so far.
    pub fn update_trailing_anchor(&mut self, close: f64) {
        if let Some(anchor) = self.trailing_anchor.as_mut() {
            *anchor = match self.side {
                Side::Long => anchor.max(close),
                Side::Short => anchor.min(close),
            };
        }
    }

    pub fn trailing_stop_price(&self) -> Option<f64> {
        let anchor = self.trailing_anchor?;
        let pct = self.trailing_stop_pct?;
        Some(match self.side {
            Side::Long => anchor * (1.0 - pct / 100.0),
            Side::Short => anchor * (1.0 + pct / 100.0),
        })
    }

    /// Price-based exit for this candle, checked against its high/low in the
    /// order stop-loss, trailing stop, take-profit. Returns the trigger price.
    pub fn risk_exit(&self, candle: &Candle) -> Option<(ExitReason, f64)> {
        let adverse_hit = |level: f64| match self.side {
            Side::Long => candle.low <= level,
            Side::Short => candle.high >= level,
        };
        let favorable_hit = |level: f64| match self.side {
            Side::Long => candle.high >= level,
            Side::Short => candle.low <= level,
        };

        if adverse_hit(self.stop_loss_price) {
            return Some((ExitReason::StopLoss, self.stop_loss_price));
        }
        if let Some(trail) = self.trailing_stop_price() {
            if adverse_hit(trail) {
                return Some((ExitReason::TrailingStop, trail));
            }
        }
        if let Some(target) = self.take_profit_price {
            if favorable_hit(target) {
                return Some((ExitReason::TakeProfit, target));
            }
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub direction: Side,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: f64,
    /// Net of fees on both legs.
    pub pnl: f64,
    /// `pnl` as a percentage of `size`.
    pub pnl_percent: f64,
    pub exit_reason: ExitReason,
}

impl Trade {
    pub fn hold_hours(&self) -> f64 {
        (self.exit_time - self.entry_time).num_seconds() as f64 / 3600.0
    }
}
