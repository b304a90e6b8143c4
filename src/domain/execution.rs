//! Trade execution and fill simulation.
//!
//! Implements entry/exit fills with slippage, percentage fees, risk-based
//! position sizing, and stop-loss/take-profit price placement.

use super::backtest::SimConfig;
use super::candle::Candle;
use super::position::{ExitReason, Position, Side, Trade};
use super::strategy::RiskParams;

/// Stop distance used when the strategy does not name one, so every
/// position carries a stop.
pub const DEFAULT_STOP_LOSS_PCT: f64 = 5.0;

/// Fee on a fill: notional * fee_pct / 100.
pub fn calculate_fee(notional: f64, fee_pct: f64) -> f64 {
    notional * fee_pct / 100.0
}

/// Long entry (buy): execution_price = market_price * (1 + slippage_pct / 100)
pub fn apply_slippage_long_entry(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 + slippage_pct / 100.0)
}

/// Short entry (sell short): execution_price = market_price * (1 - slippage_pct / 100)
pub fn apply_slippage_short_entry(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 - slippage_pct / 100.0)
}

/// Long exit (sell): execution_price = market_price * (1 - slippage_pct / 100)
pub fn apply_slippage_long_exit(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 - slippage_pct / 100.0)
}

/// Short exit (buy to cover): execution_price = market_price * (1 + slippage_pct / 100)
pub fn apply_slippage_short_exit(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 + slippage_pct / 100.0)
}

fn valid_pct(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0 && *v < 100.0)
}

/// Notional to commit: the amount that loses `risk_pct` of equity if the
/// stop fills, capped at `max_position_pct` of equity. Without a usable stop
/// distance the risk percentage of equity is used directly.
pub fn size_position(
    equity: f64,
    entry_price: f64,
    stop_price: f64,
    risk_pct: f64,
    max_position_pct: f64,
) -> f64 {
    if equity <= 0.0 || entry_price <= 0.0 {
        return 0.0;
    }
    let cap = max_position_pct * equity;
    let risk_amount = equity * risk_pct / 100.0;
    let stop_fraction = (entry_price - stop_price).abs() / entry_price;
    let risk_sized = if stop_fraction > 0.0 && stop_fraction.is_finite() {
        risk_amount / stop_fraction
    } else {
        risk_amount
    };
    risk_sized.min(cap).max(0.0)
}

/// Open a position at the candle close. Returns `None` when there is no
/// capital to commit.
pub fn open_position(
    side: Side,
    candle: &Candle,
    equity: f64,
    risk: &RiskParams,
    config: &SimConfig,
) -> Option<Position> {
    let entry_price = match side {
        Side::Long => apply_slippage_long_entry(candle.close, config.slippage_pct),
        Side::Short => apply_slippage_short_entry(candle.close, config.slippage_pct),
    };
    if !(entry_price > 0.0) {
        return None;
    }

    let stop_pct = valid_pct(risk.stop_loss_pct).unwrap_or(DEFAULT_STOP_LOSS_PCT);
    let target_pct = risk
        .take_profit_pct
        .filter(|v| v.is_finite() && *v > 0.0)
        .or_else(|| {
            risk.r_multiple
                .filter(|r| r.is_finite() && *r > 0.0)
                .map(|r| stop_pct * r)
        });

    let (stop_loss_price, take_profit_price) = match side {
        Side::Long => (
            entry_price * (1.0 - stop_pct / 100.0),
            target_pct.map(|t| entry_price * (1.0 + t / 100.0)),
        ),
        Side::Short => (
            entry_price * (1.0 + stop_pct / 100.0),
            target_pct
                .filter(|t| *t < 100.0)
                .map(|t| entry_price * (1.0 - t / 100.0)),
        ),
    };

    let risk_pct = valid_pct(risk.risk_per_trade_pct).unwrap_or(config.risk_per_trade_pct);
    let size = size_position(
        equity,
        entry_price,
        stop_loss_price,
        risk_pct,
        config.max_position_pct,
    );
    if !(size > 0.0) {
        return None;
    }

    let trailing_stop_pct = valid_pct(risk.trailing_stop_pct);

    Some(Position {
        side,
        entry_time: candle.time,
        entry_price,
        size,
        units: size / entry_price,
        entry_fee: calculate_fee(size, config.fee_pct),
        stop_loss_price,
        take_profit_price,
        trailing_stop_pct,
        trailing_anchor: trailing_stop_pct.map(|_| entry_price),
    })
}

/// Close `position` at `market_price` (trigger or close), applying exit
/// slippage and fees on both legs.
pub fn close_position(
    position: Position,
    candle: &Candle,
    market_price: f64,
    reason: ExitReason,
    config: &SimConfig,
) -> Trade {
    let exit_price = match position.side {
        Side::Long => apply_slippage_long_exit(market_price, config.slippage_pct),
        Side::Short => apply_slippage_short_exit(market_price, config.slippage_pct),
    };
    let gross = match position.side {
        Side::Long => position.units * (exit_price - position.entry_price),
        Side::Short => position.units * (position.entry_price - exit_price),
    };
    let exit_fee = calculate_fee(position.units * exit_price, config.fee_pct);
    let pnl = gross - position.entry_fee - exit_fee;
    let pnl_percent = if position.size > 0.0 {
        pnl / position.size * 100.0
    } else {
        0.0
    };

    Trade {
        entry_time: position.entry_time,
        exit_time: candle.time,
        direction: position.side,
        entry_price: position.entry_price,
        exit_price,
        size: position.size,
        pnl,
        pnl_percent,
        exit_reason: reason,
    }
}
