//! Performance statistics over a finished simulation.
//!
//! Every field is finite: undefined ratios (no trades, zero variance,
//! no losses) are reported as 0 or [`PROFIT_FACTOR_CAP`].

use super::portfolio::EquityPoint;
use super::position::Trade;

/// Reported instead of infinity when there are profits but no losses.
pub const PROFIT_FACTOR_CAP: f64 = 999.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    pub win_rate: f64,
    pub total_return_pct: f64,
    pub max_drawdown_pct: f64,
    pub sharpe: f64,
    pub profit_factor: f64,
    pub best_trade: f64,
    pub worst_trade: f64,
    pub avg_hold_hours: f64,
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub net_pnl: f64,
}

impl Stats {
    pub fn compute(trades: &[Trade], equity: &[EquityPoint], initial_capital: f64) -> Self {
        let final_equity = equity.last().map(|p| p.equity).unwrap_or(initial_capital);
        let total_return_pct = if initial_capital > 0.0 {
            finite_or_zero(100.0 * (final_equity - initial_capital) / initial_capital)
        } else {
            0.0
        };

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut gross_profit = 0.0_f64;
        let mut gross_loss = 0.0_f64;
        let mut best_trade = f64::NEG_INFINITY;
        let mut worst_trade = f64::INFINITY;
        let mut total_hours = 0.0_f64;

        for trade in trades {
            let pnl = trade.pnl;
            if pnl >= 0.0 {
                trades_won += 1;
                gross_profit += pnl;
            } else {
                trades_lost += 1;
                gross_loss += pnl.abs();
            }
            best_trade = best_trade.max(pnl);
            worst_trade = worst_trade.min(pnl);
            total_hours += trade.hold_hours();
        }

        let total_trades = trades.len();
        let (best_trade, worst_trade) = if total_trades > 0 {
            (best_trade, worst_trade)
        } else {
            (0.0, 0.0)
        };

        let win_rate = if total_trades > 0 {
            100.0 * trades_won as f64 / total_trades as f64
        } else {
            0.0
        };

        let profit_factor = if gross_loss > 0.0 {
            (gross_profit / gross_loss).min(PROFIT_FACTOR_CAP)
        } else if gross_profit > 0.0 {
            PROFIT_FACTOR_CAP
        } else {
            0.0
        };

        let avg_win = if trades_won > 0 {
            gross_profit / trades_won as f64
        } else {
            0.0
        };
        let avg_loss = if trades_lost > 0 {
            gross_loss / trades_lost as f64
        } else {
            0.0
        };
        let avg_hold_hours = if total_trades > 0 {
            total_hours / total_trades as f64
        } else {
            0.0
        };

        let returns: Vec<f64> = trades.iter().map(|t| t.pnl_percent).collect();

        Stats {
            win_rate,
            total_return_pct,
            max_drawdown_pct: compute_drawdown_pct(equity),
            sharpe: compute_sharpe(&returns),
            profit_factor: finite_or_zero(profit_factor),
            best_trade: finite_or_zero(best_trade),
            worst_trade: finite_or_zero(worst_trade),
            avg_hold_hours: finite_or_zero(avg_hold_hours),
            total_trades,
            trades_won,
            trades_lost,
            avg_win: finite_or_zero(avg_win),
            avg_loss: finite_or_zero(avg_loss),
            net_pnl: finite_or_zero(gross_profit - gross_loss),
        }
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

/// Largest peak-to-trough decline, in percent of the running peak.
pub fn compute_drawdown_pct(equity: &[EquityPoint]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for point in equity {
        if point.equity > peak {
            peak = point.equity;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - point.equity) / peak);
        }
    }
    finite_or_zero(100.0 * max_dd).clamp(0.0, 100.0)
}

/// Per-trade Sharpe: mean / sample stdev of trade returns. 0 with fewer
/// than two trades or zero variance.
pub fn compute_sharpe(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let stddev = variance.sqrt();
    if stddev > 0.0 {
        finite_or_zero(mean / stddev)
    } else {
        0.0
    }
}
