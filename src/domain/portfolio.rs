//! Account state and equity tracking for a single simulation run.

use chrono::{DateTime, Utc};

use super::position::Trade;

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub time: DateTime<Utc>,
    pub equity: f64,
}

/// Realized-equity ledger. Equity moves only when a trade closes.
#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub initial_capital: f64,
    pub equity: f64,
    pub closed_trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    /// Starts the curve with `(start, initial_capital)`.
    pub fn new(initial_capital: f64, start: DateTime<Utc>) -> Self {
        Portfolio {
            initial_capital,
            equity: initial_capital,
            closed_trades: Vec::new(),
            equity_curve: vec![EquityPoint {
                time: start,
                equity: initial_capital,
            }],
        }
    }

    pub fn record_trade(&mut self, trade: Trade) {
        self.equity = (self.equity + trade.pnl).max(0.0);
        self.equity_curve.push(EquityPoint {
            time: trade.exit_time,
            equity: self.equity,
        });
        self.closed_trades.push(trade);
    }

    pub fn trade_count(&self) -> usize {
        self.closed_trades.len()
    }
}
