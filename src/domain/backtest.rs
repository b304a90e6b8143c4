//! Backtest engine and event loop.
//!
//! A single forward pass over the candles. Indicators are computed once up
//! front; each candle then either opens a position (when flat) or checks the
//! open position's risk exits and exit signal. Conditions never read data
//! past the current candle.

use chrono::{DateTime, Utc};

use super::candle::Candle;
use super::execution::{close_position, open_position};
use super::indicator_helpers::{max_lookback, StandardIndicators};
use super::metrics::Stats;
use super::portfolio::{EquityPoint, Portfolio};
use super::position::{ExitReason, Position, Side, Trade};
use super::rule_eval::evaluate;
use super::strategy::{Direction, RuleSet};
use crate::ports::indicator_port::IndicatorPort;

pub const DEFAULT_INITIAL_CAPITAL: f64 = 10_000.0;
pub const DEFAULT_SLIPPAGE_PCT: f64 = 0.05;
pub const DEFAULT_FEE_PCT: f64 = 0.1;
pub const DEFAULT_RISK_PER_TRADE_PCT: f64 = 2.0;
pub const MAX_POSITION_PCT: f64 = 0.5;
/// Upper bound for slippage and fee percentages.
pub const MAX_FRICTION_PCT: f64 = 10.0;

/// Percentages are whole numbers (0.1 means 0.1%); `max_position_pct` is a
/// fraction of equity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimConfig {
    pub initial_capital: f64,
    pub slippage_pct: f64,
    pub fee_pct: f64,
    pub risk_per_trade_pct: f64,
    pub max_position_pct: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            initial_capital: DEFAULT_INITIAL_CAPITAL,
            slippage_pct: DEFAULT_SLIPPAGE_PCT,
            fee_pct: DEFAULT_FEE_PCT,
            risk_per_trade_pct: DEFAULT_RISK_PER_TRADE_PCT,
            max_position_pct: MAX_POSITION_PCT,
        }
    }
}

impl SimConfig {
    /// Clamp every field into its valid range. Invalid values are replaced,
    /// never reported as errors.
    pub fn sanitized(&self) -> SimConfig {
        let defaults = SimConfig::default();

        let initial_capital = if self.initial_capital.is_finite() && self.initial_capital > 0.0 {
            self.initial_capital
        } else {
            tracing::warn!(value = self.initial_capital, default = defaults.initial_capital, "invalid initial_capital, using default");
            defaults.initial_capital
        };

        let friction = |name: &str, value: f64, default: f64| {
            if !value.is_finite() || value <= 0.0 {
                tracing::warn!(field = name, value, default, "invalid percentage, using default");
                default
            } else if value > MAX_FRICTION_PCT {
                tracing::warn!(field = name, value, max = MAX_FRICTION_PCT, "percentage too large, clamping");
                MAX_FRICTION_PCT
            } else {
                value
            }
        };
        let slippage_pct = friction("slippage_pct", self.slippage_pct, defaults.slippage_pct);
        let fee_pct = friction("fee_pct", self.fee_pct, defaults.fee_pct);

        let risk_per_trade_pct = if self.risk_per_trade_pct.is_finite()
            && self.risk_per_trade_pct > 0.0
            && self.risk_per_trade_pct <= 100.0
        {
            self.risk_per_trade_pct
        } else {
            tracing::warn!(value = self.risk_per_trade_pct, default = defaults.risk_per_trade_pct, "invalid risk_per_trade_pct, using default");
            defaults.risk_per_trade_pct
        };

        let max_position_pct = if self.max_position_pct.is_finite() && self.max_position_pct > 0.0 {
            if self.max_position_pct > MAX_POSITION_PCT {
                tracing::warn!(value = self.max_position_pct, max = MAX_POSITION_PCT, "max_position_pct above cap, clamping");
            }
            self.max_position_pct.min(MAX_POSITION_PCT)
        } else {
            tracing::warn!(value = self.max_position_pct, default = MAX_POSITION_PCT, "invalid max_position_pct, using default");
            MAX_POSITION_PCT
        };

        SimConfig {
            initial_capital,
            slippage_pct,
            fee_pct,
            risk_per_trade_pct,
            max_position_pct,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub trades: Vec<Trade>,
    pub equity: Vec<EquityPoint>,
    pub stats: Stats,
}

impl SimulationResult {
    pub fn trade_returns_pct(&self) -> Vec<f64> {
        self.trades.iter().map(|t| t.pnl_percent).collect()
    }

    fn from_portfolio(portfolio: Portfolio) -> Self {
        let stats = Stats::compute(
            &portfolio.closed_trades,
            &portfolio.equity_curve,
            portfolio.initial_capital,
        );
        SimulationResult {
            trades: portfolio.closed_trades,
            equity: portfolio.equity_curve,
            stats,
        }
    }
}

/// Run with the built-in indicator implementations.
pub fn run_backtest(rule_set: &RuleSet, candles: &[Candle], config: &SimConfig) -> SimulationResult {
    run_backtest_with(&StandardIndicators, rule_set, candles, config)
}

pub fn run_backtest_with(
    provider: &dyn IndicatorPort,
    rule_set: &RuleSet,
    candles: &[Candle],
    config: &SimConfig,
) -> SimulationResult {
    let config = config.sanitized();

    let Some(first) = candles.first() else {
        tracing::info!("no candles supplied, returning empty result");
        return SimulationResult::from_portfolio(Portfolio::new(
            config.initial_capital,
            DateTime::<Utc>::UNIX_EPOCH,
        ));
    };
    let mut portfolio = Portfolio::new(config.initial_capital, first.time);

    let needed = rule_set.indicators();
    let lookback = max_lookback(&needed);
    if candles.len() <= lookback {
        tracing::info!(
            candles = candles.len(),
            lookback,
            "not enough history for the strategy's indicators"
        );
        return SimulationResult::from_portfolio(portfolio);
    }

    let indicators = provider.compute(candles, &needed);
    let last = candles.len() - 1;
    let mut open: Option<Position> = None;

    for (i, candle) in candles.iter().enumerate() {
        let entry_signal = || evaluate(&rule_set.entry, candles, &indicators, i);
        let exit_signal = || evaluate(&rule_set.exit, candles, &indicators, i);

        match open.take() {
            None => {
                if i == last {
                    continue;
                }
                let side = match rule_set.direction {
                    Direction::Long => entry_signal().then_some(Side::Long),
                    Direction::Short => entry_signal().then_some(Side::Short),
                    Direction::Both => {
                        if entry_signal() {
                            Some(Side::Long)
                        } else if exit_signal() {
                            Some(Side::Short)
                        } else {
                            None
                        }
                    }
                };
                if let Some(side) = side {
                    open = open_position(side, candle, portfolio.equity, &rule_set.risk, &config);
                    if let Some(pos) = &open {
                        tracing::debug!(index = i, side = %pos.side, price = pos.entry_price, size = pos.size, "opened position");
                    }
                }
            }
            Some(mut pos) => {
                pos.update_trailing_anchor(candle.close);

                let exit = pos.risk_exit(candle).or_else(|| {
                    let signal = match (rule_set.direction, pos.side) {
                        (Direction::Both, Side::Short) => entry_signal(),
                        _ => exit_signal(),
                    };
                    signal.then_some((ExitReason::SignalExit, candle.close))
                });

                match exit {
                    Some((reason, price)) => {
                        let trade = close_position(pos, candle, price, reason, &config);
                        tracing::debug!(index = i, reason = %reason, pnl = trade.pnl, "closed position");
                        portfolio.record_trade(trade);
                    }
                    None if i == last => {
                        let trade =
                            close_position(pos, candle, candle.close, ExitReason::EndOfData, &config);
                        portfolio.record_trade(trade);
                    }
                    None => open = Some(pos),
                }
            }
        }
    }

    tracing::debug!(trades = portfolio.trade_count(), equity = portfolio.equity, "simulation finished");
    SimulationResult::from_portfolio(portfolio)
}
