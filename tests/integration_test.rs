//! End-to-end tests over the public API.
//!
//! Tests cover:
//! - Equity curve start invariant across strategies and series
//! - Explicit-number strategy: position cap and stop-loss fills
//! - Long-only RSI strategy on rising and V-shaped series
//! - Empty / fallback strategy runs
//! - Monte Carlo determinism through the full pipeline
//! - Off-thread jobs: wait, cancel, timeout
//! - DataPort-fed pipeline with a mock port

mod common;

use approx::assert_abs_diff_eq;
use btcstrat::domain::backtest::{run_backtest, SimConfig};
use btcstrat::domain::cancel::CancelToken;
use btcstrat::domain::error::BacktestError;
use btcstrat::domain::job::{run_pipeline, BacktestJob, BacktestRequest};
use btcstrat::domain::monte_carlo::MonteCarloConfig;
use btcstrat::domain::position::ExitReason;
use btcstrat::domain::strategy::Direction;
use btcstrat::domain::strategy_parser::parse;
use btcstrat::ports::data_port::DataPort;
use common::*;
use std::time::Duration;

const STRATEGIES: [&str; 6] = [
    "",
    "RSI < 30, stop 3%, target 6%",
    "Long only, RSI < 40",
    "buy when EMA 9 crosses above EMA 21, sell when EMA 9 crosses below EMA 21",
    "short on break of 20-day low, trailing stop 4%",
    "MACD crosses above signal and price above the 50 day EMA, 2R target",
];

mod equity_curve {
    use super::*;

    #[test]
    fn first_point_is_initial_capital_at_first_candle() {
        let series = [choppy_series(300), rising_series(100), decline_then_rise(40, 60)];
        let config = SimConfig {
            initial_capital: 12_345.0,
            ..SimConfig::default()
        };
        for candles in &series {
            for text in STRATEGIES {
                let result = run_backtest(&parse(text), candles, &config);
                assert_eq!(result.equity[0].time, candles[0].time, "strategy {text:?}");
                assert_eq!(result.equity[0].equity, 12_345.0, "strategy {text:?}");
            }
        }
    }

    #[test]
    fn one_point_per_closed_trade() {
        let candles = choppy_series(400);
        for text in STRATEGIES {
            let result = run_backtest(&parse(text), &candles, &SimConfig::default());
            assert_eq!(result.equity.len(), result.trades.len() + 1);
            for (trade, point) in result.trades.iter().zip(&result.equity[1..]) {
                assert_eq!(trade.exit_time, point.time);
            }
        }
    }

    #[test]
    fn invalid_capital_is_clamped_not_rejected() {
        let candles = choppy_series(100);
        let config = SimConfig {
            initial_capital: f64::NAN,
            ..SimConfig::default()
        };
        let result = run_backtest(&parse("RSI < 30"), &candles, &config);
        assert_eq!(result.equity[0].equity, 10_000.0);
    }
}

mod explicit_numbers {
    use super::*;

    fn check(candles: &[btcstrat::domain::candle::Candle]) -> usize {
        let rule_set = parse("RSI < 30, stop 3%, target 6%");
        assert_eq!(rule_set.risk.stop_loss_pct, Some(3.0));
        assert_eq!(rule_set.risk.take_profit_pct, Some(6.0));

        let result = run_backtest(&rule_set, candles, &SimConfig::default());
        let mut stops = 0;
        for (k, trade) in result.trades.iter().enumerate() {
            let equity_before = result.equity[k].equity;
            assert!(trade.size <= 0.5 * equity_before + 1e-9);
            if k == 0 {
                assert!(trade.size <= 5_000.0 + 1e-9);
            }
            if trade.exit_reason == ExitReason::StopLoss {
                stops += 1;
                // -3% plus 0.05% slippage per leg and 0.1% fees per leg
                assert_abs_diff_eq!(trade.pnl_percent, -3.25, epsilon = 0.05);
            }
        }
        stops
    }

    #[test]
    fn position_cap_and_stop_fills_on_choppy_series() {
        check(&choppy_series(500));
    }

    #[test]
    fn stop_losses_hit_on_extended_decline() {
        let stops = check(&decline_then_rise(60, 40));
        assert!(stops > 0);
    }
}

mod long_only_rsi {
    use super::*;

    #[test]
    fn strictly_rising_series_never_enters() {
        let candles = rising_series(100);
        let rule_set = parse("Long only, RSI < 40");
        assert_eq!(rule_set.direction, Direction::Long);

        let result = run_backtest(&rule_set, &candles, &SimConfig::default());
        // RSI sits at 100 on a series with no down closes.
        assert!(result.trades.is_empty());
        assert_eq!(result.equity.len(), 1);
        assert_eq!(result.stats.total_return_pct, 0.0);
        assert_eq!(result.stats.trades_lost, 0);
    }

    #[test]
    fn buys_the_dip_and_profits_on_the_rise() {
        let candles = decline_then_rise(16, 84);
        let result = run_backtest(&parse("Long only, RSI < 40"), &candles, &SimConfig::default());
        assert!(!result.trades.is_empty());
        assert!(result.trades.iter().all(|t| t.exit_reason != ExitReason::StopLoss));
        assert!(result.stats.total_return_pct > 0.0);
    }
}

mod fallback {
    use super::*;

    #[test]
    fn empty_strategy_runs_cleanly() {
        let rule_set = parse("");
        assert!(rule_set.is_fallback);
        for candles in [choppy_series(50), rising_series(3), decline_then_rise(5, 5)] {
            let result = run_backtest(&rule_set, &candles, &SimConfig::default());
            assert_eq!(result.equity[0].equity, 10_000.0);
            assert!(result.trades.len() <= candles.len());
            assert!(result.stats.win_rate >= 0.0 && result.stats.win_rate <= 100.0);
        }
    }

    #[test]
    fn empty_candles_give_single_point() {
        let result = run_backtest(&parse("RSI < 30"), &[], &SimConfig::default());
        assert!(result.trades.is_empty());
        assert_eq!(result.equity.len(), 1);
    }
}

mod pipeline {
    use super::*;

    fn request(description: &str, seed: u64) -> BacktestRequest {
        BacktestRequest {
            description: description.into(),
            candles: choppy_series(600),
            sim: SimConfig::default(),
            monte_carlo: MonteCarloConfig {
                runs: 300,
                seed,
                ..MonteCarloConfig::default()
            },
        }
    }

    #[test]
    fn same_seed_same_report() {
        let a = run_pipeline(&request("RSI < 30, stop 3%, target 6%", 11), &CancelToken::new())
            .unwrap();
        let b = run_pipeline(&request("RSI < 30, stop 3%, target 6%", 11), &CancelToken::new())
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn monte_carlo_percentiles_ordered() {
        let report = run_pipeline(&request("", 5), &CancelToken::new()).unwrap();
        let mc = &report.monte_carlo;
        if mc.runs > 0 {
            assert!(mc.p5 <= mc.median && mc.median <= mc.p95);
            assert_eq!(mc.histogram.iter().map(|b| b.count).sum::<usize>(), mc.runs);
        }
    }

    #[test]
    fn fed_from_data_port() {
        let port = MockDataPort::new()
            .with_candles("btc", choppy_series(200))
            .with_error("eth", "feed offline");

        let candles = port.fetch_candles("btc").unwrap();
        let req = BacktestRequest {
            candles,
            ..request("buy when RSI < 35, sell when RSI > 65", 1)
        };
        let report = run_pipeline(&req, &CancelToken::new()).unwrap();
        assert_eq!(report.simulation.equity[0].time, req.candles[0].time);

        let err = port.fetch_candles("eth").unwrap_err();
        assert!(matches!(err, BacktestError::DataLoad { .. }));
    }
}

mod jobs {
    use super::*;

    fn heavy_request() -> BacktestRequest {
        BacktestRequest {
            description: "RSI < 45, stop 1%, target 1%".into(),
            candles: choppy_series(20_000),
            sim: SimConfig::default(),
            monte_carlo: MonteCarloConfig {
                runs: 100_000,
                ..MonteCarloConfig::default()
            },
        }
    }

    #[test]
    fn wait_returns_report() {
        let req = BacktestRequest {
            description: "RSI < 30".into(),
            candles: choppy_series(300),
            sim: SimConfig::default(),
            monte_carlo: MonteCarloConfig::default(),
        };
        let handle = BacktestJob::spawn(req).unwrap();
        let report = handle.wait().unwrap();
        assert!(!report.rule_set.is_fallback);
    }

    #[test]
    fn zero_timeout_reports_timeout() {
        let handle = BacktestJob::spawn(heavy_request()).unwrap();
        let err = handle.wait_timeout(Duration::ZERO).unwrap_err();
        assert!(matches!(err, BacktestError::Timeout { seconds: 0 }));
    }

    #[test]
    fn cancel_stops_promptly() {
        let handle = BacktestJob::spawn(heavy_request()).unwrap();
        handle.cancel();
        let started = std::time::Instant::now();
        match handle.wait() {
            Err(BacktestError::Cancelled) => {}
            Ok(report) => assert_eq!(report.monte_carlo.runs, 100_000),
            Err(other) => panic!("unexpected error {other}"),
        }
        assert!(started.elapsed() < Duration::from_secs(30));
    }

    #[test]
    fn is_finished_eventually() {
        let req = BacktestRequest {
            description: String::new(),
            candles: choppy_series(50),
            sim: SimConfig::default(),
            monte_carlo: MonteCarloConfig {
                runs: 10,
                ..MonteCarloConfig::default()
            },
        };
        let handle = BacktestJob::spawn(req).unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(30);
        while !handle.is_finished() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(handle.is_finished());
        assert!(handle.wait().is_ok());
    }
}
