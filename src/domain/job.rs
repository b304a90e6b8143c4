//! Off-thread backtest orchestration.
//!
//! [`run_pipeline`] chains parse, simulate and Monte Carlo for one request.
//! [`BacktestJob::spawn`] runs it on a named worker thread and hands back a
//! [`BacktestHandle`] the caller can poll, wait on with a timeout, or cancel.
//! A cancelled or timed-out job never yields a partial report.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::backtest::{run_backtest, SimConfig, SimulationResult};
use super::cancel::CancelToken;
use super::candle::Candle;
use super::error::BacktestError;
use super::monte_carlo::{simulate_cancellable, MonteCarloConfig, MonteCarloResult};
use super::strategy::RuleSet;
use super::strategy_parser::parse;

#[derive(Debug, Clone)]
pub struct BacktestRequest {
    pub description: String,
    pub candles: Vec<Candle>,
    pub sim: SimConfig,
    pub monte_carlo: MonteCarloConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestReport {
    pub rule_set: RuleSet,
    pub simulation: SimulationResult,
    pub monte_carlo: MonteCarloResult,
}

pub fn run_pipeline(
    request: &BacktestRequest,
    cancel: &CancelToken,
) -> Result<BacktestReport, BacktestError> {
    let rule_set = parse(&request.description);
    if cancel.is_cancelled() {
        return Err(BacktestError::Cancelled);
    }

    let simulation = run_backtest(&rule_set, &request.candles, &request.sim);
    if cancel.is_cancelled() {
        return Err(BacktestError::Cancelled);
    }
    tracing::info!(
        trades = simulation.trades.len(),
        total_return_pct = simulation.stats.total_return_pct,
        fallback = rule_set.is_fallback,
        "simulation complete"
    );

    let monte_carlo =
        simulate_cancellable(&simulation.trade_returns_pct(), &request.monte_carlo, cancel)?;

    Ok(BacktestReport {
        rule_set,
        simulation,
        monte_carlo,
    })
}

pub struct BacktestJob;

impl BacktestJob {
    /// Start `request` on a worker thread.
    pub fn spawn(request: BacktestRequest) -> Result<BacktestHandle, BacktestError> {
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();
        let (tx, rx) = mpsc::channel();

        let join = thread::Builder::new()
            .name("btcstrat-worker".into())
            .spawn(move || {
                let outcome = run_pipeline(&request, &worker_cancel);
                // The receiver may be gone if the caller dropped the handle.
                let _ = tx.send(outcome);
            })?;

        Ok(BacktestHandle {
            cancel,
            rx,
            join: Some(join),
        })
    }
}

pub struct BacktestHandle {
    cancel: CancelToken,
    rx: Receiver<Result<BacktestReport, BacktestError>>,
    join: Option<JoinHandle<()>>,
}

impl BacktestHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, |j| j.is_finished())
    }

    /// Block until the job ends.
    pub fn wait(mut self) -> Result<BacktestReport, BacktestError> {
        let outcome = self.rx.recv().map_err(|_| BacktestError::Worker {
            reason: "worker exited without a result".into(),
        });
        self.finish(outcome)
    }

    /// Block for at most `timeout`. On expiry the job is cancelled and
    /// [`BacktestError::Timeout`] returned.
    pub fn wait_timeout(mut self, timeout: Duration) -> Result<BacktestReport, BacktestError> {
        match self.rx.recv_timeout(timeout) {
            Ok(outcome) => self.finish(Ok(outcome)),
            Err(RecvTimeoutError::Timeout) => {
                self.cancel.cancel();
                tracing::warn!(seconds = timeout.as_secs(), "backtest timed out, cancelling");
                Err(BacktestError::Timeout {
                    seconds: timeout.as_secs(),
                })
            }
            Err(RecvTimeoutError::Disconnected) => self.finish(Err(BacktestError::Worker {
                reason: "worker exited without a result".into(),
            })),
        }
    }

    fn finish(
        &mut self,
        outcome: Result<Result<BacktestReport, BacktestError>, BacktestError>,
    ) -> Result<BacktestReport, BacktestError> {
        let panicked = self.join.take().map(|j| j.join().is_err()).unwrap_or(false);
        if panicked {
            return Err(BacktestError::Worker {
                reason: "worker panicked".into(),
            });
        }
        outcome?
    }
}

impl Drop for BacktestHandle {
    fn drop(&mut self) {
        // Abandoned jobs stop at their next cancellation check.
        if self.join.is_some() {
            self.cancel.cancel();
        }
    }
}
