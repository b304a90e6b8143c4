//! Error types for the I/O edges of the backtester.
//!
//! The strategy parser, simulator, statistics and Monte Carlo code are total:
//! bad input degrades to a well-typed result instead of an error. Errors only
//! come from loading data and configuration or from job control.

/// Top-level error type for btcstrat.
#[derive(Debug, thiserror::Error)]
pub enum BacktestError {
    #[error("failed to load candles from {source_name}: {reason}")]
    DataLoad { source_name: String, reason: String },

    #[error("invalid candle data at row {row}: {reason}")]
    CandleInvalid { row: usize, reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("backtest cancelled")]
    Cancelled,

    #[error("backtest did not finish within {seconds}s")]
    Timeout { seconds: u64 },

    #[error("backtest worker failed: {reason}")]
    Worker { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&BacktestError> for std::process::ExitCode {
    fn from(err: &BacktestError) -> Self {
        let code: u8 = match err {
            BacktestError::Io(_) | BacktestError::Worker { .. } => 1,
            BacktestError::ConfigParse { .. }
            | BacktestError::ConfigMissing { .. }
            | BacktestError::ConfigInvalid { .. } => 2,
            BacktestError::DataLoad { .. } | BacktestError::CandleInvalid { .. } => 3,
            BacktestError::Cancelled | BacktestError::Timeout { .. } => 4,
        };
        std::process::ExitCode::from(code)
    }
}
