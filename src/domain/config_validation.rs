//! Configuration validation and config-to-domain mapping.
//!
//! `validate_config` backs the `validate` command and reports the first bad
//! value. The `build_*` functions never fail: missing or unparseable values
//! fall back to defaults and the engine's own sanitizing does the clamping.

use crate::domain::backtest::SimConfig;
use crate::domain::error::BacktestError;
use crate::domain::monte_carlo::MonteCarloConfig;
use crate::ports::config_port::ConfigPort;

const SIMULATION: &str = "simulation";
const MONTE_CARLO: &str = "monte_carlo";
const STRATEGY: &str = "strategy";
const DATA: &str = "data";

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    validate_simulation(config)?;
    validate_monte_carlo(config)?;
    validate_strategy(config)?;
    validate_data(config)?;
    Ok(())
}

fn validate_simulation(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    if let Some(capital) = parse_number(config, SIMULATION, "initial_capital")? {
        if capital <= 0.0 {
            return Err(invalid(SIMULATION, "initial_capital", "initial_capital must be positive"));
        }
    }
    for key in ["slippage_pct", "fee_pct"] {
        if let Some(value) = parse_number(config, SIMULATION, key)? {
            if value <= 0.0 {
                return Err(invalid(SIMULATION, key, &format!("{key} must be positive")));
            }
        }
    }
    if let Some(risk) = parse_number(config, SIMULATION, "risk_per_trade_pct")? {
        if risk <= 0.0 || risk > 100.0 {
            return Err(invalid(
                SIMULATION,
                "risk_per_trade_pct",
                "risk_per_trade_pct must be in (0, 100]",
            ));
        }
    }
    if let Some(max_position) = parse_number(config, SIMULATION, "max_position_pct")? {
        if max_position <= 0.0 || max_position > 1.0 {
            return Err(invalid(
                SIMULATION,
                "max_position_pct",
                "max_position_pct must be a fraction in (0, 1]",
            ));
        }
    }
    Ok(())
}

fn validate_monte_carlo(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    for key in ["runs", "buckets"] {
        if let Some(value) = parse_integer(config, MONTE_CARLO, key)? {
            if value < 1 {
                return Err(invalid(MONTE_CARLO, key, &format!("{key} must be at least 1")));
            }
        }
    }
    if let Some(threshold) = parse_number(config, MONTE_CARLO, "ruin_threshold_pct")? {
        if threshold <= 0.0 || threshold > 100.0 {
            return Err(invalid(
                MONTE_CARLO,
                "ruin_threshold_pct",
                "ruin_threshold_pct must be in (0, 100]",
            ));
        }
    }
    if let Some(seed) = config.get_string(MONTE_CARLO, "seed") {
        if seed.trim().parse::<u64>().is_err() {
            return Err(invalid(MONTE_CARLO, "seed", "seed must be a non-negative integer"));
        }
    }
    Ok(())
}

fn validate_strategy(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    // A blank description is legal and parses to the fallback rule.
    match config.get_string(STRATEGY, "description") {
        Some(_) => Ok(()),
        None => Err(BacktestError::ConfigMissing {
            section: STRATEGY.to_string(),
            key: "description".to_string(),
        }),
    }
}

fn validate_data(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    match config.get_string(DATA, "candles") {
        Some(s) if s.trim().is_empty() => Err(invalid(DATA, "candles", "candles path is empty")),
        _ => Ok(()),
    }
}

fn parse_number(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, BacktestError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(invalid(section, key, &format!("'{raw}' is not a number"))),
        },
    }
}

fn parse_integer(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<i64>, BacktestError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| invalid(section, key, &format!("'{raw}' is not an integer"))),
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> BacktestError {
    BacktestError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

pub fn build_sim_config(config: &dyn ConfigPort) -> SimConfig {
    let d = SimConfig::default();
    SimConfig {
        initial_capital: config.get_double(SIMULATION, "initial_capital", d.initial_capital),
        slippage_pct: config.get_double(SIMULATION, "slippage_pct", d.slippage_pct),
        fee_pct: config.get_double(SIMULATION, "fee_pct", d.fee_pct),
        risk_per_trade_pct: config.get_double(SIMULATION, "risk_per_trade_pct", d.risk_per_trade_pct),
        max_position_pct: config.get_double(SIMULATION, "max_position_pct", d.max_position_pct),
    }
}

pub fn build_monte_carlo_config(config: &dyn ConfigPort) -> MonteCarloConfig {
    let d = MonteCarloConfig::default();
    let seed = config
        .get_string(MONTE_CARLO, "seed")
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(d.seed);
    MonteCarloConfig {
        runs: non_negative(config.get_int(MONTE_CARLO, "runs", d.runs as i64)),
        ruin_threshold_pct: config.get_double(MONTE_CARLO, "ruin_threshold_pct", d.ruin_threshold_pct),
        seed,
        buckets: non_negative(config.get_int(MONTE_CARLO, "buckets", d.buckets as i64)),
    }
}

fn non_negative(value: i64) -> usize {
    usize::try_from(value).unwrap_or(0)
}

/// `[strategy] description`, if set.
pub fn strategy_description(config: &dyn ConfigPort) -> Option<String> {
    config.get_string(STRATEGY, "description")
}

/// `[data] candles`, if set and non-empty.
pub fn candles_path(config: &dyn ConfigPort) -> Option<String> {
    config
        .get_string(DATA, "candles")
        .filter(|s| !s.trim().is_empty())
}
