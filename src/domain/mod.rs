//! Core domain types and logic.

pub mod candle;
pub mod cancel;
pub mod position;
pub mod portfolio;
pub mod execution;
pub mod indicator;
pub mod indicator_helpers;
pub mod rule;
pub mod rule_eval;
pub mod strategy;
pub mod strategy_parser;
pub mod backtest;
pub mod metrics;
pub mod monte_carlo;
pub mod job;
pub mod config_validation;
pub mod error;
