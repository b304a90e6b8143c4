//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::text_report::TextReportAdapter;
use crate::domain::backtest::SimConfig;
use crate::domain::candle::Candle;
use crate::domain::config_validation::{
    build_monte_carlo_config, build_sim_config, candles_path, strategy_description,
    validate_config,
};
use crate::domain::error::BacktestError;
use crate::domain::job::{BacktestJob, BacktestReport, BacktestRequest};
use crate::domain::monte_carlo::MonteCarloConfig;
use crate::domain::strategy_parser;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "btcstrat", about = "Natural-language strategy backtester for Bitcoin")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        /// INI config with [simulation], [monte_carlo], [strategy] and [data]
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Candle CSV (overrides [data] candles)
        #[arg(long)]
        candles: Option<PathBuf>,
        /// Strategy description (overrides [strategy] description)
        #[arg(short, long)]
        strategy: Option<String>,
        /// Monte Carlo runs (overrides [monte_carlo] runs)
        #[arg(long)]
        runs: Option<usize>,
        /// Monte Carlo seed (overrides [monte_carlo] seed)
        #[arg(long)]
        seed: Option<u64>,
        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Parse a strategy description and print the resulting rule set
    Parse { text: String },
    /// Validate a config file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            candles,
            strategy,
            runs,
            seed,
            output,
            timeout,
        } => {
            let args = BacktestArgs {
                config,
                candles,
                strategy,
                runs,
                seed,
                output,
                timeout,
            };
            match run_backtest(&args) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => report_error(&e),
            }
        }
        Command::Parse { text } => run_parse(&text),
        Command::Validate { config } => run_validate(&config),
    }
}

fn report_error(err: &BacktestError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

struct BacktestArgs {
    config: Option<PathBuf>,
    candles: Option<PathBuf>,
    strategy: Option<String>,
    runs: Option<usize>,
    seed: Option<u64>,
    output: Option<PathBuf>,
    timeout: Option<u64>,
}

fn run_backtest(args: &BacktestArgs) -> Result<(), BacktestError> {
    // Stage 1: Load and validate config
    let adapter = match &args.config {
        Some(path) => {
            eprintln!("Loading config from {}", path.display());
            let adapter = FileConfigAdapter::from_file(path)?;
            match validate_config(&adapter) {
                // The description may come from the command line instead.
                Err(BacktestError::ConfigMissing { section, .. })
                    if section == "strategy" && args.strategy.is_some() => {}
                other => other?,
            }
            Some(adapter)
        }
        None => None,
    };

    // Stage 2: Resolve strategy and data source; flags win over the file
    let description = args
        .strategy
        .clone()
        .or_else(|| adapter.as_ref().and_then(|a| strategy_description(a)))
        .ok_or_else(|| BacktestError::ConfigMissing {
            section: "strategy".into(),
            key: "description".into(),
        })?;

    let candles_source = args
        .candles
        .clone()
        .or_else(|| adapter.as_ref().and_then(|a| candles_path(a)).map(PathBuf::from))
        .ok_or_else(|| BacktestError::ConfigMissing {
            section: "data".into(),
            key: "candles".into(),
        })?;

    let (sim, mut monte_carlo) = match &adapter {
        Some(a) => (build_sim_config(a), build_monte_carlo_config(a)),
        None => (SimConfig::default(), MonteCarloConfig::default()),
    };
    if let Some(runs) = args.runs {
        monte_carlo.runs = runs;
    }
    if let Some(seed) = args.seed {
        monte_carlo.seed = seed;
    }

    // Stage 3: Load candles
    let candles = load_candles(&candles_source)?;
    eprintln!(
        "Loaded {} candles from {}",
        candles.len(),
        candles_source.display()
    );

    // Stage 4: Run the job off the main thread
    let request = BacktestRequest {
        description,
        candles,
        sim,
        monte_carlo,
    };
    let handle = BacktestJob::spawn(request)?;
    let report = match args.timeout {
        Some(seconds) => handle.wait_timeout(Duration::from_secs(seconds))?,
        None => handle.wait()?,
    };

    // Stage 5: Report
    write_report(&report, args.output.as_deref())
}

fn load_candles(path: &Path) -> Result<Vec<Candle>, BacktestError> {
    let source = path.to_string_lossy();
    CsvAdapter::new(PathBuf::new()).fetch_candles(&source)
}

fn write_report(report: &BacktestReport, output: Option<&Path>) -> Result<(), BacktestError> {
    let renderer = TextReportAdapter::new();
    match output {
        Some(path) => {
            renderer.write(report, path)?;
            eprintln!("Report written to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(renderer.render(report).as_bytes())?;
        }
    }
    Ok(())
}

fn run_parse(text: &str) -> ExitCode {
    let rule_set = strategy_parser::parse(text);
    println!("{rule_set}");
    ExitCode::SUCCESS
}

fn run_validate(path: &Path) -> ExitCode {
    let adapter = match FileConfigAdapter::from_file(path) {
        Ok(a) => a,
        Err(e) => return report_error(&e),
    };
    match validate_config(&adapter) {
        Ok(()) => {
            println!("{}: OK", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => report_error(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_backtest_flags() {
        let cli = Cli::try_parse_from([
            "btcstrat",
            "backtest",
            "--candles",
            "btc.csv",
            "--strategy",
            "RSI < 30",
            "--runs",
            "100",
            "--seed",
            "9",
        ])
        .unwrap();
        match cli.command {
            Command::Backtest {
                candles,
                strategy,
                runs,
                seed,
                config,
                ..
            } => {
                assert_eq!(candles, Some(PathBuf::from("btc.csv")));
                assert_eq!(strategy.as_deref(), Some("RSI < 30"));
                assert_eq!(runs, Some(100));
                assert_eq!(seed, Some(9));
                assert!(config.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn cli_parses_parse_command() {
        let cli = Cli::try_parse_from(["btcstrat", "parse", "buy when RSI < 30"]).unwrap();
        assert!(matches!(cli.command, Command::Parse { text } if text == "buy when RSI < 30"));
    }

    #[test]
    fn cli_requires_config_for_validate() {
        assert!(Cli::try_parse_from(["btcstrat", "validate"]).is_err());
    }

    #[test]
    fn backtest_without_strategy_is_config_missing() {
        let args = BacktestArgs {
            config: None,
            candles: Some(PathBuf::from("unused.csv")),
            strategy: None,
            runs: None,
            seed: None,
            output: None,
            timeout: None,
        };
        let err = run_backtest(&args).unwrap_err();
        assert!(matches!(err, BacktestError::ConfigMissing { key, .. } if key == "description"));
    }

    #[test]
    fn blank_strategy_is_not_missing() {
        let args = BacktestArgs {
            config: None,
            candles: None,
            strategy: Some(String::new()),
            runs: None,
            seed: None,
            output: None,
            timeout: None,
        };
        let err = run_backtest(&args).unwrap_err();
        assert!(matches!(err, BacktestError::ConfigMissing { key, .. } if key == "candles"));
    }

    #[test]
    fn backtest_without_candles_is_config_missing() {
        let args = BacktestArgs {
            config: None,
            candles: None,
            strategy: Some("RSI < 30".into()),
            runs: None,
            seed: None,
            output: None,
            timeout: None,
        };
        let err = run_backtest(&args).unwrap_err();
        assert!(matches!(err, BacktestError::ConfigMissing { key, .. } if key == "candles"));
    }
}
