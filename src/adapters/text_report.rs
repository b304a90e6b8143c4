//! Plain-text report adapter.
//!
//! Sections, in order:
//! - Strategy (the parsed rule set)
//! - Summary statistics
//! - Monthly returns
//! - Trade log
//! - Monte Carlo distribution with an ASCII histogram

use crate::domain::job::BacktestReport;
use crate::domain::metrics::Stats;
use crate::domain::monte_carlo::MonteCarloResult;
use crate::domain::portfolio::EquityPoint;
use crate::domain::position::Trade;
use crate::ports::report_port::ReportPort;
use chrono::Datelike;
use std::collections::BTreeMap;

const HISTOGRAM_WIDTH: usize = 40;

#[derive(Debug, Default)]
pub struct TextReportAdapter;

impl TextReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl ReportPort for TextReportAdapter {
    fn render(&self, report: &BacktestReport) -> String {
        let mut output = String::new();

        output.push_str("== Strategy ==\n");
        output.push_str(&report.rule_set.to_string());
        output.push_str("\n\n");

        output.push_str(&format_summary(&report.simulation.stats));
        output.push_str(&format_monthly_returns(&compute_monthly_returns(
            &report.simulation.equity,
        )));
        output.push_str(&format_trade_log(&report.simulation.trades));
        output.push_str(&format_monte_carlo(&report.monte_carlo));
        output
    }
}

pub fn format_summary(stats: &Stats) -> String {
    let mut output = String::from("== Summary ==\n");
    let rows: [(&str, String); 12] = [
        ("Total return", format!("{:.2}%", stats.total_return_pct)),
        ("Max drawdown", format!("{:.2}%", stats.max_drawdown_pct)),
        ("Sharpe (per trade)", format!("{:.3}", stats.sharpe)),
        ("Profit factor", format!("{:.2}", stats.profit_factor)),
        ("Win rate", format!("{:.1}%", stats.win_rate)),
        (
            "Trades",
            format!(
                "{} ({} won, {} lost)",
                stats.total_trades, stats.trades_won, stats.trades_lost
            ),
        ),
        ("Net P&L", format!("{:.2}", stats.net_pnl)),
        ("Best trade", format!("{:.2}", stats.best_trade)),
        ("Worst trade", format!("{:.2}", stats.worst_trade)),
        ("Average win", format!("{:.2}", stats.avg_win)),
        ("Average loss", format!("{:.2}", stats.avg_loss)),
        ("Average hold", format!("{:.1}h", stats.avg_hold_hours)),
    ];
    for (label, value) in rows {
        output.push_str(&format!("{label:<20}{value}\n"));
    }
    output.push('\n');
    output
}

pub struct MonthlyReturn {
    pub year: i32,
    pub month: u32,
    pub return_pct: f64,
}

/// Month-over-month change of the closing equity of each month. The first
/// month is measured from the first equity point.
pub fn compute_monthly_returns(equity_curve: &[EquityPoint]) -> Vec<MonthlyReturn> {
    let Some(first) = equity_curve.first() else {
        return Vec::new();
    };

    let mut month_end: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for point in equity_curve {
        month_end.insert((point.time.year(), point.time.month()), point.equity);
    }

    let mut prev = first.equity;
    month_end
        .into_iter()
        .map(|((year, month), end)| {
            let return_pct = if prev > 0.0 {
                100.0 * (end - prev) / prev
            } else {
                0.0
            };
            prev = end;
            MonthlyReturn {
                year,
                month,
                return_pct,
            }
        })
        .collect()
}

pub fn format_monthly_returns(returns: &[MonthlyReturn]) -> String {
    let mut output = String::from("== Monthly returns ==\n");
    if returns.is_empty() {
        output.push_str("No equity data.\n\n");
        return output;
    }
    for r in returns {
        output.push_str(&format!(
            "{}-{:02}  {:>8.2}%\n",
            r.year, r.month, r.return_pct
        ));
    }
    output.push('\n');
    output
}

pub fn format_trade_log(trades: &[Trade]) -> String {
    let mut output = String::from("== Trades ==\n");
    if trades.is_empty() {
        output.push_str("No trades.\n\n");
        return output;
    }

    output.push_str(&format!(
        "{:<4}{:<6}{:<22}{:<22}{:>12}{:>12}{:>12}{:>9}  {}\n",
        "#", "Side", "Entry", "Exit", "Entry px", "Exit px", "P&L", "P&L %", "Reason"
    ));
    for (i, t) in trades.iter().enumerate() {
        output.push_str(&format!(
            "{:<4}{:<6}{:<22}{:<22}{:>12.2}{:>12.2}{:>12.2}{:>8.2}%  {}\n",
            i + 1,
            t.direction.to_string(),
            t.entry_time.format("%Y-%m-%d %H:%M").to_string(),
            t.exit_time.format("%Y-%m-%d %H:%M").to_string(),
            t.entry_price,
            t.exit_price,
            t.pnl,
            t.pnl_percent,
            t.exit_reason
        ));
    }
    output.push('\n');
    output
}

pub fn format_monte_carlo(mc: &MonteCarloResult) -> String {
    let mut output = String::from("== Monte Carlo ==\n");
    if mc.runs == 0 {
        output.push_str("Skipped: no trades to resample.\n");
        return output;
    }

    output.push_str(&format!("Runs                {}\n", mc.runs));
    output.push_str(&format!("Median return       {:.2}%\n", mc.median));
    output.push_str(&format!("5th percentile      {:.2}%\n", mc.p5));
    output.push_str(&format!("95th percentile     {:.2}%\n", mc.p95));
    output.push_str(&format!(
        "P(profit)           {:.1}%\n",
        mc.profit_probability_pct
    ));
    output.push_str(&format!("P(ruin)             {:.1}%\n", mc.ruin_probability_pct));

    let peak = mc.histogram.iter().map(|b| b.count).max().unwrap_or(0);
    if peak > 0 {
        output.push('\n');
        for bucket in &mc.histogram {
            let bar = bucket.count * HISTOGRAM_WIDTH / peak;
            output.push_str(&format!(
                "{:>9.2}% .. {:>9.2}% |{:<width$}| {}\n",
                bucket.from,
                bucket.to,
                "#".repeat(bar),
                bucket.count,
                width = HISTOGRAM_WIDTH
            ));
        }
    }
    output
}
