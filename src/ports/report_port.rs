//! Report generation port trait.

use crate::domain::error::BacktestError;
use crate::domain::job::BacktestReport;
use std::fs;
use std::path::Path;

/// Port for rendering backtest reports.
pub trait ReportPort {
    fn render(&self, report: &BacktestReport) -> String;

    /// Default implementation: writes the rendered report to `output_path`.
    fn write(&self, report: &BacktestReport, output_path: &Path) -> Result<(), BacktestError> {
        fs::write(output_path, self.render(report))?;
        Ok(())
    }
}
