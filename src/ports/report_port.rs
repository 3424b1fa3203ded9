//! Report generation port trait.

use std::fs;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::BlocktraderError;

/// Port for rendering and writing backtest results.
pub trait ReportPort {
    fn render(&self, results: &[BacktestResult]) -> Result<String, BlocktraderError>;

    fn write(&self, results: &[BacktestResult], output_path: &str) -> Result<(), BlocktraderError> {
        fs::write(output_path, self.render(results)?)?;
        Ok(())
    }
}
