//! JSON report adapter implementing ReportPort.
//!
//! One result renders as an object, several as an array in run order.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::BlocktraderError;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonReportAdapter {
    pub pretty: bool,
}

impl JsonReportAdapter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn encode<T: serde::Serialize>(&self, value: &T) -> Result<String, BlocktraderError> {
        let json = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        Ok(json)
    }
}

impl ReportPort for JsonReportAdapter {
    fn render(&self, results: &[BacktestResult]) -> Result<String, BlocktraderError> {
        match results {
            [single] => self.encode(single),
            many => self.encode(&many),
        }
    }
}
