//! Candle (OHLCV bar) representation and series checks.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::error::BlocktraderError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Auxiliary per-date value such as an FX rate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aux: Option<f64>,
}

/// One point of an externally supplied auxiliary series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AuxPoint {
    pub date: NaiveDate,
    pub value: f64,
}

impl Candle {
    /// (high + low) / 2
    pub fn median_price(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

/// Candles must be strictly ascending by date. Gaps are fine.
pub fn validate_candles(candles: &[Candle]) -> Result<(), BlocktraderError> {
    for pair in candles.windows(2) {
        if pair[1].date == pair[0].date {
            return Err(BlocktraderError::InvalidData {
                reason: format!("duplicate candle date {}", pair[1].date),
            });
        }
        if pair[1].date < pair[0].date {
            return Err(BlocktraderError::InvalidData {
                reason: format!(
                    "candles out of order: {} follows {}",
                    pair[1].date, pair[0].date
                ),
            });
        }
    }
    Ok(())
}

/// Align an auxiliary series onto candles by date. A matching point overrides
/// any value already on the candle; candles without one keep theirs. Aux
/// points with no candle are dropped.
///
/// Returns the number of aux points that were attached.
pub fn attach_aux(candles: &mut [Candle], aux: &[AuxPoint]) -> usize {
    let by_date: HashMap<NaiveDate, f64> = aux.iter().map(|p| (p.date, p.value)).collect();
    let mut attached = 0;
    for candle in candles.iter_mut() {
        if let Some(value) = by_date.get(&candle.date) {
            candle.aux = Some(*value);
            attached += 1;
        }
    }
    if attached < aux.len() {
        tracing::warn!(
            dropped = aux.len() - attached,
            "auxiliary points without a matching candle were ignored"
        );
    }
    attached
}
