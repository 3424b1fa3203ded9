//! Data access port trait.

use chrono::NaiveDate;

use crate::domain::candle::{AuxPoint, Candle};
use crate::domain::error::BlocktraderError;
use crate::domain::indicator::seasonal::EventCalendar;

pub trait DataPort {
    /// Candles sorted ascending by date, limited to the inclusive bounds.
    fn fetch_candles(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<Candle>, BlocktraderError>;

    /// Auxiliary series; empty when none is configured.
    fn fetch_aux(&self) -> Result<Vec<AuxPoint>, BlocktraderError>;

    /// Event calendar without favorable months, which come from configuration.
    fn fetch_events(&self) -> Result<EventCalendar, BlocktraderError>;
}
