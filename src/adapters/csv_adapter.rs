//! CSV file data adapter.
//!
//! - candles: `date,open,high,low,close,volume[,aux]`
//! - auxiliary series: `date,value`
//! - event calendar: `event,date`
//!
//! Every file has a header row; dates are `YYYY-MM-DD`.

use chrono::NaiveDate;
use csv::StringRecord;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::domain::candle::{AuxPoint, Candle, validate_candles};
use crate::domain::error::BlocktraderError;
use crate::domain::indicator::seasonal::EventCalendar;
use crate::ports::data_port::DataPort;

pub struct CsvAdapter {
    candles_path: PathBuf,
    aux_path: Option<PathBuf>,
    events_path: Option<PathBuf>,
}

impl CsvAdapter {
    pub fn new(candles_path: PathBuf) -> Self {
        Self {
            candles_path,
            aux_path: None,
            events_path: None,
        }
    }

    pub fn with_aux(mut self, path: Option<PathBuf>) -> Self {
        self.aux_path = path;
        self
    }

    pub fn with_events(mut self, path: Option<PathBuf>) -> Self {
        self.events_path = path;
        self
    }
}

fn bad_row(path: &Path, row: usize, reason: String) -> BlocktraderError {
    BlocktraderError::InvalidData {
        reason: format!("{} row {}: {}", path.display(), row, reason),
    }
}

fn read_records(path: &Path) -> Result<Vec<StringRecord>, BlocktraderError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|e| match e.into_kind() {
            csv::ErrorKind::Io(io) => BlocktraderError::Io(io),
            other => BlocktraderError::InvalidData {
                reason: format!("{}: {:?}", path.display(), other),
            },
        })?;

    rdr.records()
        .enumerate()
        .map(|(i, r)| r.map_err(|e| bad_row(path, i + 1, e.to_string())))
        .collect()
}

fn column<'a>(
    record: &'a StringRecord,
    idx: usize,
    name: &str,
    path: &Path,
    row: usize,
) -> Result<&'a str, BlocktraderError> {
    record
        .get(idx)
        .ok_or_else(|| bad_row(path, row, format!("missing {name} column")))
}

fn parse<T: FromStr>(
    record: &StringRecord,
    idx: usize,
    name: &str,
    path: &Path,
    row: usize,
) -> Result<T, BlocktraderError>
where
    T::Err: std::fmt::Display,
{
    column(record, idx, name, path, row)?
        .parse()
        .map_err(|e| bad_row(path, row, format!("invalid {name} value: {e}")))
}

fn parse_date(
    record: &StringRecord,
    idx: usize,
    path: &Path,
    row: usize,
) -> Result<NaiveDate, BlocktraderError> {
    let s = column(record, idx, "date", path, row)?;
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| bad_row(path, row, format!("invalid date '{s}': {e}")))
}

impl DataPort for CsvAdapter {
    fn fetch_candles(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<Candle>, BlocktraderError> {
        let path = self.candles_path.as_path();
        let mut candles = Vec::new();

        for (i, record) in read_records(path)?.iter().enumerate() {
            let row = i + 1;
            let date = parse_date(record, 0, path, row)?;
            if start_date.is_some_and(|s| date < s) || end_date.is_some_and(|e| date > e) {
                continue;
            }
            let aux = match record.get(6) {
                Some(s) if !s.is_empty() => Some(parse(record, 6, "aux", path, row)?),
                _ => None,
            };
            candles.push(Candle {
                date,
                open: parse(record, 1, "open", path, row)?,
                high: parse(record, 2, "high", path, row)?,
                low: parse(record, 3, "low", path, row)?,
                close: parse(record, 4, "close", path, row)?,
                volume: parse(record, 5, "volume", path, row)?,
                aux,
            });
        }

        candles.sort_by_key(|c| c.date);
        validate_candles(&candles)?;
        tracing::info!(path = %path.display(), bars = candles.len(), "loaded candles");
        Ok(candles)
    }

    fn fetch_aux(&self) -> Result<Vec<AuxPoint>, BlocktraderError> {
        let Some(path) = self.aux_path.as_deref() else {
            return Ok(Vec::new());
        };
        let mut points = read_records(path)?
            .iter()
            .enumerate()
            .map(|(i, record)| {
                Ok(AuxPoint {
                    date: parse_date(record, 0, path, i + 1)?,
                    value: parse(record, 1, "value", path, i + 1)?,
                })
            })
            .collect::<Result<Vec<_>, BlocktraderError>>()?;
        points.sort_by_key(|p| p.date);
        tracing::debug!(path = %path.display(), points = points.len(), "loaded auxiliary series");
        Ok(points)
    }

    fn fetch_events(&self) -> Result<EventCalendar, BlocktraderError> {
        let mut calendar = EventCalendar::new();
        let Some(path) = self.events_path.as_deref() else {
            return Ok(calendar);
        };
        for (i, record) in read_records(path)?.iter().enumerate() {
            let name = column(record, 0, "event", path, i + 1)?;
            if name.is_empty() {
                return Err(bad_row(path, i + 1, "empty event name".into()));
            }
            calendar.add_event(name, parse_date(record, 1, path, i + 1)?);
        }
        tracing::debug!(
            path = %path.display(),
            events = calendar.event_names().count(),
            "loaded event calendar"
        );
        Ok(calendar)
    }
}
