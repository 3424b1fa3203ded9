//! Calendar fields and event-relative distances.
//!
//! Everything here derives from the candle date and an `EventCalendar`;
//! none of these series has a warmup.

use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorKind, IndicatorPoint, to_points};

/// Named event dates plus the set of historically favorable months.
/// Event names are matched case-insensitively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventCalendar {
    events: BTreeMap<String, Vec<NaiveDate>>,
    favorable_months: BTreeSet<u32>,
}

impl EventCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_event(&mut self, name: &str, date: NaiveDate) {
        let dates = self.events.entry(normalize(name)).or_default();
        if let Err(pos) = dates.binary_search(&date) {
            dates.insert(pos, date);
        }
    }

    /// Months outside 1..=12 are ignored.
    pub fn set_favorable_months(&mut self, months: impl IntoIterator<Item = u32>) {
        self.favorable_months = months.into_iter().filter(|m| (1..=12).contains(m)).collect();
    }

    pub fn has_event(&self, name: &str) -> bool {
        self.events.contains_key(&normalize(name))
    }

    pub fn event_names(&self) -> impl Iterator<Item = &str> {
        self.events.keys().map(String::as_str)
    }

    pub fn is_favorable_month(&self, month: u32) -> bool {
        self.favorable_months.contains(&month)
    }

    fn dates(&self, name: &str) -> &[NaiveDate] {
        self.events
            .get(&normalize(name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Days until the next occurrence on or after `date`.
    pub fn days_to(&self, name: &str, date: NaiveDate) -> Option<i64> {
        let dates = self.dates(name);
        let idx = dates.partition_point(|d| *d < date);
        dates.get(idx).map(|next| (*next - date).num_days())
    }

    /// Days since the last occurrence on or before `date`.
    pub fn days_from(&self, name: &str, date: NaiveDate) -> Option<i64> {
        let dates = self.dates(name);
        let idx = dates.partition_point(|d| *d <= date);
        idx.checked_sub(1)
            .map(|i| (date - dates[i]).num_days())
    }

    pub fn in_window(&self, name: &str, date: NaiveDate, half_width: usize) -> bool {
        let w = half_width as i64;
        self.days_to(name, date).is_some_and(|d| d <= w)
            || self.days_from(name, date).is_some_and(|d| d <= w)
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

fn flag(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

/// Seasonal series for `kind`. Returns `None` for non-seasonal kinds.
pub fn calculate_seasonal(
    candles: &[Candle],
    kind: IndicatorKind,
    period: usize,
    event: Option<&str>,
    calendar: &EventCalendar,
) -> Option<Vec<IndicatorPoint>> {
    let event = event.unwrap_or_default();
    let value = |date: NaiveDate| -> Option<f64> {
        match kind {
            IndicatorKind::Month => Some(date.month() as f64),
            IndicatorKind::DayOfMonth => Some(date.day() as f64),
            IndicatorKind::DayOfYear => Some(date.ordinal() as f64),
            IndicatorKind::DaysToEvent => calendar.days_to(event, date).map(|d| d as f64),
            IndicatorKind::DaysFromEvent => calendar.days_from(event, date).map(|d| d as f64),
            IndicatorKind::InEventWindow => Some(flag(calendar.in_window(event, date, period))),
            IndicatorKind::FavorableMonth => Some(flag(calendar.is_favorable_month(date.month()))),
            _ => None,
        }
    };

    if !matches!(
        kind,
        IndicatorKind::Month
            | IndicatorKind::DayOfMonth
            | IndicatorKind::DayOfYear
            | IndicatorKind::DaysToEvent
            | IndicatorKind::DaysFromEvent
            | IndicatorKind::InEventWindow
            | IndicatorKind::FavorableMonth
    ) {
        return None;
    }

    let values: Vec<Option<f64>> = candles.iter().map(|c| value(c.date)).collect();
    Some(to_points(candles, &values))
}
