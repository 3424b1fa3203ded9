//! Position state machine and trade records.
//!
//! A run holds at most one position: `Flat` → `Open` → `Flat`. Opening while
//! open and closing while flat are no-ops.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::candle::Candle;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[default]
    Long,
    Short,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    Signal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub direction: Direction,
    pub quantity: f64,
    pub entry_price: f64,
    pub entry_date: NaiveDate,
    /// Absolute stop price.
    pub stop_loss: Option<f64>,
    /// Absolute take-profit price.
    pub take_profit: Option<f64>,
    /// Index of the matching record in the trade log.
    pub trade_index: usize,
}

impl Position {
    /// Protective levels are percentages of the entry price; 0 disables.
    pub fn open(
        direction: Direction,
        quantity: f64,
        entry_price: f64,
        entry_date: NaiveDate,
        stop_loss_pct: f64,
        take_profit_pct: f64,
        trade_index: usize,
    ) -> Self {
        let sign = direction.sign();
        let stop_loss =
            (stop_loss_pct > 0.0).then(|| entry_price * (1.0 - sign * stop_loss_pct / 100.0));
        let take_profit =
            (take_profit_pct > 0.0).then(|| entry_price * (1.0 + sign * take_profit_pct / 100.0));
        Position {
            direction,
            quantity,
            entry_price,
            entry_date,
            stop_loss,
            take_profit,
            trade_index,
        }
    }

    pub fn is_long(&self) -> bool {
        self.direction == Direction::Long
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.direction.sign() * self.quantity * (price - self.entry_price)
    }

    pub fn should_stop_loss(&self, candle: &Candle) -> bool {
        self.stop_loss.is_some_and(|level| {
            if self.is_long() {
                candle.low <= level
            } else {
                candle.high >= level
            }
        })
    }

    pub fn should_take_profit(&self, candle: &Candle) -> bool {
        self.take_profit.is_some_and(|level| {
            if self.is_long() {
                candle.high >= level
            } else {
                candle.low <= level
            }
        })
    }

    /// Stop-loss takes precedence when both levels trade inside one bar.
    /// Fills at the level, or at the open when the bar gaps through it.
    pub fn protective_exit(&self, candle: &Candle) -> Option<(ExitReason, f64)> {
        if let Some(level) = self.stop_loss.filter(|_| self.should_stop_loss(candle)) {
            let fill = if self.is_long() {
                candle.open.min(level)
            } else {
                candle.open.max(level)
            };
            return Some((ExitReason::StopLoss, fill));
        }
        if let Some(level) = self.take_profit.filter(|_| self.should_take_profit(candle)) {
            let fill = if self.is_long() {
                candle.open.max(level)
            } else {
                candle.open.min(level)
            };
            return Some((ExitReason::TakeProfit, fill));
        }
        None
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum PositionState {
    #[default]
    Flat,
    Open(Position),
}

impl PositionState {
    pub fn is_flat(&self) -> bool {
        matches!(self, PositionState::Flat)
    }

    pub fn position(&self) -> Option<&Position> {
        match self {
            PositionState::Open(p) => Some(p),
            PositionState::Flat => None,
        }
    }

    /// Returns false, leaving the state untouched, if a position is open.
    pub fn enter(&mut self, position: Position) -> bool {
        if !self.is_flat() {
            return false;
        }
        *self = PositionState::Open(position);
        true
    }

    /// Returns the closed position, or `None` if already flat.
    pub fn exit(&mut self) -> Option<Position> {
        match std::mem::take(self) {
            PositionState::Open(p) => Some(p),
            PositionState::Flat => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub direction: Direction,
    pub status: TradeStatus,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub quantity: f64,
    pub exit_date: Option<NaiveDate>,
    pub exit_price: Option<f64>,
    pub profit: Option<f64>,
    pub profit_pct: Option<f64>,
    pub exit_reason: Option<ExitReason>,
}

impl Trade {
    pub fn opened(position: &Position) -> Self {
        Trade {
            direction: position.direction,
            status: TradeStatus::Open,
            entry_date: position.entry_date,
            entry_price: position.entry_price,
            quantity: position.quantity,
            exit_date: None,
            exit_price: None,
            profit: None,
            profit_pct: None,
            exit_reason: None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.status == TradeStatus::Closed
    }

    /// Close the trade. A closed trade is never modified again; returns the
    /// realized profit, or `None` if the trade was already closed.
    pub fn finalize(&mut self, date: NaiveDate, price: f64, reason: ExitReason) -> Option<f64> {
        if self.is_closed() {
            return None;
        }
        let sign = self.direction.sign();
        let profit = sign * (price - self.entry_price) * self.quantity;
        self.status = TradeStatus::Closed;
        self.exit_date = Some(date);
        self.exit_price = Some(price);
        self.profit = Some(profit);
        self.profit_pct = Some(sign * (price - self.entry_price) / self.entry_price * 100.0);
        self.exit_reason = Some(reason);
        Some(profit)
    }

    /// Calendar days held, for closed trades.
    pub fn duration_days(&self) -> Option<i64> {
        self.exit_date.map(|exit| (exit - self.entry_date).num_days())
    }
}
