#![allow(dead_code)]

use blocktrader::domain::candle::{AuxPoint, Candle};
use blocktrader::domain::error::BlocktraderError;
use blocktrader::domain::indicator::seasonal::EventCalendar;
use blocktrader::domain::indicator::{IndicatorConfig, IndicatorKind};
use blocktrader::domain::strategy::{
    Comparator, Condition, Group, LogicOperator, Strategy, StrategyNode,
};
use blocktrader::ports::data_port::DataPort;
use chrono::NaiveDate;

pub struct MockDataPort {
    pub candles: Vec<Candle>,
    pub aux: Vec<AuxPoint>,
    pub events: Vec<(String, NaiveDate)>,
    pub error: Option<String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            candles: Vec::new(),
            aux: Vec::new(),
            events: Vec::new(),
            error: None,
        }
    }

    pub fn with_candles(mut self, candles: Vec<Candle>) -> Self {
        self.candles = candles;
        self
    }

    pub fn with_aux(mut self, aux: Vec<AuxPoint>) -> Self {
        self.aux = aux;
        self
    }

    pub fn with_event(mut self, name: &str, date: NaiveDate) -> Self {
        self.events.push((name.to_string(), date));
        self
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_candles(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<Candle>, BlocktraderError> {
        if let Some(reason) = &self.error {
            return Err(BlocktraderError::InvalidData {
                reason: reason.clone(),
            });
        }
        Ok(self
            .candles
            .iter()
            .filter(|c| start_date.is_none_or(|s| c.date >= s))
            .filter(|c| end_date.is_none_or(|e| c.date <= e))
            .cloned()
            .collect())
    }

    fn fetch_aux(&self) -> Result<Vec<AuxPoint>, BlocktraderError> {
        Ok(self.aux.clone())
    }

    fn fetch_events(&self) -> Result<EventCalendar, BlocktraderError> {
        let mut calendar = EventCalendar::new();
        for (name, date) in &self.events {
            calendar.add_event(name, *date);
        }
        Ok(calendar)
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn day(offset: usize) -> NaiveDate {
    date("2024-01-01") + chrono::Duration::days(offset as i64)
}

/// Bar whose open, high and low all sit at `close`.
pub fn make_bar(index: usize, close: f64) -> Candle {
    Candle {
        date: day(index),
        open: close,
        high: close,
        low: close,
        close,
        volume: 1000.0,
        aux: None,
    }
}

pub fn make_bars(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(i, c))
        .collect()
}

pub fn make_ohlc(index: usize, open: f64, high: f64, low: f64, close: f64) -> Candle {
    Candle {
        date: day(index),
        open,
        high,
        low,
        close,
        volume: 1000.0,
        aux: None,
    }
}

pub fn close() -> IndicatorConfig {
    IndicatorConfig::field(IndicatorKind::Close)
}

pub fn value_condition(id: &str, left: IndicatorConfig, comparator: Comparator, value: f64) -> StrategyNode {
    StrategyNode::Condition(Condition {
        id: id.to_string(),
        left,
        comparator,
        right_indicator: None,
        right_value: Some(value),
    })
}

pub fn cross_condition(
    id: &str,
    left: IndicatorConfig,
    comparator: Comparator,
    right: IndicatorConfig,
) -> StrategyNode {
    StrategyNode::Condition(Condition {
        id: id.to_string(),
        left,
        comparator,
        right_indicator: Some(right),
        right_value: None,
    })
}

pub fn and(id: &str, children: Vec<StrategyNode>) -> Group {
    Group::new(id, LogicOperator::And, children)
}

pub fn make_strategy(id: &str, entry: Group, exit: Group) -> Strategy {
    Strategy {
        id: id.to_string(),
        name: format!("{id} strategy"),
        asset: "TEST".to_string(),
        direction: Default::default(),
        entry_logic: entry,
        exit_logic: exit,
        stop_loss_pct: 0.0,
        take_profit_pct: 0.0,
    }
}

/// Enters when close > 0, exits when close < 0: buys on the first bar and holds.
pub fn always_in_strategy(id: &str) -> Strategy {
    make_strategy(
        id,
        and(&format!("{id}-entry"), vec![value_condition(&format!("{id}-c1"), close(), Comparator::GreaterThan, 0.0)]),
        and(&format!("{id}-exit"), vec![value_condition(&format!("{id}-c2"), close(), Comparator::LessThan, 0.0)]),
    )
}

pub const STRATEGY_JSON: &str = r#"{
  "id": "sma-cross",
  "name": "SMA crossover",
  "asset": "TEST",
  "entryLogic": {
    "id": "entry",
    "operator": "AND",
    "children": [
      {
        "kind": "condition",
        "id": "c1",
        "left": { "type": "SMA", "period": 3 },
        "comparator": "crosses-above",
        "rightIndicator": { "type": "SMA", "period": 5 }
      }
    ]
  },
  "exitLogic": {
    "id": "exit",
    "operator": "OR",
    "children": [
      {
        "kind": "condition",
        "id": "c2",
        "left": { "type": "SMA", "period": 3 },
        "comparator": "crosses-below",
        "rightIndicator": { "type": "SMA", "period": 5 }
      }
    ]
  },
  "stopLossPct": 20,
  "takeProfitPct": 0
}"#;
