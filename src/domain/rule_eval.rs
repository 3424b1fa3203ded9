//! Condition evaluation against candles and a computed `IndicatorSet`.
//!
//! # Evaluation Semantics
//!
//! - Comparisons read both sides at the given bar; an unavailable side makes
//!   the condition false
//! - `=` holds when |left - right| < 1e-9
//! - `crosses-above`/`crosses-below` compare the previous and current bar and
//!   are `false` at index 0
//! - `AND`/`OR` evaluate every child, then fold; an empty `AND` is true and an
//!   empty `OR` is false
//! - Node results are memoized per bar by node id

use std::collections::HashMap;

use crate::domain::error::BlocktraderError;
use crate::domain::indicator::{IndicatorConfig, IndicatorSet};
use crate::domain::strategy::{
    Comparator, Condition, Group, LogicOperator, RightOperand, Strategy, StrategyNode,
};

const EPSILON: f64 = 1e-9;

fn resolve(
    right: RightOperand<'_>,
    indicators: &IndicatorSet,
    bar_index: usize,
) -> Option<f64> {
    match right {
        RightOperand::Indicator(config) => indicators.value_at(config, bar_index),
        RightOperand::Value(v) => Some(v),
    }
}

fn sides(condition: &Condition, indicators: &IndicatorSet, bar_index: usize) -> Option<(f64, f64)> {
    let right = condition.right().ok()?;
    let left = indicators.value_at(&condition.left, bar_index)?;
    Some((left, resolve(right, indicators, bar_index)?))
}

/// Evaluate a single condition. Never panics on out-of-range indices or
/// malformed conditions; both read as false.
pub fn evaluate_condition(condition: &Condition, indicators: &IndicatorSet, bar_index: usize) -> bool {
    let Some((left, right)) = sides(condition, indicators, bar_index) else {
        return false;
    };
    match condition.comparator {
        Comparator::GreaterThan => left > right,
        Comparator::LessThan => left < right,
        Comparator::Equal => (left - right).abs() < EPSILON,
        Comparator::CrossesAbove | Comparator::CrossesBelow => {
            if bar_index == 0 {
                return false;
            }
            let Some((left_prev, right_prev)) = sides(condition, indicators, bar_index - 1) else {
                return false;
            };
            if condition.comparator == Comparator::CrossesAbove {
                left_prev <= right_prev && left > right
            } else {
                left_prev >= right_prev && left < right
            }
        }
    }
}

/// Stateless evaluation of a node.
pub fn evaluate(node: &StrategyNode, indicators: &IndicatorSet, bar_index: usize) -> bool {
    match node {
        StrategyNode::Condition(c) => evaluate_condition(c, indicators, bar_index),
        StrategyNode::Group(g) => evaluate_group(g, indicators, bar_index),
    }
}

pub fn evaluate_group(group: &Group, indicators: &IndicatorSet, bar_index: usize) -> bool {
    let results: Vec<bool> = group
        .children
        .iter()
        .map(|child| evaluate(child, indicators, bar_index))
        .collect();
    fold(group.operator, &results)
}

fn fold(operator: LogicOperator, results: &[bool]) -> bool {
    match operator {
        LogicOperator::And => results.iter().all(|&r| r),
        LogicOperator::Or => results.iter().any(|&r| r),
    }
}

/// Evaluator with a per-bar memo keyed by node id. The memo is cleared
/// whenever the bar index changes.
pub struct Evaluator<'a> {
    indicators: &'a IndicatorSet,
    memo: HashMap<&'a str, bool>,
    bar: Option<usize>,
}

impl<'a> Evaluator<'a> {
    pub fn new(indicators: &'a IndicatorSet) -> Self {
        Evaluator {
            indicators,
            memo: HashMap::new(),
            bar: None,
        }
    }

    fn refresh(&mut self, bar_index: usize) {
        if self.bar != Some(bar_index) {
            self.memo.clear();
            self.bar = Some(bar_index);
        }
    }

    pub fn evaluate_group(&mut self, group: &'a Group, bar_index: usize) -> bool {
        self.refresh(bar_index);
        if let Some(&hit) = self.memo.get(group.id.as_str()) {
            return hit;
        }
        let results: Vec<bool> = group
            .children
            .iter()
            .map(|child| self.evaluate(child, bar_index))
            .collect();
        let result = fold(group.operator, &results);
        self.memo.insert(&group.id, result);
        result
    }

    pub fn evaluate(&mut self, node: &'a StrategyNode, bar_index: usize) -> bool {
        match node {
            StrategyNode::Group(g) => self.evaluate_group(g, bar_index),
            StrategyNode::Condition(c) => {
                self.refresh(bar_index);
                if let Some(&hit) = self.memo.get(c.id.as_str()) {
                    return hit;
                }
                let result = evaluate_condition(c, self.indicators, bar_index);
                self.memo.insert(&c.id, result);
                result
            }
        }
    }

    pub fn memo_len(&self) -> usize {
        self.memo.len()
    }
}

/// Every config the strategy reads must be present in `indicators`.
pub fn resolve_references(strategy: &Strategy, indicators: &IndicatorSet) -> Result<(), BlocktraderError> {
    for condition in strategy.conditions() {
        if let Some(missing) = condition
            .indicators()
            .find(|config| !indicators.contains(config))
        {
            return Err(unknown(&condition.id, missing));
        }
    }
    Ok(())
}

fn unknown(node_id: &str, config: &IndicatorConfig) -> BlocktraderError {
    BlocktraderError::UnknownIndicator {
        node_id: node_id.to_string(),
        indicator: config.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::{IndicatorKind, IndicatorPoint, IndicatorSeries};
    use chrono::NaiveDate;

    fn close() -> IndicatorConfig {
        IndicatorConfig::field(IndicatorKind::Close)
    }

    fn sma() -> IndicatorConfig {
        IndicatorConfig::new(IndicatorKind::Sma, 2)
    }

    fn series(config: IndicatorConfig, values: &[Option<f64>]) -> IndicatorSeries {
        IndicatorSeries {
            config,
            values: values
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    let date = NaiveDate::from_ymd_opt(2024, 1, (i + 1) as u32).unwrap();
                    match v {
                        Some(v) => IndicatorPoint::available(date, *v),
                        None => IndicatorPoint::unavailable(date),
                    }
                })
                .collect(),
        }
    }

    fn sample_set() -> IndicatorSet {
        let mut set = IndicatorSet::new();
        set.insert(series(close(), &[Some(10.0), Some(9.0), Some(12.0), Some(8.0), Some(8.0)]));
        set.insert(series(sma(), &[None, Some(10.0), Some(10.0), Some(10.0), Some(8.0)]));
        set
    }

    fn cond(id: &str, comparator: Comparator, right: Option<IndicatorConfig>, value: Option<f64>) -> Condition {
        Condition {
            id: id.into(),
            left: close(),
            comparator,
            right_indicator: right,
            right_value: value,
        }
    }

    #[test]
    fn comparisons_against_values() {
        let set = sample_set();
        assert!(evaluate_condition(&cond("a", Comparator::GreaterThan, None, Some(9.5)), &set, 0));
        assert!(evaluate_condition(&cond("b", Comparator::LessThan, None, Some(9.5)), &set, 1));
        assert!(evaluate_condition(&cond("c", Comparator::Equal, None, Some(12.0 + 1e-12)), &set, 2));
        assert!(!evaluate_condition(&cond("d", Comparator::Equal, None, Some(12.001)), &set, 2));
    }

    #[test]
    fn unavailable_side_is_false() {
        let set = sample_set();
        let c = cond("a", Comparator::LessThan, Some(sma()), None);
        assert!(!evaluate_condition(&c, &set, 0));
        let c = cond("b", Comparator::GreaterThan, Some(sma()), None);
        assert!(!evaluate_condition(&c, &set, 0));
    }

    #[test]
    fn out_of_range_is_false() {
        let set = sample_set();
        assert!(!evaluate_condition(&cond("a", Comparator::GreaterThan, None, Some(0.0)), &set, 99));
    }

    #[test]
    fn malformed_condition_is_false() {
        let set = sample_set();
        let c = cond("a", Comparator::GreaterThan, Some(sma()), Some(1.0));
        assert!(!evaluate_condition(&c, &set, 2));
    }

    #[test]
    fn crosses_above() {
        let set = sample_set();
        let c = cond("x", Comparator::CrossesAbove, Some(sma()), None);
        assert!(!evaluate_condition(&c, &set, 0));
        // bar 1 prev sma unavailable
        assert!(!evaluate_condition(&c, &set, 1));
        // 9 <= 10 and 12 > 10
        assert!(evaluate_condition(&c, &set, 2));
        assert!(!evaluate_condition(&c, &set, 3));
    }

    #[test]
    fn crosses_below() {
        let set = sample_set();
        let c = cond("x", Comparator::CrossesBelow, Some(sma()), None);
        assert!(!evaluate_condition(&c, &set, 2));
        assert!(evaluate_condition(&c, &set, 3));
        // 8 >= 10 is false at bar 3 → no cross at bar 4
        assert!(!evaluate_condition(&c, &set, 4));
    }

    #[test]
    fn cross_from_equality() {
        let mut set = IndicatorSet::new();
        set.insert(series(close(), &[Some(10.0), Some(11.0)]));
        let c = cond("x", Comparator::CrossesAbove, None, Some(10.0));
        assert!(evaluate_condition(&c, &set, 1));
    }

    #[test]
    fn cross_at_index_0_is_false() {
        let set = sample_set();
        let c = cond("x", Comparator::CrossesBelow, None, Some(100.0));
        assert!(!evaluate_condition(&c, &set, 0));
    }

    #[test]
    fn empty_groups() {
        let set = sample_set();
        assert!(evaluate_group(&Group::new("g", LogicOperator::And, vec![]), &set, 0));
        assert!(!evaluate_group(&Group::new("g", LogicOperator::Or, vec![]), &set, 0));
    }

    #[test]
    fn nested_groups() {
        let set = sample_set();
        let inner = Group::new(
            "inner",
            LogicOperator::Or,
            vec![
                StrategyNode::Condition(cond("a", Comparator::GreaterThan, None, Some(100.0))),
                StrategyNode::Condition(cond("b", Comparator::LessThan, None, Some(100.0))),
            ],
        );
        let outer = Group::new(
            "outer",
            LogicOperator::And,
            vec![
                StrategyNode::Group(inner),
                StrategyNode::Condition(cond("c", Comparator::GreaterThan, Some(sma()), None)),
            ],
        );
        assert!(evaluate_group(&outer, &set, 2));
        assert!(!evaluate_group(&outer, &set, 3));
    }

    #[test]
    fn memo_matches_stateless_and_resets_per_bar() {
        let set = sample_set();
        let group = Group::new(
            "g",
            LogicOperator::And,
            vec![
                StrategyNode::Condition(cond("a", Comparator::GreaterThan, Some(sma()), None)),
                StrategyNode::Condition(cond("b", Comparator::LessThan, None, Some(20.0))),
            ],
        );
        let mut evaluator = Evaluator::new(&set);
        for bar in 0..5 {
            assert_eq!(evaluator.evaluate_group(&group, bar), evaluate_group(&group, &set, bar));
            assert_eq!(evaluator.evaluate_group(&group, bar), evaluate_group(&group, &set, bar));
            assert_eq!(evaluator.memo_len(), 3);
        }
    }

    #[test]
    fn missing_reference_is_unknown_indicator() {
        let set = sample_set();
        let strategy = Strategy {
            id: "s".into(),
            name: "s".into(),
            asset: String::new(),
            direction: Default::default(),
            entry_logic: Group::new(
                "e",
                LogicOperator::And,
                vec![StrategyNode::Condition(cond(
                    "c9",
                    Comparator::GreaterThan,
                    Some(IndicatorConfig::new(IndicatorKind::Ema, 50)),
                    None,
                ))],
            ),
            exit_logic: Group::new("x", LogicOperator::Or, vec![]),
            stop_loss_pct: 0.0,
            take_profit_pct: 0.0,
        };
        let err = resolve_references(&strategy, &set).unwrap_err();
        assert!(matches!(err, BlocktraderError::UnknownIndicator { ref node_id, .. } if node_id == "c9"));
    }
}
