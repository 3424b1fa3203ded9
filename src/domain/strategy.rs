//! Strategy tree: entry and exit condition groups decoded from the visual
//! builder's JSON.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::domain::error::BlocktraderError;
use crate::domain::indicator::IndicatorConfig;
use crate::domain::position::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = "crosses-above")]
    CrossesAbove,
    #[serde(rename = "crosses-below")]
    CrossesBelow,
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Comparator::GreaterThan => ">",
            Comparator::LessThan => "<",
            Comparator::Equal => "=",
            Comparator::CrossesAbove => "crosses-above",
            Comparator::CrossesBelow => "crosses-below",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicOperator {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub id: String,
    pub left: IndicatorConfig,
    pub comparator: Comparator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_indicator: Option<IndicatorConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_value: Option<f64>,
}

/// Right-hand side of a condition: exactly one of an indicator or a literal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RightOperand<'a> {
    Indicator(&'a IndicatorConfig),
    Value(f64),
}

impl Condition {
    pub fn right(&self) -> Result<RightOperand<'_>, BlocktraderError> {
        match (&self.right_indicator, self.right_value) {
            (Some(config), None) => Ok(RightOperand::Indicator(config)),
            (None, Some(value)) if value.is_finite() => Ok(RightOperand::Value(value)),
            (None, Some(value)) => Err(self.invalid(format!("right value {value} is not finite"))),
            (Some(_), Some(_)) => {
                Err(self.invalid("right side has both an indicator and a value".to_string()))
            }
            (None, None) => Err(self.invalid("right side is empty".to_string())),
        }
    }

    fn invalid(&self, reason: String) -> BlocktraderError {
        BlocktraderError::InvalidCondition {
            node_id: self.id.clone(),
            reason,
        }
    }

    /// Indicator configs this condition reads.
    pub fn indicators(&self) -> impl Iterator<Item = &IndicatorConfig> {
        std::iter::once(&self.left).chain(self.right_indicator.as_ref())
    }

    /// Structural checks: one right side, computable configs.
    pub fn validate(&self) -> Result<(), BlocktraderError> {
        self.right()?;
        for config in self.indicators() {
            config
                .check()
                .map_err(|reason| BlocktraderError::InvalidIndicator {
                    node_id: self.id.clone(),
                    indicator: config.to_string(),
                    reason,
                })?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub operator: LogicOperator,
    #[serde(default)]
    pub children: Vec<StrategyNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StrategyNode {
    Condition(Condition),
    Group(Group),
}

impl StrategyNode {
    pub fn id(&self) -> &str {
        match self {
            StrategyNode::Condition(c) => &c.id,
            StrategyNode::Group(g) => &g.id,
        }
    }
}

impl Group {
    pub fn new(id: &str, operator: LogicOperator, children: Vec<StrategyNode>) -> Self {
        Group {
            id: id.to_string(),
            operator,
            children,
        }
    }

    /// Every condition below this group, depth first.
    pub fn conditions(&self) -> Vec<&Condition> {
        let mut out = Vec::new();
        collect_conditions(self, &mut out);
        out
    }

    fn collect_ids<'a>(&'a self, ids: &mut Vec<&'a str>) {
        ids.push(&self.id);
        for child in &self.children {
            match child {
                StrategyNode::Group(g) => g.collect_ids(ids),
                StrategyNode::Condition(_) => ids.push(child.id()),
            }
        }
    }
}

fn collect_conditions<'a>(group: &'a Group, out: &mut Vec<&'a Condition>) {
    for child in &group.children {
        match child {
            StrategyNode::Condition(c) => out.push(c),
            StrategyNode::Group(g) => collect_conditions(g, out),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Strategy {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub asset: String,
    #[serde(default)]
    pub direction: Direction,
    pub entry_logic: Group,
    pub exit_logic: Group,
    /// Percent below entry; 0 disables.
    #[serde(default)]
    pub stop_loss_pct: f64,
    /// Percent above entry; 0 disables.
    #[serde(default)]
    pub take_profit_pct: f64,
}

impl Strategy {
    pub fn from_json(json: &str) -> Result<Self, BlocktraderError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn conditions(&self) -> Vec<&Condition> {
        let mut out = self.entry_logic.conditions();
        out.extend(self.exit_logic.conditions());
        out
    }

    /// Canonical configs referenced anywhere in the tree, deduplicated, in
    /// first-seen order.
    pub fn required_indicators(&self) -> Vec<IndicatorConfig> {
        let mut seen = HashSet::new();
        self.conditions()
            .into_iter()
            .flat_map(Condition::indicators)
            .map(IndicatorConfig::canonical)
            .filter(|c| seen.insert(c.clone()))
            .collect()
    }

    pub fn validate(&self) -> Result<(), BlocktraderError> {
        if self.direction != Direction::Long {
            return Err(BlocktraderError::UnsupportedDirection {
                strategy: self.id.clone(),
                direction: self.direction.to_string(),
            });
        }

        for (key, pct) in [
            ("stopLossPct", self.stop_loss_pct),
            ("takeProfitPct", self.take_profit_pct),
        ] {
            if !pct.is_finite() || pct < 0.0 {
                return Err(BlocktraderError::ConfigInvalid {
                    section: "strategy".into(),
                    key: key.into(),
                    reason: format!("must be a non-negative percentage, got {pct}"),
                });
            }
        }

        let mut ids = Vec::new();
        self.entry_logic.collect_ids(&mut ids);
        self.exit_logic.collect_ids(&mut ids);
        let mut seen = HashSet::new();
        for id in ids {
            if !seen.insert(id) {
                return Err(BlocktraderError::DuplicateNodeId {
                    node_id: id.to_string(),
                });
            }
        }

        for condition in self.conditions() {
            condition.validate()?;
        }
        Ok(())
    }
}
