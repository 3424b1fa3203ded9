//! Backtest simulator: a single-pass, bar-by-bar loop over one candle series.
//!
//! Per bar, once every referenced indicator is available:
//! - flat: evaluate entry logic; if true, open long at the close
//! - in position: stop-loss, then take-profit (bar extremes), then exit logic
//!
//! Protective exits are not checked on the entry bar, and no entry is taken on
//! a bar that closed a position. Equity is recorded for every bar.

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::candle::{AuxPoint, Candle, attach_aux, validate_candles};
use crate::domain::error::BlocktraderError;
use crate::domain::indicator::seasonal::EventCalendar;
use crate::domain::indicator::{IndicatorConfig, IndicatorKind, IndicatorSet};
use crate::domain::indicator_helpers::compute_indicators;
use crate::domain::metrics::{Metrics, TRADING_DAYS_PER_YEAR};
use crate::domain::position::{ExitReason, Position, PositionState, Trade};
use crate::domain::rule_eval::{Evaluator, resolve_references};
use crate::domain::strategy::Strategy;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sizing {
    /// Fixed number of units per trade.
    Units(f64),
    /// Fraction of realized equity at entry, converted to units at the entry
    /// price.
    EquityFraction(f64),
}

impl Default for Sizing {
    fn default() -> Self {
        Sizing::Units(1.0)
    }
}

#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub periods_per_year: f64,
    pub risk_free_rate: f64,
    pub sizing: Sizing,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: 10_000.0,
            periods_per_year: TRADING_DAYS_PER_YEAR,
            risk_free_rate: 0.0,
            sizing: Sizing::default(),
        }
    }
}

impl BacktestConfig {
    fn quantity(&self, realized_equity: f64, price: f64) -> f64 {
        match self.sizing {
            Sizing::Units(units) => units,
            Sizing::EquityFraction(fraction) if price > 0.0 => {
                (realized_equity * fraction / price).max(0.0)
            }
            Sizing::EquityFraction(_) => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestResult {
    pub strategy_id: String,
    pub strategy_name: String,
    pub asset: String,
    /// First bar on which the strategy could act.
    pub first_tradable_index: usize,
    pub final_equity: f64,
    pub metrics: Metrics,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

/// Validate the strategy, then check that every event and the auxiliary
/// series it references can be supplied.
pub fn check_sources(
    strategy: &Strategy,
    candles: &[Candle],
    calendar: &EventCalendar,
) -> Result<(), BlocktraderError> {
    strategy.validate()?;
    let has_aux = candles.iter().any(|c| c.aux.is_some());
    for condition in strategy.conditions() {
        for config in condition.indicators() {
            if config.kind == IndicatorKind::Aux && !has_aux {
                return Err(BlocktraderError::MissingAuxSeries {
                    node_id: condition.id.clone(),
                    indicator: config.to_string(),
                });
            }
            if config.kind.uses_event() {
                let event = config.event.as_deref().unwrap_or_default();
                if !calendar.has_event(event) {
                    return Err(BlocktraderError::UnknownEvent {
                        node_id: condition.id.clone(),
                        event: event.to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

/// Index of the first bar on which every config in `configs` is available.
/// Errors when the series is not longer than that warmup.
pub fn first_tradable_index(
    configs: &[IndicatorConfig],
    bars: usize,
) -> Result<usize, BlocktraderError> {
    let limiting = configs.iter().max_by_key(|c| c.warmup());
    let warmup = limiting.map(IndicatorConfig::warmup).unwrap_or(0);
    if bars <= warmup {
        return Err(BlocktraderError::InsufficientData {
            bars,
            minimum: warmup.saturating_add(1),
            indicator: limiting.map_or_else(|| "any strategy".to_string(), ToString::to_string),
        });
    }
    Ok(warmup)
}

/// Full pipeline: validate inputs, compute indicators, simulate.
pub fn run_backtest(
    strategy: &Strategy,
    candles: &[Candle],
    aux: Option<&[AuxPoint]>,
    calendar: &EventCalendar,
    config: &BacktestConfig,
) -> Result<BacktestResult, BlocktraderError> {
    validate_candles(candles)?;
    let mut candles = candles.to_vec();
    if let Some(aux) = aux {
        attach_aux(&mut candles, aux);
    }

    check_sources(strategy, &candles, calendar)?;
    let required = strategy.required_indicators();
    let start = first_tradable_index(&required, candles.len())?;
    let indicators = compute_indicators(&candles, &required, calendar);

    Ok(simulate(strategy, &candles, &indicators, config, start))
}

/// Run against a caller-supplied, already computed indicator set.
pub fn run_backtest_with_indicators(
    strategy: &Strategy,
    candles: &[Candle],
    indicators: &IndicatorSet,
    config: &BacktestConfig,
) -> Result<BacktestResult, BlocktraderError> {
    validate_candles(candles)?;
    strategy.validate()?;
    resolve_references(strategy, indicators)?;
    let start = first_tradable_index(&strategy.required_indicators(), candles.len())?;
    Ok(simulate(strategy, candles, indicators, config, start))
}

/// Compute the union of every strategy's indicators once, for sharing
/// across runs.
pub fn prepare_indicators(
    strategies: &[Strategy],
    candles: &[Candle],
    calendar: &EventCalendar,
) -> Result<IndicatorSet, BlocktraderError> {
    validate_candles(candles)?;
    let mut configs = Vec::new();
    for strategy in strategies {
        check_sources(strategy, candles, calendar)?;
        configs.extend(strategy.required_indicators());
    }
    Ok(compute_indicators(candles, &configs, calendar))
}

/// Run several strategies over one series in parallel. Results keep the
/// order of `strategies`; each run fails or succeeds on its own.
pub fn run_batch(
    strategies: &[Strategy],
    candles: &[Candle],
    indicators: &IndicatorSet,
    config: &BacktestConfig,
) -> Vec<Result<BacktestResult, BlocktraderError>> {
    strategies
        .par_iter()
        .map(|strategy| run_backtest_with_indicators(strategy, candles, indicators, config))
        .collect()
}

fn simulate(
    strategy: &Strategy,
    candles: &[Candle],
    indicators: &IndicatorSet,
    config: &BacktestConfig,
    start: usize,
) -> BacktestResult {
    tracing::info!(
        strategy = %strategy.id,
        bars = candles.len(),
        first_tradable = start,
        "backtest started"
    );

    let mut evaluator = Evaluator::new(indicators);
    let mut state = PositionState::Flat;
    let mut trades: Vec<Trade> = Vec::new();
    let mut realized = 0.0;
    let mut equity_curve = Vec::with_capacity(candles.len());

    for (i, candle) in candles.iter().enumerate() {
        if i >= start {
            match state.position().copied() {
                None => {
                    if evaluator.evaluate_group(&strategy.entry_logic, i) {
                        let quantity =
                            config.quantity(config.initial_capital + realized, candle.close);
                        let position = Position::open(
                            strategy.direction,
                            quantity,
                            candle.close,
                            candle.date,
                            strategy.stop_loss_pct,
                            strategy.take_profit_pct,
                            trades.len(),
                        );
                        if state.enter(position) {
                            trades.push(Trade::opened(&position));
                            tracing::debug!(date = %candle.date, price = candle.close, quantity, "entry");
                        }
                    }
                }
                Some(position) => {
                    // entries happen at the close, so the entry bar never
                    // reaches this arm
                    let exit = position.protective_exit(candle).or_else(|| {
                        evaluator
                            .evaluate_group(&strategy.exit_logic, i)
                            .then_some((ExitReason::Signal, candle.close))
                    });

                    if let Some((reason, price)) = exit {
                        let profit = state.exit().and_then(|closed| {
                            trades[closed.trade_index].finalize(candle.date, price, reason)
                        });
                        if let Some(profit) = profit {
                            realized += profit;
                            tracing::debug!(date = %candle.date, price, ?reason, profit, "exit");
                        }
                    }
                }
            }
        }

        let unrealized = state
            .position()
            .map_or(0.0, |p| p.unrealized_pnl(candle.close));
        equity_curve.push(EquityPoint {
            date: candle.date,
            equity: config.initial_capital + realized + unrealized,
        });
    }

    let metrics = Metrics::compute_with(
        &trades,
        &equity_curve,
        config.initial_capital,
        config.periods_per_year,
        config.risk_free_rate,
    );
    let final_equity = equity_curve
        .last()
        .map_or(config.initial_capital, |p| p.equity);

    tracing::info!(
        strategy = %strategy.id,
        trades = trades.len(),
        final_equity,
        "backtest finished"
    );

    BacktestResult {
        strategy_id: strategy.id.clone(),
        strategy_name: strategy.name.clone(),
        asset: strategy.asset.clone(),
        first_tradable_index: start,
        final_equity,
        metrics,
        trades,
        equity_curve,
    }
}
