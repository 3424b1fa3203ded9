//! Performance metrics: a pure reduction over trades and the equity curve.

use serde::{Deserialize, Serialize};

use crate::domain::backtest::EquityPoint;
use crate::domain::position::Trade;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub win_rate: f64,
    pub max_drawdown: f64,
    /// Longest run of bars spent below a prior peak.
    pub max_drawdown_duration: usize,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    /// Finalized trades only.
    pub trades_count: usize,
    pub open_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    /// Gross profit / gross loss; `None` (unbounded) with wins and no losses.
    pub profit_factor: Option<f64>,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    /// Calendar days.
    pub avg_trade_duration: f64,
}

#[derive(Debug, Default)]
struct TradeStats {
    won: usize,
    lost: usize,
    breakeven: usize,
    open: usize,
    gross_win: f64,
    gross_loss: f64,
    largest_win: f64,
    largest_loss: f64,
    duration_days: i64,
}

impl TradeStats {
    fn collect(trades: &[Trade]) -> Self {
        let mut stats = TradeStats::default();
        for trade in trades {
            let (Some(profit), Some(days)) = (trade.profit, trade.duration_days()) else {
                stats.open += 1;
                continue;
            };
            if profit > 0.0 {
                stats.won += 1;
                stats.gross_win += profit;
                stats.largest_win = stats.largest_win.max(profit);
            } else if profit < 0.0 {
                stats.lost += 1;
                stats.gross_loss += profit.abs();
                stats.largest_loss = stats.largest_loss.max(profit.abs());
            } else {
                stats.breakeven += 1;
            }
            stats.duration_days += days;
        }
        stats
    }

    fn closed(&self) -> usize {
        self.won + self.lost + self.breakeven
    }
}

fn ratio(num: f64, den: usize) -> f64 {
    if den > 0 { num / den as f64 } else { 0.0 }
}

impl Metrics {
    /// Daily bars, zero risk-free rate.
    pub fn compute(trades: &[Trade], equity_curve: &[EquityPoint], initial_capital: f64) -> Self {
        Self::compute_with(trades, equity_curve, initial_capital, TRADING_DAYS_PER_YEAR, 0.0)
    }

    /// `risk_free_rate` is annual; it is spread evenly over `periods_per_year`.
    pub fn compute_with(
        trades: &[Trade],
        equity_curve: &[EquityPoint],
        initial_capital: f64,
        periods_per_year: f64,
        risk_free_rate: f64,
    ) -> Self {
        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_capital);

        let total_return = if initial_capital > 0.0 {
            (final_equity - initial_capital) / initial_capital
        } else {
            0.0
        };

        let years = equity_curve.len() as f64 / periods_per_year;
        let annualized_return = if years > 0.0 && total_return > -1.0 && total_return.is_finite() {
            (1.0 + total_return).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(equity_curve);
        let (sharpe_ratio, sortino_ratio) =
            compute_risk_adjusted(equity_curve, periods_per_year, risk_free_rate / periods_per_year);

        let stats = TradeStats::collect(trades);
        let closed = stats.closed();

        let profit_factor = if stats.gross_loss > 0.0 {
            Some(stats.gross_win / stats.gross_loss)
        } else if stats.gross_win > 0.0 {
            None
        } else {
            Some(0.0)
        };

        Metrics {
            total_return,
            annualized_return,
            win_rate: ratio(stats.won as f64, closed),
            max_drawdown,
            max_drawdown_duration,
            sharpe_ratio,
            sortino_ratio,
            trades_count: closed,
            open_trades: stats.open,
            trades_won: stats.won,
            trades_lost: stats.lost,
            trades_breakeven: stats.breakeven,
            profit_factor,
            avg_win: ratio(stats.gross_win, stats.won),
            avg_loss: ratio(stats.gross_loss, stats.lost),
            largest_win: stats.largest_win,
            largest_loss: stats.largest_loss,
            avg_trade_duration: ratio(stats.duration_days as f64, closed),
        }
    }
}

/// (max drawdown as a fraction of the running peak, longest drawdown in bars)
pub fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, usize) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    let mut max_duration = 0usize;
    let mut duration = 0usize;

    for point in equity_curve {
        if point.equity >= peak {
            peak = point.equity;
            duration = 0;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - point.equity) / peak);
            duration += 1;
            max_duration = max_duration.max(duration);
        }
    }

    (max_dd.min(1.0), max_duration)
}

/// Period-over-period percentage changes.
pub fn period_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            if prev > 0.0 {
                (w[1].equity - prev) / prev
            } else {
                0.0
            }
        })
        .collect()
}

/// (sharpe, sortino), both annualized with population standard deviations.
fn compute_risk_adjusted(
    equity_curve: &[EquityPoint],
    periods_per_year: f64,
    period_rf: f64,
) -> (f64, f64) {
    let returns = period_returns(equity_curve);
    if returns.is_empty() {
        return (0.0, 0.0);
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let stddev = (returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n).sqrt();
    let excess = mean - period_rf;
    let annualize = periods_per_year.sqrt();

    let sharpe = if stddev > 0.0 {
        excess / stddev * annualize
    } else {
        0.0
    };

    let downside = (returns
        .iter()
        .filter(|&&r| r < period_rf)
        .map(|&r| (r - period_rf).powi(2))
        .sum::<f64>()
        / n)
        .sqrt();

    let sortino = if downside > 0.0 {
        excess / downside * annualize
    } else {
        0.0
    };

    (sharpe, sortino)
}
