use common::TradeEvent;
use serde::{Deserialize, Serialize};

/// Aggregate result of a single-symbol backtest. Percentages are already
/// scaled to percent, money values are in quote currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSummary {
    pub total_return_pct: f64,
    pub num_trades: u32,
    pub win_rate_pct: f64,
    pub avg_pnl: f64,
    pub sharpe: f64,
    pub max_drawdown_pct: f64,
    pub ending_equity: f64,
}

impl BacktestSummary {
    /// The summary of a run that never traded, including one skipped for
    /// insufficient history.
    pub fn empty(starting_equity: f64) -> Self {
        Self {
            total_return_pct: 0.0,
            num_trades: 0,
            win_rate_pct: 0.0,
            avg_pnl: 0.0,
            sharpe: 0.0,
            max_drawdown_pct: 0.0,
            ending_equity: round2(starting_equity),
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Sample standard deviation (ddof 1). Zero when fewer than two samples.
fn sample_std(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let mean = xs.iter().sum::<f64>() / xs.len() as f64;
    let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (xs.len() - 1) as f64;
    var.sqrt()
}

/// Largest peak-to-trough decline over the closed-trade equity curve, in
/// percent (non-positive).
fn max_drawdown_pct(equity_curve: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst = 0.0f64;
    for &eq in equity_curve {
        peak = peak.max(eq);
        if peak > 0.0 {
            worst = worst.min((eq / peak - 1.0) * 100.0);
        }
    }
    worst
}

/// Fold the trade ledger and closed-trade equity curve into a
/// [`BacktestSummary`]. Trade count is entries; win rate, average P&L and
/// Sharpe are over exit P&Ls (annualized with √252, zero below two exits).
pub fn summarize(
    trades: &[TradeEvent],
    equity_curve: &[f64],
    initial_capital: f64,
    ending_equity: f64,
) -> BacktestSummary {
    if trades.is_empty() {
        return BacktestSummary::empty(ending_equity);
    }

    let num_trades = trades.iter().filter(|t| !t.kind.is_exit()).count() as u32;
    let pnls: Vec<f64> = trades
        .iter()
        .filter(|t| t.kind.is_exit())
        .filter_map(|t| t.pnl)
        .collect();

    let total_return = (ending_equity / initial_capital - 1.0) * 100.0;
    let (win_rate, avg_pnl) = if pnls.is_empty() {
        (0.0, 0.0)
    } else {
        let wins = pnls.iter().filter(|p| **p > 0.0).count() as f64;
        (
            wins / pnls.len() as f64 * 100.0,
            pnls.iter().sum::<f64>() / pnls.len() as f64,
        )
    };
    let sd = sample_std(&pnls);
    let sharpe = if sd > 0.0 {
        avg_pnl / sd * 252.0f64.sqrt()
    } else {
        0.0
    };

    BacktestSummary {
        total_return_pct: round2(total_return),
        num_trades,
        win_rate_pct: round2(win_rate),
        avg_pnl: round2(avg_pnl),
        sharpe: round2(sharpe),
        max_drawdown_pct: round2(max_drawdown_pct(equity_curve)),
        ending_equity: round2(ending_equity),
    }
}
