use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use common::Config;
use data::SyntheticProvider;
use engine::{BacktestConfig, Orchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    let backtest = BacktestConfig::load(&cfg.backtest_config_path).with_context(|| {
        format!("loading backtest config from '{}'", cfg.backtest_config_path)
    })?;
    info!(
        symbols = backtest.symbols.len(),
        path = %cfg.backtest_config_path,
        "DivBot starting"
    );

    // ── History provider ──────────────────────────────────────────────────────
    // Deterministic synthetic tape; a live exchange history client slots in
    // here behind the same trait.
    let provider = Arc::new(SyntheticProvider::new(2024));

    // ── Backtests ─────────────────────────────────────────────────────────────
    let orchestrator = Orchestrator::new(backtest, provider, None)?;
    let reports = orchestrator.run().await?;

    // ── Report ────────────────────────────────────────────────────────────────
    for r in &reports {
        info!(
            symbol = %r.symbol,
            action = ?r.snapshot.action,
            trades = r.summary.num_trades,
            return_pct = r.summary.total_return_pct,
            win_rate_pct = r.summary.win_rate_pct,
            sharpe = r.summary.sharpe,
            max_drawdown_pct = r.summary.max_drawdown_pct,
            ending_equity = r.summary.ending_equity,
            "backtest summary"
        );
        println!("{}", serde_json::to_string_pretty(&r.summary)?);
    }

    Ok(())
}
