use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use common::{
    round_step, Error, HistoryProvider, InstrumentInfo, Ohlcv, Result, SignalScorer, Timeframe,
    TradeEvent, TradeKind,
};
use data::resample;
use risk::{percent_of_equity, summarize, BacktestSummary};
use serde::{Deserialize, Serialize};
use signals::{
    bb_squeeze, bear_divergence, bull_divergence, fill_nan, htf_bias, mid_chop, rsi_wilder,
    shift, valuewhen,
};
use tracing::{info, warn};

use crate::executor::{BarExecutor, BarSnapshot, ExecutorParams};
use crate::gate::{ffill_to_fine, gate_series, GateParams};
use crate::hedge::{HedgeEngine, HedgeParams};
use crate::long::{LongEngine, LongParams};
use crate::short::{ShortEngine, ShortParams};
use crate::snapshot::SignalSnapshot;

/// Symbols with fewer raw bars than this are skipped with an empty summary.
const MIN_RAW_BARS: usize = 400;
/// The streaming pipeline additionally requires this many fine bars.
const MIN_FINE_BARS: usize = 500;

/// Top-level backtest config file (TOML).
///
/// Example `config/backtest.toml`:
/// ```toml
/// symbols = ["BTCUSDT", "ETHUSDT"]
/// raw_timeframe = "1h"
/// fine_timeframe = "1h"
/// history_days = 120
///
/// [engine]
/// kind = "long"
/// rsi_length = 14
/// pct_stop = 0.018
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct BacktestConfig {
    pub symbols: Vec<String>,
    #[serde(default = "default_timeframe")]
    pub raw_timeframe: Timeframe,
    #[serde(default = "default_timeframe")]
    pub fine_timeframe: Timeframe,
    #[serde(default = "default_history_days")]
    pub history_days: i64,
    pub engine: EngineConfig,
}

fn default_timeframe() -> Timeframe {
    Timeframe::H1
}

fn default_history_days() -> i64 {
    120
}

impl BacktestConfig {
    /// Load from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("backtest config: {e}")))
    }
}

/// Which state machine drives a run, with its parameter block.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EngineConfig {
    Long(LongParams),
    Short(ShortParams),
    Hedge(HedgeParams),
    Stream(StreamParams),
}

impl EngineConfig {
    fn starting_capital(&self) -> f64 {
        match self {
            EngineConfig::Long(p) => p.initial_capital,
            EngineConfig::Short(p) => p.initial_capital,
            EngineConfig::Hedge(p) => p.initial_capital,
            EngineConfig::Stream(p) => p.initial_capital,
        }
    }
}

/// Parameters of the streaming pipeline: divergence detection on the fine
/// frame, regime filters on resampled coarse frames, risk-per-unit sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamParams {
    pub executor: ExecutorParams,
    pub rsi_length: usize,
    pub lookback_left: usize,
    pub lookback_right: usize,
    pub range_lower: usize,
    pub range_upper: usize,
    pub pct_stop: f64,
    pub base_risk_pct: f64,
    pub initial_capital: f64,
    pub enable_htf_gate: bool,
    pub gate: GateParams,
    pub squeeze_period: usize,
    pub squeeze_k: f64,
    pub chop_len: usize,
    pub ema_short: usize,
    pub ema_long: usize,
}

impl Default for StreamParams {
    fn default() -> Self {
        Self {
            executor: ExecutorParams::default(),
            rsi_length: 14,
            lookback_left: 5,
            lookback_right: 5,
            range_lower: 5,
            range_upper: 60,
            pct_stop: 0.018,
            base_risk_pct: 0.01,
            initial_capital: 10_000.0,
            enable_htf_gate: false,
            gate: GateParams::default(),
            squeeze_period: 20,
            squeeze_k: 2.0,
            chop_len: 14,
            ema_short: 20,
            ema_long: 50,
        }
    }
}

impl StreamParams {
    pub fn validate(&self) -> Result<()> {
        if self.rsi_length == 0 || self.squeeze_period == 0 || self.chop_len == 0 {
            return Err(Error::Config("zero indicator length".into()));
        }
        if self.range_lower > self.range_upper {
            return Err(Error::Config("range_lower exceeds range_upper".into()));
        }
        if !(0.0..1.0).contains(&self.pct_stop) {
            return Err(Error::Config(format!("pct_stop {} out of [0,1)", self.pct_stop)));
        }
        if !(0.0..=1.0).contains(&self.base_risk_pct) {
            return Err(Error::Config(format!(
                "base_risk_pct {} out of [0,1]",
                self.base_risk_pct
            )));
        }
        if self.initial_capital <= 0.0 {
            return Err(Error::Config("non-positive capital".into()));
        }
        Ok(())
    }
}

/// Result of one symbol's run.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolReport {
    pub symbol: String,
    pub summary: BacktestSummary,
    pub trades: Vec<TradeEvent>,
    pub snapshot: SignalSnapshot,
}

/// Fans one backtest task out per configured symbol. Symbols share nothing
/// but the provider handle, so a failed symbol never poisons the others.
pub struct Orchestrator {
    cfg: BacktestConfig,
    provider: Arc<dyn HistoryProvider>,
    scorer: Option<Arc<dyn SignalScorer>>,
}

impl Orchestrator {
    pub fn new(
        cfg: BacktestConfig,
        provider: Arc<dyn HistoryProvider>,
        scorer: Option<Arc<dyn SignalScorer>>,
    ) -> Result<Self> {
        if cfg.symbols.is_empty() {
            return Err(Error::Config("no symbols configured".into()));
        }
        if cfg.fine_timeframe.seconds() < cfg.raw_timeframe.seconds() {
            return Err(Error::Config(format!(
                "fine timeframe {} finer than raw feed {}",
                cfg.fine_timeframe, cfg.raw_timeframe
            )));
        }
        if let EngineConfig::Stream(p) = &cfg.engine {
            p.validate()?;
        }
        Ok(Self { cfg, provider, scorer })
    }

    /// Run every symbol to completion and collect the reports. Reports come
    /// back in configuration order; a symbol that fails or panics is logged
    /// and dropped.
    pub async fn run(&self) -> Result<Vec<SymbolReport>> {
        let end = Utc::now();
        let start = end - Duration::days(self.cfg.history_days);

        let mut handles = Vec::new();
        for symbol in &self.cfg.symbols {
            let cfg = self.cfg.clone();
            let provider = self.provider.clone();
            let scorer = self.scorer.clone();
            let symbol = symbol.clone();
            handles.push(tokio::spawn(async move {
                run_symbol(&cfg, provider, scorer, &symbol, start, end).await
            }));
        }

        let mut reports = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(Ok(report)) => reports.push(report),
                Ok(Err(e)) => warn!(error = %e, "symbol backtest failed"),
                Err(e) => warn!(error = %e, "symbol task panicked"),
            }
        }
        Ok(reports)
    }
}

async fn run_symbol(
    cfg: &BacktestConfig,
    provider: Arc<dyn HistoryProvider>,
    scorer: Option<Arc<dyn SignalScorer>>,
    symbol: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<SymbolReport> {
    let raw = provider
        .get_history(symbol, cfg.raw_timeframe, start, end)
        .await?;
    if raw.len() < MIN_RAW_BARS {
        info!(symbol, bars = raw.len(), "insufficient raw history, skipping");
        let summary = BacktestSummary::empty(cfg.engine.starting_capital());
        let snapshot = SignalSnapshot::build(symbol, &raw, summary.clone(), &[]);
        return Ok(SymbolReport {
            symbol: symbol.to_string(),
            summary,
            trades: Vec::new(),
            snapshot,
        });
    }

    let fine = if cfg.fine_timeframe == cfg.raw_timeframe {
        raw
    } else {
        resample(&raw, cfg.fine_timeframe)
    };

    let (summary, trades) = match &cfg.engine {
        EngineConfig::Long(p) => LongEngine::new(p.clone())?.backtest(symbol, &fine),
        EngineConfig::Short(p) => ShortEngine::new(p.clone())?.backtest(symbol, &fine),
        EngineConfig::Hedge(p) => {
            let report = HedgeEngine::new(p.clone())?.backtest(symbol, &fine);
            (report.summary, report.trades)
        }
        EngineConfig::Stream(p) => run_stream(symbol, &fine, cfg.fine_timeframe, p, scorer),
    };

    info!(
        symbol,
        trades = summary.num_trades,
        return_pct = summary.total_return_pct,
        "backtest complete"
    );
    let snapshot = SignalSnapshot::build(symbol, &fine, summary.clone(), &trades);
    Ok(SymbolReport {
        symbol: symbol.to_string(),
        summary,
        trades,
        snapshot,
    })
}

/// Prefix of a coarse frame holding only buckets fully closed at the fine
/// bar labeled `ts`. A bucket labeled `b` spans `[b, b + tf)`; its last
/// fine bar is the one labeled `b + tf - fine_step`.
fn closed_prefix(coarse: &Ohlcv, tf: Timeframe, ts: DateTime<Utc>, fine_secs: i64) -> Ohlcv {
    coarse.up_to(ts + Duration::seconds(fine_secs - tf.seconds()))
}

/// Drive the streaming executor over one fine frame. Indicator and
/// divergence series are precomputed once; the coarse filter frames are
/// resampled once and cut per bar to their closed buckets, so every bar
/// sees exactly the history that was closed at its timestamp.
fn run_stream(
    symbol: &str,
    fine: &Ohlcv,
    fine_tf: Timeframe,
    p: &StreamParams,
    scorer: Option<Arc<dyn SignalScorer>>,
) -> (BacktestSummary, Vec<TradeEvent>) {
    if fine.len() < MIN_FINE_BARS {
        info!(symbol, bars = fine.len(), "insufficient fine history, skipping");
        return (BacktestSummary::empty(p.initial_capital), Vec::new());
    }

    let info = InstrumentInfo::for_symbol(symbol);
    let rsi = fill_nan(&rsi_wilder(&fine.close, p.rsi_length), 50.0);
    let bull = bull_divergence(
        &rsi,
        &fine.low,
        p.lookback_left,
        p.lookback_right,
        p.range_lower,
        p.range_upper,
    );
    let bear = bear_divergence(
        &rsi,
        &fine.high,
        p.lookback_left,
        p.lookback_right,
        p.range_lower,
        p.range_upper,
    );
    let wave_low = valuewhen(&bull, &shift(&fine.low, p.lookback_right), 0);

    let gate = if p.enable_htf_gate {
        let coarse = resample(fine, p.gate.timeframe);
        ffill_to_fine(&coarse.ts, &gate_series(&coarse, &p.gate), &fine.ts)
    } else {
        vec![true; fine.len()]
    };

    let h1 = if fine_tf == Timeframe::H1 {
        fine.clone()
    } else {
        resample(fine, Timeframe::H1)
    };
    let h4 = resample(fine, Timeframe::H4);
    let d1 = resample(fine, Timeframe::D1);
    let w1 = resample(fine, Timeframe::W1);

    let size = |equity: f64, entry: f64, _stop: f64, _confidence: f64| {
        let mut order = percent_of_equity(equity, entry, p.base_risk_pct);
        order.qty = round_step(order.qty, info.step_size);
        order
    };

    let mut exec = BarExecutor::new(p.executor.clone(), scorer);
    let fee_factor = p.executor.fee_bps / 10_000.0;
    let mut equity = p.initial_capital;
    let mut curve = vec![equity];
    let mut trades = Vec::new();

    let fine_secs = fine_tf.seconds();
    let start = MIN_RAW_BARS.max(p.lookback_left + p.lookback_right + 60);
    for i in start..fine.len() {
        let ts = fine.ts[i];
        let h1_prefix = closed_prefix(&h1, Timeframe::H1, ts, fine_secs);
        // bars are only evaluated while the 1h bands are squeezed
        if !bb_squeeze(&h1_prefix, p.squeeze_period, p.squeeze_k) {
            continue;
        }
        let (bias, bias_confidence) = htf_bias(
            &closed_prefix(&d1, Timeframe::D1, ts, fine_secs),
            &closed_prefix(&w1, Timeframe::W1, ts, fine_secs),
            p.ema_short,
            p.ema_long,
        );
        let (regime, regime_confidence) = mid_chop(
            &closed_prefix(&h4, Timeframe::H4, ts, fine_secs),
            &h1_prefix,
            p.chop_len,
        );

        let close = fine.close[i];
        let mut stop_candidate = close * (1.0 - p.pct_stop);
        if wave_low[i].is_finite() {
            stop_candidate = stop_candidate.min(wave_low[i]);
        }
        stop_candidate = stop_candidate.min(close - 3.0 * info.tick_size);

        let snap = BarSnapshot {
            ts,
            high: fine.high[i],
            low: fine.low[i],
            close,
            rsi: rsi[i],
            bull: bull[i],
            bear: bear[i],
            bias,
            bias_confidence,
            regime,
            regime_confidence,
            div_score: if bull[i] { 1.0 } else { 0.0 },
            stop_candidate,
            gate_open: gate[i],
        };

        if let Some(event) = exec.on_bar(symbol, &snap, equity, &size) {
            if event.kind == TradeKind::Enter {
                equity -= event.price * event.qty * fee_factor;
            } else {
                equity += event.pnl.unwrap_or(0.0);
                curve.push(equity);
            }
            trades.push(event);
        }
    }

    let summary = summarize(&trades, &curve, p.initial_capital, equity);
    (summary, trades)
}
