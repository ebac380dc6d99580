use chrono::{DateTime, Utc};
use common::{Error, Ohlcv, Result, Side, TradeEvent, TradeKind};
use risk::{summarize, BacktestSummary};
use serde::{Deserialize, Serialize};
use signals::{
    bars_since_true, bear_divergence, bull_divergence, crossover, crossunder, fill_nan,
    rsi_wilder,
};
use tracing::debug;

/// Parameters of the dual-sided hedge strategy. Stops are plain
/// percentages; `tp_half_pct` is the favorable excursion (percent) that
/// triggers the one-time 70% partial close.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HedgeParams {
    pub rsi_length: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub lookback_left: usize,
    pub lookback_right: usize,
    pub range_lower: usize,
    pub range_upper: usize,
    pub initial_capital: f64,
    pub size_equity_pct: f64,
    pub fee_bps: f64,
    pub init_stop_pct: f64,
    pub tp_half_pct: f64,
    pub cooldown_bars: usize,
    pub lock_arm_pct: f64,
    pub lock_profit_pct: f64,
}

impl Default for HedgeParams {
    fn default() -> Self {
        Self {
            rsi_length: 14,
            rsi_overbought: 79.0,
            rsi_oversold: 27.0,
            lookback_left: 5,
            lookback_right: 5,
            range_lower: 5,
            range_upper: 60,
            initial_capital: 10_000.0,
            size_equity_pct: 0.50,
            fee_bps: 5.0,
            init_stop_pct: 5.0,
            tp_half_pct: 7.0,
            cooldown_bars: 0,
            lock_arm_pct: 0.0,
            lock_profit_pct: 0.0,
        }
    }
}

impl HedgeParams {
    pub fn validate(&mut self) -> Result<()> {
        if self.rsi_overbought < self.rsi_oversold {
            std::mem::swap(&mut self.rsi_overbought, &mut self.rsi_oversold);
        }
        if self.rsi_length == 0 {
            return Err(Error::Config("rsi_length must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.size_equity_pct) {
            return Err(Error::Config(format!(
                "size_equity_pct {} out of [0,1]",
                self.size_equity_pct
            )));
        }
        if self.init_stop_pct < 0.0 || self.tp_half_pct < 0.0 || self.fee_bps < 0.0 {
            return Err(Error::Config("negative percentage parameter".into()));
        }
        if self.initial_capital <= 0.0 {
            return Err(Error::Config("non-positive capital".into()));
        }
        Ok(())
    }

    fn arm_window(&self) -> usize {
        (self.lookback_left + self.lookback_right).max(1)
    }
}

/// Result of a hedge backtest: the combined summary plus the combined and
/// per-side closed-trade equity curves.
#[derive(Debug, Clone)]
pub struct HedgeReport {
    pub summary: BacktestSummary,
    pub trades: Vec<TradeEvent>,
    pub equity: Vec<(DateTime<Utc>, f64)>,
    pub equity_long: Vec<(DateTime<Utc>, f64)>,
    pub equity_short: Vec<(DateTime<Utc>, f64)>,
}

struct SideState {
    open: bool,
    entry: f64,
    stop: f64,
    qty: f64,
    peak: f64,
    half_tp: bool,
    cooldown: usize,
    ledger: f64,
}

impl SideState {
    fn flat(ledger: f64) -> Self {
        Self {
            open: false,
            entry: f64::NAN,
            stop: f64::NAN,
            qty: 0.0,
            peak: 0.0,
            half_tp: false,
            cooldown: 0,
            ledger,
        }
    }
}

/// Divergence strategy holding up to one long and one short concurrently.
pub struct HedgeEngine {
    p: HedgeParams,
}

impl HedgeEngine {
    pub fn new(mut params: HedgeParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { p: params })
    }

    pub fn params(&self) -> &HedgeParams {
        &self.p
    }

    pub fn backtest(&self, symbol: &str, frame: &Ohlcv) -> HedgeReport {
        let p = &self.p;
        if frame.is_empty() {
            debug!(symbol, "empty frame, skipping");
            return HedgeReport {
                summary: BacktestSummary::empty(p.initial_capital),
                trades: Vec::new(),
                equity: Vec::new(),
                equity_long: Vec::new(),
                equity_short: Vec::new(),
            };
        }

        let rsi = fill_nan(&rsi_wilder(&frame.close, p.rsi_length), 50.0);
        let bull = bull_divergence(
            &rsi,
            &frame.low,
            p.lookback_left,
            p.lookback_right,
            p.range_lower,
            p.range_upper,
        );
        let bear = bear_divergence(
            &rsi,
            &frame.high,
            p.lookback_left,
            p.lookback_right,
            p.range_lower,
            p.range_upper,
        );
        let setup_bear = crossover(&rsi, p.rsi_overbought);
        let setup_bull = crossunder(&rsi, p.rsi_oversold);

        let window = p.arm_window();
        let lt_gap = bars_since_true(&rsi.iter().map(|&r| r < p.rsi_oversold).collect::<Vec<_>>());
        let st_gap = bars_since_true(&rsi.iter().map(|&r| r > p.rsi_overbought).collect::<Vec<_>>());

        let fee_factor = p.fee_bps / 10_000.0;
        let mut equity = p.initial_capital;
        let mut eq_curve = vec![equity];
        let mut eq_series = Vec::new();
        let mut eq_long = Vec::new();
        let mut eq_short = Vec::new();
        let mut trades: Vec<TradeEvent> = Vec::new();

        let mut long = SideState::flat(p.initial_capital * p.size_equity_pct);
        let mut short = SideState::flat(p.initial_capital * p.size_equity_pct);

        for i in 0..frame.len() {
            let ts = frame.ts[i];
            let px = frame.close[i];
            let (lo, hi) = (frame.low[i], frame.high[i]);

            if !long.open && long.cooldown > 0 {
                long.cooldown -= 1;
            }
            if !short.open && short.cooldown > 0 {
                short.cooldown -= 1;
            }

            // long side management
            if long.open {
                long.peak = long.peak.max((px / long.entry - 1.0) * 100.0);
                if p.lock_arm_pct > 0.0
                    && p.lock_profit_pct > 0.0
                    && long.peak >= p.lock_arm_pct
                {
                    let lock = (long.entry * (1.0 + p.lock_profit_pct / 100.0)).min(px);
                    long.stop = long.stop.max(lock);
                }
                if !long.half_tp && long.peak >= p.tp_half_pct {
                    let part = long.qty * 0.70;
                    let pnl =
                        (px - long.entry) * part - (px * part + long.entry * part) * fee_factor;
                    equity += pnl;
                    eq_curve.push(equity);
                    eq_series.push((ts, equity));
                    long.ledger += pnl;
                    eq_long.push((ts, long.ledger));
                    trades.push(TradeEvent::exit(
                        TradeKind::ExitHalfTp,
                        symbol,
                        ts,
                        Side::Long,
                        px,
                        part,
                        pnl,
                    ));
                    long.qty -= part;
                    long.half_tp = true;
                }
                if long.open && lo <= long.stop {
                    let fill = long.stop.clamp(lo, hi);
                    let pnl = (fill - long.entry) * long.qty
                        - (fill * long.qty + long.entry * long.qty) * fee_factor;
                    equity += pnl;
                    eq_curve.push(equity);
                    eq_series.push((ts, equity));
                    long.ledger += pnl;
                    eq_long.push((ts, long.ledger));
                    trades.push(TradeEvent::exit(
                        TradeKind::ExitSl,
                        symbol,
                        ts,
                        Side::Long,
                        fill,
                        long.qty,
                        pnl,
                    ));
                    long.open = false;
                    long.cooldown = p.cooldown_bars;
                }
            }
            if long.open && setup_bear[i] && bear[i] {
                let pnl = (px - long.entry) * long.qty
                    - (px * long.qty + long.entry * long.qty) * fee_factor;
                equity += pnl;
                eq_curve.push(equity);
                eq_series.push((ts, equity));
                long.ledger += pnl;
                eq_long.push((ts, long.ledger));
                trades.push(TradeEvent::exit(
                    TradeKind::ExitNormal,
                    symbol,
                    ts,
                    Side::Long,
                    px,
                    long.qty,
                    pnl,
                ));
                long.open = false;
            }

            // short side management
            if short.open {
                short.peak = short.peak.max((short.entry / px - 1.0) * 100.0);
                if p.lock_arm_pct > 0.0
                    && p.lock_profit_pct > 0.0
                    && short.peak >= p.lock_arm_pct
                {
                    let lock = short.entry * (1.0 - p.lock_profit_pct / 100.0);
                    short.stop = short.stop.min(lock);
                }
                if !short.half_tp && short.peak >= p.tp_half_pct {
                    let part = short.qty * 0.70;
                    let pnl =
                        (short.entry - px) * part - (px * part + short.entry * part) * fee_factor;
                    equity += pnl;
                    eq_curve.push(equity);
                    eq_series.push((ts, equity));
                    short.ledger += pnl;
                    eq_short.push((ts, short.ledger));
                    trades.push(TradeEvent::exit(
                        TradeKind::ExitHalfTp,
                        symbol,
                        ts,
                        Side::Short,
                        px,
                        part,
                        pnl,
                    ));
                    short.qty -= part;
                    short.half_tp = true;
                }
                if short.open && hi >= short.stop {
                    let fill = short.stop.clamp(lo, hi);
                    let pnl = (short.entry - fill) * short.qty
                        - (fill * short.qty + short.entry * short.qty) * fee_factor;
                    equity += pnl;
                    eq_curve.push(equity);
                    eq_series.push((ts, equity));
                    short.ledger += pnl;
                    eq_short.push((ts, short.ledger));
                    trades.push(TradeEvent::exit(
                        TradeKind::ExitSl,
                        symbol,
                        ts,
                        Side::Short,
                        fill,
                        short.qty,
                        pnl,
                    ));
                    short.open = false;
                    short.cooldown = p.cooldown_bars;
                }
            }
            if short.open && setup_bull[i] && bull[i] {
                let pnl = (short.entry - px) * short.qty
                    - (px * short.qty + short.entry * short.qty) * fee_factor;
                equity += pnl;
                eq_curve.push(equity);
                eq_series.push((ts, equity));
                short.ledger += pnl;
                eq_short.push((ts, short.ledger));
                trades.push(TradeEvent::exit(
                    TradeKind::ExitNormal,
                    symbol,
                    ts,
                    Side::Short,
                    px,
                    short.qty,
                    pnl,
                ));
                short.open = false;
            }

            // entries, possibly concurrent with the opposite side
            if !long.open && long.cooldown == 0 && bull[i] && lt_gap[i] <= window {
                let qty = (equity * p.size_equity_pct / px).max(0.0);
                if qty > 0.0 {
                    equity -= px * qty * fee_factor;
                    long.entry = px;
                    long.qty = qty;
                    long.stop = px * (1.0 - p.init_stop_pct / 100.0);
                    long.peak = 0.0;
                    long.half_tp = false;
                    long.open = true;
                    trades.push(TradeEvent::enter(symbol, ts, Side::Long, px, qty, long.stop));
                }
            }
            if !short.open && short.cooldown == 0 && bear[i] && st_gap[i] <= window {
                let qty = (equity * p.size_equity_pct / px).max(0.0);
                if qty > 0.0 {
                    equity -= px * qty * fee_factor;
                    short.entry = px;
                    short.qty = qty;
                    short.stop = px * (1.0 + p.init_stop_pct / 100.0);
                    short.peak = 0.0;
                    short.half_tp = false;
                    short.open = true;
                    trades.push(TradeEvent::enter(symbol, ts, Side::Short, px, qty, short.stop));
                }
            }
        }

        HedgeReport {
            summary: summarize(&trades, &eq_curve, p.initial_capital, equity),
            trades,
            equity: eq_series,
            equity_long: eq_long,
            equity_short: eq_short,
        }
    }
}
