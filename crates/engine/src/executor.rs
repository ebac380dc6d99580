use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{
    EntryFeatures, OpenPosition, Regime, ScoreAction, Side, SignalScorer, TradeEvent, TradeKind,
};
use risk::SizedOrder;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Everything the executor needs to know about one closed fine bar,
/// precomputed by the caller.
#[derive(Debug, Clone)]
pub struct BarSnapshot {
    pub ts: DateTime<Utc>,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub rsi: f64,
    pub bull: bool,
    pub bear: bool,
    pub bias: i8,
    pub bias_confidence: f64,
    pub regime: Regime,
    pub regime_confidence: f64,
    pub div_score: f64,
    pub stop_candidate: f64,
    pub gate_open: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorParams {
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub max_wait_bars: usize,
    pub cooldown_bars: usize,
    pub fee_bps: f64,
}

impl Default for ExecutorParams {
    fn default() -> Self {
        Self {
            rsi_oversold: 27.0,
            rsi_overbought: 79.0,
            max_wait_bars: 25,
            cooldown_bars: 15,
            fee_bps: 5.0,
        }
    }
}

/// Sizing callback: equity, entry, stop, confidence.
pub type SizeFn<'a> = &'a dyn Fn(f64, f64, f64, f64) -> SizedOrder;

/// Per-symbol long-only state machine fed one bar snapshot at a time.
/// Arms the long setup while flat and oversold, arms the exit setup while
/// in position and overbought, both with an expiry; entries additionally
/// pass the bias gate, the HTF gate, the cooldown and an optional scorer.
pub struct BarExecutor {
    p: ExecutorParams,
    scorer: Option<Arc<dyn SignalScorer>>,
    await_long: bool,
    await_long_bars: usize,
    await_bear: bool,
    await_bear_bars: usize,
    cooldown: usize,
    pos: Option<OpenPosition>,
}

impl BarExecutor {
    pub fn new(params: ExecutorParams, scorer: Option<Arc<dyn SignalScorer>>) -> Self {
        Self {
            p: params,
            scorer,
            await_long: false,
            await_long_bars: 0,
            await_bear: false,
            await_bear_bars: 0,
            cooldown: 0,
            pos: None,
        }
    }

    pub fn position(&self) -> Option<&OpenPosition> {
        self.pos.as_ref()
    }

    pub fn on_bar(
        &mut self,
        symbol: &str,
        snap: &BarSnapshot,
        equity: f64,
        size_fn: SizeFn<'_>,
    ) -> Option<TradeEvent> {
        let fee_factor = self.p.fee_bps / 10_000.0;

        if self.pos.is_none() && snap.rsi <= self.p.rsi_oversold {
            self.await_long = true;
            self.await_long_bars = 0;
        }
        if self.await_long {
            self.await_long_bars += 1;
            if self.await_long_bars > self.p.max_wait_bars {
                self.await_long = false;
                self.await_long_bars = 0;
            }
        }

        if self.pos.is_some() && snap.rsi >= self.p.rsi_overbought {
            self.await_bear = true;
            self.await_bear_bars = 0;
        }
        if self.await_bear {
            self.await_bear_bars += 1;
            if self.await_bear_bars > self.p.max_wait_bars {
                self.await_bear = false;
                self.await_bear_bars = 0;
            }
        }

        let entry_raw = self.pos.is_none() && self.await_long && snap.bull;
        let bias_ok =
            snap.bias >= 0 || (snap.regime == Regime::Chop && snap.div_score >= 0.75);
        let can_enter = self.cooldown == 0 && bias_ok && snap.gate_open;

        if entry_raw && can_enter && self.approved(snap) {
            let entry = snap.close;
            let stop = snap.stop_candidate;
            let order = size_fn(equity, entry, stop, snap.bias_confidence);
            if order.qty > 0.0 {
                let pos = OpenPosition::new(Side::Long, order.qty, entry, stop);
                debug!(
                    symbol,
                    entry,
                    stop,
                    qty = order.qty,
                    risk_pct = order.risk_pct,
                    "entering long"
                );
                self.pos = Some(pos);
                self.await_long = false;
                self.await_long_bars = 0;
                return Some(TradeEvent::enter(
                    symbol, snap.ts, Side::Long, entry, order.qty, stop,
                ));
            }
        }

        if let Some(pos) = &self.pos {
            if self.await_bear && snap.bear {
                let exit = snap.close;
                let pnl = (exit - pos.entry) * pos.qty - exit * pos.qty * fee_factor;
                let event = TradeEvent::exit(
                    TradeKind::ExitNormal,
                    symbol,
                    snap.ts,
                    Side::Long,
                    exit,
                    pos.qty,
                    pnl,
                );
                self.pos = None;
                self.await_bear = false;
                self.await_bear_bars = 0;
                return Some(event);
            }
        }

        if let Some(pos) = &self.pos {
            if snap.low <= pos.stop {
                let fill = pos.stop.clamp(snap.low, snap.high);
                let pnl = (fill - pos.entry) * pos.qty - fill * pos.qty * fee_factor;
                let event = TradeEvent::exit(
                    TradeKind::ExitSl,
                    symbol,
                    snap.ts,
                    Side::Long,
                    fill,
                    pos.qty,
                    pnl,
                );
                self.pos = None;
                self.cooldown = self.p.cooldown_bars;
                return Some(event);
            }
        }

        if self.cooldown > 0 {
            self.cooldown -= 1;
        }
        None
    }

    fn approved(&self, snap: &BarSnapshot) -> bool {
        match &self.scorer {
            None => true,
            Some(scorer) => {
                let features = EntryFeatures {
                    rsi: snap.rsi,
                    div_score: snap.div_score,
                    bias: snap.bias,
                    bias_confidence: snap.bias_confidence,
                    regime_confidence: snap.regime_confidence,
                };
                let decision = scorer.score(&features);
                debug!(action = ?decision.action, decision.confidence, "scorer decision");
                decision.action == ScoreAction::Take
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use common::{ScoreAction, ScoreDecision};
    use risk::percent_of_equity;

    fn snap(i: i64, close: f64, rsi: f64) -> BarSnapshot {
        BarSnapshot {
            ts: Utc.timestamp_opt(1_700_000_000 + i * 180, 0).unwrap(),
            high: close + 0.5,
            low: close - 0.5,
            close,
            rsi,
            bull: false,
            bear: false,
            bias: 1,
            bias_confidence: 0.6,
            regime: Regime::Mixed,
            regime_confidence: 0.5,
            div_score: 0.0,
            stop_candidate: close * 0.98,
            gate_open: true,
        }
    }

    fn sizer(equity: f64, entry: f64, _stop: f64, _conf: f64) -> SizedOrder {
        percent_of_equity(equity, entry, 0.10)
    }

    fn enter(exec: &mut BarExecutor, i: i64, close: f64) -> Option<TradeEvent> {
        // dip below oversold to arm, then print the divergence
        let armed = snap(i, close, 20.0);
        exec.on_bar("TESTUSDT", &armed, 10_000.0, &sizer);
        let mut s = snap(i + 1, close, 40.0);
        s.bull = true;
        s.div_score = 1.0;
        exec.on_bar("TESTUSDT", &s, 10_000.0, &sizer)
    }

    #[test]
    fn armed_divergence_enters_and_stop_exit_starts_cooldown() {
        let mut exec = BarExecutor::new(ExecutorParams::default(), None);
        let entered = enter(&mut exec, 0, 100.0).unwrap();
        assert_eq!(entered.kind, TradeKind::Enter);
        assert!(exec.position().is_some());

        // crash through the stop, fill clamps to the bar high
        let mut crash = snap(2, 90.0, 35.0);
        crash.high = 90.5;
        crash.low = 89.5;
        let exited = exec.on_bar("TESTUSDT", &crash, 10_000.0, &sizer).unwrap();
        assert_eq!(exited.kind, TradeKind::ExitSl);
        assert!((exited.price - 90.5).abs() < 1e-9);

        // a qualified signal during the cooldown is ignored
        assert!(enter(&mut exec, 3, 100.0).is_none());
        // quiet bars drain the remaining cooldown
        for i in 0..13 {
            exec.on_bar("TESTUSDT", &snap(5 + i, 100.0, 50.0), 10_000.0, &sizer);
        }
        // the cooldown has expired, the next qualified signal enters
        assert!(enter(&mut exec, 20, 100.0).is_some());
    }

    #[test]
    fn bias_gate_blocks_unless_choppy_with_strong_divergence() {
        let mut exec = BarExecutor::new(ExecutorParams::default(), None);
        exec.on_bar("TESTUSDT", &snap(0, 100.0, 20.0), 10_000.0, &sizer);

        let mut s = snap(1, 100.0, 40.0);
        s.bull = true;
        s.bias = -1;
        s.regime = Regime::Trend;
        s.div_score = 1.0;
        assert!(exec.on_bar("TESTUSDT", &s, 10_000.0, &sizer).is_none());

        let mut s = snap(2, 100.0, 40.0);
        s.bull = true;
        s.bias = -1;
        s.regime = Regime::Chop;
        s.div_score = 0.8;
        assert!(exec.on_bar("TESTUSDT", &s, 10_000.0, &sizer).is_some());
    }

    #[test]
    fn closed_gate_and_scorer_veto_block_entries() {
        struct Veto;
        impl SignalScorer for Veto {
            fn score(&self, _features: &EntryFeatures) -> ScoreDecision {
                ScoreDecision {
                    action: ScoreAction::Skip,
                    confidence: 0.9,
                }
            }
        }

        let mut exec = BarExecutor::new(ExecutorParams::default(), None);
        exec.on_bar("TESTUSDT", &snap(0, 100.0, 20.0), 10_000.0, &sizer);
        let mut s = snap(1, 100.0, 40.0);
        s.bull = true;
        s.gate_open = false;
        assert!(exec.on_bar("TESTUSDT", &s, 10_000.0, &sizer).is_none());

        let mut vetoed = BarExecutor::new(ExecutorParams::default(), Some(Arc::new(Veto)));
        assert!(enter(&mut vetoed, 0, 100.0).is_none());
    }

    #[test]
    fn expired_arm_no_longer_enters() {
        let p = ExecutorParams {
            max_wait_bars: 3,
            ..ExecutorParams::default()
        };
        let mut exec = BarExecutor::new(p, None);
        exec.on_bar("TESTUSDT", &snap(0, 100.0, 20.0), 10_000.0, &sizer);
        for i in 1..=3 {
            exec.on_bar("TESTUSDT", &snap(i, 100.0, 40.0), 10_000.0, &sizer);
        }
        let mut s = snap(4, 100.0, 40.0);
        s.bull = true;
        assert!(exec.on_bar("TESTUSDT", &s, 10_000.0, &sizer).is_none());
    }
}
