use common::{Error, InstrumentInfo, Ohlcv, Result, Side, TradeEvent, TradeKind};
use risk::{percent_of_equity, summarize, BacktestSummary};
use serde::{Deserialize, Serialize};
use signals::{
    bars_since_true, bear_divergence, bull_divergence, crossunder, fill_nan, rsi_wilder, shift,
    valuewhen,
};
use tracing::debug;

use crate::gate::{ffill_to_fine, gate_series, GateParams};

/// Long-side strategy parameters. The optional HTF gate carries its own
/// parameter block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LongParams {
    pub rsi_length: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub lookback_left: usize,
    pub lookback_right: usize,
    pub range_lower: usize,
    pub range_upper: usize,
    pub calculate_divergence: bool,
    pub pct_stop: f64,
    pub max_wait_bars: usize,
    pub cooldown_bars: usize,
    pub fee_bps: f64,
    pub initial_capital: f64,
    pub percent_risk: f64,
    pub enable_htf_gate: bool,
    pub gate: GateParams,
    pub lock_arm_pct: f64,
    pub lock_profit_pct: f64,
}

impl Default for LongParams {
    fn default() -> Self {
        Self {
            rsi_length: 14,
            rsi_overbought: 79.0,
            rsi_oversold: 27.0,
            lookback_left: 5,
            lookback_right: 5,
            range_lower: 5,
            range_upper: 60,
            calculate_divergence: true,
            pct_stop: 0.018,
            max_wait_bars: 25,
            cooldown_bars: 15,
            fee_bps: 5.0,
            initial_capital: 10_000.0,
            percent_risk: 0.10,
            enable_htf_gate: false,
            gate: GateParams::default(),
            lock_arm_pct: 0.0,
            lock_profit_pct: 0.0,
        }
    }
}

impl LongParams {
    /// Normalize and check the parameter block. Swapped RSI thresholds are
    /// repaired silently; structural violations are configuration errors.
    pub fn validate(&mut self) -> Result<()> {
        if self.rsi_overbought < self.rsi_oversold {
            std::mem::swap(&mut self.rsi_overbought, &mut self.rsi_oversold);
        }
        if self.rsi_length == 0 {
            return Err(Error::Config("rsi_length must be positive".into()));
        }
        if self.range_lower > self.range_upper {
            return Err(Error::Config("range_lower exceeds range_upper".into()));
        }
        if !(0.0..1.0).contains(&self.pct_stop) {
            return Err(Error::Config(format!("pct_stop {} out of [0,1)", self.pct_stop)));
        }
        if !(0.0..=1.0).contains(&self.percent_risk) {
            return Err(Error::Config(format!(
                "percent_risk {} out of [0,1]",
                self.percent_risk
            )));
        }
        if self.fee_bps < 0.0 || self.initial_capital <= 0.0 {
            return Err(Error::Config("negative fee or non-positive capital".into()));
        }
        Ok(())
    }
}

/// Backtest of the long divergence strategy over one fine-timeframe frame.
pub struct LongEngine {
    p: LongParams,
}

impl LongEngine {
    pub fn new(mut params: LongParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { p: params })
    }

    pub fn params(&self) -> &LongParams {
        &self.p
    }

    fn min_bars(&self) -> usize {
        200usize.max(self.p.lookback_left + self.p.lookback_right + 20)
    }

    pub fn backtest(&self, symbol: &str, frame: &Ohlcv) -> (BacktestSummary, Vec<TradeEvent>) {
        let p = &self.p;
        if frame.len() < self.min_bars() {
            debug!(symbol, bars = frame.len(), "insufficient history, skipping");
            return (BacktestSummary::empty(p.initial_capital), Vec::new());
        }

        let rsi = fill_nan(&rsi_wilder(&frame.close, p.rsi_length), 50.0);
        let (bull, bear) = if p.calculate_divergence {
            (
                bull_divergence(
                    &rsi,
                    &frame.low,
                    p.lookback_left,
                    p.lookback_right,
                    p.range_lower,
                    p.range_upper,
                ),
                bear_divergence(
                    &rsi,
                    &frame.high,
                    p.lookback_left,
                    p.lookback_right,
                    p.range_lower,
                    p.range_upper,
                ),
            )
        } else {
            (vec![false; frame.len()], vec![false; frame.len()])
        };

        let oversold: Vec<bool> = rsi.iter().map(|&r| r < p.rsi_oversold).collect();
        let armed_gap = bars_since_true(&oversold);
        let setup_bear = crossunder(&rsi, p.rsi_overbought);
        let low_r = shift(&frame.low, p.lookback_right);
        let wave_low = valuewhen(&bull, &low_r, 0);

        let gate_ltf: Vec<bool> = if p.enable_htf_gate {
            let htf = data::resample(frame, p.gate.timeframe);
            let coarse = gate_series(&htf, &p.gate);
            ffill_to_fine(&htf.ts, &coarse, &frame.ts)
        } else {
            vec![true; frame.len()]
        };

        let tick = InstrumentInfo::for_symbol(symbol).tick_size;
        let fee_factor = p.fee_bps / 10_000.0;
        let mut equity = p.initial_capital;
        let mut eq_curve = vec![equity];
        let mut trades: Vec<TradeEvent> = Vec::new();

        let mut in_pos = false;
        let mut entry = f64::NAN;
        let mut stop = f64::NAN;
        let mut qty = 0.0;
        let mut await_bear = false;
        let mut await_bear_bars = 0usize;
        let mut cooldown = 0usize;
        let mut runup_peak = 0.0f64;

        for i in 0..frame.len() {
            let price = frame.close[i];
            let ts = frame.ts[i];

            if cooldown > 0 && !in_pos {
                cooldown -= 1;
            }

            if in_pos && setup_bear[i] {
                await_bear = true;
                await_bear_bars = 0;
            }
            if await_bear {
                await_bear_bars += 1;
                if await_bear_bars > p.max_wait_bars {
                    await_bear = false;
                    await_bear_bars = 0;
                }
            }

            let armed = armed_gap[i] <= p.max_wait_bars;
            if !in_pos && bull[i] && armed && cooldown == 0 && gate_ltf[i] {
                let pct_stop_price = price * (1.0 - p.pct_stop);
                let mut stop_price = if wave_low[i].is_finite() {
                    wave_low[i].min(pct_stop_price)
                } else {
                    pct_stop_price
                };
                if stop_price >= price {
                    stop_price = pct_stop_price;
                }
                let min_allowed = price - 3.0 * tick;
                if stop_price > min_allowed {
                    stop_price = min_allowed;
                }

                let order = percent_of_equity(equity, price, p.percent_risk);
                if order.qty > 0.0 {
                    equity -= price * order.qty * fee_factor;
                    in_pos = true;
                    entry = price;
                    stop = stop_price;
                    qty = order.qty;
                    runup_peak = 0.0;
                    trades.push(TradeEvent::enter(symbol, ts, Side::Long, price, qty, stop));
                }
            }

            if in_pos && await_bear && bear[i] {
                let pnl = (price - entry) * qty - price * qty * fee_factor;
                equity += pnl;
                eq_curve.push(equity);
                trades.push(TradeEvent::exit(
                    TradeKind::ExitNormal,
                    symbol,
                    ts,
                    Side::Long,
                    price,
                    qty,
                    pnl,
                ));
                in_pos = false;
                await_bear = false;
                await_bear_bars = 0;
            }

            if in_pos && frame.low[i] <= stop {
                let fill = stop.clamp(frame.low[i], frame.high[i]);
                let pnl = (fill - entry) * qty - fill * qty * fee_factor;
                equity += pnl;
                eq_curve.push(equity);
                trades.push(TradeEvent::exit(
                    TradeKind::ExitSl,
                    symbol,
                    ts,
                    Side::Long,
                    fill,
                    qty,
                    pnl,
                ));
                in_pos = false;
                cooldown = p.cooldown_bars;
            }

            if in_pos {
                runup_peak = runup_peak.max((price / entry - 1.0) * 100.0);
                if p.lock_arm_pct > 0.0
                    && p.lock_profit_pct > 0.0
                    && runup_peak >= p.lock_arm_pct
                {
                    let lock = (entry * (1.0 + p.lock_profit_pct / 100.0)).min(price);
                    stop = stop.max(lock);
                }
            }
        }

        (summarize(&trades, &eq_curve, p.initial_capital, equity), trades)
    }
}
