use common::{Error, InstrumentInfo, Ohlcv, Result, Side, TradeEvent, TradeKind};
use risk::{percent_of_equity, summarize, BacktestSummary};
use serde::{Deserialize, Serialize};
use signals::{
    bars_since_true, bear_divergence, bull_divergence, crossover, crossunder, fill_nan,
    rsi_wilder, shift, valuewhen,
};
use tracing::debug;

/// Short-side strategy parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortParams {
    pub rsi_length: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub lookback_left: usize,
    pub lookback_right: usize,
    pub range_lower: usize,
    pub range_upper: usize,
    pub pct_stop: f64,
    pub max_wait_bars: usize,
    pub cooldown_bars: usize,
    pub fee_bps: f64,
    pub initial_capital: f64,
    pub percent_risk: f64,
    pub lock_arm_pct: f64,
    pub lock_profit_pct: f64,
}

impl Default for ShortParams {
    fn default() -> Self {
        Self {
            rsi_length: 15,
            rsi_overbought: 81.0,
            rsi_oversold: 17.0,
            lookback_left: 5,
            lookback_right: 5,
            range_lower: 5,
            range_upper: 60,
            pct_stop: 0.015,
            max_wait_bars: 15,
            cooldown_bars: 20,
            fee_bps: 5.0,
            initial_capital: 10_000.0,
            percent_risk: 0.10,
            lock_arm_pct: 0.0,
            lock_profit_pct: 0.0,
        }
    }
}

impl ShortParams {
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
        if self.pct_stop < 0.0 {
            return Err(Error::Config(format!("negative pct_stop {}", self.pct_stop)));
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

/// Mirror of the long engine for bearish setups: entries on bear
/// divergence while recently overbought, exits on a coincident oversold
/// crossover and bull divergence, percentage stop above the entry.
pub struct ShortEngine {
    p: ShortParams,
}

impl ShortEngine {
    pub fn new(mut params: ShortParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { p: params })
    }

    pub fn params(&self) -> &ShortParams {
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
        let bear = bear_divergence(
            &rsi,
            &frame.high,
            p.lookback_left,
            p.lookback_right,
            p.range_lower,
            p.range_upper,
        );
        let bull = bull_divergence(
            &rsi,
            &frame.low,
            p.lookback_left,
            p.lookback_right,
            p.range_lower,
            p.range_upper,
        );
        let setup_short = crossunder(&rsi, p.rsi_overbought);
        let setup_bull = crossover(&rsi, p.rsi_oversold);

        let overbought: Vec<bool> = rsi.iter().map(|&r| r >= p.rsi_overbought).collect();
        let armed_gap = bars_since_true(&overbought);
        let high_r = shift(&frame.high, p.lookback_right);
        let wave_high = valuewhen(&bear, &high_r, 0);

        let tick = InstrumentInfo::for_symbol(symbol).tick_size;
        let fee_factor = p.fee_bps / 10_000.0;
        let mut equity = p.initial_capital;
        let mut eq_curve = vec![equity];
        let mut trades: Vec<TradeEvent> = Vec::new();

        let mut in_pos = false;
        let mut entry = f64::NAN;
        let mut stop = f64::NAN;
        let mut qty = 0.0;
        let mut cooldown = 0usize;
        let mut runup_peak = 0.0f64;

        for i in 0..frame.len() {
            let price = frame.close[i];
            let ts = frame.ts[i];

            if cooldown > 0 && !in_pos {
                cooldown -= 1;
            }

            let armed = armed_gap[i] <= p.max_wait_bars;
            if !in_pos && (armed || setup_short[i]) && bear[i] && cooldown == 0 {
                let pct_stop_price = price * (1.0 + p.pct_stop);
                let mut stop_price = if wave_high[i].is_finite() {
                    wave_high[i].max(pct_stop_price)
                } else {
                    pct_stop_price
                };
                if stop_price <= price {
                    stop_price = pct_stop_price;
                }
                let min_allowed = price + 3.0 * tick;
                if stop_price < min_allowed {
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
                    trades.push(TradeEvent::enter(symbol, ts, Side::Short, price, qty, stop));
                }
            }

            if in_pos && setup_bull[i] && bull[i] {
                let pnl = (entry - price) * qty - price * qty * fee_factor;
                equity += pnl;
                eq_curve.push(equity);
                trades.push(TradeEvent::exit(
                    TradeKind::ExitNormal,
                    symbol,
                    ts,
                    Side::Short,
                    price,
                    qty,
                    pnl,
                ));
                in_pos = false;
            }

            if in_pos && frame.high[i] >= stop {
                let fill = stop.clamp(frame.low[i], frame.high[i]);
                let pnl = (entry - fill) * qty - fill * qty * fee_factor;
                equity += pnl;
                eq_curve.push(equity);
                trades.push(TradeEvent::exit(
                    TradeKind::ExitSl,
                    symbol,
                    ts,
                    Side::Short,
                    fill,
                    qty,
                    pnl,
                ));
                in_pos = false;
                cooldown = p.cooldown_bars;
            }

            if in_pos {
                runup_peak = runup_peak.max((entry / price - 1.0) * 100.0);
                if p.lock_arm_pct > 0.0
                    && p.lock_profit_pct > 0.0
                    && runup_peak >= p.lock_arm_pct
                {
                    let lock = entry * (1.0 - p.lock_profit_pct / 100.0);
                    stop = stop.min(lock);
                }
            }
        }

        (summarize(&trades, &eq_curve, p.initial_capital, equity), trades)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(i: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + i * 180, 0).unwrap()
    }

    fn frame_from(closes: Vec<f64>, spread: f64) -> Ohlcv {
        let n = closes.len();
        Ohlcv::new(
            (0..n as i64).map(ts).collect(),
            closes.clone(),
            closes.iter().map(|c| c + spread).collect(),
            closes.iter().map(|c| c - spread).collect(),
            closes,
            vec![1.0; n],
        )
        .unwrap()
    }

    fn test_params() -> ShortParams {
        ShortParams {
            rsi_overbought: 65.0,
            rsi_oversold: 30.0,
            ..ShortParams::default()
        }
    }

    #[test]
    fn flat_series_produces_no_trades() {
        let engine = ShortEngine::new(test_params()).unwrap();
        let (summary, trades) = engine.backtest("TESTUSDT", &frame_from(vec![100.0; 250], 0.1));
        assert!(trades.is_empty());
        assert_eq!(summary, BacktestSummary::empty(10_000.0));
    }

    #[test]
    fn gap_up_stop_fill_is_clamped_into_the_bar() {
        // double-top rally prints an armed bearish divergence; five bars
        // after entry the price gaps above the stop, so the fill clamps to
        // the bar low
        let mut closes = Vec::new();
        let mut v = 100.0;
        let mut seg = |slope: f64, n: usize, closes: &mut Vec<f64>| {
            for _ in 0..n {
                v += slope;
                closes.push(v);
            }
        };
        seg(-0.01, 120, &mut closes);
        seg(1.0, 6, &mut closes);
        seg(-0.6, 8, &mut closes);
        seg(0.45, 12, &mut closes);
        seg(-0.3, 6, &mut closes);
        seg(-0.05, 60, &mut closes);
        closes[155] = 107.0;
        let frame = frame_from(closes, 0.15);

        let engine = ShortEngine::new(test_params()).unwrap();
        let (summary, trades) = engine.backtest("TESTUSDT", &frame);

        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].kind, TradeKind::Enter);
        assert_eq!(trades[0].side, Side::Short);
        assert!((trades[0].price - 103.9).abs() < 1e-6);
        assert!((trades[0].stop.unwrap() - 105.55).abs() < 1e-6);
        assert_eq!(trades[1].kind, TradeKind::ExitSl);
        assert_eq!(trades[1].ts, ts(155));
        // bar 155 spans [106.85, 107.15], entirely above the 105.55 stop
        assert!((trades[1].price - 106.85).abs() < 1e-9);
        assert!((trades[1].pnl.unwrap() - (-28.90688162)).abs() < 1e-4);
        assert_eq!(summary.num_trades, 1);
        assert!((summary.ending_equity - 9970.59).abs() < 1e-9);
    }

    #[test]
    fn stop_never_within_three_ticks_of_entry() {
        let mut p = test_params();
        p.pct_stop = 0.0;
        let engine = ShortEngine::new(p).unwrap();
        let mut closes = Vec::new();
        let mut v = 100.0;
        let mut seg = |slope: f64, n: usize, closes: &mut Vec<f64>| {
            for _ in 0..n {
                v += slope;
                closes.push(v);
            }
        };
        seg(-0.01, 120, &mut closes);
        seg(1.0, 6, &mut closes);
        seg(-0.6, 8, &mut closes);
        seg(0.45, 12, &mut closes);
        seg(-0.3, 6, &mut closes);
        seg(-0.05, 60, &mut closes);
        let (_, trades) = engine.backtest("TESTUSDT", &frame_from(closes, 0.15));
        let enter = trades.iter().find(|t| t.kind == TradeKind::Enter).unwrap();
        assert!(enter.stop.unwrap() >= enter.price + 3.0 * 0.01 - 1e-9);
    }
}
