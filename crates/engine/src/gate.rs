use chrono::{DateTime, Utc};
use common::{Ohlcv, Timeframe};
use serde::{Deserialize, Serialize};
use signals::{bars_since_true, bull_divergence, crossunder, fill_nan, rsi_wilder};

/// Parameters of the coarse-timeframe long gate. Defaults mirror the LTF
/// long parameters with a wide 20% latched stop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateParams {
    pub timeframe: Timeframe,
    pub rsi_length: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub lookback_left: usize,
    pub lookback_right: usize,
    pub range_lower: usize,
    pub range_upper: usize,
    pub max_wait_bars: usize,
    pub stop_pct: f64,
}

impl Default for GateParams {
    fn default() -> Self {
        Self {
            timeframe: Timeframe::M30,
            rsi_length: 14,
            rsi_overbought: 79.0,
            rsi_oversold: 27.0,
            lookback_left: 5,
            lookback_right: 5,
            range_lower: 5,
            range_upper: 60,
            max_wait_bars: 25,
            stop_pct: 0.20,
        }
    }
}

/// Long-entry gate driven by coarse closed bars. The gate starts open;
/// a bullish divergence while recently oversold re-opens it and latches a
/// percentage stop off that bar's close, an overbought crossunder or a
/// breach of the latched stop closes it. Per bar the stop breach is checked
/// first, then the crossunder, then re-entry.
pub fn gate_series(htf: &Ohlcv, p: &GateParams) -> Vec<bool> {
    let rsi = fill_nan(&rsi_wilder(&htf.close, p.rsi_length), 50.0);
    let bull = bull_divergence(
        &rsi,
        &htf.low,
        p.lookback_left,
        p.lookback_right,
        p.range_lower,
        p.range_upper,
    );
    let oversold: Vec<bool> = rsi.iter().map(|&r| r < p.rsi_oversold).collect();
    let recently_armed = bars_since_true(&oversold);
    let close_sig = crossunder(&rsi, p.rsi_overbought);

    let mut out = Vec::with_capacity(htf.len());
    let mut open = true;
    let mut stop = f64::NAN;
    for i in 0..htf.len() {
        if open && stop.is_finite() && htf.low[i] <= stop {
            open = false;
            stop = f64::NAN;
        }
        if close_sig[i] {
            open = false;
            stop = f64::NAN;
        }
        if bull[i] && recently_armed[i] <= p.max_wait_bars {
            open = true;
            stop = htf.close[i] * (1.0 - p.stop_pct);
        }
        out.push(open);
    }
    out
}

/// Forward-fill the coarse gate onto a finer timestamp index. A fine bar
/// takes the value of the last coarse bar not after it; bars before the
/// first coarse bar default to open.
pub fn ffill_to_fine(
    coarse_ts: &[DateTime<Utc>],
    gate: &[bool],
    fine_ts: &[DateTime<Utc>],
) -> Vec<bool> {
    let mut out = Vec::with_capacity(fine_ts.len());
    let mut j = 0usize;
    for &t in fine_ts {
        while j < coarse_ts.len() && coarse_ts[j] <= t {
            j += 1;
        }
        out.push(if j == 0 { true } else { gate[j - 1] });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(i: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(i * 1800, 0).unwrap()
    }

    #[test]
    fn gate_starts_open_without_signals() {
        let flat: Vec<f64> = (0..50).map(|i| 100.0 + 0.1 * i as f64).collect();
        let frame = Ohlcv::new(
            (0..50).map(ts).collect(),
            flat.clone(),
            flat.iter().map(|v| v + 0.5).collect(),
            flat.iter().map(|v| v - 0.5).collect(),
            flat,
            vec![1.0; 50],
        )
        .unwrap();
        let gate = gate_series(&frame, &GateParams::default());
        assert!(gate.iter().all(|&g| g));
    }

    #[test]
    fn forward_fill_defaults_open_before_first_coarse_bar() {
        let coarse = vec![ts(2), ts(4)];
        let gate = vec![false, true];
        let fine: Vec<_> = (0..6).map(ts).collect();
        let ltf = ffill_to_fine(&coarse, &gate, &fine);
        assert_eq!(ltf, vec![true, true, false, false, true, true]);
    }

    #[test]
    fn gate_cycles_through_close_reopen_and_stop_breach() {
        // pump then dump closes the gate on the overbought crossunder; a
        // second, shallower sell-off prints a bullish divergence that
        // reopens it and latches a 5% stop; the final collapse breaches
        // that stop and closes the gate again
        let mut closes = Vec::new();
        let mut v = 100.0;
        let mut seg = |slope: f64, n: usize, closes: &mut Vec<f64>| {
            for _ in 0..n {
                v += slope;
                closes.push(v);
            }
        };
        seg(0.9, 10, &mut closes);
        seg(-0.8, 10, &mut closes);
        seg(0.02, 10, &mut closes);
        seg(-1.5, 6, &mut closes);
        seg(0.8, 8, &mut closes);
        seg(-0.55, 14, &mut closes);
        seg(0.8, 10, &mut closes);
        seg(0.02, 12, &mut closes);
        seg(-2.0, 10, &mut closes);
        seg(0.02, 5, &mut closes);
        let n = closes.len();
        let frame = Ohlcv::new(
            (0..n as i64).map(ts).collect(),
            closes.clone(),
            closes.iter().map(|c| c + 0.2).collect(),
            closes.iter().map(|c| c - 0.2).collect(),
            closes,
            vec![1.0; n],
        )
        .unwrap();
        let p = GateParams {
            rsi_overbought: 70.0,
            stop_pct: 0.05,
            ..GateParams::default()
        };
        let gate = gate_series(&frame, &p);
        let transitions: Vec<usize> =
            (1..n).filter(|&i| gate[i] != gate[i - 1]).collect();
        assert_eq!(transitions, vec![15, 62, 84]);
        assert!(gate[0] && !gate[15] && gate[62] && !gate[84]);
    }
}
