//! Regime and bias filters gating long entries. Each takes frames already
//! resampled by the caller so the detector crate stays free of data
//! plumbing.

use common::{Ohlcv, Regime};

use crate::indicators::{bollinger, chop_index, ema};

/// Higher-timeframe trend bias vote: daily dual-EMA cross plus weekly
/// EMA(50) slope. Returns `(bias, confidence)` where bias is +1/-1 only on
/// a unanimous vote and 0 otherwise. Insufficient history is the neutral
/// `(0, 0.4)`.
pub fn htf_bias(daily: &Ohlcv, weekly: &Ohlcv, ema_short: usize, ema_long: usize) -> (i8, f64) {
    if daily.len() < ema_long.max(5) || weekly.len() < 60 {
        return (0, 0.4);
    }
    let e_s = ema(&daily.close, ema_short);
    let e_l = ema(&daily.close, ema_long);
    let v1: i32 = if e_s[e_s.len() - 1] > e_l[e_l.len() - 1] { 1 } else { -1 };

    let e_w = ema(&weekly.close, 50);
    let v2: i32 = if e_w[e_w.len() - 1] > e_w[e_w.len() - 2] { 1 } else { -1 };

    let votes = v1 + v2;
    let bias: i8 = if votes >= 2 {
        1
    } else if votes <= -2 {
        -1
    } else {
        0
    };

    let anchor = e_l[e_l.len() - 5];
    let slope = (e_l[e_l.len() - 1] - anchor) / if anchor != 0.0 { anchor } else { 1.0 };
    let conf = (0.55 + (slope.abs() * 10.0).min(0.45)).clamp(0.0, 1.0);
    (bias, conf)
}

/// Mid-timeframe chop classifier: mean of the 4h and 1h choppiness index.
/// Above 61.8 is chop, below 38.2 trend, otherwise mixed; confidence decays
/// linearly with distance from the nearer band edge.
pub fn mid_chop(h4: &Ohlcv, h1: &Ohlcv, chop_len: usize) -> (Regime, f64) {
    if h4.len() < chop_len * 3 || h1.len() < chop_len * 3 {
        return (Regime::Mixed, 0.5);
    }
    let c4 = chop_index(h4, chop_len);
    let c1 = chop_index(h1, chop_len);
    let ch = (c4[c4.len() - 1] + c1[c1.len() - 1]) / 2.0;
    if !ch.is_finite() {
        return (Regime::Mixed, 0.5);
    }

    let regime = if ch > 61.8 {
        Regime::Chop
    } else if ch < 38.2 {
        Regime::Trend
    } else {
        Regime::Mixed
    };
    let edge = if regime == Regime::Chop { 61.8 } else { 38.2 };
    let conf = (1.0 - ((ch - edge).abs() / 22.0).min(1.0)).clamp(0.0, 1.0);
    (regime, conf)
}

/// Bollinger-band squeeze prefilter on the 1h frame: normalized band width
/// under 5%. An undefined width (warm-up, zero mean) is no squeeze.
pub fn bb_squeeze(h1: &Ohlcv, period: usize, k: f64) -> bool {
    if h1.is_empty() {
        return false;
    }
    let (up, mid, lo) = bollinger(&h1.close, period, k);
    let i = h1.len() - 1;
    let width = (up[i] - lo[i]) / mid[i];
    width.is_finite() && width < 0.05
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn frame(closes: Vec<f64>, spread: f64, step_secs: i64) -> Ohlcv {
        let n = closes.len();
        Ohlcv::new(
            (0..n as i64)
                .map(|i| Utc.timestamp_opt(1_600_000_000 + i * step_secs, 0).unwrap())
                .collect(),
            closes.clone(),
            closes.iter().map(|c| c + spread).collect(),
            closes.iter().map(|c| c - spread).collect(),
            closes,
            vec![1.0; n],
        )
        .unwrap()
    }

    #[test]
    fn bias_neutral_on_short_history() {
        let daily = frame((0..10).map(|i| 100.0 + i as f64).collect(), 1.0, 86_400);
        let weekly = frame((0..10).map(|i| 100.0 + i as f64).collect(), 1.0, 604_800);
        assert_eq!(htf_bias(&daily, &weekly, 9, 21), (0, 0.4));
    }

    #[test]
    fn bias_positive_on_unanimous_uptrend() {
        let daily = frame((0..120).map(|i| 100.0 * 1.01f64.powi(i)).collect(), 1.0, 86_400);
        let weekly = frame((0..70).map(|i| 100.0 * 1.02f64.powi(i)).collect(), 1.0, 604_800);
        let (bias, conf) = htf_bias(&daily, &weekly, 9, 21);
        assert_eq!(bias, 1);
        assert!((0.55..=1.0).contains(&conf));
    }

    #[test]
    fn chop_classifier_labels_oscillation() {
        let closes: Vec<f64> = (0..100).map(|i| 100.0 + (i % 2) as f64).collect();
        let h4 = frame(closes.clone(), 0.6, 4 * 3600);
        let h1 = frame(closes, 0.6, 3600);
        let (regime, conf) = mid_chop(&h4, &h1, 14);
        assert_eq!(regime, Regime::Chop);
        assert!((0.0..=1.0).contains(&conf));
    }

    #[test]
    fn squeeze_detects_narrow_bands() {
        let tight = frame((0..40).map(|i| 100.0 + (i % 2) as f64 * 0.01).collect(), 0.01, 3600);
        let wide = frame((0..40).map(|i| 100.0 + (i % 2) as f64 * 20.0).collect(), 1.0, 3600);
        assert!(bb_squeeze(&tight, 20, 2.0));
        assert!(!bb_squeeze(&wide, 20, 2.0));
    }
}
