use common::Ohlcv;

use crate::indicators::atr::true_range;
use crate::rolling::{rolling_max, rolling_min, rolling_sum};

/// Choppiness index: 100 * log10(sum(TR, n) / (HH(n) - LL(n))) / log10(n).
/// High values mean range-bound churn, low values a directional move.
/// NaN through the warm-up window and wherever the high-low range is zero.
pub fn chop_index(frame: &Ohlcv, length: usize) -> Vec<f64> {
    let tr_sum = rolling_sum(&true_range(frame), length);
    let hh = rolling_max(&frame.high, length);
    let ll = rolling_min(&frame.low, length);
    let log_len = (length as f64).log10();

    (0..frame.len())
        .map(|i| {
            let denom = hh[i] - ll[i];
            if !tr_sum[i].is_finite() || !denom.is_finite() || denom == 0.0 {
                return f64::NAN;
            }
            100.0 * (tr_sum[i] / denom).log10() / log_len
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn frame(highs: Vec<f64>, lows: Vec<f64>, closes: Vec<f64>) -> Ohlcv {
        let n = closes.len();
        Ohlcv::new(
            (0..n as i64)
                .map(|i| Utc.timestamp_opt(1_700_000_000 + i * 60, 0).unwrap())
                .collect(),
            closes.clone(),
            highs,
            lows,
            closes,
            vec![1.0; n],
        )
        .unwrap()
    }

    #[test]
    fn flat_range_is_undefined() {
        let f = frame(vec![100.0; 30], vec![100.0; 30], vec![100.0; 30]);
        assert!(chop_index(&f, 14).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn trending_series_scores_low() {
        let highs: Vec<f64> = (0..60).map(|i| 101.0 + i as f64).collect();
        let lows: Vec<f64> = (0..60).map(|i| 99.0 + i as f64).collect();
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let ch = chop_index(&frame(highs, lows, closes), 14);
        let last = *ch.last().unwrap();
        assert!(last.is_finite() && last < 38.2, "got {last}");
    }

    #[test]
    fn oscillating_series_scores_high() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i % 2) as f64).collect();
        let highs: Vec<f64> = closes.iter().map(|c| c + 0.5).collect();
        let lows: Vec<f64> = closes.iter().map(|c| c - 0.5).collect();
        let ch = chop_index(&frame(highs, lows, closes), 14);
        let last = *ch.last().unwrap();
        assert!(last.is_finite() && last > 61.8, "got {last}");
    }
}
