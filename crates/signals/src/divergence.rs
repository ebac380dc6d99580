//! RSI pivot and divergence detection.
//!
//! Pivots need `right` future bars to confirm, so raw window tests are
//! shifted forward by `right` bars before anything downstream sees them.
//! Every flag at index `i` therefore depends only on data at indices
//! `<= i`; the confirmation delay is part of the contract, not an
//! implementation detail to smooth away.

use crate::rolling::shift;

/// True at emission index `i` when `series[i-right]` equals the minimum of
/// the centered window `[i-right-left, i]`. Indices before `right` are
/// always false, as are windows that leave the series or contain NaN.
pub fn pivot_low(series: &[f64], left: usize, right: usize) -> Vec<bool> {
    pivot(series, left, right, |v, w| v <= w)
}

/// Mirror of [`pivot_low`] for local maxima.
pub fn pivot_high(series: &[f64], left: usize, right: usize) -> Vec<bool> {
    pivot(series, left, right, |v, w| v >= w)
}

fn pivot<F: Fn(f64, f64) -> bool>(
    series: &[f64],
    left: usize,
    right: usize,
    extreme: F,
) -> Vec<bool> {
    let n = series.len();
    let mut out = vec![false; n];
    for emit in right..n {
        let center = emit - right;
        if center < left {
            continue;
        }
        let lo = center - left;
        let hi = emit; // center + right
        let window = &series[lo..=hi];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        out[emit] = window.iter().all(|&w| extreme(series[center], w));
    }
    out
}

/// Causal "value at the occurrence-th most recent true condition".
///
/// At index `i`, returns `values[j]` where `j` is the occurrence-th most
/// recent index `<= i` with `cond[j]` true (occurrence 0 = most recent).
/// NaN until enough occurrences have happened; forward-filled between
/// occurrences afterwards.
pub fn valuewhen(cond: &[bool], values: &[f64], occurrence: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; cond.len()];
    let mut hits: Vec<f64> = Vec::new();
    for i in 0..cond.len() {
        if cond[i] {
            hits.push(values[i]);
        }
        if hits.len() > occurrence {
            out[i] = hits[hits.len() - 1 - occurrence];
        }
    }
    out
}

/// Bars elapsed since the last true flag strictly before each index. The
/// counter resets the bar after a flag and counts from the series start
/// (`i + 1`) before any flag has fired.
pub fn bars_since_last(flags: &[bool]) -> Vec<usize> {
    let mut out = vec![0usize; flags.len()];
    let mut count = 0usize;
    for i in 0..flags.len() {
        if i > 0 && flags[i - 1] {
            count = 0;
        } else {
            count += 1;
        }
        out[i] = count;
    }
    out
}

/// Bullish divergence: RSI pivot-low whose momentum made a higher low while
/// price made a lower low versus the previous pivot, with the pivot gap
/// inside `[range_low, range_up]` bars. Comparisons against a missing
/// previous pivot are false, so the first pivot of a series never flags.
pub fn bull_divergence(
    rsi: &[f64],
    low: &[f64],
    left: usize,
    right: usize,
    range_low: usize,
    range_up: usize,
) -> Vec<bool> {
    let pl = pivot_low(rsi, left, right);
    let rsi_r = shift(rsi, right);
    let low_r = shift(low, right);
    let prev_rsi = valuewhen(&pl, &rsi_r, 1);
    let prev_low = valuewhen(&pl, &low_r, 1);
    let gap = bars_since_last(&pl);

    (0..rsi.len())
        .map(|i| {
            pl[i]
                && rsi_r[i] > prev_rsi[i]
                && low_r[i] < prev_low[i]
                && (range_low..=range_up).contains(&gap[i])
        })
        .collect()
}

/// Bearish divergence: RSI pivot-high with lower-high momentum and
/// higher-high price versus the previous pivot.
pub fn bear_divergence(
    rsi: &[f64],
    high: &[f64],
    left: usize,
    right: usize,
    range_low: usize,
    range_up: usize,
) -> Vec<bool> {
    let ph = pivot_high(rsi, left, right);
    let rsi_r = shift(rsi, right);
    let high_r = shift(high, right);
    let prev_rsi = valuewhen(&ph, &rsi_r, 1);
    let prev_high = valuewhen(&ph, &high_r, 1);
    let gap = bars_since_last(&ph);

    (0..rsi.len())
        .map(|i| {
            ph[i]
                && rsi_r[i] < prev_rsi[i]
                && high_r[i] > prev_high[i]
                && (range_low..=range_up).contains(&gap[i])
        })
        .collect()
}
