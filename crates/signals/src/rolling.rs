//! Series primitives shared by the indicator library and the divergence
//! detector. All series are `Vec<f64>` aligned 1:1 with the source bars;
//! undefined entries are NaN, never zero, and every comparison against NaN
//! evaluates to false.

/// Shift a series forward by `n` bars; the first `n` entries become NaN.
pub fn shift(series: &[f64], n: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; series.len()];
    for i in n..series.len() {
        out[i] = series[i - n];
    }
    out
}

/// Forward-fill NaN gaps with the last finite value. Leading NaNs stay NaN.
pub fn ffill(series: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(series.len());
    let mut last = f64::NAN;
    for &v in series {
        if v.is_finite() {
            last = v;
        }
        out.push(last);
    }
    out
}

/// Replace NaN entries with `value`.
pub fn fill_nan(series: &[f64], value: f64) -> Vec<f64> {
    series
        .iter()
        .map(|&v| if v.is_nan() { value } else { v })
        .collect()
}

/// True where the series crosses above `level`: prev <= level && cur > level.
/// NaN on either bar means no cross.
pub fn crossover(series: &[f64], level: f64) -> Vec<bool> {
    let mut out = vec![false; series.len()];
    for i in 1..series.len() {
        out[i] = series[i - 1] <= level && series[i] > level;
    }
    out
}

/// True where the series crosses below `level`: prev >= level && cur < level.
pub fn crossunder(series: &[f64], level: f64) -> Vec<bool> {
    let mut out = vec![false; series.len()];
    for i in 1..series.len() {
        out[i] = series[i - 1] >= level && series[i] < level;
    }
    out
}

/// Bars elapsed since the condition was last true, zero on the flagged bar
/// itself and `usize::MAX` before the first true entry.
pub fn bars_since_true(flags: &[bool]) -> Vec<usize> {
    let mut out = Vec::with_capacity(flags.len());
    let mut last: Option<usize> = None;
    for (i, &f) in flags.iter().enumerate() {
        if f {
            last = Some(i);
        }
        out.push(match last {
            Some(j) => i - j,
            None => usize::MAX,
        });
    }
    out
}

/// Rolling window reduction: NaN until the window is full, NaN whenever the
/// window contains a NaN.
fn rolling<F: Fn(&[f64]) -> f64>(series: &[f64], window: usize, f: F) -> Vec<f64> {
    let mut out = vec![f64::NAN; series.len()];
    if window == 0 {
        return out;
    }
    for i in (window - 1)..series.len() {
        let w = &series[i + 1 - window..=i];
        if w.iter().all(|v| v.is_finite()) {
            out[i] = f(w);
        }
    }
    out
}

pub fn rolling_sum(series: &[f64], window: usize) -> Vec<f64> {
    rolling(series, window, |w| w.iter().sum())
}

pub fn rolling_max(series: &[f64], window: usize) -> Vec<f64> {
    rolling(series, window, |w| w.iter().copied().fold(f64::MIN, f64::max))
}

pub fn rolling_min(series: &[f64], window: usize) -> Vec<f64> {
    rolling(series, window, |w| w.iter().copied().fold(f64::MAX, f64::min))
}

pub fn rolling_mean(series: &[f64], window: usize) -> Vec<f64> {
    rolling(series, window, |w| w.iter().sum::<f64>() / w.len() as f64)
}

/// Rolling sample standard deviation (ddof = 1). Windows of length 1 give
/// NaN.
pub fn rolling_std(series: &[f64], window: usize) -> Vec<f64> {
    rolling(series, window, |w| {
        if w.len() < 2 {
            return f64::NAN;
        }
        let mean = w.iter().sum::<f64>() / w.len() as f64;
        let var =
            w.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (w.len() - 1) as f64;
        var.sqrt()
    })
}

/// Recursive (adjust-free) exponential smoothing, seeded at the first
/// finite input. NaN inputs before the seed stay NaN; NaN after the seed
/// carry the running average forward without updating it.
pub fn ewm(series: &[f64], alpha: f64) -> Vec<f64> {
    let mut out = vec![f64::NAN; series.len()];
    let mut avg = f64::NAN;
    for (i, &v) in series.iter().enumerate() {
        if v.is_finite() {
            avg = if avg.is_nan() { v } else { alpha * v + (1.0 - alpha) * avg };
        }
        out[i] = avg;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_introduces_leading_nans() {
        let s = shift(&[1.0, 2.0, 3.0], 2);
        assert!(s[0].is_nan() && s[1].is_nan());
        assert_eq!(s[2], 1.0);
    }

    #[test]
    fn ffill_keeps_leading_nan() {
        let s = ffill(&[f64::NAN, 2.0, f64::NAN, f64::NAN, 5.0]);
        assert!(s[0].is_nan());
        assert_eq!(s[2], 2.0);
        assert_eq!(s[3], 2.0);
        assert_eq!(s[4], 5.0);
    }

    #[test]
    fn crossover_requires_prior_bar_at_or_below() {
        let c = crossover(&[50.0, 69.0, 71.0, 72.0], 70.0);
        assert_eq!(c, vec![false, false, true, false]);
    }

    #[test]
    fn crossunder_ignores_nan_neighbors() {
        let c = crossunder(&[f64::NAN, 25.0, 80.0, 60.0], 70.0);
        assert_eq!(c, vec![false, false, false, true]);
    }

    #[test]
    fn bars_since_true_counts_from_the_flag() {
        let b = bars_since_true(&[false, true, false, false, true, false]);
        assert_eq!(b, vec![usize::MAX, 0, 1, 2, 0, 1]);
    }

    #[test]
    fn rolling_windows_are_nan_until_full() {
        let m = rolling_mean(&[1.0, 2.0, 3.0, 4.0], 3);
        assert!(m[0].is_nan() && m[1].is_nan());
        assert!((m[2] - 2.0).abs() < 1e-12);
        assert!((m[3] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn rolling_std_is_sample_std() {
        // std([1,2,3], ddof=1) = 1
        let s = rolling_std(&[1.0, 2.0, 3.0], 3);
        assert!((s[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn rolling_poisoned_by_nan_member() {
        let m = rolling_sum(&[1.0, f64::NAN, 3.0, 4.0], 2);
        assert!(m[1].is_nan() && m[2].is_nan());
        assert!((m[3] - 7.0).abs() < 1e-12);
    }

    #[test]
    fn ewm_seeds_at_first_finite() {
        let e = ewm(&[f64::NAN, 10.0, 20.0], 0.5);
        assert!(e[0].is_nan());
        assert_eq!(e[1], 10.0);
        assert_eq!(e[2], 15.0);
    }
}
