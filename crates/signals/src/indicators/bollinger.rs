use crate::rolling::{rolling_mean, rolling_std};

/// Bollinger bands: SMA(period) +/- k * rolling sample std (ddof = 1).
/// Returns (upper, mid, lower).
pub fn bollinger(close: &[f64], period: usize, k: f64) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let mid = rolling_mean(close, period);
    let sd = rolling_std(close, period);
    let upper: Vec<f64> = mid.iter().zip(&sd).map(|(m, s)| m + k * s).collect();
    let lower: Vec<f64> = mid.iter().zip(&sd).map(|(m, s)| m - k * s).collect();
    (upper, mid, lower)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_straddle_the_mean() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.9).sin()).collect();
        let (up, mid, lo) = bollinger(&closes, 20, 2.0);
        let i = 39;
        assert!(up[i] > mid[i] && mid[i] > lo[i]);
    }

    #[test]
    fn constant_series_has_zero_width() {
        let closes = vec![50.0; 25];
        let (up, mid, lo) = bollinger(&closes, 20, 2.0);
        assert!(up[0].is_nan());
        assert!((up[24] - 50.0).abs() < 1e-12);
        assert!((mid[24] - 50.0).abs() < 1e-12);
        assert!((lo[24] - 50.0).abs() < 1e-12);
    }
}
