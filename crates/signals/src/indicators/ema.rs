use crate::rolling::ewm;

/// Standard exponential moving average, recursive form with
/// alpha = 2/(length+1), seeded at the first value.
pub fn ema(series: &[f64], length: usize) -> Vec<f64> {
    ewm(series, 2.0 / (length as f64 + 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_seeds_at_first_value() {
        let e = ema(&[10.0, 10.0, 10.0], 5);
        assert!(e.iter().all(|&v| (v - 10.0).abs() < 1e-12));
    }

    #[test]
    fn ema_tracks_trend_with_lag() {
        let prices: Vec<f64> = (0..50).map(|i| 100.0 + i as f64).collect();
        let e = ema(&prices, 10);
        let last = *e.last().unwrap();
        assert!(last < *prices.last().unwrap());
        assert!(last > prices[30]);
    }
}
