use crate::rolling::ewm;

/// RSI with Wilder's smoothing (alpha = 1/length, the classic TradingView
/// formula, not the EMA span form).
///
/// Up and down moves are split with a clip at zero and each side is
/// smoothed recursively. When the smoothed down-move average is exactly
/// zero the output is NaN; consumers that feed RSI into boolean logic must
/// default NaN to the neutral 50 first.
pub fn rsi_wilder(close: &[f64], length: usize) -> Vec<f64> {
    let n = close.len();
    let mut up = vec![f64::NAN; n];
    let mut down = vec![f64::NAN; n];
    for i in 1..n {
        let delta = close[i] - close[i - 1];
        up[i] = delta.max(0.0);
        down[i] = (-delta).max(0.0);
    }

    let alpha = 1.0 / length as f64;
    let roll_up = ewm(&up, alpha);
    let roll_down = ewm(&down, alpha);

    (0..n)
        .map(|i| {
            let (u, d) = (roll_up[i], roll_down[i]);
            if !u.is_finite() || !d.is_finite() || d == 0.0 {
                return f64::NAN;
            }
            let rs = u / d;
            100.0 - 100.0 / (1.0 + rs)
        })
        .collect()
}
