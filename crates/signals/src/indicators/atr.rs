use common::Ohlcv;

use crate::rolling::ewm;

/// True range per bar: max(high-low, |high-prev_close|, |low-prev_close|).
/// The first bar has no previous close and is NaN.
pub fn true_range(frame: &Ohlcv) -> Vec<f64> {
    let n = frame.len();
    let mut tr = vec![f64::NAN; n];
    for i in 1..n {
        let pc = frame.close[i - 1];
        tr[i] = (frame.high[i] - frame.low[i])
            .max((frame.high[i] - pc).abs())
            .max((frame.low[i] - pc).abs());
    }
    tr
}

/// Average true range, Wilder-smoothed (alpha = 1/length).
pub fn atr(frame: &Ohlcv, length: usize) -> Vec<f64> {
    ewm(&true_range(frame), 1.0 / length as f64)
}
