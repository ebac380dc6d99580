use chrono::{DateTime, TimeZone, Utc};
use common::{Ohlcv, Timeframe};

fn bucket_start(ts: DateTime<Utc>, step: i64) -> DateTime<Utc> {
    let secs = ts.timestamp().div_euclid(step) * step;
    Utc.timestamp_opt(secs, 0).single().unwrap_or(ts)
}

/// Aggregate a frame into `tf` buckets: open first, high max, low min,
/// close last, volume sum. Buckets are aligned to epoch multiples of the
/// target interval. Empty buckets never appear and a partial trailing
/// bucket is dropped so the last bar is always fully formed.
pub fn resample(frame: &Ohlcv, tf: Timeframe) -> Ohlcv {
    let step = tf.seconds();
    let n = frame.len();
    if n == 0 {
        return Ohlcv::default();
    }

    let mut out = Ohlcv::default();
    let mut i = 0;
    while i < n {
        let start = bucket_start(frame.ts[i], step);
        let mut j = i;
        let mut high = frame.high[i];
        let mut low = frame.low[i];
        let mut volume = 0.0;
        while j < n && bucket_start(frame.ts[j], step) == start {
            high = high.max(frame.high[j]);
            low = low.min(frame.low[j]);
            volume += frame.volume[j];
            j += 1;
        }
        out.ts.push(start);
        out.open.push(frame.open[i]);
        out.high.push(high);
        out.low.push(low);
        out.close.push(frame.close[j - 1]);
        out.volume.push(volume);
        i = j;
    }

    // the source feed may still be filling the last bucket
    let last_start = *out.ts.last().unwrap_or(&frame.ts[0]);
    let source_step = if n > 1 {
        (frame.ts[1] - frame.ts[0]).num_seconds()
    } else {
        step
    };
    if frame.ts[n - 1].timestamp() + source_step < last_start.timestamp() + step {
        out.ts.pop();
        out.open.pop();
        out.high.pop();
        out.low.pop();
        out.close.pop();
        out.volume.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn hourly(n: usize) -> Ohlcv {
        Ohlcv::new(
            (0..n as i64)
                .map(|i| Utc.timestamp_opt(i * 3600, 0).unwrap())
                .collect(),
            (0..n).map(|i| 100.0 + i as f64).collect(),
            (0..n).map(|i| 101.0 + i as f64).collect(),
            (0..n).map(|i| 99.0 + i as f64).collect(),
            (0..n).map(|i| 100.5 + i as f64).collect(),
            vec![2.0; n],
        )
        .unwrap()
    }

    #[test]
    fn aggregates_ohlcv_per_bucket() {
        let out = resample(&hourly(8), Timeframe::H4);
        assert_eq!(out.len(), 2);
        assert_eq!(out.open[0], 100.0);
        assert_eq!(out.high[0], 104.0);
        assert_eq!(out.low[0], 99.0);
        assert_eq!(out.close[0], 103.5);
        assert_eq!(out.volume[0], 8.0);
        assert_eq!(out.open[1], 104.0);
    }

    #[test]
    fn drops_partial_trailing_bucket() {
        // 6 hourly bars fill one 4h bucket and half of the next
        let out = resample(&hourly(6), Timeframe::H4);
        assert_eq!(out.len(), 1);
        assert_eq!(out.close[0], 103.5);
    }

    #[test]
    fn empty_input_stays_empty() {
        assert!(resample(&Ohlcv::default(), Timeframe::D1).is_empty());
    }
}
