use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Bar aggregation interval. Variants cover every timeframe the engines
/// consume; coarser frames are always derived from a finer raw feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    #[serde(rename = "3m")]
    M3,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "8h")]
    H8,
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "1w")]
    W1,
}

impl Timeframe {
    pub fn seconds(self) -> i64 {
        match self {
            Timeframe::M3 => 3 * 60,
            Timeframe::M5 => 5 * 60,
            Timeframe::M15 => 15 * 60,
            Timeframe::M30 => 30 * 60,
            Timeframe::H1 => 3600,
            Timeframe::H4 => 4 * 3600,
            Timeframe::H8 => 8 * 3600,
            Timeframe::D1 => 24 * 3600,
            Timeframe::W1 => 7 * 24 * 3600,
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "3m" => Ok(Timeframe::M3),
            "5m" => Ok(Timeframe::M5),
            "15m" => Ok(Timeframe::M15),
            "30m" => Ok(Timeframe::M30),
            "1h" => Ok(Timeframe::H1),
            "4h" => Ok(Timeframe::H4),
            "8h" => Ok(Timeframe::H8),
            "1d" => Ok(Timeframe::D1),
            "1w" => Ok(Timeframe::W1),
            other => Err(Error::Config(format!("unknown timeframe '{other}'"))),
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Timeframe::M3 => "3m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::H8 => "8h",
            Timeframe::D1 => "1d",
            Timeframe::W1 => "1w",
        };
        write!(f, "{s}")
    }
}

/// A single OHLCV bar.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bar {
    pub ts: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Column-major OHLCV frame. All columns share the same length and the
/// timestamp column is strictly increasing; both are checked once at
/// construction so downstream series math never revalidates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ohlcv {
    pub ts: Vec<DateTime<Utc>>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
}

impl Ohlcv {
    pub fn new(
        ts: Vec<DateTime<Utc>>,
        open: Vec<f64>,
        high: Vec<f64>,
        low: Vec<f64>,
        close: Vec<f64>,
        volume: Vec<f64>,
    ) -> Result<Self> {
        let n = ts.len();
        if [open.len(), high.len(), low.len(), close.len(), volume.len()]
            .iter()
            .any(|&l| l != n)
        {
            return Err(Error::MalformedFeed("column length mismatch".into()));
        }
        for w in ts.windows(2) {
            if w[1] <= w[0] {
                return Err(Error::MalformedFeed(format!(
                    "non-monotonic timestamps: {} then {}",
                    w[0], w[1]
                )));
            }
        }
        for i in 0..n {
            for px in [open[i], high[i], low[i], close[i]] {
                if !(px.is_finite() && px > 0.0) {
                    return Err(Error::MalformedFeed(format!(
                        "non-positive price {px} at {}",
                        ts[i]
                    )));
                }
            }
            if !(volume[i].is_finite() && volume[i] >= 0.0) {
                return Err(Error::MalformedFeed(format!(
                    "negative volume {} at {}",
                    volume[i], ts[i]
                )));
            }
        }
        Ok(Self { ts, open, high, low, close, volume })
    }

    pub fn from_bars(bars: Vec<Bar>) -> Result<Self> {
        let mut ts = Vec::with_capacity(bars.len());
        let mut open = Vec::with_capacity(bars.len());
        let mut high = Vec::with_capacity(bars.len());
        let mut low = Vec::with_capacity(bars.len());
        let mut close = Vec::with_capacity(bars.len());
        let mut volume = Vec::with_capacity(bars.len());
        for b in bars {
            ts.push(b.ts);
            open.push(b.open);
            high.push(b.high);
            low.push(b.low);
            close.push(b.close);
            volume.push(b.volume);
        }
        Self::new(ts, open, high, low, close, volume)
    }

    pub fn len(&self) -> usize {
        self.ts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ts.is_empty()
    }

    pub fn bar(&self, i: usize) -> Bar {
        Bar {
            ts: self.ts[i],
            open: self.open[i],
            high: self.high[i],
            low: self.low[i],
            close: self.close[i],
            volume: self.volume[i],
        }
    }

    /// The last `n` bars (fewer if the frame is shorter). Structure is
    /// already validated so the copy skips re-checking.
    pub fn tail(&self, n: usize) -> Ohlcv {
        let start = self.len().saturating_sub(n);
        Ohlcv {
            ts: self.ts[start..].to_vec(),
            open: self.open[start..].to_vec(),
            high: self.high[start..].to_vec(),
            low: self.low[start..].to_vec(),
            close: self.close[start..].to_vec(),
            volume: self.volume[start..].to_vec(),
        }
    }

    /// Prefix of the frame covering timestamps `<= cutoff`.
    pub fn up_to(&self, cutoff: DateTime<Utc>) -> Ohlcv {
        let end = self.ts.partition_point(|&t| t <= cutoff);
        Ohlcv {
            ts: self.ts[..end].to_vec(),
            open: self.open[..end].to_vec(),
            high: self.high[..end].to_vec(),
            low: self.low[..end].to_vec(),
            close: self.close[..end].to_vec(),
            volume: self.volume[..end].to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(i: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + i * 60, 0).unwrap()
    }

    #[test]
    fn rejects_non_monotonic_timestamps() {
        let err = Ohlcv::new(
            vec![ts(1), ts(0)],
            vec![1.0; 2],
            vec![1.0; 2],
            vec![1.0; 2],
            vec![1.0; 2],
            vec![0.0; 2],
        );
        assert!(matches!(err, Err(Error::MalformedFeed(_))));
    }

    #[test]
    fn rejects_non_positive_prices() {
        let err = Ohlcv::new(
            vec![ts(0)],
            vec![0.0],
            vec![1.0],
            vec![1.0],
            vec![1.0],
            vec![0.0],
        );
        assert!(matches!(err, Err(Error::MalformedFeed(_))));
    }

    #[test]
    fn up_to_is_inclusive() {
        let f = Ohlcv::new(
            (0..5).map(ts).collect(),
            vec![1.0; 5],
            vec![1.0; 5],
            vec![1.0; 5],
            vec![1.0; 5],
            vec![0.0; 5],
        )
        .unwrap();
        assert_eq!(f.up_to(ts(2)).len(), 3);
        assert_eq!(f.tail(2).ts[0], ts(3));
    }
}
