use chrono::{DateTime, Utc};
use common::{Action, Bar, Ohlcv, TradeEvent, TradeKind};
use risk::BacktestSummary;
use serde::{Deserialize, Serialize};

/// At most this many trailing candles are embedded in a snapshot.
const MAX_CANDLES: usize = 500;
/// At most this many trailing trade markers are embedded in a snapshot.
const MAX_MARKERS: usize = 200;

/// A trade pinned to a chart coordinate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeMarker {
    pub ts: DateTime<Utc>,
    pub kind: TradeKind,
    pub price: f64,
}

/// Point-in-time view of one symbol after a backtest: the current action
/// hint, the run summary and enough trailing candles and trade markers to
/// render a chart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalSnapshot {
    pub symbol: String,
    pub action: Action,
    pub summary: BacktestSummary,
    pub candles: Vec<Bar>,
    pub markers: Vec<TradeMarker>,
}

impl SignalSnapshot {
    pub fn build(
        symbol: &str,
        frame: &Ohlcv,
        summary: BacktestSummary,
        trades: &[TradeEvent],
    ) -> Self {
        let action = match trades.last() {
            Some(t) if t.kind == TradeKind::Enter => Action::Buy,
            Some(_) => Action::Sell,
            None => Action::Hold,
        };
        let tail = frame.tail(MAX_CANDLES);
        let candles = (0..tail.len()).map(|i| tail.bar(i)).collect();
        let markers = trades
            .iter()
            .rev()
            .take(MAX_MARKERS)
            .rev()
            .map(|t| TradeMarker {
                ts: t.ts,
                kind: t.kind,
                price: t.price,
            })
            .collect();
        Self {
            symbol: symbol.to_string(),
            action,
            summary,
            candles,
            markers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use common::Side;

    fn frame(n: usize) -> Ohlcv {
        let ts = (0..n)
            .map(|i| Utc.timestamp_opt(1_700_000_000 + i as i64 * 3600, 0).unwrap())
            .collect();
        let px: Vec<f64> = (0..n).map(|i| 100.0 + i as f64 * 0.1).collect();
        Ohlcv::new(
            ts,
            px.clone(),
            px.iter().map(|p| p + 0.5).collect(),
            px.iter().map(|p| p - 0.5).collect(),
            px,
            vec![1.0; n],
        )
        .unwrap()
    }

    #[test]
    fn candles_and_markers_are_capped() {
        let f = frame(700);
        let trades: Vec<TradeEvent> = (0..250)
            .map(|i| TradeEvent::enter("X", f.ts[i], Side::Long, 100.0, 1.0, 98.0))
            .collect();
        let snap = SignalSnapshot::build("X", &f, BacktestSummary::empty(10_000.0), &trades);
        assert_eq!(snap.candles.len(), 500);
        assert_eq!(snap.markers.len(), 200);
        // the newest markers survive the cap
        assert_eq!(snap.markers.last().map(|m| m.ts), trades.last().map(|t| t.ts));
    }

    #[test]
    fn action_follows_the_last_trade() {
        let f = frame(10);
        let empty = SignalSnapshot::build("X", &f, BacktestSummary::empty(10_000.0), &[]);
        assert_eq!(empty.action, Action::Hold);

        let entered = vec![TradeEvent::enter("X", f.ts[5], Side::Long, 100.0, 1.0, 98.0)];
        let snap = SignalSnapshot::build("X", &f, BacktestSummary::empty(10_000.0), &entered);
        assert_eq!(snap.action, Action::Buy);

        let mut closed = entered;
        closed.push(TradeEvent::exit(
            TradeKind::ExitNormal,
            "X",
            f.ts[8],
            Side::Long,
            101.0,
            1.0,
            1.0,
        ));
        let snap = SignalSnapshot::build("X", &f, BacktestSummary::empty(10_000.0), &closed);
        assert_eq!(snap.action, Action::Sell);
    }
}
