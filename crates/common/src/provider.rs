use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::bars::{Ohlcv, Timeframe};
use crate::error::Result;

/// Abstraction over the OHLCV history source.
///
/// `SyntheticProvider` in `crates/data` implements this for backtests
/// without connectivity; a live exchange client would implement it for
/// real history. Returned frames are validated (`Ohlcv::new`), so
/// strictly increasing timestamps are guaranteed to callers.
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    async fn get_history(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Ohlcv>;
}
