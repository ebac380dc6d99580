pub mod bars;
pub mod config;
pub mod error;
pub mod instrument;
pub mod provider;
pub mod scorer;
pub mod types;

pub use bars::{Bar, Ohlcv, Timeframe};
pub use config::Config;
pub use error::{Error, Result};
pub use instrument::{round_step, InstrumentInfo};
pub use provider::HistoryProvider;
pub use scorer::{EntryFeatures, ScoreAction, ScoreDecision, SignalScorer};
pub use types::*;
