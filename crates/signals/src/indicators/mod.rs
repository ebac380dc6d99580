pub mod atr;
pub mod bollinger;
pub mod chop;
pub mod ema;
pub mod rsi;

pub use atr::{atr, true_range};
pub use bollinger::bollinger;
pub use chop::chop_index;
pub use ema::ema;
pub use rsi::rsi_wilder;
