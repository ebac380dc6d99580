pub mod divergence;
pub mod filters;
pub mod indicators;
pub mod rolling;

pub use divergence::{
    bars_since_last, bear_divergence, bull_divergence, pivot_high, pivot_low, valuewhen,
};
pub use filters::{bb_squeeze, htf_bias, mid_chop};
pub use indicators::{atr, bollinger, chop_index, ema, rsi_wilder};
pub use rolling::{bars_since_true, crossover, crossunder, ffill, fill_nan, shift};
