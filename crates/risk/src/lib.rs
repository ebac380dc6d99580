pub mod metrics;
pub mod sizing;

pub use metrics::{summarize, BacktestSummary};
pub use sizing::{percent_of_equity, risk_per_unit, sized_qty, SizedOrder};
