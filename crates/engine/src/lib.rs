pub mod executor;
pub mod gate;
pub mod hedge;
pub mod long;
pub mod orchestrator;
pub mod short;
pub mod snapshot;

pub use executor::{BarExecutor, BarSnapshot, ExecutorParams};
pub use gate::{ffill_to_fine, gate_series, GateParams};
pub use hedge::{HedgeEngine, HedgeParams, HedgeReport};
pub use long::{LongEngine, LongParams};
pub use orchestrator::{BacktestConfig, EngineConfig, Orchestrator, StreamParams, SymbolReport};
pub use short::{ShortEngine, ShortParams};
pub use snapshot::{SignalSnapshot, TradeMarker};
