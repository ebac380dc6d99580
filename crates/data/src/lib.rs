pub mod provider;
pub mod resample;
pub mod synthetic;

pub use provider::SyntheticProvider;
pub use resample::resample;
pub use synthetic::synthetic_hourly;
