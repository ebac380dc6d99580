use serde::{Deserialize, Serialize};

/// Per-symbol exchange metadata the engines need: minimum price increment
/// (stop-distance floor) and quantity step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InstrumentInfo {
    pub tick_size: f64,
    pub step_size: f64,
}

impl Default for InstrumentInfo {
    fn default() -> Self {
        Self { tick_size: 0.01, step_size: 0.001 }
    }
}

impl InstrumentInfo {
    /// Lookup for a symbol. Exchange filters are a collaborator concern;
    /// without one every symbol gets the defaults.
    pub fn for_symbol(_symbol: &str) -> Self {
        Self::default()
    }
}

/// Round a quantity down to an exchange step. Non-positive steps leave the
/// value untouched.
pub fn round_step(value: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return value;
    }
    (value / step).floor() * step
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_step_floors_to_step() {
        assert!((round_step(0.0127, 0.001) - 0.012).abs() < 1e-12);
        assert_eq!(round_step(1.5, 0.0), 1.5);
    }
}
