use common::round_step;

/// Hard ceiling on the equity fraction risked on a single entry. Compiled-in
/// constant, not user-configurable.
pub const MAX_RISK_PCT: f64 = 0.05;

/// Assumed reward-to-risk of a qualified divergence entry, used only to
/// shade the Kelly tilt.
const RR_APPROX: f64 = 1.8;

/// A sized order: quantity plus the equity fraction it risks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizedOrder {
    pub qty: f64,
    pub risk_pct: f64,
}

impl SizedOrder {
    pub const ZERO: SizedOrder = SizedOrder {
        qty: 0.0,
        risk_pct: 0.0,
    };
}

/// Notional percent-of-equity sizing. A non-positive entry price yields a
/// zero order, which callers treat as a rejected entry.
pub fn percent_of_equity(equity: f64, entry: f64, pct: f64) -> SizedOrder {
    if entry <= 0.0 {
        return SizedOrder::ZERO;
    }
    let qty = (equity * pct / entry).max(0.0);
    SizedOrder { qty, risk_pct: pct }
}

/// Risk-per-unit sizing with a confidence-scaled base and a capped Kelly
/// tilt. `confidence` is the entry confidence in [0, 1]; the effective risk
/// fraction never exceeds [`MAX_RISK_PCT`].
pub fn risk_per_unit(
    equity: f64,
    entry: f64,
    stop: f64,
    base_risk_pct: f64,
    confidence: f64,
    kelly_frac: f64,
) -> SizedOrder {
    let per_unit = (entry - stop).abs();
    if per_unit <= 0.0 || entry <= 0.0 {
        return SizedOrder::ZERO;
    }
    let mut risk_pct = base_risk_pct * (0.5 + 1.5 * confidence);
    let edge = confidence;
    let kelly = ((edge * RR_APPROX - (1.0 - edge)) / RR_APPROX).max(0.0);
    risk_pct = (risk_pct + kelly * kelly_frac).min(MAX_RISK_PCT);
    let qty = (equity * risk_pct / per_unit).max(0.0);
    SizedOrder { qty, risk_pct }
}

/// Quantity for a fixed risk fraction, rounded down to the instrument step.
pub fn sized_qty(equity: f64, entry: f64, stop: f64, risk_pct: f64, step_size: f64) -> f64 {
    let per_unit = (entry - stop).abs();
    if per_unit <= 0.0 || entry <= 0.0 {
        return 0.0;
    }
    let risk_amt = equity.max(0.0) * risk_pct.max(0.0);
    round_step(risk_amt / per_unit, step_size)
}
