use serde::{Deserialize, Serialize};

/// Verdict from an external signal classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreAction {
    Take,
    Skip,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreDecision {
    pub action: ScoreAction,
    pub confidence: f64,
}

impl ScoreDecision {
    pub fn take(confidence: f64) -> Self {
        Self { action: ScoreAction::Take, confidence }
    }
}

/// Feature vector handed to the scorer at entry evaluation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryFeatures {
    pub rsi: f64,
    pub div_score: f64,
    pub bias: i8,
    pub bias_confidence: f64,
    pub regime_confidence: f64,
}

/// Optional ML filter gating entries. The engines treat this as an opaque
/// collaborator: when no scorer is configured, every divergence-qualified
/// entry is taken.
pub trait SignalScorer: Send + Sync {
    fn score(&self, features: &EntryFeatures) -> ScoreDecision;
}
