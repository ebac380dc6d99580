use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Side of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

/// Lifecycle stage of a trade event emitted by an executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeKind {
    Enter,
    ExitNormal,
    ExitSl,
    ExitHalfTp,
}

impl TradeKind {
    pub fn is_exit(self) -> bool {
        !matches!(self, TradeKind::Enter)
    }
}

impl std::fmt::Display for TradeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeKind::Enter => write!(f, "enter"),
            TradeKind::ExitNormal => write!(f, "exit_normal"),
            TradeKind::ExitSl => write!(f, "exit_sl"),
            TradeKind::ExitHalfTp => write!(f, "exit_half_tp"),
        }
    }
}

/// Per-bar event record exposed to collaborators. `stop` is set on entries,
/// `pnl` on exits (net of fees).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeEvent {
    pub kind: TradeKind,
    pub symbol: String,
    pub ts: DateTime<Utc>,
    pub side: Side,
    pub price: f64,
    pub qty: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pnl: Option<f64>,
}

impl TradeEvent {
    pub fn enter(
        symbol: &str,
        ts: DateTime<Utc>,
        side: Side,
        price: f64,
        qty: f64,
        stop: f64,
    ) -> Self {
        Self {
            kind: TradeKind::Enter,
            symbol: symbol.to_string(),
            ts,
            side,
            price,
            qty,
            stop: Some(stop),
            pnl: None,
        }
    }

    pub fn exit(
        kind: TradeKind,
        symbol: &str,
        ts: DateTime<Utc>,
        side: Side,
        price: f64,
        qty: f64,
        pnl: f64,
    ) -> Self {
        Self {
            kind,
            symbol: symbol.to_string(),
            ts,
            side,
            price,
            qty,
            stop: None,
            pnl: Some(pnl),
        }
    }
}

/// An open simulated position held by an executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenPosition {
    pub id: String,
    pub side: Side,
    pub qty: f64,
    pub entry: f64,
    pub stop: f64,
}

impl OpenPosition {
    pub fn new(side: Side, qty: f64, entry: f64, stop: f64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            side,
            qty,
            entry,
            stop,
        }
    }
}

/// Current action hint for presentation layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
            Action::Hold => write!(f, "HOLD"),
        }
    }
}

/// Market regime label from the mid-timeframe chop classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    Chop,
    Trend,
    Mixed,
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Regime::Chop => write!(f, "chop"),
            Regime::Trend => write!(f, "trend"),
            Regime::Mixed => write!(f, "mixed"),
        }
    }
}
