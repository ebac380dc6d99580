use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Structurally invalid upstream feed: non-monotonic timestamps,
    /// non-positive prices, mismatched column lengths. Market conditions
    /// (thin data, degenerate indicators) never produce this.
    #[error("Malformed feed: {0}")]
    MalformedFeed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Data provider error: {0}")]
    Provider(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
