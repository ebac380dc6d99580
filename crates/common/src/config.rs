/// Process-level configuration loaded from environment variables at
/// startup. Per-symbol engine parameters live in the TOML backtest file;
/// only deployment concerns are environment-driven.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the TOML backtest configuration.
    pub backtest_config_path: String,
}

impl Config {
    /// Load configuration from environment variables, reading `.env` if
    /// present. Missing required variables panic with a clear message.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        Config {
            backtest_config_path: optional_env("BACKTEST_CONFIG_PATH")
                .unwrap_or_else(|| "config/backtest.toml".to_string()),
        }
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
