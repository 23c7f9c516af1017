use crate::error::{AppError, Result};

pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Poll loop period (seconds) — snapshot persistence + spread alerts.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 120;

/// Target-price evaluator period (seconds). Independent of the poll loop so a
/// partial outage in one does not block the other.
pub const DEFAULT_EVALUATOR_INTERVAL_SECS: u64 = 60;

/// Spread percentage above which spread/media-spread subscribers are alerted.
pub const DEFAULT_SPREAD_ALERT_PCT: f64 = 0.8;

/// How long a pending "send me your target price" dialog stays valid.
pub const DEFAULT_DIALOG_TTL_SECS: u64 = 300;

/// Provider request timeout (seconds).
pub const HTTP_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram bot token (TOKEN_BOT)
    pub bot_token: String,
    /// Spot price endpoint returning {success, buy, sell} (API_USDT)
    pub spot_url: String,
    /// Media endpoint base; the side segment ("buy"/"sell") is appended (API_USDT_MEDIA)
    pub media_base_url: String,
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    pub poll_interval_secs: u64,
    pub evaluator_interval_secs: u64,
    pub spread_alert_pct: f64,
    pub dialog_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bot_token: require("TOKEN_BOT")?,
            spot_url: require("API_USDT")?,
            media_base_url: require("API_USDT_MEDIA")?,
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "alerts.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            poll_interval_secs: parse_or("POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS),
            evaluator_interval_secs: parse_or(
                "EVALUATOR_INTERVAL_SECS",
                DEFAULT_EVALUATOR_INTERVAL_SECS,
            ),
            spread_alert_pct: std::env::var("SPREAD_ALERT_PCT")
                .ok()
                .and_then(|v| v.parse::<f64>().ok())
                .unwrap_or(DEFAULT_SPREAD_ALERT_PCT),
            dialog_ttl_secs: parse_or("DIALOG_TTL_SECS", DEFAULT_DIALOG_TTL_SECS),
        })
    }
}

fn require(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| AppError::Config(format!("{name} must be set")))
}

fn parse_or(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}
