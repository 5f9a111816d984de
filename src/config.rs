use url::Url;

use crate::logging::{log, obj, v_str, Domain, Level};
use crate::retry::RetryConfig;
use crate::summary::ViewOptions;

#[derive(Debug, Clone)]
pub struct Config {
    pub sqlite_path: String,
    /// Read by the renderer only; aggregation never looks at it.
    pub display_url: Option<Url>,
    pub top_n: usize,
    pub recent_limit: usize,
    pub change_poll_ms: u64,
    pub http_port: u16,
    pub fetch_retries: u32,
    pub fetch_base_delay_ms: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            sqlite_path: std::env::var("SALES_DB_PATH").unwrap_or_else(|_| "./sales.sqlite".to_string()),
            display_url: std::env::var("DISPLAY_URL").ok().and_then(|v| parse_display_url(&v)),
            top_n: std::env::var("TOP_N").ok().and_then(|v| v.parse().ok()).filter(|n| *n > 0).unwrap_or(5),
            recent_limit: std::env::var("RECENT_LIMIT").ok().and_then(|v| v.parse().ok()).unwrap_or(10),
            change_poll_ms: std::env::var("CHANGE_POLL_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(1000),
            http_port: std::env::var("DASHBOARD_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(8766),
            fetch_retries: std::env::var("FETCH_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(3),
            fetch_base_delay_ms: std::env::var("FETCH_BASE_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(100),
        }
    }

    pub fn view_options(&self) -> ViewOptions {
        ViewOptions {
            top_n: self.top_n,
            recent_limit: self.recent_limit,
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.fetch_retries,
            base_delay_ms: self.fetch_base_delay_ms,
            ..RetryConfig::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sqlite_path: "./sales.sqlite".to_string(),
            display_url: None,
            top_n: 5,
            recent_limit: 10,
            change_poll_ms: 1000,
            http_port: 8766,
            fetch_retries: 3,
            fetch_base_delay_ms: 100,
        }
    }
}

/// Empty means unset; an unparseable value is reported and dropped.
pub fn parse_display_url(raw: &str) -> Option<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match Url::parse(trimmed) {
        Ok(url) => Some(url),
        Err(err) => {
            log(
                Level::Warn,
                Domain::System,
                "config_invalid",
                obj(&[
                    ("key", v_str("DISPLAY_URL")),
                    ("value", v_str(trimmed)),
                    ("error", v_str(&err.to_string())),
                ]),
            );
            None
        }
    }
}
