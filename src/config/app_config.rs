use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::monitoring::log_parser::PoolHint;

pub const DEFAULT_LOG_FILE: &str = "/var/log/nginx/access_file.log";
pub const DEFAULT_POOL_HINTS: &str = "blue=app_blue|.2:;green=app_green|.3:";

/// 워처 설정
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Slack incoming webhook; alerts are only logged when absent
    pub slack_webhook_url: Option<String>,
    /// Pool assumed to be serving traffic at startup
    pub active_pool: String,
    /// Error-rate threshold as a fraction (2% -> 0.02)
    pub error_rate_threshold: f64,
    pub window_size: usize,
    pub alert_cooldown: Duration,

    pub log_file: PathBuf,
    pub skip_on_startup: u64,
    pub pool_hints: Vec<PoolHint>,
    pub line_poll_interval: Duration,
    pub file_wait_interval: Duration,
    /// Give up waiting for the log file after this many checks; unbounded when `None`
    pub file_wait_max_attempts: Option<u32>,
    pub webhook_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            slack_webhook_url: None,
            active_pool: "blue".to_string(),
            error_rate_threshold: 0.02,
            window_size: 200,
            alert_cooldown: Duration::from_secs(300),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            skip_on_startup: 10,
            // Default literals parse by construction
            pool_hints: parse_pool_hints(DEFAULT_POOL_HINTS).unwrap_or_default(),
            line_poll_interval: Duration::from_millis(100),
            file_wait_interval: Duration::from_secs(2),
            file_wait_max_attempts: None,
            webhook_timeout: Duration::from_secs(10),
        }
    }
}

impl AppConfig {
    /// 환경 변수에서 설정 로드
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let slack_webhook_url = get("SLACK_WEBHOOK_URL").map(|v| v.trim().to_string());

        let active_pool = get("ACTIVE_POOL")
            .map(|v| v.trim().to_string())
            .unwrap_or(defaults.active_pool);

        let error_rate_threshold = match get("ERROR_RATE_THRESHOLD") {
            Some(raw) => {
                let percent: f64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidThreshold(raw.clone()))?;
                if !percent.is_finite() || percent < 0.0 {
                    return Err(ConfigError::InvalidThreshold(raw));
                }
                percent / 100.0
            }
            None => defaults.error_rate_threshold,
        };

        let window_size = match get("WINDOW_SIZE") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidWindowSize)?,
            None => defaults.window_size,
        };
        if window_size == 0 {
            return Err(ConfigError::InvalidWindowSize);
        }

        let alert_cooldown = match get("ALERT_COOLDOWN_SEC") {
            Some(raw) => Duration::from_secs(parse_number("ALERT_COOLDOWN_SEC", &raw)?),
            None => defaults.alert_cooldown,
        };

        let log_file = get("LOG_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.log_file);

        let skip_on_startup = match get("SKIP_ON_STARTUP") {
            Some(raw) => parse_number("SKIP_ON_STARTUP", &raw)?,
            None => defaults.skip_on_startup,
        };

        let pool_hints = match get("POOL_HINTS") {
            Some(raw) => parse_pool_hints(&raw)?,
            None => defaults.pool_hints,
        };

        let line_poll_interval = match get("LINE_POLL_MS") {
            Some(raw) => Duration::from_millis(parse_number("LINE_POLL_MS", &raw)?),
            None => defaults.line_poll_interval,
        };

        let file_wait_interval = match get("FILE_WAIT_SECS") {
            Some(raw) => Duration::from_secs(parse_number("FILE_WAIT_SECS", &raw)?),
            None => defaults.file_wait_interval,
        };

        let file_wait_max_attempts = match get("FILE_WAIT_MAX_ATTEMPTS") {
            Some(raw) => {
                let attempts = parse_number("FILE_WAIT_MAX_ATTEMPTS", &raw)?;
                let attempts = u32::try_from(attempts)
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or(ConfigError::InvalidNumber {
                        key: "FILE_WAIT_MAX_ATTEMPTS",
                        value: raw,
                    })?;
                Some(attempts)
            }
            None => defaults.file_wait_max_attempts,
        };

        let webhook_timeout = match get("WEBHOOK_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_number("WEBHOOK_TIMEOUT_SECS", &raw)?),
            None => defaults.webhook_timeout,
        };

        Ok(Self {
            slack_webhook_url,
            active_pool,
            error_rate_threshold,
            window_size,
            alert_cooldown,
            log_file,
            skip_on_startup,
            pool_hints,
            line_poll_interval,
            file_wait_interval,
            file_wait_max_attempts,
            webhook_timeout,
        })
    }

    /// Threshold as a percentage, for messages
    pub fn error_rate_threshold_percent(&self) -> f64 {
        self.error_rate_threshold * 100.0
    }
}

fn parse_number(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        key,
        value: raw.to_string(),
    })
}

/// Parse `pool=hint|hint;pool=hint` into ordered inference hints
pub fn parse_pool_hints(raw: &str) -> Result<Vec<PoolHint>, ConfigError> {
    let mut hints = Vec::new();

    for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let (pool, needles) = entry
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidPoolHints(entry.to_string()))?;

        let pool = pool.trim();
        let needles: Vec<String> = needles
            .split('|')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect();

        if pool.is_empty() || needles.is_empty() {
            return Err(ConfigError::InvalidPoolHints(entry.to_string()));
        }

        hints.push(PoolHint::new(pool, needles));
    }

    Ok(hints)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid error rate threshold: {0}")]
    InvalidThreshold(String),
    #[error("WINDOW_SIZE must be a positive integer")]
    InvalidWindowSize,
    #[error("Invalid value for {key}: {value}")]
    InvalidNumber { key: &'static str, value: String },
    #[error("Invalid POOL_HINTS entry: {0}")]
    InvalidPoolHints(String),
}
