use std::io;

use thiserror::Error;

use crate::config::ConfigError;

/// Watcher-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("webhook delivery failed: {0}")]
    WebhookFailed(String),

    #[error("retry exhausted: {0}")]
    RetryExhausted(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

impl AppError {
    /// Stable error code for structured logs
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG500",
            AppError::Io { .. } => "IO500",
            AppError::WebhookFailed(_) => "WEBHOOK502",
            AppError::RetryExhausted(_) => "RETRY504",
            AppError::InternalError(_) => "COMMON500",
        }
    }
}

/// 편의 함수들
impl AppError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        AppError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn webhook_failed(msg: impl Into<String>) -> Self {
        AppError::WebhookFailed(msg.into())
    }

    pub fn internal_error(msg: impl Into<String>) -> Self {
        AppError::InternalError(msg.into())
    }
}
