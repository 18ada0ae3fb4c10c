//! Alert kinds, message formatting and the delivery seam

use async_trait::async_trait;
use std::fmt;

use crate::utils::AppError;

/// Kinds of alert, each with its own cooldown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKind {
    Failover,
    ErrorRate,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Failover => "failover",
            AlertKind::ErrorRate => "error_rate",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A formatted alert ready for delivery
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub kind: AlertKind,
    pub title: String,
    /// Slack mrkdwn body
    pub body: String,
}

impl Alert {
    /// Traffic moved from one pool to another
    pub fn failover(from_pool: &str, to_pool: &str, window_len: usize) -> Self {
        let from = from_pool.to_uppercase();
        let to = to_pool.to_uppercase();

        Self {
            kind: AlertKind::Failover,
            title: "🔄 Failover Detected".to_string(),
            body: format!(
                "Traffic has shifted from *{from}* to *{to}*\n\n\
                 📊 Window size: {window_len} requests\n\
                 ⚠️ Please investigate the {from} pool health."
            ),
        }
    }

    /// Rolling 5xx rate crossed the threshold
    pub fn error_rate(
        error_rate: f64,
        error_count: usize,
        window_len: usize,
        pool: &str,
        threshold_percent: f64,
    ) -> Self {
        Self {
            kind: AlertKind::ErrorRate,
            title: "⚠️ High Error Rate Alert".to_string(),
            body: format!(
                "High error rate detected: *{:.1}%* 5xx errors\n\n\
                 📈 {} errors in last {} requests\n\
                 🎯 Current pool: *{}*\n\
                 ⚠️ Threshold: {:?}%",
                error_rate * 100.0,
                error_count,
                window_len,
                pool.to_uppercase(),
                threshold_percent
            ),
        }
    }
}

/// Delivers alerts to an external channel.
///
/// Callers treat failures as non-fatal; implementations should not retry
/// internally for long, since delivery blocks the tailing loop.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, alert: &Alert) -> Result<(), AppError>;
}
