//! Slack alert service for watcher notifications
//!
//! Sends alerts to a Slack channel via an incoming webhook using Block Kit
//! messages (header, body section, UTC timestamp context).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use crate::monitoring::alert::{Alert, AlertSink};
use crate::utils::AppError;

/// Longest prefix of a failed response body kept in logs and errors
const ERROR_BODY_PREFIX: usize = 200;

/// Slack webhook message payload
#[derive(Debug, Serialize)]
pub struct SlackMessage {
    /// Fallback text for notifications
    pub text: String,
    pub blocks: Vec<SlackBlock>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackBlock {
    Header { text: SlackText },
    Section { text: SlackText },
    Context { elements: Vec<SlackText> },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackText {
    PlainText { text: String, emoji: bool },
    Mrkdwn { text: String },
}

impl SlackMessage {
    /// Build the Block Kit payload for an alert
    pub fn from_alert(alert: &Alert, sent_at: DateTime<Utc>) -> Self {
        Self {
            text: format!("🚨 *{}*", alert.title),
            blocks: vec![
                SlackBlock::Header {
                    text: SlackText::PlainText {
                        text: format!("🚨 {}", alert.title),
                        emoji: true,
                    },
                },
                SlackBlock::Section {
                    text: SlackText::Mrkdwn {
                        text: alert.body.clone(),
                    },
                },
                SlackBlock::Context {
                    elements: vec![SlackText::Mrkdwn {
                        text: format!("⏰ {}", sent_at.format("%Y-%m-%d %H:%M:%S UTC")),
                    }],
                },
            ],
        }
    }
}

/// Slack alert service
#[derive(Debug, Clone)]
pub struct SlackAlert {
    /// Webhook URL; alerts are only logged when absent
    webhook_url: Option<String>,
    client: Client,
}

impl SlackAlert {
    /// Create a Slack alert service with the given request timeout
    pub fn new(webhook_url: Option<String>, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            error!(error = %e, "Failed to build webhook client");
            AppError::internal_error(format!("Failed to build webhook client: {}", e))
        })?;

        let webhook_url = webhook_url.filter(|url| !url.trim().is_empty());
        if webhook_url.is_none() {
            warn!("SLACK_WEBHOOK_URL not configured, alerts will only be logged");
        }

        Ok(Self {
            webhook_url,
            client,
        })
    }

    /// Create a log-only alert service
    pub fn disabled() -> Self {
        Self {
            webhook_url: None,
            client: Client::new(),
        }
    }

    /// Check if webhook delivery is enabled
    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    pub fn webhook_url(&self) -> Option<&str> {
        self.webhook_url.as_deref()
    }

    /// Send raw Slack message payload
    async fn send_payload(&self, url: &str, payload: &SlackMessage) -> Result<(), AppError> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to send Slack webhook");
                AppError::webhook_failed(format!("Failed to send Slack webhook: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(ERROR_BODY_PREFIX).collect();
            error!(status = %status, body = %body, "Slack webhook returned error");
            return Err(AppError::webhook_failed(format!(
                "Slack webhook error: {} - {}",
                status, body
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl AlertSink for SlackAlert {
    #[instrument(skip(self, alert), fields(alert = %alert.kind))]
    async fn send(&self, alert: &Alert) -> Result<(), AppError> {
        let Some(url) = self.webhook_url.as_deref() else {
            warn!(title = %alert.title, body = %alert.body, "[NO WEBHOOK] Alert not delivered");
            return Ok(());
        };

        let payload = SlackMessage::from_alert(alert, Utc::now());
        self.send_payload(url, &payload).await?;

        info!(title = %alert.title, "Slack alert sent successfully");
        Ok(())
    }
}
