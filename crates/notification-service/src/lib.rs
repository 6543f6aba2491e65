mod smtp;
mod templates;

pub use smtp::SmtpNotifier;
pub use templates::EmailTemplate;

use async_trait::async_trait;
use monitor_core::AlertSummary;

/// Discord rejects embed descriptions longer than this.
const DISCORD_DESCRIPTION_LIMIT: usize = 4096;

/// Trait for notification channels.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, summary: &AlertSummary) -> Result<(), NotificationError>;
    fn name(&self) -> &str;
}

/// Errors from the notification system.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("SMTP error: {0}")]
    Smtp(String),
    #[error("Discord webhook error: {0}")]
    Discord(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Delivery failed on: {0}")]
    Delivery(String),
}

/// Configuration for the notification service.
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,
    pub smtp_to: Vec<String>,
    pub smtp_tls: SmtpTls,
    pub discord_webhook_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SmtpTls {
    #[default]
    StartTls,
    Tls,
    None,
}

impl NotificationConfig {
    /// Load from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary key lookup. Recipients default to the sender.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());

        let smtp_from = get("SMTP_FROM_ADDRESS");
        let mut smtp_to: Vec<String> = get("NOTIFICATION_EMAIL_TO")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if smtp_to.is_empty() {
            smtp_to.extend(smtp_from.clone());
        }

        let smtp_tls = match get("SMTP_TLS")
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "tls" => SmtpTls::Tls,
            "none" => SmtpTls::None,
            _ => SmtpTls::StartTls,
        };

        Self {
            smtp_host: get("SMTP_HOST"),
            smtp_port: get("SMTP_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(587),
            smtp_username: get("SMTP_USERNAME"),
            smtp_password: get("SMTP_PASSWORD"),
            smtp_from,
            smtp_to,
            smtp_tls,
            discord_webhook_url: get("DISCORD_WEBHOOK_URL"),
        }
    }
}

/// Fans one summary out to every configured channel.
pub struct NotificationService {
    channels: Vec<Box<dyn NotificationChannel>>,
}

impl NotificationService {
    pub fn new(config: &NotificationConfig) -> Self {
        let mut channels: Vec<Box<dyn NotificationChannel>> = Vec::new();

        // Add SMTP channel if configured
        if config.smtp_host.is_some() && config.smtp_from.is_some() && !config.smtp_to.is_empty() {
            match SmtpNotifier::new(config) {
                Ok(notifier) => {
                    tracing::info!(
                        "Email notifications enabled (SMTP -> {} recipients)",
                        config.smtp_to.len()
                    );
                    channels.push(Box::new(notifier));
                }
                Err(e) => {
                    tracing::warn!("Failed to initialize SMTP notifier: {}", e);
                }
            }
        }

        // Add Discord webhook channel if configured
        if let Some(ref webhook_url) = config.discord_webhook_url {
            channels.push(Box::new(DiscordWebhookNotifier::new(webhook_url.clone())));
            tracing::info!("Discord webhook notifications enabled");
        }

        if channels.is_empty() {
            tracing::info!(
                "No notification channels configured (set SMTP_HOST or DISCORD_WEBHOOK_URL)"
            );
        }

        Self { channels }
    }

    pub fn with_channels(channels: Vec<Box<dyn NotificationChannel>>) -> Self {
        Self { channels }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[async_trait]
impl NotificationChannel for NotificationService {
    /// Tries every channel; fails if any of them failed.
    async fn send(&self, summary: &AlertSummary) -> Result<(), NotificationError> {
        if self.channels.is_empty() {
            return Err(NotificationError::Config(
                "no notification channels configured".into(),
            ));
        }

        let mut failed = Vec::new();
        for channel in &self.channels {
            match channel.send(summary).await {
                Ok(()) => tracing::info!("Sent alert summary via {}", channel.name()),
                Err(e) => {
                    tracing::warn!("Failed to send notification via {}: {}", channel.name(), e);
                    failed.push(format!("{} ({})", channel.name(), e));
                }
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(NotificationError::Delivery(failed.join(", ")))
        }
    }

    fn name(&self) -> &str {
        "notification-service"
    }
}

/// Discord webhook notifier.
pub struct DiscordWebhookNotifier {
    webhook_url: String,
    client: reqwest::Client,
}

impl DiscordWebhookNotifier {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            client: reqwest::Client::new(),
        }
    }

    fn payload(summary: &AlertSummary) -> serde_json::Value {
        let description: String = summary
            .to_plain_text()
            .chars()
            .take(DISCORD_DESCRIPTION_LIMIT)
            .collect();

        serde_json::json!({
            "username": "Stock Monitor",
            "embeds": [{
                "title": summary.title,
                "description": description,
                "color": 0xff0000,
                "timestamp": summary.generated_at.to_rfc3339(),
            }]
        })
    }
}

#[async_trait]
impl NotificationChannel for DiscordWebhookNotifier {
    async fn send(&self, summary: &AlertSummary) -> Result<(), NotificationError> {
        self.client
            .post(&self.webhook_url)
            .json(&Self::payload(summary))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| NotificationError::Discord(e.to_string()))?;

        Ok(())
    }

    fn name(&self) -> &str {
        "discord-webhook"
    }
}

/// Logs the summary instead of delivering it (dry runs).
pub struct LogNotifier;

#[async_trait]
impl NotificationChannel for LogNotifier {
    async fn send(&self, summary: &AlertSummary) -> Result<(), NotificationError> {
        tracing::info!("Dry run, alert summary not sent:\n{}", summary.to_plain_text());
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
