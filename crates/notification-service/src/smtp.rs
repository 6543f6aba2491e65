use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use monitor_core::AlertSummary;

use crate::templates::EmailTemplate;
use crate::{NotificationChannel, NotificationConfig, NotificationError, SmtpTls};

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl SmtpNotifier {
    pub fn new(config: &NotificationConfig) -> Result<Self, NotificationError> {
        let host = config
            .smtp_host
            .as_deref()
            .ok_or_else(|| NotificationError::Config("SMTP_HOST not set".into()))?;
        let from_addr = config
            .smtp_from
            .as_deref()
            .ok_or_else(|| NotificationError::Config("SMTP_FROM_ADDRESS not set".into()))?;

        let from: Mailbox = from_addr
            .parse()
            .map_err(|e| NotificationError::Config(format!("Invalid from address: {}", e)))?;

        let to: Vec<Mailbox> = config
            .smtp_to
            .iter()
            .filter_map(|addr| match addr.parse::<Mailbox>() {
                Ok(mailbox) => Some(mailbox),
                Err(e) => {
                    tracing::warn!("Ignoring invalid recipient {}: {}", addr, e);
                    None
                }
            })
            .collect();

        if to.is_empty() {
            return Err(NotificationError::Config(
                "No valid NOTIFICATION_EMAIL_TO addresses".into(),
            ));
        }

        let mut builder = match config.smtp_tls {
            SmtpTls::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(host),
            SmtpTls::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host),
            SmtpTls::None => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(
                host,
            )),
        }
        .map_err(|e| NotificationError::Smtp(format!("SMTP transport error: {}", e)))?;

        builder = builder.port(config.smtp_port);

        if let (Some(user), Some(pass)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            to,
        })
    }
}

#[async_trait]
impl NotificationChannel for SmtpNotifier {
    async fn send(&self, summary: &AlertSummary) -> Result<(), NotificationError> {
        let html_body = EmailTemplate::render(summary);

        for recipient in &self.to {
            let email = Message::builder()
                .from(self.from.clone())
                .to(recipient.clone())
                .subject(&summary.title)
                .header(ContentType::TEXT_HTML)
                .body(html_body.clone())
                .map_err(|e| NotificationError::Smtp(format!("Failed to build email: {}", e)))?;

            self.transport
                .send(email)
                .await
                .map_err(|e| NotificationError::Smtp(format!("Failed to send email: {}", e)))?;
        }

        tracing::info!("Alert email sent to {} recipients", self.to.len());
        Ok(())
    }

    fn name(&self) -> &str {
        "smtp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> NotificationConfig {
        NotificationConfig {
            smtp_host: Some("smtp.example.com".into()),
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            smtp_from: Some("monitor@example.com".into()),
            smtp_to: vec!["ops@example.com".into()],
            smtp_tls: SmtpTls::None,
            discord_webhook_url: None,
        }
    }

    #[test]
    fn test_requires_valid_recipient() {
        let mut cfg = config();
        cfg.smtp_to = vec!["not an address".into()];
        assert!(matches!(
            SmtpNotifier::new(&cfg),
            Err(NotificationError::Config(_))
        ));
    }

    #[test]
    fn test_requires_host() {
        let mut cfg = config();
        cfg.smtp_host = None;
        assert!(SmtpNotifier::new(&cfg).is_err());
    }

    #[tokio::test]
    async fn test_builds_with_valid_config() {
        let notifier = SmtpNotifier::new(&config()).unwrap();
        assert_eq!(notifier.to.len(), 1);
        assert_eq!(notifier.name(), "smtp");
    }
}
