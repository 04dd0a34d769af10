use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::debug;

use super::{NotificationError, Notifier, ReturnNotice};
use crate::config::MailConfig;

/// Posts each notice as a form to an HTTP mail relay (Mailgun-style API).
#[derive(Debug, Clone)]
pub struct MailRelayNotifier {
    client: reqwest::Client,
    relay_url: String,
    api_key: String,
    from: String,
}

impl MailRelayNotifier {
    pub fn new(
        relay_url: impl Into<String>,
        api_key: impl Into<String>,
        from: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotificationError::Config(e.to_string()))?;

        Ok(Self {
            client,
            relay_url: relay_url.into(),
            api_key: api_key.into(),
            from: from.into(),
        })
    }

    pub fn from_config(mail: &MailConfig) -> Result<Self, NotificationError> {
        let relay_url = mail
            .relay_url
            .clone()
            .ok_or_else(|| NotificationError::Config("mail.relay_url is not set".into()))?;
        let api_key = mail
            .api_key
            .clone()
            .ok_or_else(|| NotificationError::Config("mail.api_key is not set".into()))?;

        Self::new(
            relay_url,
            api_key,
            mail.from.clone(),
            Duration::from_secs(mail.timeout_secs),
        )
    }

    fn form(&self, notice: &ReturnNotice) -> Result<Form, NotificationError> {
        let mut form = Form::new()
            .text("from", self.from.clone())
            .text("to", notice.recipient.clone())
            .text("subject", notice.subject.clone())
            .text("text", notice.body.clone());

        if let Some(attachment) = &notice.attachment {
            let part = Part::bytes(attachment.bytes.as_ref().clone())
                .file_name(attachment.file_name.clone())
                .mime_str(&attachment.content_type)
                .map_err(|e| NotificationError::Config(e.to_string()))?;
            form = form.part("attachment", part);
        }

        Ok(form)
    }
}

#[async_trait]
impl Notifier for MailRelayNotifier {
    async fn send(&self, notice: &ReturnNotice) -> Result<(), NotificationError> {
        let response = self
            .client
            .post(&self.relay_url)
            .basic_auth("api", Some(&self.api_key))
            .multipart(self.form(notice)?)
            .send()
            .await
            .map_err(|e| NotificationError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(recipient = %notice.recipient, %status, "relay accepted notice");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(NotificationError::Rejected {
            status: status.as_u16(),
            body,
        })
    }

    fn name(&self) -> &'static str {
        "mail-relay"
    }
}
