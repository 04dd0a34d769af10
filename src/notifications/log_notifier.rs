use async_trait::async_trait;
use tracing::info;

use super::{NotificationError, Notifier, ReturnNotice};

/// Writes notices to the log instead of sending them. Used when mail is off.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    from: String,
}

impl LogNotifier {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notice: &ReturnNotice) -> Result<(), NotificationError> {
        info!(
            from = %self.from,
            to = %notice.recipient,
            subject = %notice.subject,
            event = %notice.event,
            attachment = notice.attachment.as_ref().map(|a| a.file_name.as_str()),
            "mail disabled; notice logged\n{}",
            notice.body
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
