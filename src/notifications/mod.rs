//! Email notices for workflow transitions. Delivery is best effort: every
//! recipient is attempted independently and failures are reported, never raised.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::config::{AppConfig, MailConfig};
use crate::documents::format_currency;
use crate::models::ReturnRecord;

mod log_notifier;
mod mail_relay;

pub use log_notifier::LogNotifier;
pub use mail_relay::MailRelayNotifier;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("mail relay unreachable: {0}")]
    Transport(String),
    #[error("mail relay answered {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("mail is not configured: {0}")]
    Config(String),
}

/// Which transition a notice announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NoticeEvent {
    /// Confirmation to the submitter.
    New,
    /// Heads-up to the warehouse team.
    NewReturn,
    /// Warehouse signed off; managers are up.
    Warehouse,
    /// Final approval, credit PO attached.
    Manager,
    Rejected,
}

impl NoticeEvent {
    pub fn title(self) -> &'static str {
        match self {
            Self::New => "New",
            Self::NewReturn => "New Return",
            Self::Warehouse => "Warehouse",
            Self::Manager => "Manager",
            Self::Rejected => "Rejected",
        }
    }

    fn lead(self) -> &'static str {
        match self {
            Self::New => "Your return was submitted and is waiting for warehouse review.",
            Self::NewReturn => "A new return is waiting for warehouse approval.",
            Self::Warehouse => "The warehouse approved this return. It now needs manager approval.",
            Self::Manager => "Your return was approved. The credit PO is attached.",
            Self::Rejected => "Your return was rejected.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Arc<Vec<u8>>,
}

impl Attachment {
    pub fn pdf(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: "application/pdf".to_string(),
            bytes: Arc::new(bytes),
        }
    }
}

/// One message to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnNotice {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub event: NoticeEvent,
    pub attachment: Option<Attachment>,
}

/// Shared wording for every notice about one return.
#[derive(Debug, Clone)]
pub struct NoticeTemplate {
    event: NoticeEvent,
    subject: String,
    body: String,
    attachment: Option<Attachment>,
}

impl NoticeTemplate {
    pub fn new(
        event: NoticeEvent,
        record: &ReturnRecord,
        total_credit: Option<Decimal>,
        view_url: Option<&str>,
        company_name: &str,
    ) -> Self {
        let mut body = format!("{}\n\n", event.lead());
        body.push_str(&format!("Return #: {}\n", record.id));
        body.push_str(&format!("Rep: {}\n", record.rep_name));
        body.push_str(&format!("Order #: {}\n", record.order_number));
        body.push_str(&format!("Customer: {}\n", record.customer_name));
        body.push_str(&format!("Status: {}\n", record.status));
        if let Some(total) = total_credit {
            body.push_str(&format!("Total credit: {}\n", format_currency(total)));
        }
        if let Some(url) = view_url.filter(|u| !u.is_empty()) {
            body.push_str(&format!("\nView the return: {url}\n"));
        }
        body.push_str(&format!("\n{company_name}\n"));

        Self {
            event,
            subject: format!("Return #{} - {}", record.id, event.title()),
            body,
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    pub fn event(&self) -> NoticeEvent {
        self.event
    }

    pub fn to(&self, recipient: impl Into<String>) -> ReturnNotice {
        ReturnNotice {
            recipient: recipient.into(),
            subject: self.subject.clone(),
            body: self.body.clone(),
            event: self.event,
            attachment: self.attachment.clone(),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notice: &ReturnNotice) -> Result<(), NotificationError>;

    fn name(&self) -> &'static str;
}

/// Picks the relay when mail is enabled, the log otherwise.
pub fn notifier_from_config(mail: &MailConfig) -> Result<Arc<dyn Notifier>, NotificationError> {
    if mail.enabled {
        Ok(Arc::new(MailRelayNotifier::from_config(mail)?))
    } else {
        Ok(Arc::new(LogNotifier::new(mail.from.clone())))
    }
}

pub fn notifier_for(config: &AppConfig) -> Result<Arc<dyn Notifier>, NotificationError> {
    notifier_from_config(&config.mail)
}

/// Trimmed, exactly one `@`, something on both sides.
pub fn is_deliverable_address(address: &str) -> bool {
    let address = address.trim();
    let mut parts = address.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty() && !domain.is_empty() && !address.contains(char::is_whitespace)
        }
        _ => false,
    }
}

/// Outcome of one fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
    pub warnings: Vec<String>,
}

impl DispatchReport {
    pub fn merge(&mut self, other: DispatchReport) {
        self.sent += other.sent;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.warnings.extend(other.warnings);
    }

    pub fn skip(&mut self, warning: impl Into<String>) {
        self.skipped += 1;
        self.warnings.push(warning.into());
    }

    pub fn attempted(&self) -> usize {
        self.sent + self.failed
    }
}

/// Sends `template` to every recipient concurrently. Undeliverable addresses
/// are skipped; a failure for one recipient never affects another.
pub async fn dispatch(
    notifier: &dyn Notifier,
    template: &NoticeTemplate,
    recipients: &[String],
) -> DispatchReport {
    let mut report = DispatchReport::default();
    let mut notices = Vec::with_capacity(recipients.len());

    for recipient in recipients {
        if is_deliverable_address(recipient) {
            notices.push(template.to(recipient.trim()));
        } else {
            warn!(
                event = %template.event,
                recipient = %recipient,
                "skipping notice to undeliverable address"
            );
            report.skip(format!(
                "Skipped {} notice to '{}': not a valid email address",
                template.event, recipient
            ));
        }
    }

    let results = join_all(notices.iter().map(|notice| notifier.send(notice))).await;

    for (notice, result) in notices.iter().zip(results) {
        match result {
            Ok(()) => {
                report.sent += 1;
                info!(
                    event = %notice.event,
                    recipient = %notice.recipient,
                    via = notifier.name(),
                    "notice sent"
                );
            }
            Err(e) => {
                report.failed += 1;
                error!(
                    event = %notice.event,
                    recipient = %notice.recipient,
                    via = notifier.name(),
                    error = %e,
                    "notice delivery failed"
                );
                report
                    .warnings
                    .push(format!("Could not notify {}: {}", notice.recipient, e));
            }
        }
    }

    report
}
