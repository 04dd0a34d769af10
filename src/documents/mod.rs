//! Printable documents. Layout is decided here as plain data; a
//! [`DocumentRenderer`] turns it into bytes.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

use crate::errors::ServiceError;
use crate::models::returns::total_credit;
use crate::models::{ReturnItem, ReturnRecord};

mod pdf;

pub use pdf::PdfRenderer;

/// Descriptions longer than this are cut on the printout.
pub const DESCRIPTION_WIDTH: usize = 40;

pub const ITEM_COLUMNS: [&str; 5] = ["Code", "Description", "Price", "Qty", "Credit"];

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("rendering failed: {0}")]
    Render(String),
    #[error("renderer task failed: {0}")]
    Task(String),
}

impl From<DocumentError> for ServiceError {
    fn from(err: DocumentError) -> Self {
        ServiceError::DocumentError(err.to_string())
    }
}

/// Company details printed at the top of every document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branding {
    pub company_name: String,
    pub company_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRow {
    pub code: String,
    pub description: String,
    pub price: String,
    pub quantity: String,
    pub credit: String,
}

impl DocumentRow {
    fn from_item(item: &ReturnItem) -> Self {
        Self {
            code: item.product_code.clone(),
            description: truncate(&item.product_desc, DESCRIPTION_WIDTH),
            price: fixed(item.price_per_unit, 2),
            quantity: fixed(item.quantity, 3),
            credit: format_currency(item.credit_amount),
        }
    }
}

/// Everything a renderer needs, already formatted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentLayout {
    pub file_name: String,
    pub title: String,
    pub letterhead: Vec<String>,
    pub details: Vec<String>,
    pub rows: Vec<DocumentRow>,
    pub total_label: String,
    pub total: String,
    pub notes: Option<String>,
}

/// The manager-approval output stating the credit owed.
pub struct CreditPoDocument;

impl CreditPoDocument {
    pub fn build(
        record: &ReturnRecord,
        items: &[ReturnItem],
        branding: &Branding,
        generated_on: NaiveDate,
    ) -> DocumentLayout {
        DocumentLayout {
            file_name: format!("credit_po_{}.pdf", record.id),
            title: format!("CREDIT-PO - Return #{}", record.id),
            letterhead: letterhead(branding),
            details: vec![
                format!("Order #: {}", record.order_number),
                format!("Rep: {}", record.rep_name),
                format!("Date: {}", generated_on.format("%Y-%m-%d")),
            ],
            rows: items.iter().map(DocumentRow::from_item).collect(),
            total_label: "TOTAL CREDIT".to_string(),
            total: format_currency(total_credit(items)),
            notes: None,
        }
    }
}

/// Printable copy of a submitted return, available at any status.
pub struct ReturnFormDocument;

impl ReturnFormDocument {
    pub fn build(record: &ReturnRecord, items: &[ReturnItem], branding: &Branding) -> DocumentLayout {
        let notes = record
            .additional_notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or("(none)")
            .to_string();

        DocumentLayout {
            file_name: format!("return_{}.pdf", record.id),
            title: format!("Return #{}", record.id),
            letterhead: letterhead(branding),
            details: vec![
                format!("Submitted: {}", record.date_submitted.format("%Y-%m-%d")),
                format!(
                    "Rep: {}    Order #: {}",
                    or_dash(&record.rep_name),
                    or_dash(&record.order_number)
                ),
                format!("Customer: {}", or_dash(&record.customer_name)),
                format!("Status: {}", record.status),
            ],
            rows: items.iter().map(DocumentRow::from_item).collect(),
            total_label: "TOTAL CREDIT".to_string(),
            total: format_currency(total_credit(items)),
            notes: Some(notes),
        }
    }
}

#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render(&self, layout: DocumentLayout) -> Result<Vec<u8>, DocumentError>;
}

fn letterhead(branding: &Branding) -> Vec<String> {
    let mut lines = vec![branding.company_name.clone()];
    lines.extend(branding.company_address.iter().cloned());
    lines
}

fn or_dash(value: &str) -> &str {
    if value.trim().is_empty() {
        "-"
    } else {
        value
    }
}

pub fn truncate(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}

/// Fixed-point rendering, rounding half away from zero.
pub fn fixed(value: Decimal, dp: u32) -> String {
    let rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.*}", dp as usize, rounded)
}

/// `$#,##0.00`, e.g. `$1,234.50`.
pub fn format_currency(amount: Decimal) -> String {
    let text = fixed(amount.abs(), 2);
    let (whole, cents) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if amount.is_sign_negative() && !amount.round_dp(2).is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}${grouped}.{cents}")
}
