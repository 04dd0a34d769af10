//! Flat CSV dump of every return, one row per item.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};

use crate::repositories::ReturnDetail;

pub const EXPORT_COLUMNS: [&str; 24] = [
    "return_id",
    "date_created",
    "date_submitted",
    "date_shipped",
    "order_number",
    "customer_name",
    "return_type",
    "status",
    "advised_customer",
    "additional_notes",
    "created_by",
    "warehouse_approved_by",
    "warehouse_approved_at",
    "manager_approved_by",
    "manager_approved_at",
    "product_code",
    "product_desc",
    "price_per_unit",
    "quantity",
    "credit_amount",
    "product_returning",
    "reason_for_return",
    "follow_up_action",
    "supplier_credit",
];

pub fn escape_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        let escaped = value.replace('"', "\"\"");
        format!("\"{escaped}\"")
    } else {
        value.to_string()
    }
}

fn timestamp(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

fn date(value: Option<NaiveDate>) -> String {
    value.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default()
}

/// Renders `rows` as CSV. `usernames` resolves user ids for the creator and
/// approver columns; unknown ids print as the bare number.
pub fn write_csv(rows: &[ReturnDetail], usernames: &HashMap<i64, String>) -> String {
    let user = |id: Option<i64>| -> String {
        match id {
            Some(id) => usernames.get(&id).cloned().unwrap_or_else(|| id.to_string()),
            None => String::new(),
        }
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(EXPORT_COLUMNS.join(","));

    for ReturnDetail { record, items } in rows {
        for item in items {
            let fields = [
                record.id.to_string(),
                timestamp(Some(record.date_created)),
                date(Some(record.date_submitted)),
                date(record.date_shipped),
                record.order_number.clone(),
                record.customer_name.clone(),
                record.return_type.clone(),
                record.status.to_string(),
                record.advised_customer.clone().unwrap_or_default(),
                record.additional_notes.clone().unwrap_or_default(),
                user(Some(record.created_by)),
                user(record.wh_approved_by),
                timestamp(record.wh_approved_at),
                user(record.mgr_approved_by),
                timestamp(record.mgr_approved_at),
                item.product_code.clone(),
                item.product_desc.clone(),
                item.price_per_unit.to_string(),
                item.quantity.to_string(),
                item.credit_amount.to_string(),
                item.product_returning.clone(),
                item.reason_for_return.clone(),
                item.follow_up_action.clone().unwrap_or_default(),
                item.supplier_credit.to_string(),
            ];
            let row: Vec<String> = fields.iter().map(|f| escape_field(f)).collect();
            lines.push(row.join(","));
        }
    }

    let mut body = lines.join("\n");
    body.push('\n');
    body
}
