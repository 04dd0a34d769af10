//! Return workflow rules: statuses, legal transitions, credit arithmetic and
//! the listing filter.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{return_entity, return_item_entity};
use crate::auth::Capability;

/// Status of a return. `Approved` and `Rejected` are terminal.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum ReturnStatus {
    #[sea_orm(string_value = "Pending")]
    #[serde(rename = "Pending")]
    #[strum(serialize = "Pending")]
    Pending,
    #[sea_orm(string_value = "WH Approved")]
    #[serde(rename = "WH Approved")]
    #[strum(serialize = "WH Approved")]
    WhApproved,
    #[sea_orm(string_value = "Approved")]
    #[serde(rename = "Approved")]
    #[strum(serialize = "Approved")]
    Approved,
    #[sea_orm(string_value = "Rejected")]
    #[serde(rename = "Rejected")]
    #[strum(serialize = "Rejected")]
    Rejected,
}

impl ReturnStatus {
    pub const ALL: [ReturnStatus; 4] = [
        ReturnStatus::Pending,
        ReturnStatus::WhApproved,
        ReturnStatus::Approved,
        ReturnStatus::Rejected,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, ReturnStatus::Approved | ReturnStatus::Rejected)
    }

    /// Status reached by applying `action`, or `None` when the action is not
    /// legal from this status.
    pub fn after(self, action: WorkflowAction) -> Option<ReturnStatus> {
        use ReturnStatus::*;
        use WorkflowAction::*;
        match (self, action) {
            (Pending, ApproveWarehouse) => Some(WhApproved),
            (WhApproved, ApproveManager) => Some(Approved),
            (Pending | WhApproved, Reject) => Some(Rejected),
            _ => None,
        }
    }
}

/// State-changing actions on an existing return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkflowAction {
    ApproveWarehouse,
    ApproveManager,
    Reject,
}

impl WorkflowAction {
    pub fn capability(self) -> Capability {
        match self {
            WorkflowAction::ApproveWarehouse => Capability::ApproveWarehouse,
            WorkflowAction::ApproveManager => Capability::ApproveManager,
            WorkflowAction::Reject => Capability::RejectReturn,
        }
    }

    /// Human description of the statuses the action may start from.
    pub fn expected_status(self) -> &'static str {
        match self {
            WorkflowAction::ApproveWarehouse => "Pending",
            WorkflowAction::ApproveManager => "WH Approved",
            WorkflowAction::Reject => "Pending or WH Approved",
        }
    }
}

/// A transition attempted from a status that does not allow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IllegalTransition {
    pub found: ReturnStatus,
    pub action: WorkflowAction,
}

impl return_entity::Model {
    /// Applies `action` in memory, stamping the approval metadata for the
    /// actor. Returns the status the record was in before the change.
    pub fn apply(
        &mut self,
        action: WorkflowAction,
        actor_id: i64,
        at: DateTime<Utc>,
    ) -> Result<ReturnStatus, IllegalTransition> {
        let previous = self.status;
        let next = previous.after(action).ok_or(IllegalTransition {
            found: previous,
            action,
        })?;

        match action {
            WorkflowAction::ApproveWarehouse => {
                self.wh_approved_by = Some(actor_id);
                self.wh_approved_at = Some(at);
            }
            WorkflowAction::ApproveManager => {
                self.mgr_approved_by = Some(actor_id);
                self.mgr_approved_at = Some(at);
            }
            // Warehouse sign-off stays on record when a WH Approved return is rejected.
            WorkflowAction::Reject => {
                self.approved_by = Some(actor_id);
                self.approved_at = Some(at);
            }
        }
        self.status = next;
        Ok(previous)
    }

    /// Checks that the approval stamps agree with the status.
    pub fn approval_metadata_consistent(&self) -> bool {
        let wh = self.wh_approved_by.is_some() && self.wh_approved_at.is_some();
        let wh_none = self.wh_approved_by.is_none() && self.wh_approved_at.is_none();
        let mgr = self.mgr_approved_by.is_some() && self.mgr_approved_at.is_some();
        let mgr_none = self.mgr_approved_by.is_none() && self.mgr_approved_at.is_none();
        let rejected = self.approved_by.is_some() && self.approved_at.is_some();
        let not_rejected = self.approved_by.is_none() && self.approved_at.is_none();

        match self.status {
            ReturnStatus::Pending => wh_none && mgr_none && not_rejected,
            ReturnStatus::WhApproved => wh && mgr_none && not_rejected,
            ReturnStatus::Approved => wh && mgr && not_rejected,
            ReturnStatus::Rejected => (wh || wh_none) && mgr_none && rejected,
        }
    }
}

/// `price × quantity` rounded to cents, half away from zero. `None` when
/// the product does not fit in a `Decimal`.
pub fn credit_amount(price_per_unit: Decimal, quantity: Decimal) -> Option<Decimal> {
    price_per_unit.checked_mul(quantity).map(|credit| {
        with_cents(credit.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    })
}

/// Pads a money value to at least two decimal places without dropping
/// finer digits. SQLite hands decimals back with their trailing zeros gone.
pub fn with_cents(mut amount: Decimal) -> Decimal {
    if amount.scale() < 2 {
        amount.rescale(2);
    }
    amount
}

/// Sum of money values, saturating instead of panicking.
pub fn sum_money(amounts: impl IntoIterator<Item = Decimal>) -> Decimal {
    amounts.into_iter().fold(Decimal::ZERO, Decimal::saturating_add)
}

/// Sum of the stored item credits. Never derived from price and quantity.
pub fn total_credit(items: &[return_item_entity::Model]) -> Decimal {
    sum_money(items.iter().map(|item| item.credit_amount))
}

/// Status groups offered by the listing screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum StatusBucket {
    All,
    Pending,
    Accepted,
    Rejected,
}

impl StatusBucket {
    /// Parses a filter value. Blank means no filter; anything unrecognised
    /// also means no filter, reported through the warning.
    pub fn parse(raw: Option<&str>) -> (StatusBucket, Option<String>) {
        let value = raw.map(str::trim).unwrap_or_default();
        if value.is_empty() {
            return (StatusBucket::All, None);
        }
        match value.to_ascii_lowercase().as_str() {
            "pending" => (StatusBucket::Pending, None),
            "accepted" => (StatusBucket::Accepted, None),
            "rejected" => (StatusBucket::Rejected, None),
            "all" => (StatusBucket::All, None),
            _ => (
                StatusBucket::All,
                Some(format!(
                    "Unknown status filter '{value}'; showing all statuses"
                )),
            ),
        }
    }

    pub fn statuses(self) -> Option<Vec<ReturnStatus>> {
        match self {
            StatusBucket::All => None,
            StatusBucket::Pending => Some(vec![ReturnStatus::Pending]),
            StatusBucket::Accepted => Some(vec![ReturnStatus::WhApproved, ReturnStatus::Approved]),
            StatusBucket::Rejected => Some(vec![ReturnStatus::Rejected]),
        }
    }
}

/// Parses a `YYYY-MM-DD` value. A malformed value yields `None` and a warning.
pub fn parse_date(raw: Option<&str>, label: &str) -> (Option<NaiveDate>, Option<String>) {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => (None, None),
        Some(value) => match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
            Ok(date) => (Some(date), None),
            Err(_) => (None, Some(format!("{label} must be YYYY-MM-DD"))),
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Criteria for listing returns. Date bounds are inclusive on the
/// submission date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReturnFilter {
    pub statuses: Option<Vec<ReturnStatus>>,
    pub submitted_from: Option<NaiveDate>,
    pub submitted_to: Option<NaiveDate>,
    pub created_by: Option<i64>,
    pub order: ListOrder,
}

impl ReturnFilter {
    /// Builds a filter from raw query values, collecting warnings for the
    /// parts that were ignored.
    pub fn from_query(
        status: Option<&str>,
        from: Option<&str>,
        to: Option<&str>,
    ) -> (ReturnFilter, Vec<String>) {
        let mut warnings = Vec::new();
        let (bucket, status_warning) = StatusBucket::parse(status);
        let (submitted_from, from_warning) = parse_date(from, "From date");
        let (submitted_to, to_warning) = parse_date(to, "To date");
        warnings.extend(status_warning);
        warnings.extend(from_warning);
        warnings.extend(to_warning);

        let filter = ReturnFilter {
            statuses: bucket.statuses(),
            submitted_from,
            submitted_to,
            created_by: None,
            order: ListOrder::NewestFirst,
        };
        (filter, warnings)
    }

    /// Returns awaiting a decision, oldest first.
    pub fn awaiting_approval() -> ReturnFilter {
        ReturnFilter {
            statuses: Some(vec![ReturnStatus::Pending, ReturnStatus::WhApproved]),
            order: ListOrder::OldestFirst,
            ..Default::default()
        }
    }

    pub fn matches(&self, record: &return_entity::Model) -> bool {
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&record.status) {
                return false;
            }
        }
        if let Some(from) = self.submitted_from {
            if record.date_submitted < from {
                return false;
            }
        }
        if let Some(to) = self.submitted_to {
            if record.date_submitted > to {
                return false;
            }
        }
        if let Some(owner) = self.created_by {
            if record.created_by != owner {
                return false;
            }
        }
        true
    }
}
