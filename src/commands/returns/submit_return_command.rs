use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use super::{notify, role_recipients, TransitionOutcome};
use crate::auth::{AuthUser, Capability, Role};
use crate::commands::{Command, WorkflowContext};
use crate::errors::ServiceError;
use crate::models::returns::{credit_amount, parse_date, total_credit};
use crate::models::ReturnStatus;
use crate::notifications::{DispatchReport, NoticeEvent, NoticeTemplate};
use crate::repositories::{NewReturn, NewReturnItem, ReturnDetail};

fn default_return_type() -> String {
    "Credit".to_string()
}

fn default_product_returning() -> String {
    "Yes".to_string()
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// Upper bounds keep every credit and return total well inside `Decimal`.
const MAX_PRICE_PER_UNIT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);
const MAX_QUANTITY: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

fn price_in_range(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::new("negative"));
    }
    if *value > MAX_PRICE_PER_UNIT {
        return Err(ValidationError::new("too_large"));
    }
    Ok(())
}

fn quantity_in_range(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        return Err(ValidationError::new("not_positive"));
    }
    if *value > MAX_QUANTITY {
        return Err(ValidationError::new("too_large"));
    }
    Ok(())
}

/// A return as entered on the submission form.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct SubmitReturnRequest {
    /// Defaults to the submitter's display name
    #[serde(default)]
    pub rep_name: Option<String>,
    /// `YYYY-MM-DD`; today when missing or malformed
    #[serde(default)]
    pub date_submitted: Option<String>,
    #[validate(custom = "not_blank", length(max = 64))]
    pub order_number: String,
    #[validate(custom = "not_blank", length(max = 200))]
    pub customer_name: String,
    /// `YYYY-MM-DD`; ignored when malformed
    #[serde(default)]
    pub date_shipped: Option<String>,
    #[serde(default = "default_return_type")]
    #[validate(length(max = 64))]
    pub return_type: String,
    #[serde(default)]
    pub advised_customer: Option<String>,
    #[serde(default)]
    pub additional_notes: Option<String>,
    #[validate]
    pub items: Vec<ReturnItemInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReturnItemInput {
    #[validate(custom = "not_blank", length(max = 64))]
    pub product_code: String,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub product_desc: String,
    #[schema(value_type = String, example = "12.50")]
    #[validate(custom = "price_in_range")]
    pub price_per_unit: Decimal,
    #[schema(value_type = String, example = "3.2")]
    #[validate(custom = "quantity_in_range")]
    pub quantity: Decimal,
    #[serde(default = "default_product_returning")]
    pub product_returning: String,
    #[serde(default)]
    pub reason_for_return: String,
    #[serde(default)]
    pub follow_up_action: Option<String>,
    #[serde(default)]
    pub supplier_credit: bool,
}

#[derive(Debug, Clone)]
pub struct SubmitReturnCommand {
    pub actor: AuthUser,
    pub request: SubmitReturnRequest,
}

/// A stored submission plus everything the caller should be told about it.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Submission {
    #[serde(flatten)]
    pub outcome: TransitionOutcome,
    pub items: Vec<crate::models::ReturnItem>,
    #[schema(value_type = String)]
    pub total_credit: Decimal,
    pub warnings: Vec<String>,
}

fn optional_text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl SubmitReturnCommand {
    pub fn new(actor: AuthUser, request: SubmitReturnRequest) -> Self {
        Self { actor, request }
    }

    /// Turns the form into a storable submission. Date problems become
    /// warnings; missing required fields are errors.
    fn prepare(&self, today: NaiveDate) -> Result<(NewReturn, Vec<String>), ServiceError> {
        self.request.validate()?;
        if self.request.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "items: at least one item is required".into(),
            ));
        }

        let mut warnings = Vec::new();
        let (date_submitted, submitted_warning) =
            parse_date(self.request.date_submitted.as_deref(), "Submission date");
        // Missing counts as malformed: the form always carries this date.
        let date_submitted = match (date_submitted, submitted_warning) {
            (Some(date), _) => date,
            (None, warning) => {
                warnings.push(
                    warning.unwrap_or_else(|| "Submission date must be YYYY-MM-DD".to_string()),
                );
                today
            }
        };
        let (date_shipped, shipped_warning) =
            parse_date(self.request.date_shipped.as_deref(), "Ship date");
        warnings.extend(shipped_warning);

        let items = self
            .request
            .items
            .iter()
            .map(|item| {
                let credit = credit_amount(item.price_per_unit, item.quantity).ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "items: credit for {} is out of range",
                        item.product_code.trim()
                    ))
                })?;
                Ok(NewReturnItem {
                    product_code: item.product_code.trim().to_string(),
                    product_desc: item.product_desc.trim().to_string(),
                    price_per_unit: item.price_per_unit,
                    quantity: item.quantity,
                    credit_amount: credit,
                    product_returning: item.product_returning.clone(),
                    reason_for_return: item.reason_for_return.trim().to_string(),
                    follow_up_action: optional_text(&item.follow_up_action),
                    supplier_credit: item.supplier_credit,
                })
            })
            .collect::<Result<Vec<_>, ServiceError>>()?;

        let rep_name = optional_text(&self.request.rep_name).unwrap_or_else(|| self.actor.name.clone());

        let submission = NewReturn {
            rep_name,
            date_submitted,
            order_number: self.request.order_number.trim().to_string(),
            customer_name: self.request.customer_name.trim().to_string(),
            date_shipped,
            return_type: self.request.return_type.trim().to_string(),
            advised_customer: optional_text(&self.request.advised_customer),
            additional_notes: optional_text(&self.request.additional_notes),
            created_by: self.actor.user_id,
            date_created: Utc::now(),
            items,
        };
        Ok((submission, warnings))
    }
}

#[async_trait::async_trait]
impl Command for SubmitReturnCommand {
    type Result = Submission;

    #[instrument(skip(self, ctx), fields(actor_id = self.actor.user_id))]
    async fn execute(&self, ctx: &WorkflowContext) -> Result<Self::Result, ServiceError> {
        self.actor.require(Capability::SubmitReturn)?;

        let (submission, mut warnings) = self.prepare(Utc::now().date_naive())?;
        let ReturnDetail { record, items } = ctx.returns.insert_submission(submission).await?;
        let total = total_credit(&items);
        info!(
            return_id = record.id,
            items = items.len(),
            total_credit = %total,
            "return submitted"
        );

        let mut report = DispatchReport::default();
        let view_url = ctx.settings.return_url(record.id);

        let confirmation = NoticeTemplate::new(
            NoticeEvent::New,
            &record,
            Some(total),
            Some(&view_url),
            &ctx.settings.branding.company_name,
        );
        notify(ctx, &confirmation, &[self.actor.email.clone()], &mut report).await;

        let heads_up = NoticeTemplate::new(
            NoticeEvent::NewReturn,
            &record,
            Some(total),
            Some(&view_url),
            &ctx.settings.branding.company_name,
        );
        let warehouse = role_recipients(ctx, Role::Warehouse, true, &mut report).await?;
        notify(ctx, &heads_up, &warehouse, &mut report).await;

        warnings.extend(report.warnings.iter().cloned());
        Ok(Submission {
            outcome: TransitionOutcome {
                record,
                previous_status: ReturnStatus::Pending,
                notifications: report,
            },
            items,
            total_credit: total,
            warnings,
        })
    }
}
