//! Return workflow commands. Each guarded transition follows the same path:
//! check the actor's capability, apply the action to a copy of the stored
//! record, then save it only if nobody moved the status in between.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use super::WorkflowContext;
use crate::auth::{AuthUser, Role};
use crate::errors::ServiceError;
use crate::models::{ReturnItem, ReturnRecord, ReturnStatus, WorkflowAction};
use crate::notifications::{dispatch, is_deliverable_address, DispatchReport, NoticeTemplate};

pub mod approve_manager_command;
pub mod approve_warehouse_command;
pub mod reject_return_command;
pub mod submit_return_command;

pub use approve_manager_command::{ApproveManagerCommand, ManagerApproval};
pub use approve_warehouse_command::ApproveWarehouseCommand;
pub use reject_return_command::RejectReturnCommand;
pub use submit_return_command::{ReturnItemInput, SubmitReturnCommand, SubmitReturnRequest, Submission};

/// Result of a guarded transition.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransitionOutcome {
    #[serde(rename = "return")]
    pub record: ReturnRecord,
    pub previous_status: ReturnStatus,
    pub notifications: DispatchReport,
}

pub(crate) async fn load_return(ctx: &WorkflowContext, id: i64) -> Result<ReturnRecord, ServiceError> {
    ctx.returns
        .get_by_id(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Return {id}")))
}

pub(crate) async fn load_items(ctx: &WorkflowContext, id: i64) -> Result<Vec<ReturnItem>, ServiceError> {
    ctx.returns.items_for(id).await
}

/// Runs `action` against return `id` on behalf of `actor`. Exactly one of
/// several racing callers succeeds; the others see the status that won.
pub(crate) async fn transition(
    ctx: &WorkflowContext,
    id: i64,
    actor: &AuthUser,
    action: WorkflowAction,
) -> Result<(ReturnRecord, ReturnStatus), ServiceError> {
    actor.require(action.capability())?;

    let stored = load_return(ctx, id).await?;
    let mut updated = stored.clone();
    let previous = updated
        .apply(action, actor.user_id, Utc::now())
        .map_err(|illegal| ServiceError::IllegalTransition {
            return_id: id,
            found: illegal.found,
            expected: illegal.action.expected_status().to_string(),
        })?;

    if !ctx.returns.save_transition(&updated, previous).await? {
        let found = load_return(ctx, id).await?.status;
        warn!(return_id = id, %action, %found, "lost transition race");
        return Err(ServiceError::IllegalTransition {
            return_id: id,
            found,
            expected: action.expected_status().to_string(),
        });
    }

    info!(
        return_id = id,
        actor_id = actor.user_id,
        from = %previous,
        to = %updated.status,
        "return status changed"
    );
    Ok((updated, previous))
}

/// Address of the user who submitted `record`, if they still have an account.
pub(crate) async fn submitter_recipients(
    ctx: &WorkflowContext,
    record: &ReturnRecord,
    report: &mut DispatchReport,
) -> Result<Vec<String>, ServiceError> {
    match ctx.users.get_user(record.created_by).await? {
        Some(user) => Ok(vec![user.username]),
        None => {
            warn!(return_id = record.id, user_id = record.created_by, "submitter account not found");
            report.skip(format!(
                "Submitter of return #{} has no account to notify",
                record.id
            ));
            Ok(Vec::new())
        }
    }
}

/// Everyone holding `role`, or the configured fallback mailbox when none of
/// them has a deliverable address.
pub(crate) async fn role_recipients(
    ctx: &WorkflowContext,
    role: Role,
    active_only: bool,
    report: &mut DispatchReport,
) -> Result<Vec<String>, ServiceError> {
    let recipients: Vec<String> = ctx
        .users
        .users_with_role(role, active_only)
        .await?
        .into_iter()
        .map(|user| user.username)
        .collect();

    if recipients.iter().any(|r| is_deliverable_address(r)) {
        return Ok(recipients);
    }

    match ctx.settings.approver_fallbacks.for_role(role) {
        Some(fallback) => {
            info!(%role, fallback, "no reachable users; using fallback approver mailbox");
            Ok(vec![fallback.to_string()])
        }
        None if recipients.is_empty() => {
            warn!(%role, "no users to notify");
            report.skip(format!("No {role} users to notify"));
            Ok(Vec::new())
        }
        None => Ok(recipients),
    }
}

pub(crate) async fn notify(
    ctx: &WorkflowContext,
    template: &NoticeTemplate,
    recipients: &[String],
    report: &mut DispatchReport,
) {
    report.merge(dispatch(ctx.notifier.as_ref(), template, recipients).await);
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use tokio::sync::Mutex;

    use super::{ReturnItemInput, SubmitReturnCommand, SubmitReturnRequest};
    use crate::auth::{AuthUser, Role};
    use crate::commands::{Command, WorkflowContext, WorkflowSettings};
    use crate::models::ReturnRecord;
    use crate::config::ApproverFallbacks;
    use crate::documents::{Branding, DocumentError, DocumentLayout, DocumentRenderer};
    use crate::notifications::{NotificationError, Notifier, ReturnNotice};
    use crate::repositories::{InMemoryReturnStore, InMemoryUserDirectory, NewUser, UserDirectory};

    /// Keeps every notice it is handed; addresses in `fail_for` error out.
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<ReturnNotice>>,
        pub fail_for: Vec<String>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, notice: &ReturnNotice) -> Result<(), NotificationError> {
            if self.fail_for.contains(&notice.recipient) {
                return Err(NotificationError::Transport("relay down".into()));
            }
            self.sent.lock().await.push(notice.clone());
            Ok(())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    /// Produces the layout's total as the document body.
    pub struct TextRenderer;

    #[async_trait]
    impl DocumentRenderer for TextRenderer {
        async fn render(&self, layout: DocumentLayout) -> Result<Vec<u8>, DocumentError> {
            Ok(format!("{}|{}", layout.title, layout.total).into_bytes())
        }
    }

    pub struct Harness {
        pub ctx: WorkflowContext,
        pub notifier: Arc<RecordingNotifier>,
        pub sales: AuthUser,
        pub warehouse: AuthUser,
        pub manager: AuthUser,
        pub admin: AuthUser,
    }

    pub async fn harness() -> Harness {
        harness_with(RecordingNotifier::default(), ApproverFallbacks::default()).await
    }

    pub async fn harness_with(notifier: RecordingNotifier, fallbacks: ApproverFallbacks) -> Harness {
        let users = Arc::new(InMemoryUserDirectory::new());
        let mut actors = Vec::new();
        for (username, role) in [
            ("sam@acme.test", Role::Sales),
            ("wes@acme.test", Role::Warehouse),
            ("mia@acme.test", Role::Manager),
            ("ada@acme.test", Role::Admin),
        ] {
            let user = users
                .create_user(NewUser {
                    username: username.into(),
                    name: username.split('@').next().unwrap_or_default().into(),
                    password_hash: "x".into(),
                    role,
                    is_active: true,
                })
                .await
                .unwrap();
            actors.push(AuthUser::from(&user));
        }

        let notifier = Arc::new(notifier);
        let ctx = WorkflowContext {
            returns: Arc::new(InMemoryReturnStore::new()),
            users,
            notifier: notifier.clone(),
            renderer: Arc::new(TextRenderer),
            settings: WorkflowSettings {
                branding: Branding {
                    company_name: "Acme Foods".into(),
                    company_address: None,
                },
                public_base_url: "https://returns.acme.test/".into(),
                approver_fallbacks: fallbacks,
            },
        };

        let admin = actors.pop().unwrap();
        let manager = actors.pop().unwrap();
        let warehouse = actors.pop().unwrap();
        let sales = actors.pop().unwrap();
        Harness {
            ctx,
            notifier,
            sales,
            warehouse,
            manager,
            admin,
        }
    }

    /// Submits a return as the harness sales user, one item per (price, qty).
    pub async fn submit(h: &Harness, lines: &[(Decimal, Decimal)]) -> ReturnRecord {
        let request = SubmitReturnRequest {
            rep_name: Some("Sam Rep".into()),
            date_submitted: Some("2024-06-03".into()),
            order_number: "SO-2001".into(),
            customer_name: "Harbor Market".into(),
            date_shipped: Some("2024-05-28".into()),
            return_type: "Credit".into(),
            advised_customer: Some("Yes".into()),
            additional_notes: None,
            items: lines
                .iter()
                .enumerate()
                .map(|(i, (price, qty))| ReturnItemInput {
                    product_code: format!("SKU-{i}"),
                    product_desc: "Pork shoulder".into(),
                    price_per_unit: *price,
                    quantity: *qty,
                    product_returning: "Yes".into(),
                    reason_for_return: "Short dated".into(),
                    follow_up_action: None,
                    supplier_credit: false,
                })
                .collect(),
        };
        let submission = SubmitReturnCommand::new(h.sales.clone(), request)
            .execute(&h.ctx)
            .await
            .unwrap();
        h.notifier.sent.lock().await.clear();
        submission.outcome.record
    }
}
