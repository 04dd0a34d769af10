use tracing::instrument;
use validator::Validate;

use super::{notify, role_recipients, transition, TransitionOutcome};
use crate::auth::{AuthUser, Role};
use crate::commands::{Command, WorkflowContext};
use crate::errors::ServiceError;
use crate::models::WorkflowAction;
use crate::notifications::{DispatchReport, NoticeEvent, NoticeTemplate};

/// First sign-off: Pending -> WH Approved, then every manager hears about it.
#[derive(Debug, Clone, Validate)]
pub struct ApproveWarehouseCommand {
    #[validate(range(min = 1))]
    pub return_id: i64,
    pub actor: AuthUser,
}

impl ApproveWarehouseCommand {
    pub fn new(return_id: i64, actor: AuthUser) -> Self {
        Self { return_id, actor }
    }
}

#[async_trait::async_trait]
impl Command for ApproveWarehouseCommand {
    type Result = TransitionOutcome;

    #[instrument(skip(self, ctx), fields(return_id = self.return_id, actor_id = self.actor.user_id))]
    async fn execute(&self, ctx: &WorkflowContext) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        let (record, previous) =
            transition(ctx, self.return_id, &self.actor, WorkflowAction::ApproveWarehouse).await?;

        let mut report = DispatchReport::default();
        let template = NoticeTemplate::new(
            NoticeEvent::Warehouse,
            &record,
            None,
            Some(&ctx.settings.return_url(record.id)),
            &ctx.settings.branding.company_name,
        );
        // Managers are notified whether or not their account is active.
        let managers = role_recipients(ctx, Role::Manager, false, &mut report).await?;
        notify(ctx, &template, &managers, &mut report).await;

        Ok(TransitionOutcome {
            record,
            previous_status: previous,
            notifications: report,
        })
    }
}
