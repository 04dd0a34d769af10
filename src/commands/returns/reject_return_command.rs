use tracing::instrument;
use validator::Validate;

use super::{notify, submitter_recipients, transition, TransitionOutcome};
use crate::auth::AuthUser;
use crate::commands::{Command, WorkflowContext};
use crate::errors::ServiceError;
use crate::models::WorkflowAction;
use crate::notifications::{DispatchReport, NoticeEvent, NoticeTemplate};

/// Pending or WH Approved -> Rejected. Warehouse sign-off, if any, is kept.
#[derive(Debug, Clone, Validate)]
pub struct RejectReturnCommand {
    #[validate(range(min = 1))]
    pub return_id: i64,
    pub actor: AuthUser,
}

impl RejectReturnCommand {
    pub fn new(return_id: i64, actor: AuthUser) -> Self {
        Self { return_id, actor }
    }
}

#[async_trait::async_trait]
impl Command for RejectReturnCommand {
    type Result = TransitionOutcome;

    #[instrument(skip(self, ctx), fields(return_id = self.return_id, actor_id = self.actor.user_id))]
    async fn execute(&self, ctx: &WorkflowContext) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        let (record, previous) =
            transition(ctx, self.return_id, &self.actor, WorkflowAction::Reject).await?;

        let mut report = DispatchReport::default();
        let template = NoticeTemplate::new(
            NoticeEvent::Rejected,
            &record,
            None,
            Some(&ctx.settings.return_url(record.id)),
            &ctx.settings.branding.company_name,
        );
        let submitter = submitter_recipients(ctx, &record, &mut report).await?;
        notify(ctx, &template, &submitter, &mut report).await;

        Ok(TransitionOutcome {
            record,
            previous_status: previous,
            notifications: report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::returns::test_support::{harness, submit};
    use crate::commands::returns::{ApproveManagerCommand, ApproveWarehouseCommand};
    use crate::models::ReturnStatus;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn rejecting_pending_only_touches_legacy_stamp() {
        let h = harness().await;
        let record = submit(&h, &[(dec!(1), dec!(1))]).await;

        let outcome = RejectReturnCommand::new(record.id, h.manager.clone())
            .execute(&h.ctx)
            .await
            .unwrap();

        let r = &outcome.record;
        assert_eq!(r.status, ReturnStatus::Rejected);
        assert_eq!(r.approved_by, Some(h.manager.user_id));
        assert!(r.approved_at.is_some());
        assert!(r.wh_approved_by.is_none() && r.wh_approved_at.is_none());
        assert!(r.mgr_approved_by.is_none() && r.mgr_approved_at.is_none());

        let sent = h.notifier.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, h.sales.email);
        assert_eq!(sent[0].subject, format!("Return #{} - Rejected", record.id));
    }

    #[tokio::test]
    async fn rejecting_after_warehouse_keeps_its_stamp() {
        let h = harness().await;
        let record = submit(&h, &[(dec!(1), dec!(1))]).await;
        ApproveWarehouseCommand::new(record.id, h.warehouse.clone())
            .execute(&h.ctx)
            .await
            .unwrap();

        let outcome = RejectReturnCommand::new(record.id, h.admin.clone())
            .execute(&h.ctx)
            .await
            .unwrap();

        assert_eq!(outcome.previous_status, ReturnStatus::WhApproved);
        assert_eq!(outcome.record.wh_approved_by, Some(h.warehouse.user_id));
        assert!(outcome.record.approval_metadata_consistent());
    }

    #[tokio::test]
    async fn decisions_are_final() {
        let h = harness().await;
        let record = submit(&h, &[(dec!(1), dec!(1))]).await;
        ApproveWarehouseCommand::new(record.id, h.warehouse.clone())
            .execute(&h.ctx)
            .await
            .unwrap();
        ApproveManagerCommand::new(record.id, h.manager.clone())
            .execute(&h.ctx)
            .await
            .unwrap();

        let err = RejectReturnCommand::new(record.id, h.manager.clone())
            .execute(&h.ctx)
            .await;
        assert_matches!(
            err,
            Err(ServiceError::IllegalTransition { found: ReturnStatus::Approved, .. })
        );
    }

    #[tokio::test]
    async fn sales_cannot_reject() {
        let h = harness().await;
        let record = submit(&h, &[(dec!(1), dec!(1))]).await;
        let err = RejectReturnCommand::new(record.id, h.sales.clone())
            .execute(&h.ctx)
            .await;
        assert_matches!(err, Err(ServiceError::Forbidden(_)));
    }
}
