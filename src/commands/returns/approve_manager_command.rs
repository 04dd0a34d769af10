use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, instrument};
use validator::Validate;

use super::{load_items, notify, submitter_recipients, transition, TransitionOutcome};
use crate::auth::AuthUser;
use crate::commands::{Command, WorkflowContext};
use crate::documents::CreditPoDocument;
use crate::errors::ServiceError;
use crate::models::returns::total_credit;
use crate::models::WorkflowAction;
use crate::notifications::{Attachment, DispatchReport, NoticeEvent, NoticeTemplate};

/// Final sign-off: WH Approved -> Approved. Produces the credit PO and mails
/// it to the submitter.
#[derive(Debug, Clone, Validate)]
pub struct ApproveManagerCommand {
    #[validate(range(min = 1))]
    pub return_id: i64,
    pub actor: AuthUser,
}

#[derive(Debug, Clone)]
pub struct ManagerApproval {
    pub outcome: TransitionOutcome,
    pub total_credit: Decimal,
    pub file_name: String,
    pub document: Vec<u8>,
}

impl ApproveManagerCommand {
    pub fn new(return_id: i64, actor: AuthUser) -> Self {
        Self { return_id, actor }
    }
}

#[async_trait::async_trait]
impl Command for ApproveManagerCommand {
    type Result = ManagerApproval;

    #[instrument(skip(self, ctx), fields(return_id = self.return_id, actor_id = self.actor.user_id))]
    async fn execute(&self, ctx: &WorkflowContext) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        let (record, previous) =
            transition(ctx, self.return_id, &self.actor, WorkflowAction::ApproveManager).await?;

        // The approval is already stored; a rendering failure surfaces to the
        // caller without rolling it back.
        let items = load_items(ctx, record.id).await?;
        let total = total_credit(&items);
        let layout = CreditPoDocument::build(
            &record,
            &items,
            &ctx.settings.branding,
            Utc::now().date_naive(),
        );
        let file_name = layout.file_name.clone();
        let document = ctx.renderer.render(layout).await?;
        info!(return_id = record.id, %file_name, bytes = document.len(), "credit PO generated");

        let mut report = DispatchReport::default();
        let template = NoticeTemplate::new(
            NoticeEvent::Manager,
            &record,
            Some(total),
            None,
            &ctx.settings.branding.company_name,
        )
        .with_attachment(Attachment::pdf(file_name.clone(), document.clone()));
        let submitter = submitter_recipients(ctx, &record, &mut report).await?;
        notify(ctx, &template, &submitter, &mut report).await;

        Ok(ManagerApproval {
            outcome: TransitionOutcome {
                record,
                previous_status: previous,
                notifications: report,
            },
            total_credit: total,
            file_name,
            document,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::returns::test_support::{harness, submit};
    use crate::commands::returns::ApproveWarehouseCommand;
    use crate::models::ReturnStatus;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn full_approval_produces_credit_po() {
        let h = harness().await;
        let record = submit(&h, &[(dec!(10.00), dec!(2)), (dec!(5.00), dec!(1))]).await;
        ApproveWarehouseCommand::new(record.id, h.warehouse.clone())
            .execute(&h.ctx)
            .await
            .unwrap();
        h.notifier.sent.lock().await.clear();

        let approval = ApproveManagerCommand::new(record.id, h.manager.clone())
            .execute(&h.ctx)
            .await
            .unwrap();

        let stored = &approval.outcome.record;
        assert_eq!(stored.status, ReturnStatus::Approved);
        assert_eq!(stored.mgr_approved_by, Some(h.manager.user_id));
        assert_eq!(stored.wh_approved_by, Some(h.warehouse.user_id));
        assert!(stored.approval_metadata_consistent());
        assert_eq!(approval.total_credit, dec!(25.00));
        assert_eq!(approval.file_name, format!("credit_po_{}.pdf", record.id));
        assert_eq!(
            String::from_utf8(approval.document.clone()).unwrap(),
            format!("CREDIT-PO - Return #{}|$25.00", record.id)
        );

        let sent = h.notifier.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, h.sales.email);
        assert!(sent[0].body.contains("Total credit: $25.00"));
        let attachment = sent[0].attachment.as_ref().unwrap();
        assert_eq!(attachment.file_name, approval.file_name);
        assert_eq!(*attachment.bytes, approval.document);
    }

    #[tokio::test]
    async fn pending_return_cannot_skip_the_warehouse() {
        let h = harness().await;
        let record = submit(&h, &[(dec!(1), dec!(1))]).await;

        let err = ApproveManagerCommand::new(record.id, h.manager.clone())
            .execute(&h.ctx)
            .await;
        assert_matches!(
            err,
            Err(ServiceError::IllegalTransition { found: ReturnStatus::Pending, .. })
        );
        assert!(h.notifier.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn warehouse_cannot_give_final_approval() {
        let h = harness().await;
        let record = submit(&h, &[(dec!(1), dec!(1))]).await;
        ApproveWarehouseCommand::new(record.id, h.warehouse.clone())
            .execute(&h.ctx)
            .await
            .unwrap();

        let err = ApproveManagerCommand::new(record.id, h.warehouse.clone())
            .execute(&h.ctx)
            .await;
        assert_matches!(err, Err(ServiceError::Forbidden(_)));
    }
}
