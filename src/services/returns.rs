use std::collections::HashMap;

use serde::Deserialize;
use tracing::{debug, instrument, warn};
use utoipa::IntoParams;

use crate::auth::{AuthUser, Capability};
use crate::commands::returns::{
    load_items, load_return, ApproveManagerCommand, ApproveWarehouseCommand, ManagerApproval,
    RejectReturnCommand, SubmitReturnCommand, SubmitReturnRequest, Submission, TransitionOutcome,
};
use crate::commands::{Command, WorkflowContext};
use crate::documents::ReturnFormDocument;
use crate::errors::ServiceError;
use crate::models::{ReturnFilter, ReturnRecord};
use crate::repositories::ReturnDetail;
use crate::services::analytics::{summarize, AnalyticsSummary};
use crate::services::export::write_csv;

/// Raw listing filters as they arrive on the query string.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListReturnsQuery {
    /// `pending`, `accepted`, `rejected` or empty for all
    pub status: Option<String>,
    /// Inclusive lower bound on the submission date, `YYYY-MM-DD`
    pub from: Option<String>,
    /// Inclusive upper bound on the submission date, `YYYY-MM-DD`
    pub to: Option<String>,
}

/// A generated file ready to hand back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Entry point for every return operation. Role checks happen here as well
/// as at the routes, so the workflow holds without HTTP in front of it.
#[derive(Clone)]
pub struct ReturnService {
    ctx: WorkflowContext,
}

impl ReturnService {
    pub fn new(ctx: WorkflowContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &WorkflowContext {
        &self.ctx
    }

    pub async fn submit(
        &self,
        actor: &AuthUser,
        request: SubmitReturnRequest,
    ) -> Result<Submission, ServiceError> {
        SubmitReturnCommand::new(actor.clone(), request)
            .execute(&self.ctx)
            .await
    }

    pub async fn approve_warehouse(
        &self,
        actor: &AuthUser,
        id: i64,
    ) -> Result<TransitionOutcome, ServiceError> {
        ApproveWarehouseCommand::new(id, actor.clone())
            .execute(&self.ctx)
            .await
    }

    pub async fn approve_manager(
        &self,
        actor: &AuthUser,
        id: i64,
    ) -> Result<ManagerApproval, ServiceError> {
        ApproveManagerCommand::new(id, actor.clone())
            .execute(&self.ctx)
            .await
    }

    pub async fn reject(&self, actor: &AuthUser, id: i64) -> Result<TransitionOutcome, ServiceError> {
        RejectReturnCommand::new(id, actor.clone())
            .execute(&self.ctx)
            .await
    }

    /// One return with its items. Sales users may only open their own.
    #[instrument(skip(self, actor), fields(actor_id = actor.user_id))]
    pub async fn get_for_actor(&self, actor: &AuthUser, id: i64) -> Result<ReturnDetail, ServiceError> {
        let record = load_return(&self.ctx, id).await?;
        ensure_visible(actor, &record)?;
        let items = load_items(&self.ctx, id).await?;
        Ok(ReturnDetail { record, items })
    }

    /// Filtered listing plus warnings for filter values that were ignored.
    #[instrument(skip(self, actor, query), fields(actor_id = actor.user_id))]
    pub async fn list_for_actor(
        &self,
        actor: &AuthUser,
        query: &ListReturnsQuery,
    ) -> Result<(Vec<ReturnRecord>, Vec<String>), ServiceError> {
        let (mut filter, warnings) = ReturnFilter::from_query(
            query.status.as_deref(),
            query.from.as_deref(),
            query.to.as_deref(),
        );
        if !actor.can(Capability::ViewAllReturns) {
            filter.created_by = Some(actor.user_id);
        }
        for warning in &warnings {
            warn!(actor_id = actor.user_id, %warning, "listing filter ignored");
        }

        let records = self.ctx.returns.list_filtered(&filter).await?;
        debug!(count = records.len(), "returns listed");
        Ok((records, warnings))
    }

    /// Pending and WH Approved returns, oldest submission first.
    pub async fn pending_approvals(&self, actor: &AuthUser) -> Result<Vec<ReturnRecord>, ServiceError> {
        actor.require(Capability::ViewApprovals)?;
        self.ctx
            .returns
            .list_filtered(&ReturnFilter::awaiting_approval())
            .await
    }

    /// Printable copy of a return at any status.
    #[instrument(skip(self, actor), fields(actor_id = actor.user_id))]
    pub async fn return_form(&self, actor: &AuthUser, id: i64) -> Result<RenderedDocument, ServiceError> {
        let ReturnDetail { record, items } = self.get_for_actor(actor, id).await?;
        let layout = ReturnFormDocument::build(&record, &items, &self.ctx.settings.branding);
        let file_name = layout.file_name.clone();
        let bytes = self.ctx.renderer.render(layout).await?;
        Ok(RenderedDocument { file_name, bytes })
    }

    #[instrument(skip(self, actor), fields(actor_id = actor.user_id))]
    pub async fn export_csv(&self, actor: &AuthUser) -> Result<String, ServiceError> {
        actor.require(Capability::ExportDataset)?;
        let rows = self.ctx.returns.export_rows().await?;
        let usernames: HashMap<i64, String> = self
            .ctx
            .users
            .list_users()
            .await?
            .into_iter()
            .map(|u| (u.id, u.username))
            .collect();
        Ok(write_csv(&rows, &usernames))
    }

    pub async fn analytics(&self, actor: &AuthUser) -> Result<AnalyticsSummary, ServiceError> {
        actor.require(Capability::ViewAnalytics)?;
        let rows = self.ctx.returns.export_rows().await?;
        Ok(summarize(&rows))
    }
}

fn ensure_visible(actor: &AuthUser, record: &ReturnRecord) -> Result<(), ServiceError> {
    if actor.can(Capability::ViewAllReturns) || record.created_by == actor.user_id {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!(
            "Return {} belongs to another user",
            record.id
        )))
    }
}
