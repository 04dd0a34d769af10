use axum::{
    extract::{Path, Query, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use super::file_response;
use crate::auth::AuthUser;
use crate::commands::returns::{SubmitReturnRequest, Submission, TransitionOutcome};
use crate::errors::ServiceError;
use crate::models::returns::total_credit;
use crate::models::{ReturnItem, ReturnRecord};
use crate::repositories::ReturnDetail;
use crate::services::returns::ListReturnsQuery;
use crate::{ApiResponse, ApiResult, AppState};

/// A return with its items and the credit they add up to.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReturnView {
    #[serde(rename = "return")]
    pub record: ReturnRecord,
    pub items: Vec<ReturnItem>,
    #[schema(value_type = String, example = "25.00")]
    pub total_credit: Decimal,
}

impl From<ReturnDetail> for ReturnView {
    fn from(detail: ReturnDetail) -> Self {
        Self {
            total_credit: total_credit(&detail.items),
            record: detail.record,
            items: detail.items,
        }
    }
}

fn header(name: &'static str, value: impl ToString) -> Option<(HeaderName, HeaderValue)> {
    HeaderValue::from_str(&value.to_string())
        .ok()
        .map(|v| (HeaderName::from_static(name), v))
}

#[utoipa::path(
    get,
    path = "/api/v1/returns",
    summary = "List returns",
    description = "Returns filtered by status bucket and inclusive submission-date range. Sales users only see their own. Unusable filter values are ignored and reported in `warnings`.",
    params(ListReturnsQuery),
    responses(
        (status = 200, description = "Returns listed", body = ApiResponse<Vec<ReturnRecord>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "returns"
)]
pub async fn list_returns(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Query(query): Query<ListReturnsQuery>,
) -> ApiResult<Vec<ReturnRecord>> {
    let (records, warnings) = state.return_service().list_for_actor(&actor, &query).await?;
    Ok(Json(ApiResponse::success(records).with_warnings(warnings)))
}

#[utoipa::path(
    post,
    path = "/api/v1/returns",
    summary = "Submit a return",
    request_body = SubmitReturnRequest,
    responses(
        (status = 201, description = "Return stored as Pending", body = ApiResponse<Submission>),
        (status = 400, description = "Missing or invalid fields", body = crate::errors::ErrorResponse),
        (status = 403, description = "Only sales users submit returns", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "returns"
)]
pub async fn create_return(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Json(payload): Json<SubmitReturnRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Submission>>), ServiceError> {
    let submission = state.return_service().submit(&actor, payload).await?;
    let warnings = submission.warnings.clone();
    let message = format!("Return #{} submitted for approval", submission.outcome.record.id);
    Ok((
        StatusCode::CREATED,
        Json(
            ApiResponse::success(submission)
                .with_message(message)
                .with_warnings(warnings),
        ),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/returns/{id}",
    summary = "View a return",
    params(("id" = i64, Path, description = "Return id")),
    responses(
        (status = 200, description = "Return found", body = ApiResponse<ReturnView>),
        (status = 403, description = "Belongs to another sales user", body = crate::errors::ErrorResponse),
        (status = 404, description = "No such return", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "returns"
)]
pub async fn get_return(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<ReturnView> {
    let detail = state.return_service().get_for_actor(&actor, id).await?;
    Ok(Json(ApiResponse::success(ReturnView::from(detail))))
}

#[utoipa::path(
    get,
    path = "/api/v1/returns/{id}/pdf",
    summary = "Download the return form",
    params(("id" = i64, Path, description = "Return id")),
    responses(
        (status = 200, description = "PDF document", content_type = "application/pdf", body = Vec<u8>),
        (status = 403, description = "Belongs to another sales user", body = crate::errors::ErrorResponse),
        (status = 404, description = "No such return", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "returns"
)]
pub async fn return_pdf(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Response, ServiceError> {
    let document = state.return_service().return_form(&actor, id).await?;
    Ok(file_response(
        document.bytes,
        "application/pdf",
        &document.file_name,
        true,
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/approvals",
    summary = "Returns awaiting a decision",
    description = "Pending and WH Approved returns, oldest submission first.",
    responses(
        (status = 200, description = "Approval queue", body = ApiResponse<Vec<ReturnRecord>>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "approvals"
)]
pub async fn list_approvals(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
) -> ApiResult<Vec<ReturnRecord>> {
    let queue = state.return_service().pending_approvals(&actor).await?;
    Ok(Json(ApiResponse::success(queue)))
}

#[utoipa::path(
    post,
    path = "/api/v1/returns/{id}/approve-warehouse",
    summary = "Warehouse approval",
    description = "Moves a Pending return to WH Approved and notifies managers.",
    params(("id" = i64, Path, description = "Return id")),
    responses(
        (status = 200, description = "Approved by warehouse", body = ApiResponse<TransitionOutcome>),
        (status = 403, description = "Warehouse role required", body = crate::errors::ErrorResponse),
        (status = 409, description = "Return is not Pending", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "approvals"
)]
pub async fn approve_warehouse(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<TransitionOutcome> {
    let outcome = state.return_service().approve_warehouse(&actor, id).await?;
    let warnings = outcome.notifications.warnings.clone();
    Ok(Json(
        ApiResponse::success(outcome)
            .with_message(format!("Return #{id} approved by warehouse"))
            .with_warnings(warnings),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/returns/{id}/approve-manager",
    summary = "Manager approval",
    description = "Moves a WH Approved return to Approved and responds with the credit-PO PDF, which is also mailed to the submitter.",
    params(("id" = i64, Path, description = "Return id")),
    responses(
        (status = 200, description = "Credit PO", content_type = "application/pdf", body = Vec<u8>,
            headers(
                ("X-Return-Status" = String, description = "Status after approval"),
                ("X-Total-Credit" = String, description = "Sum of item credits"),
                ("X-Notices-Failed" = usize, description = "Notices that could not be delivered")
            )
        ),
        (status = 403, description = "Manager role required", body = crate::errors::ErrorResponse),
        (status = 409, description = "Return is not WH Approved", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "approvals"
)]
pub async fn approve_manager(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Response, ServiceError> {
    let approval = state.return_service().approve_manager(&actor, id).await?;

    let mut response = file_response(
        approval.document,
        "application/pdf",
        &approval.file_name,
        false,
    );
    let report = &approval.outcome.notifications;
    let extra = [
        header("x-return-status", approval.outcome.record.status),
        header("x-total-credit", format!("{:.2}", approval.total_credit)),
        header("x-notices-sent", report.sent),
        header("x-notices-failed", report.failed + report.skipped),
    ];
    for (name, value) in extra.into_iter().flatten() {
        response.headers_mut().insert(name, value);
    }
    Ok(response)
}

#[utoipa::path(
    post,
    path = "/api/v1/returns/{id}/reject",
    summary = "Reject a return",
    params(("id" = i64, Path, description = "Return id")),
    responses(
        (status = 200, description = "Rejected", body = ApiResponse<TransitionOutcome>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "Return already decided", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "approvals"
)]
pub async fn reject_return(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<TransitionOutcome> {
    let outcome = state.return_service().reject(&actor, id).await?;
    let warnings = outcome.notifications.warnings.clone();
    Ok(Json(
        ApiResponse::success(outcome)
            .with_message(format!("Return #{id} rejected"))
            .with_warnings(warnings),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/returns/export.csv",
    summary = "Export every return as CSV",
    description = "One row per item, creator and approvers shown by username.",
    responses(
        (status = 200, description = "CSV dump", content_type = "text/csv", body = String),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "exports"
)]
pub async fn export_csv(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
) -> Result<Response, ServiceError> {
    let csv = state.return_service().export_csv(&actor).await?;
    let file_name = format!("returns_{}.csv", chrono::Utc::now().format("%Y%m%d"));
    Ok(file_response(
        csv.into_bytes(),
        "text/csv; charset=utf-8",
        &file_name,
        false,
    )
    .into_response())
}
