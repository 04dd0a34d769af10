use axum::{extract::State, Extension, Json};

use crate::auth::AuthUser;
use crate::services::analytics::AnalyticsSummary;
use crate::{ApiResponse, ApiResult, AppState};

#[utoipa::path(
    get,
    path = "/api/v1/analytics/summary",
    summary = "Return analytics",
    description = "Totals, per-status breakdown, approval timings and top products across all returns.",
    responses(
        (status = 200, description = "Summary", body = ApiResponse<AnalyticsSummary>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "analytics"
)]
pub async fn summary(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
) -> ApiResult<AnalyticsSummary> {
    let summary = state.return_service().analytics(&actor).await?;
    Ok(Json(ApiResponse::success(summary)))
}
