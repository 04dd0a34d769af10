//! Return Desk
//!
//! Customer-return approval service: sales submit returns, warehouse and
//! manager approve them in two steps, and approval produces a credit-PO PDF.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod commands;
pub mod config;
pub mod db;
pub mod documents;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod models;
pub mod notifications;
pub mod openapi;
pub mod repositories;
pub mod services;
pub mod tracing;

use axum::{
    extract::State,
    http::HeaderValue,
    response::Json,
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
};
use utoipa::ToSchema;

use crate::auth::{AuthConfig, AuthRouterExt, AuthService, Capability};
use crate::commands::{WorkflowContext, WorkflowSettings};
use crate::documents::PdfRenderer;
use crate::repositories::{ReturnRepository, UserRepository};
use crate::services::{returns::ReturnService, users::UserService};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
}

impl AppState {
    /// Wires the sea-orm stores, the configured notifier and the PDF renderer
    /// into the services. The auth service shares the same user directory.
    pub fn build(
        db: DatabaseConnection,
        config: config::AppConfig,
    ) -> Result<(Self, Arc<AuthService>), errors::ServiceError> {
        let db = Arc::new(db);
        let returns = Arc::new(ReturnRepository::new(db.clone()));
        let users = Arc::new(UserRepository::new(db.clone()));
        let notifier = notifications::notifier_for(&config)
            .map_err(|e| errors::ServiceError::InternalError(e.to_string()))?;
        ::tracing::info!(notifier = notifier.name(), "notifications configured");

        let ctx = WorkflowContext {
            returns,
            users: users.clone(),
            notifier,
            renderer: Arc::new(PdfRenderer::new()),
            settings: WorkflowSettings::from_config(&config),
        };
        let services =
            handlers::AppServices::new(ReturnService::new(ctx), UserService::new(users.clone()));

        let auth = Arc::new(AuthService::new(
            AuthConfig::new(
                config.jwt_secret.clone(),
                Duration::from_secs(config.jwt_expiration as u64),
            ),
            users,
        ));

        Ok((
            Self {
                db,
                config,
                services,
            },
            auth,
        ))
    }

    pub fn return_service(&self) -> Arc<ReturnService> {
        self.services.returns.clone()
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    /// Problems that did not stop the request
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            warnings: Vec::new(),
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            warnings: Vec::new(),
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn validation_errors(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some("Validation failed".to_string()),
            errors: Some(errors),
            warnings: Vec::new(),
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn with_message(mut self, message: String) -> Self {
        self.message = Some(message);
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }
}


/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

pub fn api_v1_routes() -> Router<AppState> {
    use handlers::{analytics, returns, users};

    // Any signed-in user; the service narrows sales users to their own returns.
    let returns_read = Router::new()
        .route("/returns", get(returns::list_returns))
        .route("/returns/:id", get(returns::get_return))
        .route("/returns/:id/pdf", get(returns::return_pdf))
        .with_auth();

    let returns_submit = Router::new()
        .route("/returns", post(returns::create_return))
        .with_capability(Capability::SubmitReturn);

    let approvals_read = Router::new()
        .route("/approvals", get(returns::list_approvals))
        .with_capability(Capability::ViewApprovals);

    let approve_warehouse = Router::new()
        .route(
            "/returns/:id/approve-warehouse",
            post(returns::approve_warehouse),
        )
        .with_capability(Capability::ApproveWarehouse);

    let approve_manager = Router::new()
        .route("/returns/:id/approve-manager", post(returns::approve_manager))
        .with_capability(Capability::ApproveManager);

    let reject = Router::new()
        .route("/returns/:id/reject", post(returns::reject_return))
        .with_capability(Capability::RejectReturn);

    let export = Router::new()
        .route("/returns/export.csv", get(returns::export_csv))
        .with_capability(Capability::ExportDataset);

    let analytics = Router::new()
        .route("/analytics/summary", get(analytics::summary))
        .with_capability(Capability::ViewAnalytics);

    let admin = Router::new()
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/:id", put(users::edit_user))
        .route("/users/:id/toggle", post(users::toggle_user))
        .with_capability(Capability::ManageUsers);

    Router::new()
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .merge(returns_read)
        .merge(returns_submit)
        .merge(approvals_read)
        .merge(approve_warehouse)
        .merge(approve_manager)
        .merge(reject)
        .merge(export)
        .merge(analytics)
        .nest("/admin", admin)
}

/// Full application router: API, login, docs and the cross-cutting layers.
pub fn app_router(
    state: AppState,
    auth_service: Arc<AuthService>,
) -> Result<Router, errors::ServiceError> {
    let cors = cors_layer(&state.config)?;

    Ok(Router::<AppState>::new()
        .route("/", get(|| async { "return-desk up" }))
        .nest("/api/v1", api_v1_routes())
        .nest(
            "/auth",
            auth::auth_routes().with_state(auth_service.clone()),
        )
        .merge(openapi::swagger_ui())
        .layer(axum::middleware::from_fn(request_logging_middleware))
        .layer(crate::tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        .layer(cors)
        // Inject AuthService into request extensions for auth middleware
        .layer(axum::middleware::from_fn_with_state(
            auth_service,
            |State(auth): State<Arc<AuthService>>,
             mut req: axum::http::Request<axum::body::Body>,
             next: axum::middleware::Next| async move {
                req.extensions_mut().insert(auth);
                next.run(req).await
            },
        ))
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state))
}

fn cors_layer(cfg: &config::AppConfig) -> Result<CorsLayer, errors::ServiceError> {
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    if let Some(origins) = configured_origins {
        Ok(CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any))
    } else if cfg.should_allow_permissive_cors() {
        ::tracing::info!(
            "Using permissive CORS because explicit origins were not configured ({})",
            if cfg.is_development() {
                "development environment"
            } else {
                "explicit override enabled"
            }
        );
        Ok(CorsLayer::permissive())
    } else {
        Err(errors::ServiceError::InternalError(
            "Missing CORS configuration: set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
        ))
    }
}

async fn api_status(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let status_data = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "return-desk",
        "timestamp": Utc::now().to_rfc3339(),
        "environment": state.config.environment,
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(e) => {
            ::tracing::warn!(error = %e, "database ping failed");
            "unhealthy"
        }
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}

async fn request_logging_middleware(
    request: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    ::tracing::debug!(method = %method, uri = %uri, "Incoming request");

    let response = next.run(request).await;

    ::tracing::info!(
        method = %method,
        uri = %uri,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Request completed"
    );

    response
}
