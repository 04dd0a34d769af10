#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use return_desk::{
    auth::{user, AuthService, Role},
    config::{AppConfig, DEV_DEFAULT_JWT_SECRET},
    db,
    repositories::{UserDirectory, UserRepository},
    services::users::CreateUserRequest,
    AppState,
};
use serde_json::Value;
use tower::ServiceExt;

pub const PASSWORD: &str = "correct horse battery";

/// Router over a fresh in-memory SQLite database with one account per role.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub auth_service: Arc<AuthService>,
    pub sales: user::Model,
    pub other_sales: user::Model,
    pub warehouse: user::Model,
    pub manager: user::Model,
    pub admin: user::Model,
}

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::new(
        "sqlite::memory:".to_string(),
        DEV_DEFAULT_JWT_SECRET.to_string(),
        3600,
        "127.0.0.1".to_string(),
        0,
        "development".to_string(),
    );
    cfg.public_base_url = "https://returns.acme.test".to_string();
    cfg.company_name = "Acme Foods".to_string();
    cfg
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(cfg: AppConfig) -> Self {
        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (state, auth_service) = AppState::build(pool, cfg).expect("services");
        let router =
            return_desk::app_router(state.clone(), auth_service.clone()).expect("router");

        let users = UserRepository::new(state.db.clone());
        let sales = create_user(&state, &users, "sam@acme.test", "Sam Sales", Role::Sales).await;
        let other_sales =
            create_user(&state, &users, "sue@acme.test", "Sue Sales", Role::Sales).await;
        let warehouse =
            create_user(&state, &users, "wes@acme.test", "Wes Warehouse", Role::Warehouse).await;
        let manager =
            create_user(&state, &users, "mia@acme.test", "Mia Manager", Role::Manager).await;
        let admin = create_user(&state, &users, "ada@acme.test", "Ada Admin", Role::Admin).await;

        Self {
            router,
            state,
            auth_service,
            sales,
            other_sales,
            warehouse,
            manager,
            admin,
        }
    }

    pub fn token_for(&self, user: &user::Model) -> String {
        self.auth_service
            .generate_token(user)
            .expect("token generation")
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Request signed as `user`.
    pub async fn request_as(
        &self,
        user: &user::Model,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response {
        let token = self.token_for(user);
        self.request(method, uri, body, Some(&token)).await
    }
}

async fn create_user(
    state: &AppState,
    users: &UserRepository,
    email: &str,
    name: &str,
    role: Role,
) -> user::Model {
    let summary = state
        .services
        .users
        .create(CreateUserRequest {
            username: email.to_string(),
            name: name.to_string(),
            role,
            password: PASSWORD.to_string(),
            is_active: true,
        })
        .await
        .expect("seed user");
    users
        .get_user(summary.id)
        .await
        .expect("lookup")
        .expect("seeded user exists")
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

pub async fn response_bytes(response: Response) -> Vec<u8> {
    body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes")
        .to_vec()
}
