use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Return Desk API",
        version = "0.1.0",
        description = r#"
# Return Desk

Customer-return approval service.

- **Sales** submit returns with one or more items; credit per item is `price x quantity` rounded to cents.
- **Warehouse** approves a Pending return (Pending -> WH Approved).
- **Manager** approves a WH Approved return (-> Approved) and receives the credit PO as a PDF.
- Warehouse, managers and admins may reject a return that is not yet decided.

## Authentication

Sign in at `/auth/login` and send the token on every call:

```
Authorization: Bearer <your-jwt-token>
```

## Warnings

Problems that do not stop a request (an unparseable filter date, a notification that
could not be delivered) are reported in the `warnings` array of the response envelope.
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "returns", description = "Submitting and viewing returns"),
        (name = "approvals", description = "Warehouse and manager decisions"),
        (name = "exports", description = "Dataset export"),
        (name = "analytics", description = "Return statistics"),
        (name = "admin", description = "Account administration"),
        (name = "auth", description = "Sign-in")
    ),
    paths(
        crate::auth::login_handler,

        crate::handlers::returns::list_returns,
        crate::handlers::returns::create_return,
        crate::handlers::returns::get_return,
        crate::handlers::returns::return_pdf,
        crate::handlers::returns::list_approvals,
        crate::handlers::returns::approve_warehouse,
        crate::handlers::returns::approve_manager,
        crate::handlers::returns::reject_return,
        crate::handlers::returns::export_csv,

        crate::handlers::analytics::summary,

        crate::handlers::users::list_users,
        crate::handlers::users::create_user,
        crate::handlers::users::toggle_user,
        crate::handlers::users::edit_user,
    ),
    components(
        schemas(
            crate::models::ReturnStatus,
            crate::auth::Role,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDocV1;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
