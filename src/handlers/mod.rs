use std::sync::Arc;

use axum::{
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};

use crate::services::returns::ReturnService;
use crate::services::users::UserService;

pub mod analytics;
pub mod returns;
pub mod users;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub returns: Arc<ReturnService>,
    pub users: Arc<UserService>,
}

impl AppServices {
    pub fn new(returns: ReturnService, users: UserService) -> Self {
        Self {
            returns: Arc::new(returns),
            users: Arc::new(users),
        }
    }
}

/// Binary download with a `Content-Disposition` file name.
pub(crate) fn file_response(
    bytes: Vec<u8>,
    content_type: &'static str,
    file_name: &str,
    inline: bool,
) -> Response {
    let disposition = format!(
        "{}; filename=\"{}\"",
        if inline { "inline" } else { "attachment" },
        file_name.replace('"', "")
    );
    let mut response = (
        [(header::CONTENT_TYPE, HeaderValue::from_static(content_type))],
        bytes,
    )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        response
            .headers_mut()
            .insert(header::CONTENT_DISPOSITION, value);
    }
    response
}
