//! Tower middleware guarding HTTP routes with bearer tokens.
//!
//! [`auth::BearerAuthLayer`] authenticates every request once and stores
//! the [`crate::Authenticated`] result in the request extensions.
//! [`capability::RequireCapabilityLayer`] is attached per route and checks
//! the stored claims against that route's [`capability::Capability`].
use core::pin::Pin;

use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use http::header::WWW_AUTHENTICATE;
use serde_json::json;

pub mod auth;
pub mod capability;

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub(crate) fn unauthorized(challenge: &str, detail: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(WWW_AUTHENTICATE, challenge.to_string())],
        Json(json!({ "detail": detail })),
    )
        .into_response()
}

pub(crate) fn error_response(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}
