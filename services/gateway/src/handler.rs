use axum::body::Bytes;
use axum::{Extension, Json};
use common::{Now, SystemNow};
use http::Method;
use serde::Serialize;
use serde_json::{Value, json};
use token::{Authenticated, Claims, Principal};
use tracing::instrument;

/// Public endpoint, no token required.
pub async fn hello() -> Json<Value> {
    Json(json!({
        "message": "Hello, World!",
        "description": "This is a public endpoint that doesn't require authentication.",
    }))
}

#[derive(Debug, Serialize)]
pub struct ProtectedResp {
    message: &'static str,
    user: String,
    client_id: Option<String>,
    scopes: Vec<String>,
}

/// Echoes the authenticated caller.
#[instrument(skip_all)]
pub async fn protected(Extension(auth): Extension<Authenticated>) -> Json<ProtectedResp> {
    Json(ProtectedResp {
        message: "You have successfully authenticated!",
        user: auth.principal.to_string(),
        client_id: auth.claims.client_id.clone(),
        scopes: scope_list(&auth.claims),
    })
}

/// Requires the `read` scope.
pub async fn scoped_read() -> Json<Value> {
    Json(json!({
        "message": "You have read access!",
        "data": [
            { "id": 1, "name": "Item 1" },
            { "id": 2, "name": "Item 2" },
            { "id": 3, "name": "Item 3" },
        ],
    }))
}

/// Requires the `write` scope.
pub async fn scoped_write(method: Method, body: Bytes) -> Json<Value> {
    if method == Method::GET {
        return Json(json!({
            "message": "This endpoint requires write scope. Use POST to create data.",
        }));
    }
    Json(json!({
        "message": "You have write access!",
        "created": true,
        "data": body_json(&body),
    }))
}

/// `read` for safe methods, `write` otherwise.
#[instrument(skip_all, fields(method = %method))]
pub async fn scoped_read_write(
    method: Method,
    Extension(auth): Extension<Authenticated>,
    body: Bytes,
) -> Json<Value> {
    let scopes = auth.claims.scope.clone();
    if method == Method::GET {
        return Json(json!({
            "message": "Reading data (requires read scope)",
            "method": "GET",
            "scopes": scopes,
        }));
    }
    Json(json!({
        "message": "Writing data (requires write scope)",
        "method": method.as_str(),
        "data": body_json(&body),
        "scopes": scopes,
    }))
}

/// Requires the `admin` scope.
pub async fn scoped_admin(
    method: Method,
    Extension(auth): Extension<Authenticated>,
) -> Json<Value> {
    let action = if method == Method::GET {
        "View all system settings"
    } else if method == Method::POST {
        "Create new system configuration"
    } else {
        "Delete system resources"
    };
    Json(json!({
        "message": format!("Admin access granted: {action}"),
        "method": method.as_str(),
        "admin_access": true,
        "scopes": auth.claims.scope,
    }))
}

/// Requires both `read` and `write`.
pub async fn multi_scope(Extension(auth): Extension<Authenticated>, body: Bytes) -> Json<Value> {
    Json(json!({
        "message": "You have both read and write access!",
        "operation": "Complex operation requiring multiple permissions",
        "data": body_json(&body),
        "scopes": auth.claims.scope,
    }))
}

#[derive(Debug, Serialize)]
pub struct TieredResp {
    message: &'static str,
    your_scopes: Vec<String>,
    access_level: &'static str,
    data: Value,
}

/// Returns more data the stronger the granted scope.
pub async fn tiered(Extension(auth): Extension<Authenticated>) -> Json<TieredResp> {
    let (access_level, data) = access_tier(&auth.claims);
    Json(TieredResp {
        message: "Scope-based data access",
        your_scopes: scope_list(&auth.claims),
        access_level,
        data,
    })
}

fn access_tier(claims: &Claims) -> (&'static str, Value) {
    let scopes = claims.scopes_of();
    if scopes.contains("admin") {
        return (
            "admin",
            json!({
                "public": "Everyone can see this",
                "internal": "Only authenticated users see this",
                "sensitive": "Only admins see this",
                "secrets": "Top secret admin data",
            }),
        );
    }
    if scopes.contains("write") {
        return (
            "write",
            json!({
                "public": "Everyone can see this",
                "internal": "Only authenticated users see this",
                "sensitive": "Only write/admin users see this",
            }),
        );
    }
    if scopes.contains("read") {
        return (
            "read",
            json!({
                "public": "Everyone can see this",
                "internal": "Only authenticated users see this",
            }),
        );
    }
    ("none", json!({ "public": "Everyone can see this" }))
}

/// Works with and without a token.
pub async fn optional_auth(auth: Option<Extension<Authenticated>>) -> Json<Value> {
    match auth {
        Some(Extension(auth)) => Json(json!({
            "message": "Welcome authenticated user!",
            "authenticated": true,
            "user": auth.principal.to_string(),
            "scopes": auth.claims.scope,
        })),
        None => Json(json!({
            "message": "Welcome anonymous user!",
            "authenticated": false,
            "hint": "Provide a bearer token to see more data",
        })),
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct TokenInfo {
    iss: String,
    sub: Option<String>,
    client_id: Option<String>,
    scopes: Vec<String>,
    exp: i64,
    iat: i64,
    jti: String,
    user_bound: bool,
    user_id: Option<String>,
    username: Option<String>,
    expires_in: i64,
}

impl TokenInfo {
    fn new(auth: &Authenticated, now: i64) -> Self {
        let claims = &auth.claims;
        let (user_id, username) = match &auth.principal {
            Principal::User(account) => (Some(account.id.clone()), Some(account.username.clone())),
            Principal::Anonymous => (None, None),
        };

        Self {
            iss: claims.iss.clone(),
            sub: claims.sub.clone(),
            client_id: claims.client_id.clone(),
            scopes: scope_list(claims),
            exp: claims.exp,
            iat: claims.iat,
            jti: claims.jti.clone(),
            user_bound: claims.is_user_bound(),
            user_id,
            username,
            expires_in: (claims.exp - now).max(0),
        }
    }
}

/// Summarizes the presented token.
#[instrument(skip_all)]
pub async fn token_info(Extension(auth): Extension<Authenticated>) -> Json<TokenInfo> {
    Json(TokenInfo::new(&auth, SystemNow.unix_seconds()))
}

fn scope_list(claims: &Claims) -> Vec<String> {
    claims.scopes_of().into_iter().map(str::to_string).collect()
}

fn body_json(body: &Bytes) -> Value {
    serde_json::from_slice(body).unwrap_or(Value::Null)
}
