mod handler;

use std::error::Error;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use database::PGConfig;
use setup::{add_middleware, init_tracer};
use tokio::net::TcpListener;
use token::{
    Authenticator, BearerAuthLayer, Capability, PostgresAccountStore, RequestAuthenticator,
    RequireCapabilityLayer, TokenConfig, TokenVerifier,
};

use crate::handler::{
    hello, multi_scope, optional_auth, protected, scoped_admin, scoped_read, scoped_read_write,
    scoped_write, tiered, token_info,
};

const SERVICE_NAME: &str = "gateway";
const DEFAULT_PORT: &str = "3000";
const ACCOUNTS_DB: &str = "accounts";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();
    let tracer = init_tracer(SERVICE_NAME)?;

    let config = TokenConfig::from_env()?;
    let keys = Arc::new(config.key_resolver()?);
    let pool = database::connect(&PGConfig::from_env(ACCOUNTS_DB)?)?;
    let authenticator = Arc::new(Authenticator::new(
        &config,
        TokenVerifier::new(&config, keys),
        PostgresAccountStore::new(pool),
    ));

    let router = add_middleware(app(authenticator));

    let port = std::env::var("PORT").unwrap_or_else(|_| DEFAULT_PORT.to_string());
    let listener = TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router).await?;

    if let Some(tracer) = tracer {
        tracer.shutdown()?;
    }

    Ok(())
}

/// Builds the routes, each guarded by the capability it was registered with.
fn app<A>(authenticator: A) -> Router
where
    A: RequestAuthenticator + Clone,
{
    let challenge = authenticator.challenge();
    let guard = |capability| RequireCapabilityLayer::new(capability).with_challenge(&challenge);

    Router::new()
        .route("/hello", get(hello))
        .route("/optional", get(optional_auth))
        .route(
            "/protected",
            get(protected).route_layer(guard(Capability::Authenticated)),
        )
        .route(
            "/scoped/read",
            get(scoped_read).route_layer(guard(Capability::scopes(["read"]))),
        )
        .route(
            "/scoped/write",
            get(scoped_write)
                .post(scoped_write)
                .route_layer(guard(Capability::scopes(["write"]))),
        )
        .route(
            "/scoped/read-write",
            get(scoped_read_write)
                .post(scoped_read_write)
                .route_layer(guard(Capability::ReadWrite)),
        )
        .route(
            "/scoped/admin",
            get(scoped_admin)
                .post(scoped_admin)
                .delete(scoped_admin)
                .route_layer(guard(Capability::scopes(["admin"]))),
        )
        .route(
            "/scoped/multiple",
            post(multi_scope).route_layer(guard(Capability::scopes(["read", "write"]))),
        )
        .route(
            "/scoped/tiered",
            get(tiered).route_layer(guard(Capability::any_of([["read"], ["write"], ["admin"]]))),
        )
        .route(
            "/token/info",
            get(token_info).route_layer(guard(Capability::Authenticated)),
        )
        .layer(BearerAuthLayer::new(
            authenticator,
            vec!["/hello".to_string()],
        ))
}
