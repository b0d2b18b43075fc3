use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use axum::body::Body;
use common::Now;
use http::header::AUTHORIZATION;
use http::{Method, Request, Response, StatusCode};
use tower::{Layer, Service};

use super::{BoxFuture, error_response, unauthorized};
use crate::account::AccountStore;
use crate::authenticate::{Authenticated, Authenticator};
use crate::error::AuthenticateErr;

#[async_trait]
pub trait RequestAuthenticator: Send + Sync + 'static {
    /// Authenticates the value of a request's authorization header.
    ///
    /// # Returns
    /// - `Some(`[`Authenticated`]`)` if the header carries a valid token.
    /// - `None` if the request offers no bearer credentials.
    /// - [`AuthenticateErr`] if the header or token is rejected.
    async fn authenticate(
        &self,
        header: Option<&str>,
    ) -> Result<Option<Authenticated>, AuthenticateErr>;

    /// Value of the `WWW-Authenticate` header sent with a 401.
    fn challenge(&self) -> String;
}

#[async_trait]
impl<A, N> RequestAuthenticator for Authenticator<A, N>
where
    A: AccountStore,
    N: Now,
{
    async fn authenticate(
        &self,
        header: Option<&str>,
    ) -> Result<Option<Authenticated>, AuthenticateErr> {
        Authenticator::authenticate(self, header).await
    }

    fn challenge(&self) -> String {
        self.www_authenticate()
    }
}

#[async_trait]
impl<T> RequestAuthenticator for Arc<T>
where
    T: RequestAuthenticator + ?Sized,
{
    async fn authenticate(
        &self,
        header: Option<&str>,
    ) -> Result<Option<Authenticated>, AuthenticateErr> {
        (**self).authenticate(header).await
    }

    fn challenge(&self) -> String {
        (**self).challenge()
    }
}

/// Service produced by [`BearerAuthLayer`] that authenticates requests with a bearer token.
#[derive(Clone)]
pub struct BearerAuthService<S, A> {
    /// The inner service.
    pub inner: S,

    /// Authenticates the authorization header.
    pub authenticator: A,

    /// Request uri paths for which authentication should be skipped.
    pub public_paths: Vec<String>,
}

/// Authentication layer that validates the bearer token of incoming requests.
///
/// After successful authentication the middleware inserts [`Authenticated`]
/// into the request's extensions allowing handlers and the capability guard
/// to access principal and claims. Requests without bearer credentials pass
/// through unauthenticated.
#[derive(Clone)]
pub struct BearerAuthLayer<A> {
    pub authenticator: A,

    /// Request uri paths for which authentication should be skipped.
    pub public_paths: Vec<String>,
}

impl<A> BearerAuthLayer<A> {
    /// Creates a new [`BearerAuthLayer`].
    pub fn new(authenticator: A, public_paths: Vec<String>) -> Self {
        Self {
            authenticator,
            public_paths,
        }
    }
}

impl<S, A: Clone> Layer<S> for BearerAuthLayer<A> {
    type Service = BearerAuthService<S, A>;

    fn layer(&self, inner: S) -> Self::Service {
        BearerAuthService {
            inner,
            authenticator: self.authenticator.clone(),
            public_paths: self.public_paths.clone(),
        }
    }
}

impl<S, ReqBody, A> Service<Request<ReqBody>> for BearerAuthService<S, A>
where
    S: Service<Request<ReqBody>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
    A: RequestAuthenticator + Clone,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        // Allow preflight
        if request.method() == Method::OPTIONS {
            return Box::pin(self.inner.call(request));
        }

        let req_path = request.uri().path();
        if self.public_paths.iter().any(|p| matches_pattern(p, req_path)) {
            return Box::pin(self.inner.call(request));
        }

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let authenticator = self.authenticator.clone();

        Box::pin(async move {
            let header = match request.headers().get(AUTHORIZATION).map(|v| v.to_str()) {
                None => None,
                Some(Ok(value)) => Some(value.to_string()),
                Some(Err(_)) => {
                    let err = AuthenticateErr::MalformedHeader("header is not valid ASCII");
                    return Ok(reject(&authenticator, &err));
                }
            };

            match authenticator.authenticate(header.as_deref()).await {
                Ok(Some(authenticated)) => {
                    tracing::Span::current().record(
                        "principal",
                        tracing::field::display(&authenticated.principal),
                    );
                    request.extensions_mut().insert(authenticated);
                    inner.call(request).await
                }
                Ok(None) => inner.call(request).await,
                Err(err) => Ok(reject(&authenticator, &err)),
            }
        })
    }
}

fn reject<A: RequestAuthenticator>(authenticator: &A, err: &AuthenticateErr) -> Response<Body> {
    if err.is_operator_fault() {
        // Verification faults are logged, throttled, by the verifier.
        if let AuthenticateErr::Store(_) = err {
            tracing::error!(error = %err, "authentication failed");
        }
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal authentication error",
        );
    }
    unauthorized(&authenticator.challenge(), &err.to_string())
}

fn matches_pattern(pattern: &str, path: &str) -> bool {
    let pattern_parts: Vec<&str> = pattern.split('/').collect();
    let path_parts: Vec<&str> = path.split('/').collect();

    if pattern_parts.len() != path_parts.len() {
        return false;
    }

    pattern_parts
        .iter()
        .zip(path_parts.iter())
        .all(|(pattern, path)| *pattern == "*" || pattern == path)
}
