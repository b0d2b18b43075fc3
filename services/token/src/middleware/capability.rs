use std::collections::BTreeSet;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use http::{Method, Request, Response, StatusCode};
use tower::{Layer, Service};

use super::{BoxFuture, error_response, unauthorized};
use crate::authenticate::Authenticated;
use crate::claims::Claims;

const DEFAULT_CHALLENGE: &str = "Bearer realm=\"api\"";

/// Access requirement attached to a route when it is registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    /// Any verified token.
    Authenticated,

    /// Every listed scope.
    Scopes(BTreeSet<String>),

    /// Every scope of at least one alternative.
    AnyOf(Vec<BTreeSet<String>>),

    /// `read` for safe methods, `write` for all others.
    ReadWrite,
}

impl Capability {
    pub fn scopes<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Capability::Scopes(scopes.into_iter().map(Into::into).collect())
    }

    pub fn any_of<I, J, S>(alternatives: I) -> Self
    where
        I: IntoIterator<Item = J>,
        J: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Capability::AnyOf(
            alternatives
                .into_iter()
                .map(|scopes| scopes.into_iter().map(Into::into).collect())
                .collect(),
        )
    }

    /// Returns true if `claims` grant this capability for a request with `method`.
    #[must_use]
    pub fn permits(&self, claims: &Claims, method: &Method) -> bool {
        match self {
            Capability::Authenticated => true,
            Capability::Scopes(scopes) => claims.satisfies(scopes),
            Capability::AnyOf(alternatives) => alternatives.iter().any(|s| claims.satisfies(s)),
            Capability::ReadWrite => {
                let required = if is_safe(method) { "read" } else { "write" };
                claims.satisfies([required])
            }
        }
    }
}

fn is_safe(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Service produced by [`RequireCapabilityLayer`].
#[derive(Clone)]
pub struct RequireCapabilityService<S> {
    pub inner: S,
    pub capability: Arc<Capability>,
    pub challenge: Arc<str>,
}

/// Rejects requests whose authenticated claims lack a capability.
///
/// Must run after [`super::auth::BearerAuthLayer`]. Requests without
/// [`Authenticated`] get a 401, insufficient claims a 403.
#[derive(Clone)]
pub struct RequireCapabilityLayer {
    capability: Arc<Capability>,
    challenge: Arc<str>,
}

impl RequireCapabilityLayer {
    pub fn new(capability: Capability) -> Self {
        Self {
            capability: Arc::new(capability),
            challenge: Arc::from(DEFAULT_CHALLENGE),
        }
    }

    /// Replaces the `WWW-Authenticate` value sent with a 401.
    #[must_use]
    pub fn with_challenge(mut self, challenge: impl Into<String>) -> Self {
        self.challenge = Arc::from(challenge.into());
        self
    }
}

impl<S> Layer<S> for RequireCapabilityLayer {
    type Service = RequireCapabilityService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequireCapabilityService {
            inner,
            capability: self.capability.clone(),
            challenge: self.challenge.clone(),
        }
    }
}

impl<S, ReqBody> Service<Request<ReqBody>> for RequireCapabilityService<S>
where
    S: Service<Request<ReqBody>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let Some(authenticated) = request.extensions().get::<Authenticated>() else {
            let resp = unauthorized(&self.challenge, "authentication credentials were not provided");
            return Box::pin(async move { Ok::<_, S::Error>(resp) });
        };

        if !self.capability.permits(&authenticated.claims, request.method()) {
            tracing::info!(principal = %authenticated.principal, "insufficient scope");
            let resp = error_response(StatusCode::FORBIDDEN, "insufficient scope");
            return Box::pin(async move { Ok::<_, S::Error>(resp) });
        }

        Box::pin(self.inner.call(request))
    }
}
