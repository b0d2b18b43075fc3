use jsonwebtoken::Algorithm;
use thiserror::Error;

use crate::keys::KeyPurpose;

/// Deployment fault: missing or unusable settings and key material.
///
/// Never caused by a client; surfaced to operators rather than as an
/// invalid-token response.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigErr {
    #[error("missing setting: {0}")]
    MissingSetting(String),

    #[error("invalid setting {name}: {reason}")]
    InvalidSetting { name: String, reason: String },

    #[error("missing {purpose} key setting: {name}")]
    MissingKey { purpose: KeyPurpose, name: String },

    #[error("invalid key material in {name}: {source}")]
    InvalidKey {
        name: String,
        #[source]
        source: jsonwebtoken::errors::Error,
    },

    #[error("unsupported algorithm {0:?}: key material must be asymmetric")]
    UnsupportedAlgorithm(Algorithm),
}

/// Error for [`crate::TokenIssuer::issue`]
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IssueTokenErr {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigErr),

    #[error("failed to sign token: {0}")]
    Sign(#[from] jsonwebtoken::errors::Error),
}

/// Error for [`crate::TokenVerifier::verify`]
///
/// Messages never contain key material.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VerifyTokenErr {
    #[error("error decoding token: {0}")]
    Malformed(String),

    #[error("invalid token: signature verification failed")]
    BadSignature,

    #[error("token has expired")]
    Expired,

    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigErr),
}

/// Error for [`crate::Authenticator::authenticate`] and [`crate::Authenticator::resolve`]
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthenticateErr {
    #[error("invalid authorization header: {0}")]
    MalformedHeader(&'static str),

    #[error(transparent)]
    InvalidToken(#[from] VerifyTokenErr),

    #[error("user not found")]
    UserNotFound,

    #[error("user account is disabled")]
    AccountDisabled,

    #[error("account lookup error: {0}")]
    Store(DBError),
}

impl AuthenticateErr {
    /// Returns true for faults on the operator's side rather than the caller's.
    #[must_use]
    pub fn is_operator_fault(&self) -> bool {
        matches!(
            self,
            AuthenticateErr::InvalidToken(VerifyTokenErr::Configuration(_))
                | AuthenticateErr::Store(_)
        )
    }
}

// Database error
#[derive(Debug, Error)]
pub enum DBError {
    #[error("internal database error: {0}")]
    Internal(#[from] tokio_postgres::Error),

    #[error("connection error: {0}")]
    Connection(#[from] deadpool_postgres::PoolError),

    #[error("entity not found")]
    NotFound,
}
