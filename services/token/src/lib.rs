//! Issuance and verification of signed, self-contained access tokens.
//!
//! A [`TokenIssuer`] turns an authorization context into a signed token.
//! A [`TokenVerifier`] checks signature and lifetime and yields [`Claims`],
//! which an [`Authenticator`] resolves to a [`Principal`]. Both share one
//! [`KeyResolver`] built from a [`TokenConfig`].
pub mod account;
pub mod authenticate;
pub mod claims;
pub mod config;
pub mod error;
pub mod header;
pub mod issuer;
pub mod keys;
pub mod middleware;
pub mod verifier;

mod fixture;

pub use account::{Account, AccountStore, InMemoryAccountStore, PostgresAccountStore};
pub use authenticate::{Authenticated, Authenticator, Principal};
pub use claims::Claims;
pub use config::TokenConfig;
pub use error::{AuthenticateErr, ConfigErr, DBError, IssueTokenErr, VerifyTokenErr};
pub use header::extract_bearer;
pub use issuer::{IssueContext, TokenIssuer, TokenUser};
pub use keys::{KeyPurpose, KeyResolver};
pub use middleware::auth::{BearerAuthLayer, RequestAuthenticator};
pub use middleware::capability::{Capability, RequireCapabilityLayer};
pub use verifier::TokenVerifier;
