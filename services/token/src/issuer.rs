//! Token issuer
//!
//! Builds the claims of a fresh access token from an authorization
//! context and signs them with the deployment's private key. Nothing is
//! persisted; the token is self-verifying until it expires.
use std::sync::Arc;

use common::{Now, SystemNow, UuidGenerator, UuidV4Generator};
use jsonwebtoken::{Algorithm, Header, encode};
use tracing::instrument;

use crate::account::Account;
use crate::claims::Claims;
use crate::config::TokenConfig;
use crate::error::IssueTokenErr;
use crate::keys::KeyResolver;

/// What an authorization grant hands to the issuer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueContext {
    /// OAuth2 client the token is issued to.
    pub client_id: Option<String>,

    /// Granted scopes, joined in order.
    pub scopes: Vec<String>,

    /// Authenticated user, absent for client-credentials grants.
    pub user: Option<TokenUser>,
}

/// The user a token is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenUser {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
}

impl From<&Account> for TokenUser {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.clone(),
            username: account.username.clone(),
            email: account.email.clone(),
        }
    }
}

pub struct TokenIssuer<N = SystemNow, U = UuidV4Generator> {
    issuer: String,
    algorithm: Algorithm,
    lifetime: i64,
    keys: Arc<KeyResolver>,
    now: N,
    uuid: U,
}

impl TokenIssuer {
    /// Creates an issuer for the configured deployment issuer.
    #[must_use]
    pub fn new(config: &TokenConfig, keys: Arc<KeyResolver>) -> Self {
        Self {
            issuer: config.issuer.clone(),
            algorithm: config.signing_algorithm,
            lifetime: config.lifetime,
            keys,
            now: SystemNow,
            uuid: UuidV4Generator,
        }
    }
}

impl<N, U> TokenIssuer<N, U> {
    /// Replaces the clock.
    #[must_use]
    pub fn with_now<N2: Now>(self, now: N2) -> TokenIssuer<N2, U> {
        TokenIssuer {
            issuer: self.issuer,
            algorithm: self.algorithm,
            lifetime: self.lifetime,
            keys: self.keys,
            now,
            uuid: self.uuid,
        }
    }

    /// Replaces the token id generator.
    #[must_use]
    pub fn with_uuid<U2: UuidGenerator>(self, uuid: U2) -> TokenIssuer<N, U2> {
        TokenIssuer {
            issuer: self.issuer,
            algorithm: self.algorithm,
            lifetime: self.lifetime,
            keys: self.keys,
            now: self.now,
            uuid,
        }
    }
}

impl<N, U> TokenIssuer<N, U>
where
    N: Now,
    U: UuidGenerator,
{
    /// Builds the claims for `ctx` without signing them.
    ///
    /// Client-credentials tokens carry the client id as `sub` but no
    /// `username`, which keeps them from being user bound.
    #[must_use]
    pub fn claims(&self, ctx: &IssueContext) -> Claims {
        let iat = self.now.unix_seconds();
        let mut claims = Claims {
            iss: self.issuer.clone(),
            exp: iat.saturating_add(self.lifetime),
            iat,
            jti: self.uuid.generate().to_string(),
            client_id: ctx.client_id.clone(),
            aud: ctx.client_id.clone(),
            ..Default::default()
        };

        if !ctx.scopes.is_empty() {
            claims.scope = Some(ctx.scopes.join(" "));
        }

        match &ctx.user {
            Some(user) => {
                claims.sub = Some(user.id.clone());
                claims.username = Some(user.username.clone());
                claims.email.clone_from(&user.email);
            }
            None => claims.sub.clone_from(&ctx.client_id),
        }

        claims
    }

    /// Issues a signed access token.
    ///
    /// # Errors
    /// - no signing key is configured for the deployment issuer
    /// - the configured algorithm does not fit that key
    /// - signing fails
    #[instrument(skip_all, fields(client_id = ctx.client_id.as_deref(), jti), err)]
    pub fn issue(&self, ctx: &IssueContext) -> Result<String, IssueTokenErr> {
        let signing = self.keys.signing_key(&self.issuer, self.algorithm)?;
        let claims = self.claims(ctx);
        tracing::Span::current().record("jti", claims.jti.as_str());

        let token = encode(&Header::new(signing.algorithm), &claims, signing.key)?;
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use common::mock::{DEFAULT_TIME, MockNow};
    use jsonwebtoken::decode_header;
    use rstest::rstest;

    use super::*;
    use crate::error::ConfigErr;
    use crate::fixture::{fixture_config, fixture_context, fixture_issuer, fixture_verifier};

    #[rstest]
    #[case::user_bound(
        fixture_context(|_| {}),
        Claims {
            sub: Some("42".to_string()),
            client_id: Some("client-1".to_string()),
            aud: Some("client-1".to_string()),
            scope: Some("read write".to_string()),
            username: Some("alice".to_string()),
            email: Some("alice@example.com".to_string()),
            ..Default::default()
        }
    )]
    #[case::client_credentials(
        fixture_context(|ctx| ctx.user = None),
        Claims {
            sub: Some("client-1".to_string()),
            client_id: Some("client-1".to_string()),
            aud: Some("client-1".to_string()),
            scope: Some("read write".to_string()),
            ..Default::default()
        }
    )]
    #[case::no_client_no_user(
        fixture_context(|ctx| {
            ctx.client_id = None;
            ctx.user = None;
        }),
        Claims::default()
    )]
    #[case::no_scopes(
        fixture_context(|ctx| ctx.scopes.clear()),
        Claims {
            sub: Some("42".to_string()),
            client_id: Some("client-1".to_string()),
            aud: Some("client-1".to_string()),
            username: Some("alice".to_string()),
            email: Some("alice@example.com".to_string()),
            ..Default::default()
        }
    )]
    #[case::user_without_email(
        fixture_context(|ctx| {
            ctx.client_id = None;
            if let Some(user) = ctx.user.as_mut() {
                user.email = None;
            }
        }),
        Claims {
            sub: Some("42".to_string()),
            scope: Some("read write".to_string()),
            username: Some("alice".to_string()),
            ..Default::default()
        }
    )]
    fn test_claims(#[case] ctx: IssueContext, #[case] want: Claims) {
        // given
        let config = fixture_config(|_| {});
        let issuer = fixture_issuer(&config, &MockNow::default());
        let want = Claims {
            iss: "auth-server".to_string(),
            iat: DEFAULT_TIME,
            exp: DEFAULT_TIME + 3600,
            jti: "00000000-0000-0000-0000-000000000000".to_string(),
            ..want
        };

        // when
        let got = issuer.claims(&ctx);

        // then
        assert_eq!(got, want);
    }

    #[test]
    fn test_scope_order_is_preserved() {
        let config = fixture_config(|_| {});
        let issuer = fixture_issuer(&config, &MockNow::default());
        let ctx = fixture_context(|ctx| {
            ctx.scopes = vec!["write".to_string(), "read".to_string(), "write".to_string()];
        });

        let got = issuer.claims(&ctx);

        assert_eq!(got.scope.as_deref(), Some("write read write"));
    }

    #[rstest]
    #[case::zero(0)]
    #[case::negative(-60)]
    fn test_non_positive_lifetime_is_not_checked(#[case] lifetime: i64) {
        // given
        let config = fixture_config(|c| c.lifetime = lifetime);
        let issuer = fixture_issuer(&config, &MockNow::default());

        // when
        let got = issuer.issue(&fixture_context(|_| {}));

        // then
        assert!(got.is_ok());
        assert!(issuer.claims(&fixture_context(|_| {})).exp <= DEFAULT_TIME);
    }

    #[test]
    fn test_issue_produces_compact_token() {
        // given
        let config = fixture_config(|_| {});
        let issuer = fixture_issuer(&config, &MockNow::default());

        // when
        let token = issuer.issue(&fixture_context(|_| {})).unwrap();

        // then
        assert_eq!(token.split('.').count(), 3);
        let header = decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::RS256);
    }

    #[rstest]
    #[case::rs512(Algorithm::RS512)]
    #[case::ps256(Algorithm::PS256)]
    fn test_issue_signs_with_configured_algorithm(#[case] algorithm: Algorithm) {
        // given
        let config = fixture_config(|c| {
            c.signing_algorithm = algorithm;
            c.allowed_algorithms = vec![Algorithm::RS256, algorithm];
        });
        let now = MockNow::default();
        let issuer = fixture_issuer(&config, &now);

        // when
        let token = issuer.issue(&fixture_context(|_| {})).unwrap();

        // then
        assert_eq!(decode_header(&token).unwrap().alg, algorithm);
        assert!(fixture_verifier(&config, &now).verify(&token).is_ok());
    }

    #[test]
    fn test_issue_with_algorithm_of_other_key_type() {
        // given
        let config = fixture_config(|c| c.signing_algorithm = Algorithm::ES256);
        let issuer = fixture_issuer(&config, &MockNow::default());

        // when
        let got = issuer.issue(&fixture_context(|_| {}));

        // then
        assert!(matches!(
            got,
            Err(IssueTokenErr::Configuration(ConfigErr::InvalidSetting { .. }))
        ));
    }

    #[test]
    fn test_issue_without_signing_key() {
        // given
        let config = fixture_config(|c| c.issuer = "partner.example".to_string());
        let issuer = fixture_issuer(&config, &MockNow::default());

        // when
        let got = issuer.issue(&fixture_context(|_| {}));

        // then
        assert!(matches!(got, Err(IssueTokenErr::Configuration(_))));
    }
}
