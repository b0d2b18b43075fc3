//! Authentication adapter
//!
//! Turns an authorization header into a verified principal: parse the
//! header, verify the token, then resolve the claims against the account
//! store.
use std::fmt;

use common::{Now, SystemNow};
use tracing::instrument;

use crate::account::{Account, AccountStore};
use crate::claims::Claims;
use crate::config::TokenConfig;
use crate::error::{AuthenticateErr, DBError};
use crate::header::extract_bearer;
use crate::verifier::TokenVerifier;

/// Who a request acts as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// No human identity, e.g. a client-credentials caller.
    Anonymous,
    User(Account),
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::Anonymous => f.write_str("AnonymousUser"),
            Principal::User(account) => f.write_str(&account.username),
        }
    }
}

/// The result of a successful authentication.
///
/// Inserted into the request extensions by the bearer middleware and
/// dropped with the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticated {
    pub principal: Principal,
    pub claims: Claims,
}

pub struct Authenticator<A, N = SystemNow> {
    auth_disabled: bool,
    header_prefix: String,
    realm: String,
    verifier: TokenVerifier<N>,
    accounts: A,
}

impl<A, N> Authenticator<A, N>
where
    A: AccountStore,
    N: Now,
{
    #[must_use]
    pub fn new(config: &TokenConfig, verifier: TokenVerifier<N>, accounts: A) -> Self {
        Self {
            auth_disabled: config.auth_disabled,
            header_prefix: config.header_prefix.clone(),
            realm: config.realm.clone(),
            verifier,
            accounts,
        }
    }

    /// Value of the `WWW-Authenticate` header sent with a 401.
    #[must_use]
    pub fn www_authenticate(&self) -> String {
        format!("{} realm=\"{}\"", self.header_prefix, self.realm)
    }

    /// Authenticates the request carrying `header`.
    ///
    /// Returns `Ok(None)` if the request offers no bearer credentials.
    ///
    /// # Errors
    /// - the header is malformed
    /// - the token fails verification
    /// - the principal cannot be resolved, see [`Self::resolve`]
    #[instrument(skip_all, fields(principal), err(level = "info"))]
    pub async fn authenticate(
        &self,
        header: Option<&str>,
    ) -> Result<Option<Authenticated>, AuthenticateErr> {
        let Some(token) = extract_bearer(header, &self.header_prefix)? else {
            return Ok(None);
        };

        let claims = self.verifier.verify(token)?;
        let principal = self.resolve(&claims).await?;
        tracing::Span::current().record("principal", tracing::field::display(&principal));

        Ok(Some(Authenticated { principal, claims }))
    }

    /// Resolves verified claims to a principal.
    ///
    /// # Errors
    /// - [`AuthenticateErr::UserNotFound`] if no account has the claimed id
    ///   or its username differs from the claimed one
    /// - [`AuthenticateErr::AccountDisabled`] if the account is inactive
    /// - [`AuthenticateErr::Store`] if the account store fails
    pub async fn resolve(&self, claims: &Claims) -> Result<Principal, AuthenticateErr> {
        if self.auth_disabled || !claims.is_user_bound() {
            return Ok(Principal::Anonymous);
        }

        let id = claims.sub.as_deref().unwrap_or_default();
        let account = self.accounts.get_account(id).await.map_err(|e| match e {
            DBError::NotFound => AuthenticateErr::UserNotFound,
            _ => AuthenticateErr::Store(e),
        })?;

        if claims.username.as_deref() != Some(account.username.as_str()) {
            return Err(AuthenticateErr::UserNotFound);
        }
        if !account.is_active {
            return Err(AuthenticateErr::AccountDisabled);
        }

        Ok(Principal::User(account))
    }
}

#[cfg(test)]
mod tests {
    use common::mock::MockNow;
    use deadpool_postgres::PoolError;
    use rstest::rstest;

    use super::*;
    use crate::account::InMemoryAccountStore;
    use crate::account::test::MockAccountStore;
    use crate::error::VerifyTokenErr;
    use crate::fixture::{
        fixture_account, fixture_config, fixture_context, fixture_issuer, fixture_verifier,
    };

    fn fixture_claims<F>(mut func: F) -> Claims
    where
        F: FnMut(&mut Claims),
    {
        let mut claims = Claims {
            iss: "auth-server".to_string(),
            sub: Some("42".to_string()),
            username: Some("alice".to_string()),
            ..Default::default()
        };
        func(&mut claims);
        claims
    }

    #[rstest]
    #[case::user(
        fixture_claims(|_| {}),
        false,
        Some(Ok(fixture_account(|_| {}))),
        Ok(Principal::User(fixture_account(|_| {}))),
        1
    )]
    #[case::client_credentials(
        fixture_claims(|c| {
            c.sub = Some("client-1".to_string());
            c.username = None;
        }),
        false,
        None,
        Ok(Principal::Anonymous),
        0
    )]
    #[case::auth_disabled(fixture_claims(|_| {}), true, None, Ok(Principal::Anonymous), 0)]
    #[case::not_found(
        fixture_claims(|_| {}),
        false,
        Some(Err(DBError::NotFound)),
        Err("user not found"),
        1
    )]
    #[case::username_mismatch(
        fixture_claims(|c| c.username = Some("mallory".to_string())),
        false,
        Some(Ok(fixture_account(|_| {}))),
        Err("user not found"),
        1
    )]
    #[case::disabled(
        fixture_claims(|_| {}),
        false,
        Some(Ok(fixture_account(|a| a.is_active = false))),
        Err("user account is disabled"),
        1
    )]
    #[case::store_error(
        fixture_claims(|_| {}),
        false,
        Some(Err(DBError::Connection(PoolError::Closed))),
        Err("account lookup error: connection error: Pool has been closed"),
        1
    )]
    #[tokio::test]
    async fn test_resolve(
        #[case] claims: Claims,
        #[case] auth_disabled: bool,
        #[case] db_result: Option<Result<Account, DBError>>,
        #[case] want: Result<Principal, &str>,
        #[case] want_lookups: usize,
    ) {
        // given
        let config = fixture_config(|c| c.auth_disabled = auth_disabled);
        let now = MockNow::default();
        let store = match db_result {
            Some(result) => MockAccountStore::returning(result),
            None => MockAccountStore::default(),
        };
        let lookups = store.get_account_count.clone();
        let authenticator = Authenticator::new(&config, fixture_verifier(&config, &now), store);

        // when
        let got = authenticator.resolve(&claims).await;

        // then
        assert_eq!(got.map_err(|e| e.to_string()), want.map_err(str::to_string));
        assert_eq!(*lookups.lock().await, want_lookups);
    }

    #[tokio::test]
    async fn test_authenticate_user_token() {
        // given
        let config = fixture_config(|_| {});
        let now = MockNow::default();
        let token = fixture_issuer(&config, &now)
            .issue(&fixture_context(|_| {}))
            .unwrap();
        let store: InMemoryAccountStore = [fixture_account(|_| {})].into_iter().collect();
        let authenticator = Authenticator::new(&config, fixture_verifier(&config, &now), store);
        let header = format!("Bearer {token}");

        // when
        let got = authenticator.authenticate(Some(&header)).await.unwrap();

        // then
        let got = got.unwrap();
        assert_eq!(got.principal, Principal::User(fixture_account(|_| {})));
        assert_eq!(got.principal.to_string(), "alice");
        assert!(got.claims.satisfies(["read", "write"]));
    }

    #[rstest]
    #[case::no_header(None)]
    #[case::other_scheme(Some("Basic dXNlcjpwYXNz"))]
    #[tokio::test]
    async fn test_authenticate_without_credentials(#[case] header: Option<&str>) {
        let config = fixture_config(|_| {});
        let now = MockNow::default();
        let authenticator = Authenticator::new(
            &config,
            fixture_verifier(&config, &now),
            MockAccountStore::default(),
        );

        let got = authenticator.authenticate(header).await;

        assert!(matches!(got, Ok(None)));
    }

    #[tokio::test]
    async fn test_authenticate_disabled_still_verifies() {
        // given
        let config = fixture_config(|c| c.auth_disabled = true);
        let now = MockNow::default();
        let authenticator = Authenticator::new(
            &config,
            fixture_verifier(&config, &now),
            MockAccountStore::default(),
        );

        // when
        let got = authenticator.authenticate(Some("Bearer not-a-token")).await;

        // then
        assert!(matches!(
            got,
            Err(AuthenticateErr::InvalidToken(VerifyTokenErr::Malformed(_)))
        ));
    }

    #[test]
    fn test_www_authenticate() {
        let config = fixture_config(|c| c.realm = "gateway".to_string());
        let authenticator = Authenticator::new(
            &config,
            fixture_verifier(&config, &MockNow::default()),
            MockAccountStore::default(),
        );

        assert_eq!(authenticator.www_authenticate(), "Bearer realm=\"gateway\"");
    }

    #[test]
    fn test_anonymous_display() {
        assert_eq!(Principal::Anonymous.to_string(), "AnonymousUser");
    }
}
