#![allow(dead_code)]

use std::sync::Arc;

use common::mock::{MockNow, MockUuidGenerator};
use token::{
    Account, Authenticator, InMemoryAccountStore, IssueContext, KeyResolver, TokenConfig,
    TokenIssuer, TokenUser, TokenVerifier,
};

pub const PRIMARY_PRIVATE_KEY: &str = include_str!("../../testdata/primary.pem");
pub const PRIMARY_PUBLIC_KEY: &str = include_str!("../../testdata/primary.pub.pem");
pub const PARTNER_PRIVATE_KEY: &str = include_str!("../../testdata/partner.pem");
pub const PARTNER_PUBLIC_KEY: &str = include_str!("../../testdata/partner.pub.pem");

pub fn fixture_env(name: &str) -> Option<String> {
    match name {
        "JWT_ISSUER" => Some("auth-server".to_string()),
        "JWT_TRUSTED_ISSUERS" => Some("partner.example".to_string()),
        "JWT_PRIVATE_KEY_AUTH_SERVER" => Some(PRIMARY_PRIVATE_KEY.to_string()),
        "JWT_PUBLIC_KEY_AUTH_SERVER" => Some(PRIMARY_PUBLIC_KEY.to_string()),
        "JWT_PUBLIC_KEY_PARTNER_EXAMPLE" => Some(PARTNER_PUBLIC_KEY.to_string()),
        _ => None,
    }
}

pub fn fixture_config<F>(mut func: F) -> TokenConfig
where
    F: FnMut(&mut TokenConfig),
{
    let mut config = TokenConfig::from_lookup(fixture_env).unwrap();
    func(&mut config);
    config
}

pub fn fixture_account<F>(mut func: F) -> Account
where
    F: FnMut(&mut Account),
{
    let mut account = Account {
        id: "42".to_string(),
        username: "alice".to_string(),
        email: Some("alice@example.com".to_string()),
        is_active: true,
    };
    func(&mut account);
    account
}

pub fn fixture_context<F>(mut func: F) -> IssueContext
where
    F: FnMut(&mut IssueContext),
{
    let mut ctx = IssueContext {
        client_id: Some("client-1".to_string()),
        scopes: vec!["read".to_string(), "write".to_string()],
        user: Some(TokenUser::from(&fixture_account(|_| {}))),
    };
    func(&mut ctx);
    ctx
}

/// Issuer, verifier and authenticator sharing one key resolver and clock.
pub struct Engine {
    pub config: TokenConfig,
    pub now: MockNow,
    pub issuer: TokenIssuer<MockNow, MockUuidGenerator>,
    pub authenticator: Arc<Authenticator<InMemoryAccountStore, MockNow>>,
}

impl Engine {
    pub fn new(config: TokenConfig, accounts: InMemoryAccountStore) -> Self {
        let now = MockNow::default();
        let keys = Arc::new(config.key_resolver().unwrap());
        let issuer = TokenIssuer::new(&config, keys.clone())
            .with_now(now.clone())
            .with_uuid(MockUuidGenerator::new());
        let authenticator = Arc::new(Authenticator::new(
            &config,
            Self::verifier_with(&config, keys, &now),
            accounts,
        ));

        Self {
            config,
            now,
            issuer,
            authenticator,
        }
    }

    /// Engine with the default configuration and alice as the only account.
    pub fn default_with<F>(func: F) -> Self
    where
        F: FnMut(&mut TokenConfig),
    {
        let accounts = [fixture_account(|_| {})].into_iter().collect();
        Self::new(fixture_config(func), accounts)
    }

    pub fn verifier(&self) -> TokenVerifier<MockNow> {
        let keys = Arc::new(self.config.key_resolver().unwrap());
        Self::verifier_with(&self.config, keys, &self.now)
    }

    pub fn issue(&self, ctx: &IssueContext) -> String {
        self.issuer.issue(ctx).unwrap()
    }

    fn verifier_with(
        config: &TokenConfig,
        keys: Arc<KeyResolver>,
        now: &MockNow,
    ) -> TokenVerifier<MockNow> {
        TokenVerifier::new(config, keys).with_now(now.clone())
    }
}
