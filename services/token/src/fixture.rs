#![cfg(test)]

use std::sync::Arc;

use common::mock::{MockNow, MockUuidGenerator};

use crate::account::Account;
use crate::config::TokenConfig;
use crate::issuer::{IssueContext, TokenIssuer, TokenUser};
use crate::keys::KeyResolver;
use crate::verifier::TokenVerifier;

pub(crate) const PRIMARY_PRIVATE_KEY: &str = include_str!("../testdata/primary.pem");
pub(crate) const PRIMARY_PUBLIC_KEY: &str = include_str!("../testdata/primary.pub.pem");
pub(crate) const PARTNER_PRIVATE_KEY: &str = include_str!("../testdata/partner.pem");
pub(crate) const PARTNER_PUBLIC_KEY: &str = include_str!("../testdata/partner.pub.pem");

pub(crate) fn fixture_env(name: &str) -> Option<String> {
    match name {
        "JWT_ISSUER" => Some("auth-server".to_string()),
        "JWT_TRUSTED_ISSUERS" => Some("partner.example".to_string()),
        "JWT_PRIVATE_KEY_AUTH_SERVER" => Some(PRIMARY_PRIVATE_KEY.to_string()),
        "JWT_PUBLIC_KEY_AUTH_SERVER" => Some(PRIMARY_PUBLIC_KEY.to_string()),
        "JWT_PUBLIC_KEY_PARTNER_EXAMPLE" => Some(PARTNER_PUBLIC_KEY.to_string()),
        _ => None,
    }
}

pub(crate) fn fixture_config<F>(mut func: F) -> TokenConfig
where
    F: FnMut(&mut TokenConfig),
{
    let mut config = TokenConfig::from_lookup(fixture_env).unwrap();
    func(&mut config);
    config
}

pub(crate) fn fixture_resolver(config: &TokenConfig) -> Arc<KeyResolver> {
    Arc::new(config.key_resolver().unwrap())
}

pub(crate) fn fixture_issuer(
    config: &TokenConfig,
    now: &MockNow,
) -> TokenIssuer<MockNow, MockUuidGenerator> {
    TokenIssuer::new(config, fixture_resolver(config))
        .with_now(now.clone())
        .with_uuid(MockUuidGenerator::new())
}

pub(crate) fn fixture_verifier(config: &TokenConfig, now: &MockNow) -> TokenVerifier<MockNow> {
    TokenVerifier::new(config, fixture_resolver(config)).with_now(now.clone())
}

pub(crate) fn fixture_account<F>(mut func: F) -> Account
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

pub(crate) fn fixture_context<F>(mut func: F) -> IssueContext
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
