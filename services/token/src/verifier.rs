//! Token verifier
//!
//! Verification runs in fixed stages and stops at the first failure:
//!
//! 1. decode header and payload without checking the signature
//! 2. read `iss`, falling back to the deployment issuer
//! 3. resolve the verification key of that issuer
//! 4. check the header algorithm against the allow-list and verify the signature
//! 5. reject expired tokens
//! 6. reject tokens without a plausible `iat`
//!
//! The unverified `iss` only selects the key. Claims are returned after
//! stage 6 and are therefore never expired at the time of verification.
//!
//! A token naming an unknown issuer is a configuration fault, but `iss` is
//! caller controlled, so such faults are logged at `error` at most once per
//! [`CONFIG_ERROR_LOG_WINDOW_SECONDS`] and at `debug` otherwise.
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use common::{Now, SystemNow};
use jsonwebtoken::{DecodingKey, Validation, decode, decode_header};
use serde::Deserialize;
use tracing::instrument;

use crate::claims::Claims;
use crate::config::TokenConfig;
use crate::error::VerifyTokenErr;
use crate::keys::KeyResolver;

/// Minimum spacing of `error` events for configuration faults.
pub const CONFIG_ERROR_LOG_WINDOW_SECONDS: i64 = 60;

pub struct TokenVerifier<N = SystemNow> {
    default_issuer: String,
    leeway: i64,
    keys: Arc<KeyResolver>,
    now: N,
    config_errors: LogThrottle,
}

impl TokenVerifier {
    /// Creates a verifier for tokens of the configured issuers.
    #[must_use]
    pub fn new(config: &TokenConfig, keys: Arc<KeyResolver>) -> Self {
        Self {
            default_issuer: config.issuer.clone(),
            leeway: config.leeway,
            keys,
            now: SystemNow,
            config_errors: LogThrottle::new(CONFIG_ERROR_LOG_WINDOW_SECONDS),
        }
    }
}

impl<N> TokenVerifier<N> {
    /// Replaces the clock.
    #[must_use]
    pub fn with_now<N2: Now>(self, now: N2) -> TokenVerifier<N2> {
        TokenVerifier {
            default_issuer: self.default_issuer,
            leeway: self.leeway,
            keys: self.keys,
            now,
            config_errors: self.config_errors,
        }
    }
}

/// Payload fields read before the signature is checked.
#[derive(Deserialize)]
struct UnverifiedClaims {
    iss: Option<String>,
    // Only its presence is checked here: a token without `exp` is malformed.
    #[allow(dead_code)]
    exp: i64,
}

#[derive(Deserialize)]
struct TimeBounds {
    exp: i64,
    iat: Option<i64>,
}

impl<N: Now> TokenVerifier<N> {
    /// Verifies a token and returns its claims.
    ///
    /// # Errors
    /// - [`VerifyTokenErr::Malformed`] if the token cannot be decoded
    /// - [`VerifyTokenErr::Configuration`] if no key is configured for its issuer
    /// - [`VerifyTokenErr::BadSignature`] if the algorithm is not allowed, the
    ///   signature does not verify or `iat` is missing or in the future
    /// - [`VerifyTokenErr::Expired`] if `exp` has passed
    #[instrument(skip_all, fields(iss), err(level = "debug"))]
    pub fn verify(&self, token: &str) -> Result<Claims, VerifyTokenErr> {
        let result = self.verify_stages(token);
        match &result {
            Err(VerifyTokenErr::BadSignature) => {
                tracing::warn!("rejected token with invalid signature or payload");
            }
            Err(VerifyTokenErr::Configuration(err)) => {
                if self.config_errors.permit(self.now.unix_seconds()) {
                    tracing::error!(error = %err, "no usable verification key");
                } else {
                    tracing::debug!(error = %err, "no usable verification key");
                }
            }
            _ => {}
        }
        result
    }

    fn verify_stages(&self, token: &str) -> Result<Claims, VerifyTokenErr> {
        // 1. structure
        let header = decode_header(token).map_err(|e| VerifyTokenErr::Malformed(e.to_string()))?;
        let unverified = decode_unverified(token)?;

        // 2. issuer
        let issuer = unverified
            .iss
            .filter(|iss| !iss.is_empty())
            .unwrap_or_else(|| self.default_issuer.clone());
        tracing::Span::current().record("iss", issuer.as_str());

        // 3. key
        let key = self.keys.verification_key(&issuer)?;

        // 4. signature
        if !key.accepts(header.alg) {
            return Err(VerifyTokenErr::BadSignature);
        }
        let mut validation = Validation::new(header.alg);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        let payload = decode::<serde_json::Value>(token, key.key, &validation)
            .map_err(|_| VerifyTokenErr::BadSignature)?
            .claims;

        // 5. expiry
        let now = self.now.unix_seconds();
        let bounds =
            TimeBounds::deserialize(&payload).map_err(|_| VerifyTokenErr::BadSignature)?;
        if now >= bounds.exp.saturating_add(self.leeway) {
            return Err(VerifyTokenErr::Expired);
        }

        // 6. issued at
        match bounds.iat {
            Some(iat) if iat <= now.saturating_add(self.leeway) => {}
            _ => return Err(VerifyTokenErr::BadSignature),
        }

        serde_json::from_value(payload).map_err(|_| VerifyTokenErr::BadSignature)
    }
}

/// Lets one event through per window.
struct LogThrottle {
    window: i64,
    next: AtomicI64,
}

impl LogThrottle {
    fn new(window: i64) -> Self {
        Self {
            window,
            next: AtomicI64::new(i64::MIN),
        }
    }

    fn permit(&self, now: i64) -> bool {
        let next = self.next.load(Ordering::Relaxed);
        now >= next
            && self
                .next
                .compare_exchange(
                    next,
                    now.saturating_add(self.window),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                )
                .is_ok()
    }
}

fn decode_unverified(token: &str) -> Result<UnverifiedClaims, VerifyTokenErr> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<UnverifiedClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| VerifyTokenErr::Malformed(e.to_string()))
}
