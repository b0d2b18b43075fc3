//! Token payload and the scope-membership rules evaluated against it.
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// The payload of one access token.
///
/// Field order is the serialization order. Optional fields are omitted from
/// the token when absent.
///
/// A `Claims` value handed out by [`crate::TokenVerifier::verify`] has
/// already passed the expiry check, so no expiry helper exists here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer identifier, selects the verification key.
    /// Empty when the token carried no `iss` and was verified under the
    /// deployment's default issuer.
    #[serde(default)]
    pub iss: String,

    /// Expiry, unix seconds.
    pub exp: i64,

    /// Issuance, unix seconds.
    pub iat: i64,

    /// Unique token identifier.
    #[serde(default)]
    pub jti: String,

    /// Subject: user id for user-bound tokens, client id for client-credentials tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Audience, equal to `client_id` when set by this issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,

    /// Space separated scope tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Claims {
    /// Returns the granted scopes. Duplicates collapse, absence yields an empty set.
    #[must_use]
    pub fn scopes_of(&self) -> BTreeSet<&str> {
        self.scope
            .as_deref()
            .map(|scope| scope.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Returns true if every required scope is granted.
    ///
    /// An empty requirement is always satisfied. This is strict AND; callers
    /// wanting OR evaluate each alternative separately.
    #[must_use]
    pub fn satisfies<I, S>(&self, required: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let granted = self.scopes_of();
        required
            .into_iter()
            .all(|scope| granted.contains(scope.as_ref()))
    }

    /// Returns true if the token names a human principal.
    ///
    /// Client-credentials tokens carry the client id in `sub` but no
    /// `username`, so they are not user bound.
    #[must_use]
    pub fn is_user_bound(&self) -> bool {
        let present = |field: &Option<String>| field.as_deref().is_some_and(|v| !v.is_empty());
        present(&self.sub) && present(&self.username)
    }
}
