//! Token engine configuration
//!
//! Read once at startup from the environment and passed explicitly into
//! the resolver, issuer, verifier and authenticator.
use std::collections::HashMap;
use std::str::FromStr;

use jsonwebtoken::Algorithm;

use crate::error::ConfigErr;
use crate::keys::{IssuerKeyMaterial, KeyPurpose, KeyResolver, normalize_issuer};

const DEFAULT_ALGORITHM: Algorithm = Algorithm::RS256;
const DEFAULT_LIFETIME_SECONDS: i64 = 3600;
const DEFAULT_HEADER_PREFIX: &str = "Bearer";
const DEFAULT_REALM: &str = "api";

/// Immutable token engine configuration.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Issuer identity of this deployment.
    pub issuer: String,

    /// Token lifetime in seconds. Zero or negative values produce tokens
    /// that are expired on issue.
    pub lifetime: i64,

    /// Algorithm tokens are signed with.
    pub signing_algorithm: Algorithm,

    /// Algorithms a token header may declare.
    pub allowed_algorithms: Vec<Algorithm>,

    /// Clock skew tolerance in seconds.
    pub leeway: i64,

    /// Skip principal resolution and treat every valid token as anonymous.
    pub auth_disabled: bool,

    /// Scheme keyword of the authorization header.
    pub header_prefix: String,

    /// Realm advertised in `WWW-Authenticate`.
    pub realm: String,

    /// Key material per issuer, own issuer included.
    pub keys: HashMap<String, IssuerKeyMaterial>,
}

impl TokenConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    /// - a required setting is missing
    /// - a setting cannot be parsed
    pub fn from_env() -> Result<Self, ConfigErr> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// # Errors
    /// - a required setting is missing
    /// - a setting cannot be parsed
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigErr>
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings = Settings(lookup);

        let issuer = settings.required("JWT_ISSUER")?;
        let signing_algorithm = settings
            .parsed("JWT_ENC_ALGORITHM", parse_algorithm)?
            .unwrap_or(DEFAULT_ALGORITHM);
        let allowed_algorithms = settings
            .parsed("JWT_JWS_ALGORITHMS", |value| {
                split_list(value).map(parse_algorithm).collect()
            })?
            .unwrap_or_else(|| vec![DEFAULT_ALGORITHM]);
        let lifetime = settings
            .parsed("ACCESS_TOKEN_EXPIRE_SECONDS", parse_int)?
            .unwrap_or(DEFAULT_LIFETIME_SECONDS);
        let leeway = settings
            .parsed("JWT_LEEWAY_SECONDS", |value| {
                let leeway = parse_int(value)?;
                if leeway < 0 {
                    return Err("must not be negative".to_string());
                }
                Ok(leeway)
            })?
            .unwrap_or_default();
        let auth_disabled = settings
            .parsed("JWT_AUTH_DISABLED", parse_bool)?
            .unwrap_or_default();
        let header_prefix = settings
            .optional("JWT_AUTH_HEADER_PREFIX")
            .unwrap_or_else(|| DEFAULT_HEADER_PREFIX.to_string());
        let realm = settings
            .optional("JWT_AUTH_REALM")
            .unwrap_or_else(|| DEFAULT_REALM.to_string());

        let mut keys = HashMap::new();
        keys.insert(
            issuer.clone(),
            IssuerKeyMaterial {
                algorithm: signing_algorithm,
                private_key_pem: Some(settings.key(KeyPurpose::Sign, &issuer)?),
                public_key_pem: settings.key(KeyPurpose::Verify, &issuer)?,
            },
        );

        let own = normalize_issuer(&issuer);
        let trusted = settings.optional("JWT_TRUSTED_ISSUERS").unwrap_or_default();
        for trusted_issuer in split_list(&trusted) {
            let normalized = normalize_issuer(trusted_issuer);
            if normalized == own {
                continue;
            }
            let algorithm = settings
                .parsed(&format!("JWT_ALGORITHM_{normalized}"), parse_algorithm)?
                .unwrap_or(DEFAULT_ALGORITHM);
            keys.insert(
                trusted_issuer.to_string(),
                IssuerKeyMaterial {
                    algorithm,
                    private_key_pem: None,
                    public_key_pem: settings.key(KeyPurpose::Verify, trusted_issuer)?,
                },
            );
        }

        Ok(Self {
            issuer,
            lifetime,
            signing_algorithm,
            allowed_algorithms,
            leeway,
            auth_disabled,
            header_prefix,
            realm,
            keys,
        })
    }

    /// Parses the configured key material.
    ///
    /// # Errors
    /// - see [`KeyResolver::new`]
    pub fn key_resolver(&self) -> Result<KeyResolver, ConfigErr> {
        KeyResolver::new(self.keys.clone(), self.allowed_algorithms.clone())
    }
}

struct Settings<F>(F);

impl<F> Settings<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, name: &str) -> Option<String> {
        (self.0)(name)
    }

    fn required(&self, name: &str) -> Result<String, ConfigErr> {
        self.optional(name)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| ConfigErr::MissingSetting(name.to_string()))
    }

    fn parsed<T, P>(&self, name: &str, parse: P) -> Result<Option<T>, ConfigErr>
    where
        P: FnOnce(&str) -> Result<T, String>,
    {
        let Some(value) = self.optional(name) else {
            return Ok(None);
        };
        parse(value.trim())
            .map(Some)
            .map_err(|reason| ConfigErr::InvalidSetting {
                name: name.to_string(),
                reason,
            })
    }

    /// Reads a PEM key, expanding escaped newlines.
    fn key(&self, purpose: KeyPurpose, issuer: &str) -> Result<Vec<u8>, ConfigErr> {
        let name = purpose.setting_name(issuer);
        let value = self
            .optional(&name)
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigErr::MissingKey { purpose, name })?;

        Ok(value.replace("\\n", "\n").into_bytes())
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
}

fn parse_algorithm(value: &str) -> Result<Algorithm, String> {
    Algorithm::from_str(value).map_err(|_| format!("unknown algorithm {value:?}"))
}

fn parse_int(value: &str) -> Result<i64, String> {
    value
        .parse()
        .map_err(|_| format!("expected an integer, got {value:?}"))
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        _ => Err(format!("expected a boolean, got {value:?}")),
    }
}
