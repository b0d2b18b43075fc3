//! Key resolver
//!
//! Maps an issuer identifier and a purpose (signing or verification) to
//! parsed key material. Keys are parsed once at construction and only
//! read afterwards, so a resolver can be shared across tasks behind an
//! `Arc` without locking.
use std::collections::HashMap;
use std::fmt;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};

use crate::error::ConfigErr;

/// The role a key plays for an issuer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPurpose {
    Sign,
    Verify,
}

impl KeyPurpose {
    /// Returns the setting that holds the key for `issuer`,
    /// e.g. `JWT_PRIVATE_KEY_AUTH_SERVER` for signing with `auth-server`.
    #[must_use]
    pub fn setting_name(self, issuer: &str) -> String {
        let prefix = match self {
            KeyPurpose::Sign => "JWT_PRIVATE_KEY",
            KeyPurpose::Verify => "JWT_PUBLIC_KEY",
        };
        format!("{prefix}_{}", normalize_issuer(issuer))
    }
}

impl fmt::Display for KeyPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPurpose::Sign => f.write_str("signing"),
            KeyPurpose::Verify => f.write_str("verification"),
        }
    }
}

/// Normalizes an issuer identifier for key lookup.
///
/// Upper-cases ASCII letters and replaces every non-alphanumeric
/// character with `_`, so `auth-server`, `Auth.Server` and `AUTH_SERVER`
/// share one key entry.
#[must_use]
pub fn normalize_issuer(issuer: &str) -> String {
    issuer
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Unparsed key material for one issuer, as read from configuration.
#[derive(Clone)]
pub struct IssuerKeyMaterial {
    /// Declared algorithm, selects how the PEM keys are parsed.
    pub algorithm: Algorithm,

    /// PEM encoded private key. Only the deployment's own issuer has one.
    pub private_key_pem: Option<Vec<u8>>,

    /// PEM encoded public key.
    pub public_key_pem: Vec<u8>,
}

impl fmt::Debug for IssuerKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuerKeyMaterial")
            .field("algorithm", &self.algorithm)
            .field("private_key_pem", &self.private_key_pem.as_ref().map(|_| "<redacted>"))
            .field("public_key_pem", &"<redacted>")
            .finish()
    }
}

/// Key and algorithm to sign a token with.
pub struct SigningKey<'a> {
    pub algorithm: Algorithm,
    pub key: &'a EncodingKey,
}

/// Key and the algorithms a token header may declare for it.
pub struct VerificationKey<'a> {
    pub key: &'a DecodingKey,
    pub algorithms: &'a [Algorithm],
}

impl VerificationKey<'_> {
    /// Returns true if a token signed with `algorithm` may be verified.
    #[must_use]
    pub fn accepts(&self, algorithm: Algorithm) -> bool {
        self.algorithms.contains(&algorithm)
    }
}

struct IssuerKeys {
    family: KeyFamily,
    encoding: Option<EncodingKey>,
    decoding: DecodingKey,
    /// Allow-list restricted to algorithms of this key's family.
    algorithms: Vec<Algorithm>,
}

/// Resolves parsed keys by normalized issuer.
pub struct KeyResolver {
    issuers: HashMap<String, IssuerKeys>,
    allowed_algorithms: Vec<Algorithm>,
}

impl fmt::Debug for KeyResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut issuers: Vec<_> = self.issuers.keys().collect();
        issuers.sort();
        f.debug_struct("KeyResolver")
            .field("issuers", &issuers)
            .field("allowed_algorithms", &self.allowed_algorithms)
            .finish_non_exhaustive()
    }
}

impl KeyResolver {
    /// Parses the key material of every issuer.
    ///
    /// # Errors
    /// - the allow-list is empty or names a symmetric algorithm
    /// - an issuer declares a symmetric algorithm
    /// - a PEM cannot be parsed for the issuer's algorithm
    pub fn new(
        keys: HashMap<String, IssuerKeyMaterial>,
        allowed_algorithms: Vec<Algorithm>,
    ) -> Result<Self, ConfigErr> {
        if allowed_algorithms.is_empty() {
            return Err(ConfigErr::InvalidSetting {
                name: "JWT_JWS_ALGORITHMS".to_string(),
                reason: "at least one algorithm is required".to_string(),
            });
        }
        for algorithm in &allowed_algorithms {
            KeyFamily::of(*algorithm)?;
        }

        let mut issuers = HashMap::with_capacity(keys.len());
        for (issuer, material) in keys {
            let family = KeyFamily::of(material.algorithm)?;

            let encoding = match &material.private_key_pem {
                Some(pem) => Some(
                    family
                        .encoding_key(pem)
                        .map_err(|source| ConfigErr::InvalidKey {
                            name: KeyPurpose::Sign.setting_name(&issuer),
                            source,
                        })?,
                ),
                None => None,
            };
            let decoding = family
                .decoding_key(&material.public_key_pem)
                .map_err(|source| ConfigErr::InvalidKey {
                    name: KeyPurpose::Verify.setting_name(&issuer),
                    source,
                })?;
            let algorithms = allowed_algorithms
                .iter()
                .copied()
                .filter(|alg| KeyFamily::of(*alg).is_ok_and(|f| f == family))
                .collect();

            issuers.insert(
                normalize_issuer(&issuer),
                IssuerKeys {
                    family,
                    encoding,
                    decoding,
                    algorithms,
                },
            );
        }

        Ok(Self {
            issuers,
            allowed_algorithms,
        })
    }

    /// Returns the signing key of `issuer` for use with `algorithm`.
    ///
    /// # Errors
    /// - no private key is configured for the issuer
    /// - `algorithm` is symmetric or does not fit the key type
    pub fn signing_key(
        &self,
        issuer: &str,
        algorithm: Algorithm,
    ) -> Result<SigningKey<'_>, ConfigErr> {
        let missing = || ConfigErr::MissingKey {
            purpose: KeyPurpose::Sign,
            name: KeyPurpose::Sign.setting_name(issuer),
        };
        let keys = self.issuers.get(&normalize_issuer(issuer)).ok_or_else(missing)?;
        let key = keys.encoding.as_ref().ok_or_else(missing)?;
        if KeyFamily::of(algorithm)? != keys.family {
            return Err(ConfigErr::InvalidSetting {
                name: "JWT_ENC_ALGORITHM".to_string(),
                reason: format!("{algorithm:?} does not fit the signing key"),
            });
        }

        Ok(SigningKey { algorithm, key })
    }

    /// Returns the verification key of `issuer` and the algorithms it
    /// may be used with.
    ///
    /// # Errors
    /// - no public key is configured for the issuer
    pub fn verification_key(&self, issuer: &str) -> Result<VerificationKey<'_>, ConfigErr> {
        let keys = self
            .issuers
            .get(&normalize_issuer(issuer))
            .ok_or_else(|| ConfigErr::MissingKey {
                purpose: KeyPurpose::Verify,
                name: KeyPurpose::Verify.setting_name(issuer),
            })?;

        Ok(VerificationKey {
            key: &keys.decoding,
            algorithms: &keys.algorithms,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyFamily {
    Rsa,
    Ec,
    Ed,
}

impl KeyFamily {
    fn of(algorithm: Algorithm) -> Result<Self, ConfigErr> {
        match algorithm {
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => Ok(KeyFamily::Rsa),
            Algorithm::ES256 | Algorithm::ES384 => Ok(KeyFamily::Ec),
            Algorithm::EdDSA => Ok(KeyFamily::Ed),
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                Err(ConfigErr::UnsupportedAlgorithm(algorithm))
            }
        }
    }

    fn encoding_key(self, pem: &[u8]) -> jsonwebtoken::errors::Result<EncodingKey> {
        match self {
            KeyFamily::Rsa => EncodingKey::from_rsa_pem(pem),
            KeyFamily::Ec => EncodingKey::from_ec_pem(pem),
            KeyFamily::Ed => EncodingKey::from_ed_pem(pem),
        }
    }

    fn decoding_key(self, pem: &[u8]) -> jsonwebtoken::errors::Result<DecodingKey> {
        match self {
            KeyFamily::Rsa => DecodingKey::from_rsa_pem(pem),
            KeyFamily::Ec => DecodingKey::from_ec_pem(pem),
            KeyFamily::Ed => DecodingKey::from_ed_pem(pem),
        }
    }
}
