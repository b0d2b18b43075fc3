use std::{env, error::Error};

const DEFAULT_POOL_SIZE: usize = 16;

/// Connection settings for the database holding the account records.
#[derive(Debug, Clone, PartialEq)]
pub struct PGConfig {
    pub(super) dbname: String,
    pub(super) user: String,
    pub(super) password: String,
    pub(super) host: String,
    pub(super) port: u16,
    pub(super) pool_size: usize,
}

impl PGConfig {
    /// Load PostgreSQL configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing
    /// or if `PG_PORT` cannot be parsed.
    pub fn from_env(default_dbname: &str) -> Result<Self, Box<dyn Error>> {
        Self::from_lookup(default_dbname, |key| env::var(key).ok())
    }

    /// Load PostgreSQL configuration from an arbitrary key lookup.
    ///
    /// `PG_DBNAME` is optional and falls back to `default_dbname`,
    /// `PG_POOL_SIZE` falls back to 16 connections.
    ///
    /// # Errors
    ///
    /// Returns an error if a required key is missing or `PG_PORT` is not a port number.
    pub fn from_lookup<F>(default_dbname: &str, lookup: F) -> Result<Self, Box<dyn Error>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).ok_or_else(|| format!("{key} must be set"));

        Ok(Self {
            dbname: lookup("PG_DBNAME").unwrap_or_else(|| default_dbname.to_string()),
            user: required("PG_USER")?,
            password: required("PG_PASSWORD")?,
            host: patched_host(required("PG_HOST")?, lookup("APP_ENV")),
            port: required("PG_PORT")?.parse::<u16>()?,
            pool_size: match lookup("PG_POOL_SIZE") {
                Some(size) => size.parse::<usize>()?,
                None => DEFAULT_POOL_SIZE,
            },
        })
    }
}

fn patched_host(host: String, app_env: Option<String>) -> String {
    match app_env.unwrap_or_default().as_str() {
        "local" => "localhost".to_string(),
        "integration-test" => format!("{host}-integration-test"),
        _ => host,
    }
}
