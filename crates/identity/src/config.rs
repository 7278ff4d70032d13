//! Environment-driven settings for the Management API.

use std::time::Duration;

use thiserror::Error;

use crate::secret::SecretString;

/// Default interval between token refreshes (6 hours).
pub const DEFAULT_TOKEN_REFRESH_SECS: u64 = 6 * 60 * 60;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required environment variable was not set.
    #[error("missing environment variable: {0}")]
    MissingEnvVar(String),

    /// A value was empty or could not be parsed.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Everything needed to reach the tenant's Management API.
#[derive(Debug, Clone)]
pub struct ManagementConfig {
    /// Tenant domain, e.g. `acme.eu.auth0.com`.
    pub domain: String,
    pub client_id: String,
    pub client_secret: SecretString,
    /// Audience requested in the client-credentials grant.
    pub audience: String,
    /// Identifier of the API whose scopes form the permission catalogue.
    pub api_identifier: String,
    pub token_refresh_interval: Duration,
    pub http_timeout: Duration,
}

impl ManagementConfig {
    /// Load from process environment.
    ///
    /// Required: `AUTH0_DOMAIN`, `AUTH0_MANAGEMENT_CLIENT_ID`,
    /// `AUTH0_MANAGEMENT_CLIENT_SECRET`, `AUTH0_API_IDENTIFIER`.
    /// Optional: `AUTH0_MANAGEMENT_AUDIENCE`, `AUTH0_TOKEN_REFRESH_SECS`,
    /// `AUTH0_HTTP_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (tests pass a map here).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String, ConfigError> {
            let value = lookup(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))?;
            let value = value.trim().to_string();
            if value.is_empty() {
                return Err(ConfigError::Invalid(format!("{key} cannot be empty")));
            }
            Ok(value)
        };
        let seconds = |key: &str, default: u64| -> Result<Duration, ConfigError> {
            match lookup(key) {
                None => Ok(Duration::from_secs(default)),
                Some(raw) => match raw.trim().parse::<u64>() {
                    Ok(0) | Err(_) => Err(ConfigError::Invalid(format!(
                        "{key} must be a positive number of seconds, got {raw:?}"
                    ))),
                    Ok(secs) => Ok(Duration::from_secs(secs)),
                },
            }
        };

        let domain = required("AUTH0_DOMAIN")?
            .trim_start_matches("https://")
            .trim_end_matches('/')
            .to_string();
        let client_id = required("AUTH0_MANAGEMENT_CLIENT_ID")?;
        let client_secret = SecretString::new(required("AUTH0_MANAGEMENT_CLIENT_SECRET")?);
        let api_identifier = required("AUTH0_API_IDENTIFIER")?;
        let audience = lookup("AUTH0_MANAGEMENT_AUDIENCE")
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| format!("https://{domain}/api/v2/"));

        Ok(Self {
            token_refresh_interval: seconds("AUTH0_TOKEN_REFRESH_SECS", DEFAULT_TOKEN_REFRESH_SECS)?,
            http_timeout: seconds("AUTH0_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?,
            domain,
            client_id,
            client_secret,
            audience,
            api_identifier,
        })
    }

    /// `https://{domain}/api/v2/`
    pub fn management_base_url(&self) -> String {
        format!("https://{}/api/v2/", self.domain)
    }

    /// `https://{domain}/oauth/token`
    pub fn token_url(&self) -> String {
        format!("https://{}/oauth/token", self.domain)
    }
}
