//! Process settings for the HTTP server.

use std::net::SocketAddr;

use usermgmt_identity::{ConfigError, ManagementConfig};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// API identifier used by the in-memory backend when none is configured.
pub const DEFAULT_IN_MEMORY_API_IDENTIFIER: &str = "https://usermgmt.local/api";

/// Where user, role and permission data lives.
#[derive(Debug, Clone)]
pub enum IdentityBackend {
    /// The tenant's Management API.
    Auth0(ManagementConfig),
    /// In-process platform; nothing survives a restart.
    InMemory { api_identifier: String },
}

impl IdentityBackend {
    pub fn api_identifier(&self) -> &str {
        match self {
            IdentityBackend::Auth0(cfg) => &cfg.api_identifier,
            IdentityBackend::InMemory { api_identifier } => api_identifier,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub backend: IdentityBackend,
}

impl ApiConfig {
    /// `USERMGMT_BIND_ADDR` (default `0.0.0.0:8080`), `IDENTITY_BACKEND`
    /// (`auth0` by default, or `in-memory`), plus the Management API settings
    /// when the Auth0 backend is selected.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_addr = lookup("USERMGMT_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: SocketAddr = raw_addr.trim().parse().map_err(|_| {
            ConfigError::Invalid(format!("USERMGMT_BIND_ADDR is not a socket address: {raw_addr:?}"))
        })?;

        let backend = match lookup("IDENTITY_BACKEND")
            .map(|b| b.trim().to_ascii_lowercase())
            .as_deref()
        {
            None | Some("") | Some("auth0") => {
                IdentityBackend::Auth0(ManagementConfig::from_lookup(&lookup)?)
            }
            Some("in-memory") | Some("memory") => IdentityBackend::InMemory {
                api_identifier: lookup("AUTH0_API_IDENTIFIER")
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_IN_MEMORY_API_IDENTIFIER.to_string()),
            },
            Some(other) => {
                return Err(ConfigError::Invalid(format!(
                    "IDENTITY_BACKEND must be auth0 or in-memory, got {other:?}"
                )));
            }
        };

        Ok(Self { bind_addr, backend })
    }
}
