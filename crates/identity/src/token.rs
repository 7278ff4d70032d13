//! OAuth2 client-credentials grant against the tenant's token endpoint.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::ManagementConfig;
use crate::credentials::{AccessToken, TokenFetcher};
use crate::error::CredentialError;
use crate::secret::SecretString;

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    audience: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
}

/// Machine-to-machine token source for the Management API.
#[derive(Debug, Clone)]
pub struct ClientCredentialsFetcher {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: SecretString,
    audience: String,
}

impl ClientCredentialsFetcher {
    pub fn new(http: reqwest::Client, config: &ManagementConfig) -> Self {
        Self {
            http,
            token_url: config.token_url(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            audience: config.audience.clone(),
        }
    }
}

#[async_trait]
impl TokenFetcher for ClientCredentialsFetcher {
    async fn fetch(&self) -> Result<AccessToken, CredentialError> {
        let body = TokenRequest {
            grant_type: "client_credentials",
            client_id: &self.client_id,
            client_secret: self.client_secret.expose(),
            audience: &self.audience,
        };

        let response = self.http.post(&self.token_url).json(&body).send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<TokenErrorResponse>(&text)
                .ok()
                .and_then(|e| e.error_description.or(e.error))
                .unwrap_or(text);
            return Err(CredentialError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let token: TokenResponse = response.json().await?;
        let expires_at = token
            .expires_in
            .map(|secs| Utc::now() + chrono::Duration::seconds(secs));

        Ok(AccessToken::new(token.access_token, expires_at))
    }
}
