//! Auth0 Management API v2 over HTTP.
//!
//! One request per trait call, no retries. Every request carries the current
//! token from the injected [`CredentialProvider`].

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use usermgmt_core::{RoleId, UserId};

use crate::api::ManagementApi;
use crate::config::{ConfigError, ManagementConfig};
use crate::credentials::CredentialProvider;
use crate::error::{ManagementError, ManagementResult};
use crate::model::{
    NewRole, NewUser, PageQuery, PasswordChangeTicket, PasswordChangeTicketRequest, Permission,
    PermissionRef, PermissionsBody, ResourceServer, Role, RoleUpdate, RolesBody, RolesPage, Scope,
    ScopesBody, User, UsersPage,
};

/// Page size for collections the service reads whole (a user's roles, a role's permissions).
const COLLECTION_PAGE_SIZE: usize = 100;

const USER_AGENT: &str = concat!("usermgmt/", env!("CARGO_PKG_VERSION"));

/// Vendor error body, e.g. `{"statusCode":404,"error":"Not Found","message":"..."}`.
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Clone)]
pub struct Auth0ManagementClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Arc<dyn CredentialProvider>,
}

impl core::fmt::Debug for Auth0ManagementClient {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Auth0ManagementClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl Auth0ManagementClient {
    /// Client against `base_url` (e.g. `https://acme.auth0.com/api/v2/`).
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, ConfigError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ConfigError::Invalid(format!("management base URL {base_url:?}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::Invalid(format!(
                "management base URL {base_url} cannot carry a path"
            )));
        }

        Ok(Self {
            http,
            base_url,
            credentials,
        })
    }

    /// Client for the configured tenant with the configured timeout.
    pub fn from_config(
        config: &ManagementConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, ConfigError> {
        let http = http_client(config)?;
        Self::new(http, &config.management_base_url(), credentials)
    }

    /// `base_url` + escaped `segments`.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<RequestBody<'_>>,
    ) -> ManagementResult<Response> {
        let token = self.credentials.access_token()?;
        debug!(%method, path = url.path(), "management API request");

        let mut request: RequestBuilder = self
            .http
            .request(method, url)
            .bearer_auth(token.secret().expose());
        request = match body {
            Some(body) => body.attach(request),
            None => request,
        };

        check_status(request.send().await?).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> ManagementResult<T> {
        decode(self.send(Method::GET, url, None).await?).await
    }

    /// Every item of a paged collection; stops at the first short page.
    async fn get_all<T: DeserializeOwned>(&self, segments: &[&str]) -> ManagementResult<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 0u32;
        loop {
            let mut url = self.url(segments);
            url.query_pairs_mut()
                .append_pair("page", &page.to_string())
                .append_pair("per_page", &COLLECTION_PAGE_SIZE.to_string());

            let batch: Vec<T> = self.get_json(url).await?;
            let last = batch.len() < COLLECTION_PAGE_SIZE;
            items.extend(batch);
            if last {
                return Ok(items);
            }
            page += 1;
        }
    }
}

/// HTTP client with the configured timeout.
pub fn http_client(config: &ManagementConfig) -> Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(config.http_timeout)
        .build()
        .map_err(|e| ConfigError::Invalid(format!("HTTP client: {e}")))
}

/// Typed JSON bodies accepted by [`Auth0ManagementClient::send`].
enum RequestBody<'a> {
    User(&'a NewUser),
    Ticket(&'a PasswordChangeTicketRequest),
    Roles(RolesBody<'a>),
    NewRole(&'a NewRole),
    RoleUpdate(&'a RoleUpdate),
    Permissions(PermissionsBody<'a>),
    Scopes(ScopesBody<'a>),
}

impl RequestBody<'_> {
    fn attach(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            RequestBody::User(b) => request.json(b),
            RequestBody::Ticket(b) => request.json(b),
            RequestBody::Roles(b) => request.json(b),
            RequestBody::NewRole(b) => request.json(b),
            RequestBody::RoleUpdate(b) => request.json(b),
            RequestBody::Permissions(b) => request.json(b),
            RequestBody::Scopes(b) => request.json(b),
        }
    }
}

fn permissions_body(permissions: &[Permission]) -> PermissionsBody<'_> {
    PermissionsBody {
        permissions: permissions
            .iter()
            .map(|p| PermissionRef {
                resource_server_identifier: &p.resource_server_identifier,
                permission_name: &p.permission_name,
            })
            .collect(),
    }
}

async fn check_status(response: Response) -> ManagementResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(ManagementError::NotFound);
    }

    let text = response.text().await.unwrap_or_default();
    Err(ManagementError::api(status.as_u16(), error_message(&text, status)))
}

fn error_message(body: &str, status: StatusCode) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message.or(b.error))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body.trim().to_string()
            }
        })
}

async fn decode<T: DeserializeOwned>(response: Response) -> ManagementResult<T> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| ManagementError::Decode(e.to_string()))
}

fn with_page(mut url: Url, query: PageQuery) -> Url {
    url.query_pairs_mut()
        .append_pair("page", &query.page.to_string())
        .append_pair("per_page", &query.per_page.to_string())
        .append_pair("include_totals", "true");
    url
}

#[async_trait]
impl ManagementApi for Auth0ManagementClient {
    async fn create_user(&self, user: &NewUser) -> ManagementResult<User> {
        let url = self.url(&["users"]);
        let response = self
            .send(Method::POST, url, Some(RequestBody::User(user)))
            .await?;
        decode(response).await
    }

    async fn get_user(&self, id: &UserId) -> ManagementResult<User> {
        self.get_json(self.url(&["users", id.as_str()])).await
    }

    async fn list_users(&self, query: PageQuery) -> ManagementResult<UsersPage> {
        self.get_json(with_page(self.url(&["users"]), query)).await
    }

    async fn delete_user(&self, id: &UserId) -> ManagementResult<()> {
        self.send(Method::DELETE, self.url(&["users", id.as_str()]), None)
            .await
            .map(drop)
    }

    async fn list_user_roles(&self, id: &UserId) -> ManagementResult<Vec<Role>> {
        self.get_all(&["users", id.as_str(), "roles"]).await
    }

    async fn add_user_roles(&self, id: &UserId, roles: &[RoleId]) -> ManagementResult<()> {
        let url = self.url(&["users", id.as_str(), "roles"]);
        self.send(Method::POST, url, Some(RequestBody::Roles(RolesBody { roles })))
            .await
            .map(drop)
    }

    async fn remove_user_roles(&self, id: &UserId, roles: &[RoleId]) -> ManagementResult<()> {
        let url = self.url(&["users", id.as_str(), "roles"]);
        self.send(Method::DELETE, url, Some(RequestBody::Roles(RolesBody { roles })))
            .await
            .map(drop)
    }

    async fn create_password_change_ticket(
        &self,
        request: &PasswordChangeTicketRequest,
    ) -> ManagementResult<String> {
        let url = self.url(&["tickets", "password-change"]);
        let response = self
            .send(Method::POST, url, Some(RequestBody::Ticket(request)))
            .await?;
        let ticket: PasswordChangeTicket = decode(response).await?;
        Ok(ticket.ticket)
    }

    async fn create_role(&self, role: &NewRole) -> ManagementResult<Role> {
        let response = self
            .send(Method::POST, self.url(&["roles"]), Some(RequestBody::NewRole(role)))
            .await?;
        decode(response).await
    }

    async fn get_role(&self, id: &RoleId) -> ManagementResult<Role> {
        self.get_json(self.url(&["roles", id.as_str()])).await
    }

    async fn list_roles(&self, query: PageQuery) -> ManagementResult<RolesPage> {
        self.get_json(with_page(self.url(&["roles"]), query)).await
    }

    async fn update_role(&self, id: &RoleId, update: &RoleUpdate) -> ManagementResult<Role> {
        let url = self.url(&["roles", id.as_str()]);
        let response = self
            .send(Method::PATCH, url, Some(RequestBody::RoleUpdate(update)))
            .await?;
        decode(response).await
    }

    async fn delete_role(&self, id: &RoleId) -> ManagementResult<()> {
        self.send(Method::DELETE, self.url(&["roles", id.as_str()]), None)
            .await
            .map(drop)
    }

    async fn list_role_permissions(&self, id: &RoleId) -> ManagementResult<Vec<Permission>> {
        self.get_all(&["roles", id.as_str(), "permissions"]).await
    }

    async fn add_role_permissions(
        &self,
        id: &RoleId,
        permissions: &[Permission],
    ) -> ManagementResult<()> {
        let url = self.url(&["roles", id.as_str(), "permissions"]);
        let body = RequestBody::Permissions(permissions_body(permissions));
        self.send(Method::POST, url, Some(body)).await.map(drop)
    }

    async fn remove_role_permissions(
        &self,
        id: &RoleId,
        permissions: &[Permission],
    ) -> ManagementResult<()> {
        let url = self.url(&["roles", id.as_str(), "permissions"]);
        let body = RequestBody::Permissions(permissions_body(permissions));
        self.send(Method::DELETE, url, Some(body)).await.map(drop)
    }

    async fn get_resource_server(&self, identifier: &str) -> ManagementResult<ResourceServer> {
        self.get_json(self.url(&["resource-servers", identifier])).await
    }

    async fn update_resource_server_scopes(
        &self,
        identifier: &str,
        scopes: &[Scope],
    ) -> ManagementResult<()> {
        let url = self.url(&["resource-servers", identifier]);
        self.send(Method::PATCH, url, Some(RequestBody::Scopes(ScopesBody { scopes })))
            .await
            .map(drop)
    }
}
