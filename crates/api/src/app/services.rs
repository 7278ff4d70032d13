use std::sync::Arc;

use anyhow::Context;

use usermgmt_identity::{
    http_client, Auth0ManagementClient, ClientCredentialsFetcher, InMemoryManagementApi,
    ManagementApi, RefreshHandle, RefreshingCredential,
};
use usermgmt_services::{PermissionService, RoleService, UserService};

use crate::config::{ApiConfig, IdentityBackend};

/// Application services shared by all handlers.
pub struct AppServices {
    pub users: UserService,
    pub roles: RoleService,
    pub permissions: PermissionService,
}

impl AppServices {
    pub fn new(api: Arc<dyn ManagementApi>, api_identifier: &str) -> Self {
        Self {
            users: UserService::new(api.clone()),
            roles: RoleService::new(api.clone(), api_identifier),
            permissions: PermissionService::new(api, api_identifier),
        }
    }
}

/// Wired services plus the background token refresh, if any.
pub struct Backend {
    pub services: Arc<AppServices>,
    pub refresh: Option<RefreshHandle>,
}

/// Build services for the configured backend.
///
/// The Auth0 backend fetches its first token here; startup fails without one.
pub async fn build_services(config: &ApiConfig) -> anyhow::Result<Backend> {
    match &config.backend {
        IdentityBackend::Auth0(management) => {
            let http = http_client(management).context("building HTTP client")?;
            let fetcher = Arc::new(ClientCredentialsFetcher::new(http.clone(), management));
            let credential = RefreshingCredential::initialize(fetcher)
                .await
                .context("fetching initial management API token")?;
            let refresh = credential.spawn_refresh(management.token_refresh_interval);

            let client = Auth0ManagementClient::new(
                http,
                &management.management_base_url(),
                credential,
            )
            .context("building management API client")?;

            tracing::info!(domain = %management.domain, "using Auth0 management API");
            Ok(Backend {
                services: Arc::new(AppServices::new(
                    Arc::new(client),
                    &management.api_identifier,
                )),
                refresh: Some(refresh),
            })
        }
        IdentityBackend::InMemory { api_identifier } => {
            tracing::warn!("using in-memory identity platform; data is not persisted");
            let (_api, services) = in_memory(api_identifier);
            Ok(Backend {
                services,
                refresh: None,
            })
        }
    }
}

/// In-memory platform with an empty resource server for `api_identifier`.
pub fn in_memory(api_identifier: &str) -> (Arc<InMemoryManagementApi>, Arc<AppServices>) {
    let api = Arc::new(InMemoryManagementApi::new());
    api.seed_resource_server(api_identifier, "usermgmt", &[]);
    let services = Arc::new(AppServices::new(api.clone(), api_identifier));
    (api, services)
}
