//! The scope catalogue of the configured API (resource server).

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{error, info};

use usermgmt_core::{cmp_nulls_first_ci, Page};
use usermgmt_identity::{ManagementApi, Scope};

use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionSummary {
    pub name: String,
    pub description: Option<String>,
}

/// One entry of a replacement catalogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionDefinition {
    pub name: String,
    pub description: Option<String>,
}

pub struct PermissionService {
    api: Arc<dyn ManagementApi>,
    api_identifier: String,
}

impl PermissionService {
    pub fn new(api: Arc<dyn ManagementApi>, api_identifier: impl Into<String>) -> Self {
        Self {
            api,
            api_identifier: api_identifier.into(),
        }
    }

    /// Every scope as a single page, sorted by name.
    ///
    /// A failed fetch is logged and reads as an empty catalogue.
    pub async fn list(&self) -> Page<PermissionSummary> {
        let server = match self.api.get_resource_server(&self.api_identifier).await {
            Ok(server) => server,
            Err(e) => {
                error!(api = %self.api_identifier, error = %e, "failed to load scope catalogue");
                return Page::single(Vec::new());
            }
        };

        let mut content: Vec<PermissionSummary> = server
            .scopes
            .into_iter()
            .map(|s| PermissionSummary {
                name: s.value,
                description: s.description,
            })
            .collect();
        content.sort_by(|a, b| cmp_nulls_first_ci(Some(a.name.as_str()), Some(b.name.as_str())));
        Page::single(content)
    }

    /// Replace the whole catalogue with `definitions`.
    pub async fn replace(&self, definitions: Vec<PermissionDefinition>) -> ServiceResult<()> {
        let mut seen = BTreeSet::new();
        let mut scopes = Vec::with_capacity(definitions.len());
        for def in definitions {
            let name = def.name.trim().to_string();
            if name.is_empty() {
                return Err(ServiceError::validation("permission name cannot be empty"));
            }
            if !seen.insert(name.clone()) {
                return Err(ServiceError::validation(format!(
                    "duplicate permission name: {name}"
                )));
            }
            scopes.push(Scope::new(name, def.description));
        }

        self.api
            .update_resource_server_scopes(&self.api_identifier, &scopes)
            .await?;
        info!(api = %self.api_identifier, scopes = scopes.len(), "scope catalogue replaced");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use usermgmt_identity::{InMemoryManagementApi, Operation};

    const API: &str = "https://api.acme.test";

    fn setup() -> (Arc<InMemoryManagementApi>, PermissionService) {
        let api = Arc::new(InMemoryManagementApi::new());
        api.seed_resource_server(API, "Acme API", &["write:b", "Read:a", "read:b"]);
        let service = PermissionService::new(api.clone(), API);
        (api, service)
    }

    fn def(name: &str) -> PermissionDefinition {
        PermissionDefinition {
            name: name.into(),
            description: None,
        }
    }

    #[tokio::test]
    async fn list_is_one_sorted_page() {
        let (_api, service) = setup();

        let page = service.list().await;

        let names: Vec<_> = page.content.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Read:a", "read:b", "write:b"]);
        assert_eq!(page.current_page, 0);
        assert_eq!(page.page_size, 3);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.total_elements, 3);
    }

    #[tokio::test]
    async fn failed_fetch_reads_as_empty() {
        let (api, service) = setup();
        api.fail_on(Operation::GetResourceServer);

        let page = service.list().await;

        assert!(page.content.is_empty());
        assert_eq!(page.total_elements, 0);
        assert_eq!(page.total_pages, 0);
    }

    #[tokio::test]
    async fn replace_swaps_the_whole_catalogue() {
        let (api, service) = setup();

        service
            .replace(vec![def("deploy:app"), def(" audit:read ")])
            .await
            .unwrap();

        assert_eq!(api.scope_names(API), vec!["deploy:app", "audit:read"]);
    }

    #[tokio::test]
    async fn replace_rejects_blank_and_duplicate_names() {
        let (api, service) = setup();

        assert!(matches!(
            service.replace(vec![def("a"), def(" ")]).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            service.replace(vec![def("a"), def("a")]).await,
            Err(ServiceError::Validation(_))
        ));
        assert_eq!(api.count(Operation::UpdateResourceServerScopes), 0);
    }
}
