use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{info, warn};

use usermgmt_core::{cmp_nulls_first_ci, Page, PageRequest, RoleId};
use usermgmt_identity::{ManagementApi, NewRole, Role, RoleUpdate};

use crate::error::{lookup_error, ServiceError, ServiceResult};
use crate::reconcile::PermissionReconciler;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSummary {
    pub id: RoleId,
    pub name: Option<String>,
    pub description: Option<String>,
    /// Names of the granted scopes, case-insensitively sorted.
    pub permissions: Vec<String>,
}

/// Partial update; `None` leaves the field (or the permission set) untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub permissions: Option<BTreeSet<String>>,
}

pub struct RoleService {
    api: Arc<dyn ManagementApi>,
    reconciler: PermissionReconciler,
}

impl RoleService {
    pub fn new(api: Arc<dyn ManagementApi>, api_identifier: impl Into<String>) -> Self {
        Self {
            reconciler: PermissionReconciler::new(api.clone(), api_identifier),
            api,
        }
    }

    pub async fn create(
        &self,
        name: &str,
        description: Option<String>,
    ) -> ServiceResult<RoleSummary> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::validation("role name cannot be empty"));
        }

        let role = self
            .api
            .create_role(&NewRole {
                name: name.to_string(),
                description,
            })
            .await?;
        info!(role_id = %role.id, name, "role created");
        Ok(self.summarize(role).await)
    }

    /// Roles of one platform page, sorted by name (missing names first).
    pub async fn list(&self, request: PageRequest) -> ServiceResult<Page<RoleSummary>> {
        let page = self.api.list_roles(request.into()).await?;
        let total = page.total.unwrap_or(page.roles.len() as u64);

        let mut roles = page.roles;
        roles.sort_by(|a, b| cmp_nulls_first_ci(a.name.as_deref(), b.name.as_deref()));

        let mut content = Vec::with_capacity(roles.len());
        for role in roles {
            content.push(self.summarize(role).await);
        }
        Ok(Page::from_window(content, page.start, page.limit, total))
    }

    pub async fn get(&self, id: &RoleId) -> ServiceResult<Option<RoleSummary>> {
        match self.api.get_role(id).await {
            Ok(role) => Ok(Some(self.summarize(role).await)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Patch details (or just read the role when none are given), reconcile
    /// permissions when requested, then read the result back.
    pub async fn update(
        &self,
        id: &RoleId,
        changes: RoleChanges,
    ) -> ServiceResult<Option<RoleSummary>> {
        if changes.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ServiceError::validation("role name cannot be empty"));
        }

        let details = RoleUpdate {
            name: changes.name.map(|n| n.trim().to_string()),
            description: changes.description,
        };
        let found = if details.is_empty() {
            self.api.get_role(id).await
        } else {
            self.api.update_role(id, &details).await
        };
        match found {
            Ok(_) => {}
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        if let Some(requested) = &changes.permissions {
            self.reconciler.reconcile(id, requested).await?;
        }

        self.get(id).await
    }

    pub async fn delete(&self, id: &RoleId) -> ServiceResult<()> {
        self.api.delete_role(id).await.map_err(lookup_error)?;
        info!(role_id = %id, "role deleted");
        Ok(())
    }

    /// Attach permission names; a failed lookup leaves the role without any.
    async fn summarize(&self, role: Role) -> RoleSummary {
        let mut permissions: Vec<String> = match self.api.list_role_permissions(&role.id).await {
            Ok(granted) => granted.into_iter().map(|p| p.permission_name).collect(),
            Err(e) => {
                warn!(role_id = %role.id, error = %e, "failed to load role permissions");
                Vec::new()
            }
        };
        permissions.sort_by(|a, b| cmp_nulls_first_ci(Some(a.as_str()), Some(b.as_str())));

        RoleSummary {
            id: role.id,
            name: role.name,
            description: role.description,
            permissions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use usermgmt_identity::{InMemoryManagementApi, Operation};

    const API: &str = "https://api.acme.test";

    fn setup() -> (Arc<InMemoryManagementApi>, RoleService) {
        let api = Arc::new(InMemoryManagementApi::new());
        api.seed_resource_server(API, "Acme API", &["read:a", "write:a", "read:b"]);
        let service = RoleService::new(api.clone(), API);
        (api, service)
    }

    fn names(set: &[&str]) -> BTreeSet<String> {
        set.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn create_returns_the_same_shape_as_get() {
        let (_api, service) = setup();

        let created = service
            .create("  auditor ", Some("read only".into()))
            .await
            .unwrap();
        let fetched = service.get(&created.id).await.unwrap().unwrap();

        assert_eq!(created, fetched);
        assert_eq!(created.name.as_deref(), Some("auditor"));
        assert!(created.permissions.is_empty());
    }

    #[tokio::test]
    async fn create_rejects_blank_names_without_calling_the_platform() {
        let (api, service) = setup();

        let err = service.create("   ", None).await.unwrap_err();

        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(api.count(Operation::CreateRole), 0);
    }

    #[tokio::test]
    async fn list_sorts_case_insensitively_and_reports_window() {
        let (api, service) = setup();
        api.seed_role("zeta", None);
        api.seed_role("Alpha", None);
        api.seed_role("beta", None);

        let page = service.list(PageRequest::normalized(0, 10)).await.unwrap();

        let names: Vec<_> = page.content.iter().filter_map(|r| r.name.clone()).collect();
        assert_eq!(names, vec!["Alpha", "beta", "zeta"]);
        assert_eq!(page.page_size, 10);
        assert_eq!(page.current_page, 0);
        assert_eq!(page.total_elements, 3);
        assert_eq!(page.total_pages, 1);
    }

    #[tokio::test]
    async fn list_tolerates_failed_permission_lookups() {
        let (api, service) = setup();
        let role = api.seed_role("ops", None);
        api.seed_role_permissions(&role, API, &["read:a"]);
        api.fail_on(Operation::ListRolePermissions);

        let page = service.list(PageRequest::default()).await.unwrap();

        assert_eq!(page.content.len(), 1);
        assert!(page.content[0].permissions.is_empty());
    }

    #[tokio::test]
    async fn update_without_details_reads_then_reconciles() {
        let (api, service) = setup();
        let role = api.seed_role("ops", Some("operators"));
        api.seed_role_permissions(&role, API, &["read:a", "write:a"]);

        let updated = service
            .update(
                &role,
                RoleChanges {
                    permissions: Some(names(&["write:a", "read:b"])),
                    ..RoleChanges::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(api.count(Operation::UpdateRole), 0);
        assert_eq!(updated.permissions, vec!["read:b", "write:a"]);
        assert_eq!(updated.description.as_deref(), Some("operators"));
    }

    #[tokio::test]
    async fn update_details_only_leaves_permissions_alone() {
        let (api, service) = setup();
        let role = api.seed_role("ops", None);
        api.seed_role_permissions(&role, API, &["read:a"]);

        let updated = service
            .update(
                &role,
                RoleChanges {
                    name: Some("operators".into()),
                    ..RoleChanges::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.name.as_deref(), Some("operators"));
        assert_eq!(updated.permissions, vec!["read:a"]);
        assert_eq!(api.count(Operation::ListRolePermissions), 1);
        assert_eq!(api.count(Operation::AddRolePermissions), 0);
    }

    #[tokio::test]
    async fn update_unknown_role_is_none() {
        let (_api, service) = setup();

        let result = service
            .update(&RoleId::new("rol_missing"), RoleChanges::default())
            .await
            .unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn reconciliation_failure_surfaces() {
        let (api, service) = setup();
        let role = api.seed_role("ops", None);
        api.fail_on(Operation::AddRolePermissions);

        let err = service
            .update(
                &role,
                RoleChanges {
                    permissions: Some(names(&["read:a"])),
                    ..RoleChanges::default()
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::ReconciliationFailed { .. }));
    }

    #[tokio::test]
    async fn delete_removes_the_role() {
        let (api, service) = setup();
        let role = api.seed_role("ops", None);

        service.delete(&role).await.unwrap();

        assert!(service.get(&role).await.unwrap().is_none());
        assert!(matches!(
            service.delete(&role).await,
            Err(ServiceError::NotFound)
        ));
        assert_eq!(api.count(Operation::DeleteRole), 2);
    }
}
