use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{info, warn};

use usermgmt_core::{Page, PageRequest, RoleId, UserId};
use usermgmt_identity::{ManagementApi, Role, User};

use crate::error::{lookup_error, ServiceResult};
use crate::provisioning::{ProvisionRequest, ProvisionResult, ProvisioningWorkflow};

/// A role as shown on a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRef {
    pub id: RoleId,
    pub name: Option<String>,
}

impl From<Role> for RoleRef {
    fn from(role: Role) -> Self {
        Self {
            id: role.id,
            name: role.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSummary {
    pub id: UserId,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
    /// RFC 3339.
    pub last_login: Option<String>,
    pub roles: Vec<RoleRef>,
}

pub struct UserService {
    api: Arc<dyn ManagementApi>,
    workflow: ProvisioningWorkflow,
}

impl UserService {
    pub fn new(api: Arc<dyn ManagementApi>) -> Self {
        Self {
            workflow: ProvisioningWorkflow::new(api.clone()),
            api,
        }
    }

    pub async fn provision(&self, request: &ProvisionRequest) -> ServiceResult<ProvisionResult> {
        self.workflow.provision(request).await
    }

    /// One platform page, each user with their roles.
    pub async fn list(&self, request: PageRequest) -> ServiceResult<Page<UserSummary>> {
        let page = self.api.list_users(request.into()).await?;
        let total = page.total.unwrap_or(page.users.len() as u64);

        let mut content = Vec::with_capacity(page.users.len());
        for user in page.users {
            content.push(self.summarize(user).await);
        }
        Ok(Page::from_request(content, request, total))
    }

    pub async fn get(&self, id: &UserId) -> ServiceResult<Option<UserSummary>> {
        match self.api.get_user(id).await {
            Ok(user) => Ok(Some(self.summarize(user).await)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete(&self, id: &UserId) -> ServiceResult<()> {
        self.api.delete_user(id).await.map_err(lookup_error)?;
        info!(user_id = %id, "user deleted");
        Ok(())
    }

    /// Make the user hold exactly `role_ids`: unassign the rest, then assign
    /// the missing ones. Each call is skipped when it has nothing to do.
    pub async fn update_roles(&self, id: &UserId, role_ids: &[RoleId]) -> ServiceResult<()> {
        let current: BTreeSet<RoleId> = self
            .api
            .list_user_roles(id)
            .await
            .map_err(lookup_error)?
            .into_iter()
            .map(|r| r.id)
            .collect();
        let requested: BTreeSet<RoleId> = role_ids.iter().cloned().collect();

        let to_remove: Vec<RoleId> = current.difference(&requested).cloned().collect();
        let to_add: Vec<RoleId> = requested.difference(&current).cloned().collect();

        if !to_remove.is_empty() {
            self.api.remove_user_roles(id, &to_remove).await?;
        }
        if !to_add.is_empty() {
            self.api.add_user_roles(id, &to_add).await?;
        }
        info!(
            user_id = %id,
            added = to_add.len(),
            removed = to_remove.len(),
            "user roles updated"
        );
        Ok(())
    }

    /// Attach roles; a failed lookup leaves the user without roles.
    async fn summarize(&self, user: User) -> UserSummary {
        let roles = match self.api.list_user_roles(&user.user_id).await {
            Ok(roles) => roles.into_iter().map(RoleRef::from).collect(),
            Err(e) => {
                warn!(user_id = %user.user_id, error = %e, "failed to load user roles");
                Vec::new()
            }
        };

        UserSummary {
            id: user.user_id,
            email: user.email,
            name: user.name,
            picture: user.picture,
            last_login: user.last_login.map(|t| t.to_rfc3339()),
            roles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use usermgmt_identity::{InMemoryManagementApi, Operation};

    fn setup() -> (Arc<InMemoryManagementApi>, UserService) {
        let api = Arc::new(InMemoryManagementApi::new());
        let service = UserService::new(api.clone());
        (api, service)
    }

    #[tokio::test]
    async fn list_pages_users_and_rounds_total_pages_up() {
        let (api, service) = setup();
        let admin = api.seed_role("admin", None);
        for i in 0..5 {
            let id = api.seed_user(&format!("u{i}@acme.test"));
            if i == 0 {
                api.seed_user_roles(&id, std::slice::from_ref(&admin));
            }
        }

        let page = service.list(PageRequest::normalized(0, 2)).await.unwrap();

        assert_eq!(page.content.len(), 2);
        assert_eq!(page.total_elements, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.page_size, 2);
        assert_eq!(page.content[0].roles.len(), 1);
        assert_eq!(page.content[0].roles[0].name.as_deref(), Some("admin"));
        assert!(page.content[1].roles.is_empty());
    }

    #[tokio::test]
    async fn failed_role_lookup_yields_empty_roles() {
        let (api, service) = setup();
        let id = api.seed_user("a@acme.test");
        let role = api.seed_role("admin", None);
        api.seed_user_roles(&id, &[role]);
        api.fail_on(Operation::ListUserRoles);

        let user = service.get(&id).await.unwrap().unwrap();

        assert!(user.roles.is_empty());
        assert_eq!(user.email.as_deref(), Some("a@acme.test"));
    }

    #[tokio::test]
    async fn get_unknown_user_is_none() {
        let (_api, service) = setup();
        let found = service.get(&UserId::new("auth0|missing")).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn delete_unknown_user_is_not_found() {
        let (_api, service) = setup();
        let err = service.delete(&UserId::new("auth0|missing")).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound));
    }

    #[tokio::test]
    async fn update_roles_applies_only_the_difference() {
        let (api, service) = setup();
        let id = api.seed_user("a@acme.test");
        let keep = api.seed_role("keep", None);
        let stale = api.seed_role("stale", None);
        let add = api.seed_role("add", None);
        api.seed_user_roles(&id, &[keep.clone(), stale]);

        service.update_roles(&id, &[keep.clone(), add.clone()]).await.unwrap();

        let mut assigned = api.user_role_ids(&id);
        assigned.sort();
        let mut expected = vec![keep, add];
        expected.sort();
        assert_eq!(assigned, expected);

        api.reset_calls();
        service.update_roles(&id, &expected).await.unwrap();
        assert_eq!(api.count(Operation::AddUserRoles), 0);
        assert_eq!(api.count(Operation::RemoveUserRoles), 0);
    }
}
