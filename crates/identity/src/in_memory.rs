//! In-process identity platform.
//!
//! Intended for tests/dev. Keeps users, roles, assignments and one scope
//! catalogue per resource server; records the most recent trait calls and can
//! be told to fail a given operation.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use uuid::Uuid;

use usermgmt_core::{RoleId, UserId};

use crate::api::ManagementApi;
use crate::error::{ManagementError, ManagementResult};
use crate::model::{
    NewRole, NewUser, PageQuery, PasswordChangeTicketRequest, Permission, ResourceServer, Role,
    RoleUpdate, RolesPage, Scope, User, UsersPage,
};

/// Base of generated ticket URLs.
pub const TICKET_URL_BASE: &str = "https://in-memory.local/lo/reset";

/// Calls and tickets kept for inspection; older entries are dropped first.
pub const RECORD_LIMIT: usize = 1024;

/// One [`ManagementApi`] method.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateUser,
    GetUser,
    ListUsers,
    DeleteUser,
    ListUserRoles,
    AddUserRoles,
    RemoveUserRoles,
    CreatePasswordChangeTicket,
    CreateRole,
    GetRole,
    ListRoles,
    UpdateRole,
    DeleteRole,
    ListRolePermissions,
    AddRolePermissions,
    RemoveRolePermissions,
    GetResourceServer,
    UpdateResourceServerScopes,
}

/// A recorded call: which operation, against which record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub operation: Operation,
    /// User id, role id or resource-server identifier; empty for collection calls.
    pub target: String,
}

#[derive(Debug, Clone)]
struct StoredUser {
    user: User,
    connection: String,
}

#[derive(Debug, Default)]
struct State {
    users: Vec<StoredUser>,
    user_roles: HashMap<UserId, Vec<RoleId>>,
    roles: Vec<Role>,
    role_permissions: HashMap<RoleId, Vec<Permission>>,
    resource_servers: Vec<ResourceServer>,
    tickets: VecDeque<PasswordChangeTicketRequest>,
    calls: VecDeque<Call>,
    failing: HashSet<Operation>,
    garble_created_users: bool,
}

impl State {
    /// Record the call, then apply failure injection.
    fn enter(&mut self, operation: Operation, target: impl Into<String>) -> ManagementResult<()> {
        push_bounded(
            &mut self.calls,
            Call {
                operation,
                target: target.into(),
            },
        );
        if self.failing.contains(&operation) {
            return Err(ManagementError::api(500, "injected failure"));
        }
        Ok(())
    }

    fn user(&self, id: &UserId) -> ManagementResult<&StoredUser> {
        self.users
            .iter()
            .find(|u| &u.user.user_id == id)
            .ok_or(ManagementError::NotFound)
    }

    fn role(&self, id: &RoleId) -> ManagementResult<&Role> {
        self.roles
            .iter()
            .find(|r| &r.id == id)
            .ok_or(ManagementError::NotFound)
    }

    fn role_mut(&mut self, id: &RoleId) -> ManagementResult<&mut Role> {
        self.roles
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or(ManagementError::NotFound)
    }

    fn resource_server(&self, identifier: &str) -> ManagementResult<&ResourceServer> {
        self.resource_servers
            .iter()
            .find(|rs| rs.identifier.as_deref() == Some(identifier))
            .ok_or(ManagementError::NotFound)
    }

    fn role_name_taken(&self, name: &str, except: Option<&RoleId>) -> bool {
        self.roles.iter().any(|r| {
            Some(&r.id) != except
                && r.name
                    .as_deref()
                    .is_some_and(|n| n.eq_ignore_ascii_case(name))
        })
    }
}

/// In-memory [`ManagementApi`].
#[derive(Debug, Default)]
pub struct InMemoryManagementApi {
    state: Mutex<State>,
}

impl InMemoryManagementApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Failure injection
    // ─────────────────────────────────────────────────────────────────────────

    /// Every later call of `operation` fails with a 500 API error.
    pub fn fail_on(&self, operation: Operation) {
        self.lock().failing.insert(operation);
    }

    /// Later `create_user` calls store the user but report an unreadable
    /// response body, as when the platform answers 2xx with a garbled payload.
    pub fn garble_created_users(&self) {
        self.lock().garble_created_users = true;
    }

    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.failing.clear();
        state.garble_created_users = false;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Seeding (not recorded as calls)
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a resource server (API) with its scope catalogue.
    pub fn seed_resource_server(&self, identifier: &str, name: &str, scopes: &[&str]) {
        let mut state = self.lock();
        state
            .resource_servers
            .retain(|rs| rs.identifier.as_deref() != Some(identifier));
        state.resource_servers.push(ResourceServer {
            id: Some(Uuid::now_v7().simple().to_string()),
            identifier: Some(identifier.to_string()),
            name: Some(name.to_string()),
            scopes: scopes.iter().map(|s| Scope::new(*s, None)).collect(),
        });
    }

    pub fn seed_role(&self, name: &str, description: Option<&str>) -> RoleId {
        let id = new_role_id();
        self.lock().roles.push(Role {
            id: id.clone(),
            name: Some(name.to_string()),
            description: description.map(str::to_string),
        });
        id
    }

    pub fn seed_user(&self, email: &str) -> UserId {
        let id = new_user_id();
        self.lock().users.push(StoredUser {
            user: new_user_record(id.clone(), email, true),
            connection: "Username-Password-Authentication".to_string(),
        });
        id
    }

    /// Grant scopes of `api_identifier` to a role, bypassing catalogue checks.
    pub fn seed_role_permissions(&self, role: &RoleId, api_identifier: &str, names: &[&str]) {
        let mut state = self.lock();
        let granted = state.role_permissions.entry(role.clone()).or_default();
        for name in names {
            if !granted.iter().any(|p| p.permission_name == *name) {
                granted.push(Permission::new(*name, api_identifier));
            }
        }
    }

    pub fn seed_user_roles(&self, user: &UserId, roles: &[RoleId]) {
        let mut state = self.lock();
        let assigned = state.user_roles.entry(user.clone()).or_default();
        for role in roles {
            if !assigned.contains(role) {
                assigned.push(role.clone());
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Inspection
    // ─────────────────────────────────────────────────────────────────────────

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.iter().cloned().collect()
    }

    /// Number of recorded calls of `operation`.
    pub fn count(&self, operation: Operation) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    /// Targets of the recorded calls of `operation`, in call order.
    pub fn targets(&self, operation: Operation) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.operation == operation)
            .map(|c| c.target.clone())
            .collect()
    }

    pub fn reset_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn user_count(&self) -> usize {
        self.lock().users.len()
    }

    pub fn find_user_by_email(&self, email: &str) -> Option<UserId> {
        self.lock()
            .users
            .iter()
            .find(|u| u.user.email.as_deref() == Some(email))
            .map(|u| u.user.user_id.clone())
    }

    pub fn user_role_ids(&self, id: &UserId) -> Vec<RoleId> {
        self.lock().user_roles.get(id).cloned().unwrap_or_default()
    }

    /// Names of the scopes granted to a role, sorted.
    pub fn role_permission_names(&self, id: &RoleId) -> Vec<String> {
        let mut names: Vec<String> = self
            .lock()
            .role_permissions
            .get(id)
            .map(|ps| ps.iter().map(|p| p.permission_name.clone()).collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Scope values of a resource server, in catalogue order.
    pub fn scope_names(&self, identifier: &str) -> Vec<String> {
        self.lock()
            .resource_server(identifier)
            .map(|rs| rs.scopes.iter().map(|s| s.value.clone()).collect())
            .unwrap_or_default()
    }

    pub fn tickets(&self) -> Vec<PasswordChangeTicketRequest> {
        self.lock().tickets.iter().cloned().collect()
    }
}

fn push_bounded<T>(log: &mut VecDeque<T>, item: T) {
    if log.len() == RECORD_LIMIT {
        log.pop_front();
    }
    log.push_back(item);
}

fn new_user_id() -> UserId {
    UserId::new(format!("auth0|{}", Uuid::now_v7().simple()))
}

fn new_role_id() -> RoleId {
    RoleId::new(format!("rol_{}", Uuid::now_v7().simple()))
}

fn new_user_record(id: UserId, email: &str, email_verified: bool) -> User {
    User {
        user_id: id,
        email: Some(email.to_string()),
        email_verified: Some(email_verified),
        name: Some(email.to_string()),
        picture: None,
        last_login: None,
    }
}

/// `page`/`per_page` window over `items` in platform shape.
fn window<T: Clone>(items: &[T], query: PageQuery) -> (Vec<T>, u64, u32, u64) {
    let start = u64::from(query.page) * u64::from(query.per_page);
    let slice = items
        .iter()
        .skip(usize::try_from(start).unwrap_or(usize::MAX))
        .take(query.per_page as usize)
        .cloned()
        .collect();
    (slice, start, query.per_page, items.len() as u64)
}

#[async_trait]
impl ManagementApi for InMemoryManagementApi {
    async fn create_user(&self, user: &NewUser) -> ManagementResult<User> {
        let mut state = self.lock();
        state.enter(Operation::CreateUser, user.email.clone())?;

        if !user.email.contains('@') {
            return Err(ManagementError::api(400, "Payload validation error: invalid email"));
        }
        if user.password.is_empty() {
            return Err(ManagementError::api(400, "Payload validation error: password required"));
        }
        let duplicate = state.users.iter().any(|u| {
            u.connection == user.connection
                && u.user
                    .email
                    .as_deref()
                    .is_some_and(|e| e.eq_ignore_ascii_case(&user.email))
        });
        if duplicate {
            return Err(ManagementError::api(409, "The user already exists."));
        }

        let record = new_user_record(new_user_id(), &user.email, user.email_verified);
        state.users.push(StoredUser {
            user: record.clone(),
            connection: user.connection.clone(),
        });
        if state.garble_created_users {
            return Err(ManagementError::Decode("expected value at line 1 column 1".into()));
        }
        Ok(record)
    }

    async fn get_user(&self, id: &UserId) -> ManagementResult<User> {
        let mut state = self.lock();
        state.enter(Operation::GetUser, id.as_str())?;
        state.user(id).map(|u| u.user.clone())
    }

    async fn list_users(&self, query: PageQuery) -> ManagementResult<UsersPage> {
        let mut state = self.lock();
        state.enter(Operation::ListUsers, "")?;
        let users: Vec<User> = state.users.iter().map(|u| u.user.clone()).collect();
        let (users, start, limit, total) = window(&users, query);
        Ok(UsersPage {
            users,
            start: Some(start),
            limit: Some(limit),
            total: Some(total),
        })
    }

    async fn delete_user(&self, id: &UserId) -> ManagementResult<()> {
        let mut state = self.lock();
        state.enter(Operation::DeleteUser, id.as_str())?;
        state.user(id)?;
        state.users.retain(|u| &u.user.user_id != id);
        state.user_roles.remove(id);
        Ok(())
    }

    async fn list_user_roles(&self, id: &UserId) -> ManagementResult<Vec<Role>> {
        let mut state = self.lock();
        state.enter(Operation::ListUserRoles, id.as_str())?;
        state.user(id)?;
        let assigned = state.user_roles.get(id).cloned().unwrap_or_default();
        Ok(assigned
            .iter()
            .filter_map(|rid| state.role(rid).ok().cloned())
            .collect())
    }

    async fn add_user_roles(&self, id: &UserId, roles: &[RoleId]) -> ManagementResult<()> {
        let mut state = self.lock();
        state.enter(Operation::AddUserRoles, id.as_str())?;
        state.user(id)?;
        if let Some(unknown) = roles.iter().find(|r| state.role(r).is_err()) {
            return Err(ManagementError::api(400, format!("Role {unknown} does not exist")));
        }
        let assigned = state.user_roles.entry(id.clone()).or_default();
        for role in roles {
            if !assigned.contains(role) {
                assigned.push(role.clone());
            }
        }
        Ok(())
    }

    async fn remove_user_roles(&self, id: &UserId, roles: &[RoleId]) -> ManagementResult<()> {
        let mut state = self.lock();
        state.enter(Operation::RemoveUserRoles, id.as_str())?;
        state.user(id)?;
        if let Some(assigned) = state.user_roles.get_mut(id) {
            assigned.retain(|r| !roles.contains(r));
        }
        Ok(())
    }

    async fn create_password_change_ticket(
        &self,
        request: &PasswordChangeTicketRequest,
    ) -> ManagementResult<String> {
        let mut state = self.lock();
        state.enter(Operation::CreatePasswordChangeTicket, request.user_id.as_str())?;
        state.user(&request.user_id)?;
        push_bounded(&mut state.tickets, request.clone());
        Ok(format!("{TICKET_URL_BASE}?ticket={}#", Uuid::now_v7().simple()))
    }

    async fn create_role(&self, role: &NewRole) -> ManagementResult<Role> {
        let mut state = self.lock();
        state.enter(Operation::CreateRole, role.name.clone())?;
        if role.name.trim().is_empty() {
            return Err(ManagementError::api(400, "Payload validation error: name required"));
        }
        if state.role_name_taken(&role.name, None) {
            return Err(ManagementError::api(409, "Role name already exists"));
        }
        let created = Role {
            id: new_role_id(),
            name: Some(role.name.clone()),
            description: role.description.clone(),
        };
        state.roles.push(created.clone());
        Ok(created)
    }

    async fn get_role(&self, id: &RoleId) -> ManagementResult<Role> {
        let mut state = self.lock();
        state.enter(Operation::GetRole, id.as_str())?;
        state.role(id).cloned()
    }

    async fn list_roles(&self, query: PageQuery) -> ManagementResult<RolesPage> {
        let mut state = self.lock();
        state.enter(Operation::ListRoles, "")?;
        let (roles, start, limit, total) = window(&state.roles, query);
        Ok(RolesPage {
            roles,
            start: Some(start),
            limit: Some(limit),
            total: Some(total),
        })
    }

    async fn update_role(&self, id: &RoleId, update: &RoleUpdate) -> ManagementResult<Role> {
        let mut state = self.lock();
        state.enter(Operation::UpdateRole, id.as_str())?;
        state.role(id)?;
        if let Some(name) = &update.name {
            if name.trim().is_empty() {
                return Err(ManagementError::api(400, "Payload validation error: name required"));
            }
            if state.role_name_taken(name, Some(id)) {
                return Err(ManagementError::api(409, "Role name already exists"));
            }
        }
        let role = state.role_mut(id)?;
        if let Some(name) = &update.name {
            role.name = Some(name.clone());
        }
        if let Some(description) = &update.description {
            role.description = Some(description.clone());
        }
        Ok(role.clone())
    }

    async fn delete_role(&self, id: &RoleId) -> ManagementResult<()> {
        let mut state = self.lock();
        state.enter(Operation::DeleteRole, id.as_str())?;
        state.role(id)?;
        state.roles.retain(|r| &r.id != id);
        state.role_permissions.remove(id);
        for assigned in state.user_roles.values_mut() {
            assigned.retain(|r| r != id);
        }
        Ok(())
    }

    async fn list_role_permissions(&self, id: &RoleId) -> ManagementResult<Vec<Permission>> {
        let mut state = self.lock();
        state.enter(Operation::ListRolePermissions, id.as_str())?;
        state.role(id)?;
        Ok(state.role_permissions.get(id).cloned().unwrap_or_default())
    }

    async fn add_role_permissions(
        &self,
        id: &RoleId,
        permissions: &[Permission],
    ) -> ManagementResult<()> {
        let mut state = self.lock();
        state.enter(Operation::AddRolePermissions, id.as_str())?;
        state.role(id)?;

        let mut resolved = Vec::with_capacity(permissions.len());
        for p in permissions {
            let rs = state
                .resource_server(&p.resource_server_identifier)
                .map_err(|_| {
                    ManagementError::api(
                        400,
                        format!("Resource server {} does not exist", p.resource_server_identifier),
                    )
                })?;
            let scope = rs
                .scopes
                .iter()
                .find(|s| s.value == p.permission_name)
                .ok_or_else(|| {
                    ManagementError::api(
                        400,
                        format!(
                            "Permission {} does not exist on {}",
                            p.permission_name, p.resource_server_identifier
                        ),
                    )
                })?;
            resolved.push(Permission {
                permission_name: scope.value.clone(),
                resource_server_identifier: p.resource_server_identifier.clone(),
                description: scope.description.clone(),
                resource_server_name: rs.name.clone(),
            });
        }

        let granted = state.role_permissions.entry(id.clone()).or_default();
        for p in resolved {
            let already = granted.iter().any(|g| {
                g.permission_name == p.permission_name
                    && g.resource_server_identifier == p.resource_server_identifier
            });
            if !already {
                granted.push(p);
            }
        }
        Ok(())
    }

    async fn remove_role_permissions(
        &self,
        id: &RoleId,
        permissions: &[Permission],
    ) -> ManagementResult<()> {
        let mut state = self.lock();
        state.enter(Operation::RemoveRolePermissions, id.as_str())?;
        state.role(id)?;
        if let Some(granted) = state.role_permissions.get_mut(id) {
            granted.retain(|g| {
                !permissions.iter().any(|p| {
                    p.permission_name == g.permission_name
                        && p.resource_server_identifier == g.resource_server_identifier
                })
            });
        }
        Ok(())
    }

    async fn get_resource_server(&self, identifier: &str) -> ManagementResult<ResourceServer> {
        let mut state = self.lock();
        state.enter(Operation::GetResourceServer, identifier)?;
        state.resource_server(identifier).cloned()
    }

    async fn update_resource_server_scopes(
        &self,
        identifier: &str,
        scopes: &[Scope],
    ) -> ManagementResult<()> {
        let mut state = self.lock();
        state.enter(Operation::UpdateResourceServerScopes, identifier)?;
        state.resource_server(identifier)?;
        if let Some(rs) = state
            .resource_servers
            .iter_mut()
            .find(|rs| rs.identifier.as_deref() == Some(identifier))
        {
            rs.scopes = scopes.to_vec();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::SecretString;

    const API: &str = "https://api.acme.test";

    fn new_user(email: &str) -> NewUser {
        NewUser {
            connection: "Username-Password-Authentication".into(),
            email: email.into(),
            email_verified: false,
            password: SecretString::new("Abcdefgh12345678Abcdefgh12345678"),
        }
    }

    #[tokio::test]
    async fn created_users_get_vendor_shaped_ids() {
        let api = InMemoryManagementApi::new();
        let user = api.create_user(&new_user("a@acme.test")).await.unwrap();

        assert!(user.user_id.as_str().starts_with("auth0|"));
        assert_eq!(user.email_verified, Some(false));
        assert_eq!(api.count(Operation::CreateUser), 1);
    }

    #[tokio::test]
    async fn call_log_keeps_only_the_latest_calls() {
        let api = InMemoryManagementApi::new();
        api.seed_resource_server(API, "Acme API", &[]);

        for _ in 0..RECORD_LIMIT {
            api.list_users(PageQuery { page: 0, per_page: 10 }).await.unwrap();
        }
        api.get_resource_server(API).await.unwrap();

        let calls = api.calls();
        assert_eq!(calls.len(), RECORD_LIMIT);
        assert_eq!(api.count(Operation::ListUsers), RECORD_LIMIT - 1);
        assert_eq!(calls.last().unwrap().operation, Operation::GetResourceServer);
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let api = InMemoryManagementApi::new();
        api.create_user(&new_user("a@acme.test")).await.unwrap();

        let err = api.create_user(&new_user("A@acme.test")).await.unwrap_err();
        assert!(matches!(err, ManagementError::Api { status: 409, .. }));
        assert_eq!(api.user_count(), 1);
    }

    #[tokio::test]
    async fn injected_failures_are_recorded_and_persist() {
        let api = InMemoryManagementApi::new();
        api.fail_on(Operation::ListRoles);

        let query = PageQuery { page: 0, per_page: 10 };
        assert!(api.list_roles(query).await.is_err());
        assert!(api.list_roles(query).await.is_err());
        assert_eq!(api.count(Operation::ListRoles), 2);

        api.clear_failures();
        assert!(api.list_roles(query).await.is_ok());
    }

    #[tokio::test]
    async fn role_permissions_must_exist_in_catalogue() {
        let api = InMemoryManagementApi::new();
        api.seed_resource_server(API, "Acme API", &["read:users"]);
        let role = api.seed_role("viewer", None);

        api.add_role_permissions(&role, &[Permission::new("read:users", API)])
            .await
            .unwrap();
        let err = api
            .add_role_permissions(&role, &[Permission::new("nuke:all", API)])
            .await
            .unwrap_err();

        assert!(matches!(err, ManagementError::Api { status: 400, .. }));
        let granted = api.list_role_permissions(&role).await.unwrap();
        assert_eq!(granted.len(), 1);
        assert_eq!(granted[0].resource_server_name.as_deref(), Some("Acme API"));
    }

    #[tokio::test]
    async fn list_users_reports_window_and_total() {
        let api = InMemoryManagementApi::new();
        for i in 0..5 {
            api.seed_user(&format!("u{i}@acme.test"));
        }

        let page = api
            .list_users(PageQuery { page: 1, per_page: 2 })
            .await
            .unwrap();
        assert_eq!(page.users.len(), 2);
        assert_eq!(page.start, Some(2));
        assert_eq!(page.limit, Some(2));
        assert_eq!(page.total, Some(5));
        assert_eq!(page.users[0].email.as_deref(), Some("u2@acme.test"));
    }

    #[tokio::test]
    async fn deleting_a_role_unassigns_it() {
        let api = InMemoryManagementApi::new();
        let user = api.seed_user("a@acme.test");
        let role = api.seed_role("ops", None);
        api.seed_user_roles(&user, std::slice::from_ref(&role));

        api.delete_role(&role).await.unwrap();

        assert!(api.user_role_ids(&user).is_empty());
        assert!(matches!(api.get_role(&role).await, Err(ManagementError::NotFound)));
    }
}
