//! Capability interface over the identity platform's Management API.
//!
//! Services depend on this trait only, so the platform can be swapped for
//! [`crate::InMemoryManagementApi`] without touching HTTP concerns.

use std::sync::Arc;

use async_trait::async_trait;

use usermgmt_core::{RoleId, UserId};

use crate::error::ManagementResult;
use crate::model::{
    NewRole, NewUser, PageQuery, PasswordChangeTicketRequest, Permission, ResourceServer, Role,
    RoleUpdate, RolesPage, Scope, User, UsersPage,
};

/// Management API operations used by this service.
///
/// Every call is a single attempt; retries are an infrastructure concern.
#[async_trait]
pub trait ManagementApi: Send + Sync {
    // users
    async fn create_user(&self, user: &NewUser) -> ManagementResult<User>;
    async fn get_user(&self, id: &UserId) -> ManagementResult<User>;
    async fn list_users(&self, query: PageQuery) -> ManagementResult<UsersPage>;
    async fn delete_user(&self, id: &UserId) -> ManagementResult<()>;
    async fn list_user_roles(&self, id: &UserId) -> ManagementResult<Vec<Role>>;
    async fn add_user_roles(&self, id: &UserId, roles: &[RoleId]) -> ManagementResult<()>;
    async fn remove_user_roles(&self, id: &UserId, roles: &[RoleId]) -> ManagementResult<()>;

    // tickets
    /// Returns the ticket URL.
    async fn create_password_change_ticket(
        &self,
        request: &PasswordChangeTicketRequest,
    ) -> ManagementResult<String>;

    // roles
    async fn create_role(&self, role: &NewRole) -> ManagementResult<Role>;
    async fn get_role(&self, id: &RoleId) -> ManagementResult<Role>;
    async fn list_roles(&self, query: PageQuery) -> ManagementResult<RolesPage>;
    async fn update_role(&self, id: &RoleId, update: &RoleUpdate) -> ManagementResult<Role>;
    async fn delete_role(&self, id: &RoleId) -> ManagementResult<()>;
    async fn list_role_permissions(&self, id: &RoleId) -> ManagementResult<Vec<Permission>>;
    async fn add_role_permissions(
        &self,
        id: &RoleId,
        permissions: &[Permission],
    ) -> ManagementResult<()>;
    async fn remove_role_permissions(
        &self,
        id: &RoleId,
        permissions: &[Permission],
    ) -> ManagementResult<()>;

    // resource servers
    async fn get_resource_server(&self, identifier: &str) -> ManagementResult<ResourceServer>;
    /// Replaces the whole scope catalogue of the resource server.
    async fn update_resource_server_scopes(
        &self,
        identifier: &str,
        scopes: &[Scope],
    ) -> ManagementResult<()>;
}

#[async_trait]
impl<T> ManagementApi for Arc<T>
where
    T: ManagementApi + ?Sized,
{
    async fn create_user(&self, user: &NewUser) -> ManagementResult<User> {
        (**self).create_user(user).await
    }

    async fn get_user(&self, id: &UserId) -> ManagementResult<User> {
        (**self).get_user(id).await
    }

    async fn list_users(&self, query: PageQuery) -> ManagementResult<UsersPage> {
        (**self).list_users(query).await
    }

    async fn delete_user(&self, id: &UserId) -> ManagementResult<()> {
        (**self).delete_user(id).await
    }

    async fn list_user_roles(&self, id: &UserId) -> ManagementResult<Vec<Role>> {
        (**self).list_user_roles(id).await
    }

    async fn add_user_roles(&self, id: &UserId, roles: &[RoleId]) -> ManagementResult<()> {
        (**self).add_user_roles(id, roles).await
    }

    async fn remove_user_roles(&self, id: &UserId, roles: &[RoleId]) -> ManagementResult<()> {
        (**self).remove_user_roles(id, roles).await
    }

    async fn create_password_change_ticket(
        &self,
        request: &PasswordChangeTicketRequest,
    ) -> ManagementResult<String> {
        (**self).create_password_change_ticket(request).await
    }

    async fn create_role(&self, role: &NewRole) -> ManagementResult<Role> {
        (**self).create_role(role).await
    }

    async fn get_role(&self, id: &RoleId) -> ManagementResult<Role> {
        (**self).get_role(id).await
    }

    async fn list_roles(&self, query: PageQuery) -> ManagementResult<RolesPage> {
        (**self).list_roles(query).await
    }

    async fn update_role(&self, id: &RoleId, update: &RoleUpdate) -> ManagementResult<Role> {
        (**self).update_role(id, update).await
    }

    async fn delete_role(&self, id: &RoleId) -> ManagementResult<()> {
        (**self).delete_role(id).await
    }

    async fn list_role_permissions(&self, id: &RoleId) -> ManagementResult<Vec<Permission>> {
        (**self).list_role_permissions(id).await
    }

    async fn add_role_permissions(
        &self,
        id: &RoleId,
        permissions: &[Permission],
    ) -> ManagementResult<()> {
        (**self).add_role_permissions(id, permissions).await
    }

    async fn remove_role_permissions(
        &self,
        id: &RoleId,
        permissions: &[Permission],
    ) -> ManagementResult<()> {
        (**self).remove_role_permissions(id, permissions).await
    }

    async fn get_resource_server(&self, identifier: &str) -> ManagementResult<ResourceServer> {
        (**self).get_resource_server(identifier).await
    }

    async fn update_resource_server_scopes(
        &self,
        identifier: &str,
        scopes: &[Scope],
    ) -> ManagementResult<()> {
        (**self).update_resource_server_scopes(identifier, scopes).await
    }
}
