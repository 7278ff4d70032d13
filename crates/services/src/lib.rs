//! `usermgmt-services` — application services over the identity platform.
//!
//! - `provisioning`: create user → assign roles → issue ticket, with rollback
//! - `reconcile`: diff-based role permission updates
//! - `users` / `roles` / `permissions`: the operations the HTTP layer exposes

pub mod error;
pub mod permissions;
pub mod provisioning;
pub mod reconcile;
pub mod roles;
pub mod users;

pub use error::{ProvisioningStage, ServiceError, ServiceResult};
pub use permissions::{PermissionDefinition, PermissionService, PermissionSummary};
pub use provisioning::{
    ProvisionRequest, ProvisionResult, ProvisionedUser, ProvisioningWorkflow, TICKET_TTL_SECS,
};
pub use reconcile::{PermissionReconciler, RoleDiff};
pub use roles::{RoleChanges, RoleService, RoleSummary};
pub use users::{RoleRef, UserService, UserSummary};
