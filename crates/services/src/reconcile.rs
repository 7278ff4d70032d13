//! Diff-based reconciliation of a role's permissions.
//!
//! Current grants and the scope catalogue are read before any change is made.
//! Removal is issued before addition and each is skipped when empty, so
//! re-applying the same set makes no mutating calls. There is no compensation:
//! a removal that succeeded before a failed addition stays applied.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{info, warn};

use usermgmt_core::RoleId;
use usermgmt_identity::{ManagementApi, ManagementError, Permission};

use crate::error::{ServiceError, ServiceResult};

/// Minimal change turning `current` into `requested`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleDiff {
    pub to_add: BTreeSet<String>,
    pub to_remove: BTreeSet<String>,
}

impl RoleDiff {
    /// `to_remove = current - requested`, `to_add = requested - current`.
    pub fn compute(current: &BTreeSet<String>, requested: &BTreeSet<String>) -> Self {
        Self {
            to_add: requested.difference(current).cloned().collect(),
            to_remove: current.difference(requested).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Applies permission diffs to roles, resolving names against the scope
/// catalogue of one API (resource server).
pub struct PermissionReconciler {
    api: Arc<dyn ManagementApi>,
    api_identifier: String,
}

impl PermissionReconciler {
    pub fn new(api: Arc<dyn ManagementApi>, api_identifier: impl Into<String>) -> Self {
        Self {
            api,
            api_identifier: api_identifier.into(),
        }
    }

    /// Make the role hold exactly `requested` (minus names unknown to the
    /// catalogue). Returns the diff that was computed.
    pub async fn reconcile(
        &self,
        role_id: &RoleId,
        requested: &BTreeSet<String>,
    ) -> ServiceResult<RoleDiff> {
        let fail = |source: ManagementError| ServiceError::ReconciliationFailed {
            role_id: role_id.clone(),
            source,
        };

        let granted = self
            .api
            .list_role_permissions(role_id)
            .await
            .map_err(fail)?;
        let current: BTreeSet<String> = granted.iter().map(|p| p.permission_name.clone()).collect();
        let diff = RoleDiff::compute(&current, requested);

        // Every read happens before the first mutation.
        let additions = if diff.to_add.is_empty() {
            Vec::new()
        } else {
            self.resolve(&diff.to_add).await.map_err(fail)?
        };

        if !diff.to_remove.is_empty() {
            let removals: Vec<Permission> = granted
                .into_iter()
                .filter(|p| diff.to_remove.contains(&p.permission_name))
                .collect();
            self.api
                .remove_role_permissions(role_id, &removals)
                .await
                .map_err(fail)?;
            info!(role_id = %role_id, removed = ?diff.to_remove, "role permissions removed");
        }

        if !additions.is_empty() {
            self.api
                .add_role_permissions(role_id, &additions)
                .await
                .map_err(fail)?;
            info!(role_id = %role_id, added = additions.len(), "role permissions added");
        }

        Ok(diff)
    }

    /// Catalogue lookup; unknown names are dropped with a warning.
    async fn resolve(&self, names: &BTreeSet<String>) -> Result<Vec<Permission>, ManagementError> {
        let catalogue = self.api.get_resource_server(&self.api_identifier).await?;
        let known: BTreeSet<&str> = catalogue.scopes.iter().map(|s| s.value.as_str()).collect();

        let mut resolved = Vec::with_capacity(names.len());
        for name in names {
            if known.contains(name.as_str()) {
                resolved.push(Permission::new(name.clone(), self.api_identifier.clone()));
            } else {
                warn!(
                    permission = %name,
                    api = %self.api_identifier,
                    "requested permission is not in the scope catalogue; dropped"
                );
            }
        }
        Ok(resolved)
    }
}
