use core::fmt;

use serde::Serialize;
use thiserror::Error;

use usermgmt_core::RoleId;
use usermgmt_identity::ManagementError;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Step of the provisioning workflow that failed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningStage {
    CreateUser,
    AssignRoles,
    IssueTicket,
}

impl fmt::Display for ProvisioningStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProvisioningStage::CreateUser => "create_user",
            ProvisioningStage::AssignRoles => "assign_roles",
            ProvisioningStage::IssueTicket => "issue_ticket",
        })
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    /// A remote call of the provisioning workflow failed. Any user created
    /// before the failure has already been (or attempted to be) deleted.
    #[error("provisioning {email} failed at {stage}: {source}")]
    ProvisioningFailed {
        stage: ProvisioningStage,
        email: String,
        source: ManagementError,
    },

    /// Applying a role's permission diff failed. Changes made before the
    /// failure are kept.
    #[error("permission reconciliation for role {role_id} failed: {source}")]
    ReconciliationFailed {
        role_id: RoleId,
        source: ManagementError,
    },

    #[error("not found")]
    NotFound,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Management(#[from] ManagementError),
}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// Lookup failure: the platform's 404 becomes [`ServiceError::NotFound`].
pub(crate) fn lookup_error(err: ManagementError) -> ServiceError {
    if err.is_not_found() {
        ServiceError::NotFound
    } else {
        ServiceError::Management(err)
    }
}
