//! User provisioning workflow.
//!
//! 1. Create the user with a random throwaway password, email unverified.
//! 2. Assign roles (only when some were requested).
//! 3. Issue a password-change ticket so the user sets their own password.
//!
//! Compensating action: delete the user if step 2 or 3 fails. The delete is
//! attempted once; if it fails the user is reported as orphaned in the log and
//! the original error is still returned.

use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use tracing::{error, info, warn};

use usermgmt_core::{RoleId, UserId};
use usermgmt_identity::{
    ManagementApi, ManagementError, NewUser, PasswordChangeTicketRequest, SecretString,
};

use crate::error::{ProvisioningStage, ServiceError, ServiceResult};

/// Lifetime of the password-change ticket (24 hours).
pub const TICKET_TTL_SECS: u64 = 24 * 60 * 60;

/// Length of the throwaway password set at creation.
pub const THROWAWAY_PASSWORD_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionRequest {
    pub email: String,
    /// Database connection the account is created in.
    pub connection: String,
    /// Roles to assign; duplicates are ignored.
    pub role_ids: Vec<RoleId>,
    /// Where the user lands after setting their password.
    pub result_url: Option<String>,
}

impl ProvisionRequest {
    pub fn validate(&self) -> ServiceResult<()> {
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(ServiceError::validation("email must be a valid address"));
        }
        if self.connection.trim().is_empty() {
            return Err(ServiceError::validation("connection cannot be empty"));
        }
        Ok(())
    }

    fn distinct_role_ids(&self) -> Vec<RoleId> {
        let mut ids: Vec<RoleId> = Vec::with_capacity(self.role_ids.len());
        for id in &self.role_ids {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }
}

/// A user created by step 1 and not yet confirmed by the rest of the workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedUser {
    pub user_id: UserId,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionResult {
    pub ticket_url: String,
}

/// Random alphanumeric password from the OS RNG, wiped when dropped.
pub fn throwaway_password() -> SecretString {
    let value: String = OsRng
        .sample_iter(&Alphanumeric)
        .take(THROWAWAY_PASSWORD_LEN)
        .map(char::from)
        .collect();
    SecretString::from(value)
}

pub struct ProvisioningWorkflow {
    api: Arc<dyn ManagementApi>,
}

impl ProvisioningWorkflow {
    pub fn new(api: Arc<dyn ManagementApi>) -> Self {
        Self { api }
    }

    /// Run the workflow. All-or-nothing from the caller's point of view.
    pub async fn provision(&self, request: &ProvisionRequest) -> ServiceResult<ProvisionResult> {
        request.validate()?;
        let email = request.email.trim();

        let user = self.create_user(request, email).await?;

        let role_ids = request.distinct_role_ids();
        if !role_ids.is_empty() {
            if let Err(e) = self.api.add_user_roles(&user.user_id, &role_ids).await {
                self.rollback(&user, ProvisioningStage::AssignRoles).await;
                return Err(failed(ProvisioningStage::AssignRoles, email, e));
            }
        }

        let ticket = PasswordChangeTicketRequest {
            user_id: user.user_id.clone(),
            result_url: request.result_url.clone(),
            ttl_sec: TICKET_TTL_SECS,
            mark_email_as_verified: false,
            include_email_in_redirect: false,
        };
        let ticket_url = match self.api.create_password_change_ticket(&ticket).await {
            Ok(url) => url,
            Err(e) => {
                self.rollback(&user, ProvisioningStage::IssueTicket).await;
                return Err(failed(ProvisioningStage::IssueTicket, email, e));
            }
        };

        info!(
            user_id = %user.user_id,
            roles = role_ids.len(),
            "user provisioned; password-change ticket issued"
        );
        Ok(ProvisionResult { ticket_url })
    }

    async fn create_user(
        &self,
        request: &ProvisionRequest,
        email: &str,
    ) -> ServiceResult<ProvisionedUser> {
        let new_user = NewUser {
            connection: request.connection.trim().to_string(),
            email: email.to_string(),
            email_verified: false,
            password: throwaway_password(),
        };
        let created = self.api.create_user(&new_user).await;
        drop(new_user);

        let created = created.map_err(|e| {
            // A 2xx with an unreadable body means the account may exist.
            if matches!(e, ManagementError::Decode(_)) {
                error!(
                    event = "PossibleOrphan",
                    %email,
                    error = %e,
                    "create-user response unreadable; account may exist without roles or ticket"
                );
            }
            failed(ProvisioningStage::CreateUser, email, e)
        })?;
        Ok(ProvisionedUser {
            user_id: created.user_id,
            email: email.to_string(),
        })
    }

    /// Delete the user created by step 1. Never fails the caller.
    async fn rollback(&self, user: &ProvisionedUser, stage: ProvisioningStage) {
        match self.api.delete_user(&user.user_id).await {
            Ok(()) => warn!(
                user_id = %user.user_id,
                %stage,
                "provisioning failed; created user deleted"
            ),
            Err(e) => error!(
                event = "RollbackFailed",
                user_id = %user.user_id,
                email = %user.email,
                %stage,
                error = %e,
                "rollback failed; user is orphaned and must be removed manually"
            ),
        }
    }
}

fn failed(stage: ProvisioningStage, email: &str, source: ManagementError) -> ServiceError {
    error!(%stage, %email, error = %source, "provisioning step failed");
    ServiceError::ProvisioningFailed {
        stage,
        email: email.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;
    use usermgmt_identity::{InMemoryManagementApi, Operation};

    fn setup() -> (Arc<InMemoryManagementApi>, ProvisioningWorkflow) {
        let api = Arc::new(InMemoryManagementApi::new());
        let workflow = ProvisioningWorkflow::new(api.clone());
        (api, workflow)
    }

    fn request(role_ids: Vec<RoleId>) -> ProvisionRequest {
        ProvisionRequest {
            email: "new.hire@acme.test".into(),
            connection: "Username-Password-Authentication".into(),
            role_ids,
            result_url: Some("https://app.acme.test/welcome".into()),
        }
    }

    #[test]
    fn throwaway_passwords_are_long_alphanumeric_and_distinct() {
        let a = throwaway_password();
        let b = throwaway_password();

        assert_eq!(a.len(), THROWAWAY_PASSWORD_LEN);
        assert!(a.expose().chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn request_validation_rejects_bad_email_and_blank_connection() {
        let mut req = request(vec![]);
        req.email = "not-an-email".into();
        assert!(matches!(req.validate(), Err(ServiceError::Validation(_))));

        let mut req = request(vec![]);
        req.connection = "  ".into();
        assert!(matches!(req.validate(), Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn success_with_roles_makes_one_call_per_step_and_no_delete() {
        let (api, workflow) = setup();
        let role = api.seed_role("staff", None);

        let result = workflow.provision(&request(vec![role.clone()])).await.unwrap();

        assert!(result.ticket_url.starts_with("https://"));
        assert_eq!(api.count(Operation::CreateUser), 1);
        assert_eq!(api.count(Operation::AddUserRoles), 1);
        assert_eq!(api.count(Operation::CreatePasswordChangeTicket), 1);
        assert_eq!(api.count(Operation::DeleteUser), 0);

        let user = api.find_user_by_email("new.hire@acme.test").unwrap();
        assert_eq!(api.user_role_ids(&user), vec![role]);
    }

    #[tokio::test]
    async fn success_without_roles_skips_assignment() {
        let (api, workflow) = setup();

        workflow.provision(&request(vec![])).await.unwrap();

        assert_eq!(api.count(Operation::CreateUser), 1);
        assert_eq!(api.count(Operation::AddUserRoles), 0);
        assert_eq!(api.count(Operation::CreatePasswordChangeTicket), 1);
        assert_eq!(api.count(Operation::DeleteUser), 0);
    }

    #[tokio::test]
    async fn ticket_is_24h_unverified_with_callers_redirect() {
        let (api, workflow) = setup();

        workflow.provision(&request(vec![])).await.unwrap();

        let tickets = api.tickets();
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].ttl_sec, 86_400);
        assert!(!tickets[0].mark_email_as_verified);
        assert!(!tickets[0].include_email_in_redirect);
        assert_eq!(tickets[0].result_url.as_deref(), Some("https://app.acme.test/welcome"));
    }

    #[tokio::test]
    async fn create_failure_has_nothing_to_compensate() {
        let (api, workflow) = setup();
        api.fail_on(Operation::CreateUser);

        let err = workflow.provision(&request(vec![])).await.unwrap_err();

        assert!(matches!(
            err,
            ServiceError::ProvisioningFailed { stage: ProvisioningStage::CreateUser, .. }
        ));
        assert_eq!(api.count(Operation::DeleteUser), 0);
        assert_eq!(api.count(Operation::CreatePasswordChangeTicket), 0);
    }

    #[tokio::test]
    async fn role_assignment_failure_deletes_the_created_user() {
        let (api, workflow) = setup();
        let role = api.seed_role("staff", None);
        api.fail_on(Operation::AddUserRoles);

        let err = workflow.provision(&request(vec![role])).await.unwrap_err();

        match err {
            ServiceError::ProvisioningFailed { stage, source, .. } => {
                assert_eq!(stage, ProvisioningStage::AssignRoles);
                assert!(matches!(source, ManagementError::Api { status: 500, .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(api.count(Operation::DeleteUser), 1);
        assert_eq!(api.count(Operation::CreatePasswordChangeTicket), 0);
        assert!(api.find_user_by_email("new.hire@acme.test").is_none());
        assert!(api.targets(Operation::DeleteUser)[0].starts_with("auth0|"));
    }

    #[tokio::test]
    async fn ticket_failure_deletes_exactly_the_created_user() {
        let (api, workflow) = setup();
        api.fail_on(Operation::CreatePasswordChangeTicket);

        let err = workflow.provision(&request(vec![])).await.unwrap_err();

        assert!(matches!(
            err,
            ServiceError::ProvisioningFailed { stage: ProvisioningStage::IssueTicket, .. }
        ));
        let ticket_target = api.targets(Operation::CreatePasswordChangeTicket);
        assert_eq!(api.targets(Operation::DeleteUser), ticket_target);
        assert_eq!(api.user_count(), 0);
    }

    #[tokio::test]
    async fn failed_rollback_still_surfaces_the_stage_error() {
        let (api, workflow) = setup();
        api.fail_on(Operation::CreatePasswordChangeTicket);
        api.fail_on(Operation::DeleteUser);

        let err = workflow.provision(&request(vec![])).await.unwrap_err();

        assert!(matches!(
            err,
            ServiceError::ProvisioningFailed { stage: ProvisioningStage::IssueTicket, .. }
        ));
        assert_eq!(api.count(Operation::DeleteUser), 1);
        // Orphaned, not retried.
        assert_eq!(api.user_count(), 1);
    }

    #[tokio::test]
    async fn invalid_request_makes_no_remote_calls() {
        let (api, workflow) = setup();
        let mut req = request(vec![]);
        req.email = " ".into();

        assert!(workflow.provision(&req).await.is_err());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn duplicate_role_ids_are_assigned_once() {
        let (api, workflow) = setup();
        let role = api.seed_role("staff", None);

        workflow
            .provision(&request(vec![role.clone(), role.clone()]))
            .await
            .unwrap();

        let user = api.find_user_by_email("new.hire@acme.test").unwrap();
        assert_eq!(api.user_role_ids(&user), vec![role]);
    }

    #[tokio::test]
    #[traced_test]
    async fn unreadable_create_response_is_reported_as_possible_orphan() {
        let (api, workflow) = setup();
        api.garble_created_users();

        let err = workflow.provision(&request(vec![])).await.unwrap_err();

        match err {
            ServiceError::ProvisioningFailed { stage, source, .. } => {
                assert_eq!(stage, ProvisioningStage::CreateUser);
                assert!(matches!(source, ManagementError::Decode(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(api.user_count(), 1);
        assert_eq!(api.count(Operation::DeleteUser), 0);
        assert!(logs_contain("PossibleOrphan"));
        assert!(logs_contain("new.hire@acme.test"));
    }
}
