//! Wire shapes of the Auth0 Management API v2 (only the fields this service uses).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use usermgmt_core::{RoleId, UserId};

use crate::secret::{serialize_exposed, SecretString};

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

/// Body of `POST /users`.
///
/// The platform insists on a password at creation even when the user will set
/// their own through a ticket; it is wiped when this value is dropped.
#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    pub connection: String,
    pub email: String,
    pub email_verified: bool,
    #[serde(serialize_with = "serialize_exposed")]
    pub password: SecretString,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

/// `GET /users?include_totals=true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsersPage {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub start: Option<u64>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub total: Option<u64>,
}

/// Page selector sent as `page`/`per_page` (totals are always requested).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub page: u32,
    pub per_page: u32,
}

impl From<usermgmt_core::PageRequest> for PageQuery {
    fn from(req: usermgmt_core::PageRequest) -> Self {
        Self {
            page: req.page(),
            per_page: req.size(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tickets
// ─────────────────────────────────────────────────────────────────────────────

/// Body of `POST /tickets/password-change`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordChangeTicketRequest {
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    pub ttl_sec: u64,
    pub mark_email_as_verified: bool,
    #[serde(rename = "includeEmailInRedirect")]
    pub include_email_in_redirect: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct PasswordChangeTicket {
    pub ticket: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Roles & permissions
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRole {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Body of `PATCH /roles/{id}`; absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RoleUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolesPage {
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub start: Option<u64>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub total: Option<u64>,
}

/// A scope granted to a role, qualified by the API that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub permission_name: String,
    pub resource_server_identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_server_name: Option<String>,
}

impl Permission {
    pub fn new(name: impl Into<String>, resource_server_identifier: impl Into<String>) -> Self {
        Self {
            permission_name: name.into(),
            resource_server_identifier: resource_server_identifier.into(),
            description: None,
            resource_server_name: None,
        }
    }
}

/// Body of `POST|DELETE /roles/{id}/permissions`.
#[derive(Debug, Serialize)]
pub(crate) struct PermissionsBody<'a> {
    pub permissions: Vec<PermissionRef<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PermissionRef<'a> {
    pub resource_server_identifier: &'a str,
    pub permission_name: &'a str,
}

/// Body of `POST|DELETE /users/{id}/roles`.
#[derive(Debug, Serialize)]
pub(crate) struct RolesBody<'a> {
    pub roles: &'a [RoleId],
}

// ─────────────────────────────────────────────────────────────────────────────
// Resource servers
// ─────────────────────────────────────────────────────────────────────────────

/// A named capability registered against an API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Scope {
    pub fn new(value: impl Into<String>, description: Option<String>) -> Self {
        Self {
            value: value.into(),
            description,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceServer {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub scopes: Vec<Scope>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ScopesBody<'a> {
    pub scopes: &'a [Scope],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_carries_password_on_the_wire_but_not_in_debug() {
        let user = NewUser {
            connection: "Username-Password-Authentication".into(),
            email: "a@example.com".into(),
            email_verified: false,
            password: SecretString::new("s3cret-value"),
        };

        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["password"], "s3cret-value");
        assert_eq!(json["email_verified"], false);
        assert!(!format!("{user:?}").contains("s3cret-value"));
    }

    #[test]
    fn ticket_request_uses_platform_field_names() {
        let req = PasswordChangeTicketRequest {
            user_id: UserId::new("auth0|1"),
            result_url: None,
            ttl_sec: 86_400,
            mark_email_as_verified: false,
            include_email_in_redirect: false,
        };

        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["includeEmailInRedirect"], false);
        assert_eq!(json["ttl_sec"], 86_400);
        assert!(json.get("result_url").is_none());
    }

    #[test]
    fn user_tolerates_missing_optional_fields() {
        let user: User = serde_json::from_str(r#"{"user_id":"auth0|x"}"#).unwrap();
        assert_eq!(user.user_id.as_str(), "auth0|x");
        assert!(user.email.is_none());
        assert!(user.last_login.is_none());
    }

    #[test]
    fn role_update_skips_absent_fields() {
        let update = RoleUpdate {
            name: Some("ops".into()),
            description: None,
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({ "name": "ops" }));
        assert!(RoleUpdate::default().is_empty());
    }
}
