use std::collections::BTreeSet;

use axum::http::StatusCode;
use serde::Deserialize;

use usermgmt_core::{PageRequest, RoleId, UserId};
use usermgmt_services::{PermissionDefinition, PermissionSummary, RoleSummary, UserSummary};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub size: Option<i64>,
}

impl PageParams {
    pub fn to_request(&self) -> PageRequest {
        PageRequest::normalized(
            self.page.unwrap_or(0),
            self.size.unwrap_or(i64::from(usermgmt_core::page::DEFAULT_PAGE_SIZE)),
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    pub connection: String,
    #[serde(default)]
    pub role_ids: Vec<String>,
    pub result_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRolesRequest {
    #[serde(default)]
    pub role_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub permissions: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionDefinitionRequest {
    pub permission_name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReplacePermissionsRequest {
    pub permissions: Vec<PermissionDefinitionRequest>,
}

impl From<PermissionDefinitionRequest> for PermissionDefinition {
    fn from(req: PermissionDefinitionRequest) -> Self {
        PermissionDefinition {
            name: req.permission_name,
            description: req.description,
        }
    }
}

// -------------------------
// Parsing helpers
// -------------------------

pub fn parse_user_id(raw: &str) -> Result<UserId, axum::response::Response> {
    raw.parse()
        .map_err(|e: usermgmt_core::DomainError| {
            errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string())
        })
}

pub fn parse_role_id(raw: &str) -> Result<RoleId, axum::response::Response> {
    raw.parse()
        .map_err(|e: usermgmt_core::DomainError| {
            errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string())
        })
}

pub fn parse_role_ids(raw: &[String]) -> Result<Vec<RoleId>, axum::response::Response> {
    raw.iter().map(|r| parse_role_id(r)).collect()
}

/// Trimmed, de-duplicated permission names.
pub fn permission_names(raw: Vec<String>) -> BTreeSet<String> {
    raw.into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn user_to_json(user: UserSummary) -> serde_json::Value {
    serde_json::json!({
        "id": user.id.as_str(),
        "email": user.email,
        "name": user.name,
        "picture": user.picture,
        "lastLogin": user.last_login,
        "roles": user.roles.into_iter().map(|r| serde_json::json!({
            "id": r.id.as_str(),
            "name": r.name,
        })).collect::<Vec<_>>(),
    })
}

pub fn role_to_json(role: RoleSummary) -> serde_json::Value {
    serde_json::json!({
        "id": role.id.as_str(),
        "name": role.name,
        "description": role.description,
        "permissions": role.permissions,
    })
}

pub fn permission_to_json(permission: PermissionSummary) -> serde_json::Value {
    serde_json::json!({
        "permissionName": permission.name,
        "description": permission.description,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use usermgmt_services::RoleRef;

    #[test]
    fn page_params_fall_back_to_defaults() {
        let req = PageParams::default().to_request();
        assert_eq!(req.page(), 0);
        assert_eq!(req.size(), 20);

        let req = PageParams {
            page: Some(-1),
            size: Some(0),
        }
        .to_request();
        assert_eq!(req.page(), 0);
        assert_eq!(req.size(), 20);
    }

    #[test]
    fn create_user_request_reads_camel_case() {
        let req: CreateUserRequest = serde_json::from_str(
            r#"{"email":"a@acme.test","connection":"db","roleIds":["rol_1"],"resultUrl":"https://x"}"#,
        )
        .unwrap();
        assert_eq!(req.role_ids, vec!["rol_1"]);
        assert_eq!(req.result_url.as_deref(), Some("https://x"));
    }

    #[test]
    fn user_json_uses_camel_case_keys() {
        let json = user_to_json(UserSummary {
            id: UserId::new("auth0|1"),
            email: Some("a@acme.test".into()),
            name: None,
            picture: None,
            last_login: Some("2024-01-01T00:00:00+00:00".into()),
            roles: vec![RoleRef {
                id: RoleId::new("rol_1"),
                name: Some("admin".into()),
            }],
        });
        assert_eq!(json["lastLogin"], "2024-01-01T00:00:00+00:00");
        assert_eq!(json["roles"][0]["name"], "admin");
    }

    #[test]
    fn blank_role_ids_are_rejected() {
        assert!(parse_role_ids(&["rol_1".into(), " ".into()]).is_err());
        assert_eq!(permission_names(vec![" a ".into(), "a".into(), "".into()]).len(), 1);
    }
}
