use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use usermgmt_services::RoleChanges;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_role).get(list_roles))
        .route("/:id", get(get_role).put(update_role).delete(delete_role))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// POST /roles
pub async fn create_role(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateRoleRequest>,
) -> axum::response::Response {
    match services.roles.create(&body.name, body.description).await {
        Ok(role) => (StatusCode::CREATED, Json(dto::role_to_json(role))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// GET /roles?page&size - One page of roles with their permissions
pub async fn list_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<dto::PageParams>,
) -> axum::response::Response {
    match services.roles.list(params.to_request()).await {
        Ok(page) => Json(page.map(dto::role_to_json)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// GET /roles/:id
pub async fn get_role(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_role_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.roles.get(&id).await {
        Ok(Some(role)) => Json(dto::role_to_json(role)).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "role not found"),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// PUT /roles/:id - Patch details; `permissions`, when present, becomes the
/// exact permission set of the role
pub async fn update_role(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateRoleRequest>,
) -> axum::response::Response {
    let id = match dto::parse_role_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let changes = RoleChanges {
        name: body.name,
        description: body.description,
        permissions: body.permissions.map(dto::permission_names),
    };

    match services.roles.update(&id, changes).await {
        Ok(Some(role)) => Json(dto::role_to_json(role)).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "role not found"),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// DELETE /roles/:id
pub async fn delete_role(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_role_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.roles.delete(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
