use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use usermgmt_services::ProvisionRequest;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_user).get(list_users))
        .route("/:id", get(get_user).put(update_user_roles).delete(delete_user))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// POST /users - Provision a user and return their password-setup link
pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateUserRequest>,
) -> axum::response::Response {
    let role_ids = match dto::parse_role_ids(&body.role_ids) {
        Ok(ids) => ids,
        Err(resp) => return resp,
    };

    let request = ProvisionRequest {
        email: body.email,
        connection: body.connection,
        role_ids,
        result_url: body.result_url,
    };

    match services.users.provision(&request).await {
        Ok(result) => (
            StatusCode::OK,
            Json(serde_json::json!({ "ticketUrl": result.ticket_url })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// GET /users?page&size - One page of users with their roles
pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<dto::PageParams>,
) -> axum::response::Response {
    match services.users.list(params.to_request()).await {
        Ok(page) => Json(page.map(dto::user_to_json)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// GET /users/:id
pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_user_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.users.get(&id).await {
        Ok(Some(user)) => Json(dto::user_to_json(user)).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "user not found"),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// PUT /users/:id - Replace the user's role assignments
pub async fn update_user_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateUserRolesRequest>,
) -> axum::response::Response {
    let id = match dto::parse_user_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let role_ids = match dto::parse_role_ids(&body.role_ids) {
        Ok(ids) => ids,
        Err(resp) => return resp,
    };

    match services.users.update_roles(&id, &role_ids).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// DELETE /users/:id
pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_user_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.users.delete(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
