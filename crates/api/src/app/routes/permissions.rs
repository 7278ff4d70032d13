use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/", get(list_permissions).put(replace_permissions))
}

/// GET /permissions - The whole scope catalogue as one page
pub async fn list_permissions(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let page = services.permissions.list().await;
    Json(page.map(dto::permission_to_json)).into_response()
}

/// PUT /permissions - Replace the scope catalogue
pub async fn replace_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::ReplacePermissionsRequest>,
) -> axum::response::Response {
    let definitions = body.permissions.into_iter().map(Into::into).collect();

    match services.permissions.replace(definitions).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
