use axum::Router;

pub mod permissions;
pub mod roles;
pub mod system;
pub mod users;

/// Router for the versioned management endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/users", users::router())
        .nest("/roles", roles::router())
        .nest("/permissions", permissions::router())
}
