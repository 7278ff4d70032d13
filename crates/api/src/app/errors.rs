use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::error;

use usermgmt_identity::ManagementError;
use usermgmt_services::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        ServiceError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        e @ ServiceError::ProvisioningFailed { .. } => {
            error!(error = %e, "user provisioning failed");
            json_error(StatusCode::BAD_GATEWAY, "provisioning_failed", e.to_string())
        }
        e @ ServiceError::ReconciliationFailed { .. } => {
            error!(error = %e, "role permission reconciliation failed");
            json_error(StatusCode::BAD_GATEWAY, "reconciliation_failed", e.to_string())
        }
        ServiceError::Management(ManagementError::Credential(e)) => {
            error!(error = %e, "no usable management API credential");
            json_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "credential_unavailable",
                e.to_string(),
            )
        }
        ServiceError::Management(e) => {
            error!(error = %e, "identity platform call failed");
            json_error(StatusCode::BAD_GATEWAY, "identity_platform_error", e.to_string())
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
