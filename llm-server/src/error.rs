//! Maps `DispatchError` onto the HTTP status codes and bodies §6
//! documents: 429 with `{message, reset_at, retry_after}` on rate-limit
//! deny, 400 on an unresolvable backend, 500 with
//! `{error_code, message, user_message, details}` for everything else.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use llm_dispatcher::DispatchError;
use serde_json::json;

pub struct ApiError(pub DispatchError);

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self.0 {
            DispatchError::RateLimited { retry_after_secs, reset_at_unix_ms } => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "message": "rate limit exceeded",
                    "reset_at": reset_at_unix_ms,
                    "retry_after": retry_after_secs,
                })),
            )
                .into_response(),
            DispatchError::NoSuchBackend(id) => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error_code": "no_such_backend",
                    "message": format!("no such backend: {id}"),
                    "user_message": "the requested model is not available",
                    "details": null,
                })),
            )
                .into_response(),
            DispatchError::ProviderError { status, body } => (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "error_code": "provider_error",
                    "message": format!("provider returned {status}: {body}"),
                    "user_message": "the model provider returned an error",
                    "details": { "provider_status": status },
                })),
            )
                .into_response(),
            other => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error_code": error_code(&other),
                    "message": other.to_string(),
                    "user_message": "something went wrong processing this request",
                    "details": null,
                })),
            )
                .into_response(),
        }
    }
}

fn error_code(err: &DispatchError) -> &'static str {
    match err {
        DispatchError::BackendUnavailable(_) => "backend_unavailable",
        DispatchError::DecodeError(_) => "decode_error",
        DispatchError::QueueTimeout => "queue_timeout",
        DispatchError::ExecutionTimeout => "execution_timeout",
        DispatchError::Cancelled => "cancelled",
        DispatchError::CacheUnavailable => "cache_unavailable",
        DispatchError::MetricsUnavailable => "metrics_unavailable",
        DispatchError::RateLimited { .. } | DispatchError::NoSuchBackend(_) | DispatchError::ProviderError { .. } => {
            unreachable!("handled by dedicated match arms above")
        }
    }
}
