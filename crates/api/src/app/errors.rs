use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use thiserror::Error;

use keygate_auth::{AuthzError, ClaimsError};

use crate::verifier::VerifyError;

/// Request-level failures, mapped onto HTTP responses.
///
/// `Unauthenticated` (401) and `Forbidden` (403) are kept distinct: the first
/// means no usable identity, the second an identity that a policy denied.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error(transparent)]
    Forbidden(#[from] AuthzError),
}

impl From<VerifyError> for ApiError {
    fn from(err: VerifyError) -> Self {
        Self::Unauthenticated(err.to_string())
    }
}

impl From<ClaimsError> for ApiError {
    fn from(err: ClaimsError) -> Self {
        Self::Unauthenticated(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            Self::Unauthenticated(msg) => json_error(StatusCode::UNAUTHORIZED, "unauthenticated", msg),
            Self::Forbidden(err) => json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string()),
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
