use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::app::errors::ApiError;
use crate::context::PrincipalContext;
use crate::verifier::TokenVerifier;

#[derive(Clone)]
pub struct AuthState {
    pub verifier: Arc<dyn TokenVerifier>,
}

/// Verify the bearer token, normalize its claims and attach the principal.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(req.headers())?;

    let claims = state.verifier.verify(token).inspect_err(|e| {
        tracing::debug!(error = %e, "bearer token rejected");
    })?;
    let principal = keygate_auth::normalize(claims)?;

    tracing::debug!(
        subject = %principal.subject,
        roles = ?principal.roles.to_strings(),
        "principal authenticated"
    );

    req.extensions_mut().insert(PrincipalContext::new(principal));

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, ApiError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| ApiError::Unauthenticated("missing Authorization header".into()))?;

    let header = header
        .to_str()
        .map_err(|_| ApiError::Unauthenticated("Authorization header is not valid ASCII".into()))?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthenticated("expected a Bearer token".into()))?;

    let token = header.trim();
    if token.is_empty() {
        return Err(ApiError::Unauthenticated("empty bearer token".into()));
    }

    Ok(token)
}
