//! HTTP API application wiring (Axum router + shared state).
//!
//! - `routes/`: HTTP routes + handlers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;

use keygate_auth::{PolicyError, PolicyRegistry};

use crate::middleware;
use crate::verifier::TokenVerifier;

pub mod errors;
pub mod routes;

/// Process-wide, read-only state shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<PolicyRegistry>,
    pub verifier: Arc<dyn TokenVerifier>,
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Fails when a route is guarded by a policy the registry does not know.
pub fn build_app(state: AppState) -> Result<Router, PolicyError> {
    let auth_state = middleware::AuthState {
        verifier: state.verifier,
    };

    // Auth runs outermost so every handler and policy guard sees a principal.
    let app = routes::router(&state.registry)?.layer(
        ServiceBuilder::new()
            .layer(axum::middleware::from_fn_with_state(
                auth_state,
                middleware::auth_middleware,
            ))
            .layer(Extension(state.registry)),
    );

    Ok(app)
}
