use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use keygate_api::app::{build_app, AppState};
use keygate_api::verifier::{TokenVerifier, VerifyError};
use keygate_auth::{PolicyRegistry, RawClaims, RolePermissions};

/// Verifier backed by a fixed token → claims table.
pub struct StaticVerifier {
    tokens: HashMap<String, RawClaims>,
}

impl StaticVerifier {
    pub fn new<'a>(tokens: impl IntoIterator<Item = (&'a str, serde_json::Value)>) -> Self {
        let tokens = tokens
            .into_iter()
            .map(|(token, claims)| {
                (token.to_string(), serde_json::from_value(claims).expect("claims object"))
            })
            .collect();
        Self { tokens }
    }
}

impl TokenVerifier for StaticVerifier {
    fn verify(&self, token: &str) -> Result<RawClaims, VerifyError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| VerifyError::Rejected("unknown token".into()))
    }
}

pub fn app(verifier: StaticVerifier) -> axum::Router {
    let registry = PolicyRegistry::standard(Arc::new(RolePermissions::standard()))
        .build()
        .expect("registry");
    build_app(AppState {
        registry: Arc::new(registry),
        verifier: Arc::new(verifier),
    })
    .expect("app")
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request")
}

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}
