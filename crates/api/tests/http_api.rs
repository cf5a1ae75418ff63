mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::{app, get, read_json, StaticVerifier};
use keygate_api::app::{build_app, AppState};
use keygate_api::authz::require_policy;
use keygate_auth::{PolicyError, PolicyRegistry, RolePermissions};
use serde_json::json;
use tower::ServiceExt;

fn verifier() -> StaticVerifier {
    StaticVerifier::new([
        (
            "admin-token",
            json!({
                "sub": "u-admin",
                "preferred_username": "ada",
                "email": "ada@example.com",
                "realm_access": { "roles": ["admin"] },
                "resource_access": { "billing-api": { "roles": ["viewer"] } }
            }),
        ),
        (
            "user-token",
            json!({
                "sub": "u-user",
                "realm_access": { "roles": ["user"] },
                "permissions": "write"
            }),
        ),
        (
            "service-token",
            json!({
                "sub": "svc-reports",
                "realm_access": "not-an-object",
                "permissions": ["manage"]
            }),
        ),
        ("anonymous-token", json!({ "realm_access": { "roles": ["admin"] } })),
    ])
}

#[tokio::test]
async fn missing_or_unknown_token_is_unauthenticated() {
    let app = app(verifier());

    let response = app.clone().oneshot(get("/me", None)).await.expect("me");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(read_json(response).await["error"], "unauthenticated");

    let response = app.clone().oneshot(get("/me", Some("forged"))).await.expect("me");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.oneshot(get("/me", Some("anonymous-token"))).await.expect("me");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_reports_normalized_roles_and_permissions() {
    let app = app(verifier());

    let response = app.oneshot(get("/me", Some("admin-token"))).await.expect("me");
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["subject"], "u-admin");
    assert_eq!(body["username"], "ada");
    assert_eq!(body["roles"], json!(["admin", "billing-api:viewer"]));
    assert_eq!(body["permissions"], json!(["delete", "manage", "read", "write"]));
}

#[tokio::test]
async fn guarded_route_distinguishes_forbidden_from_unauthenticated() {
    let app = app(verifier());

    let response = app
        .clone()
        .oneshot(get("/authz/policies", Some("admin-token")))
        .await
        .expect("policies");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let names: Vec<&str> = body["policies"]
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|p| p["name"].as_str())
        .collect();
    assert!(names.contains(&"AdminOnly"));
    assert!(names.contains(&"CanWrite"));

    let response = app
        .clone()
        .oneshot(get("/authz/policies", Some("user-token")))
        .await
        .expect("policies");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(read_json(response).await["error"], "forbidden");

    let response = app.oneshot(get("/authz/policies", None)).await.expect("policies");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn explicit_permission_claim_opens_permission_guard() {
    let app = app(verifier());

    // Malformed realm_access contributes no roles; the explicit claim still grants.
    let response = app
        .clone()
        .oneshot(get("/authz/roles", Some("service-token")))
        .await
        .expect("roles");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["roles"].as_array().map(Vec::len), Some(4));

    let response = app.oneshot(get("/authz/roles", Some("user-token"))).await.expect("roles");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn check_endpoint_evaluates_named_policies() {
    let app = app(verifier());

    let cases = [
        ("admin-token", "AdminOnly", true),
        ("admin-token", "ManagerOnly", false),
        ("user-token", "CanRead", true),
        ("user-token", "CanWrite", false),
        ("user-token", "NoSuchPolicy", false),
    ];

    for (token, policy, expected) in cases {
        let uri = format!("/authz/check/{policy}");
        let response = app.clone().oneshot(get(&uri, Some(token))).await.expect("check");
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["allowed"], expected, "{token} -> {policy}");
    }
}

#[tokio::test]
async fn explain_endpoint_reports_denial() {
    let app = app(verifier());

    let response = app
        .oneshot(get("/authz/explain/CanWrite", Some("user-token")))
        .await
        .expect("explain");
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["granted"], false);
    assert_eq!(body["principal"]["explicit_claim_unparseable"], true);
    assert_eq!(body["denial_reason"]["kind"], "missing_permission");
    assert_eq!(body["denial_reason"]["permission"], "write");
}

#[test]
fn startup_rejects_router_with_unregistered_policy() {
    let registry = PolicyRegistry::builder(Arc::new(RolePermissions::standard()))
        .require_roles("AdminOnly", ["admin"])
        .build()
        .expect("registry");

    let result = build_app(AppState {
        registry: Arc::new(registry),
        verifier: Arc::new(verifier()),
    });

    match result {
        Err(PolicyError::Unregistered(missing)) => assert_eq!(missing, vec!["CanManage".to_string()]),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected startup validation to fail"),
    }
}

#[test]
fn misspelled_guard_fails_router_construction() {
    let registry = PolicyRegistry::standard(Arc::new(RolePermissions::standard()))
        .build()
        .expect("registry");
    let registry = Arc::new(registry);

    let guarded = require_policy::<()>(&registry, "AdminOnyl", axum::routing::get(|| async { "ok" }))
        .map(|route| axum::Router::new().route("/admin", route));

    match guarded {
        Err(PolicyError::Unregistered(missing)) => assert_eq!(missing, vec!["AdminOnyl".to_string()]),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected the misspelled guard to be rejected"),
    }
}
