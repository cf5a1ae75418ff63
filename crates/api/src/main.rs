use std::sync::Arc;

use anyhow::{bail, Context};

use keygate_api::app::{build_app, AppState};
use keygate_api::config::{ApiConfig, ENV_INSECURE_DEV_DECODE};
use keygate_api::verifier::{TokenVerifier, UnverifiedDecoder};
use keygate_auth::{PolicyRegistry, RolePermissions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ApiConfig::from_env().context("invalid configuration")?;
    keygate_observability::init(&config.log);

    let verifier: Arc<dyn TokenVerifier> = if config.insecure_dev_decode {
        tracing::warn!("{ENV_INSECURE_DEV_DECODE}=1: token signatures are NOT verified");
        Arc::new(UnverifiedDecoder)
    } else {
        bail!("no token verifier configured; set {ENV_INSECURE_DEV_DECODE}=1 for local development");
    };

    let permissions = Arc::new(RolePermissions::standard());
    let registry = PolicyRegistry::standard(permissions)
        .permission_claim(config.permission_claim.clone())
        .build()
        .context("invalid policy registry")?;

    let app = build_app(AppState {
        registry: Arc::new(registry),
        verifier,
    })
    .context("router references unregistered policies")?;

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
