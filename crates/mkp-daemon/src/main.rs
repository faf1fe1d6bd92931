//! mkp-daemon entry point.
//!
//! Sets up tracing, loads configuration and secrets, wires the reconciler to
//! its record store and the Procurement API, then serves the push endpoint.
//! Route handlers live in `routes.rs`; shared state types in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use mkp_config::{ConfigMode, Settings, UnusedKeyPolicy};
use mkp_daemon::{routes, state};
use mkp_procurement::{ProcurementApi, ProcurementClient};
use mkp_reconcile::{ReconcilePolicy, Reconciler};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

const DEFAULT_CONFIG_PATH: &str = "config/reconciler.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience). Production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let paths = config_paths();
    let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let loaded = mkp_config::load_layered_yaml(&path_refs)
        .with_context(|| format!("load config {:?}", paths))?;

    let unused = mkp_config::report_unused_keys(
        ConfigMode::Reconcile,
        &loaded.config_json,
        UnusedKeyPolicy::Warn,
    )?;
    if !unused.is_clean() {
        warn!(keys = ?unused.unused_leaf_pointers, "config keys not read by the daemon");
    }

    let secrets = mkp_config::resolve_secrets(&loaded.config_json, ConfigMode::Reconcile)?;
    let settings = Settings::from_config_json(&loaded.config_json)?;

    let store = mkp_store::open_from_settings(&settings.store, &secrets)
        .await
        .context("open record store")?;
    let procurement: Arc<dyn ProcurementApi> =
        Arc::new(ProcurementClient::from_settings(&settings.procurement, &secrets)?);
    let policy = ReconcilePolicy::from_settings(&settings.reconcile)?;

    info!(
        config_hash = %loaded.config_hash,
        store = store.kind(),
        signup_policy = policy.signup.as_str(),
        cancellation_policy = policy.cancellation.as_str(),
        "reconciler configured"
    );

    let reconciler = Reconciler::new(store, procurement).with_policy(policy);
    let shared = Arc::new(state::AppState::new(reconciler).with_config_hash(loaded.config_hash));

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_override(std::env::var("MKP_DAEMON_ADDR").ok().as_deref())?
        .unwrap_or(settings.bind_addr);
    info!("mkp-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// `MKP_CONFIG` is a comma-separated list of YAML layers, base first.
fn config_paths() -> Vec<String> {
    match std::env::var("MKP_CONFIG") {
        Ok(v) if !v.trim().is_empty() => v
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect(),
        _ => vec![DEFAULT_CONFIG_PATH.to_string()],
    }
}

/// `MKP_DAEMON_ADDR` overrides `/daemon/bind_addr`; unset or blank means no override.
fn bind_addr_override(raw: Option<&str>) -> anyhow::Result<Option<SocketAddr>> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .with_context(|| format!("invalid MKP_DAEMON_ADDR {v:?}")),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "ctrl-c handler failed; serving until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_addr_override_parses_or_fails_loudly() {
        assert_eq!(bind_addr_override(None).unwrap(), None);
        assert_eq!(bind_addr_override(Some("  ")).unwrap(), None);
        assert_eq!(
            bind_addr_override(Some("127.0.0.1:8899")).unwrap(),
            Some("127.0.0.1:8899".parse().unwrap())
        );

        let err = bind_addr_override(Some("localhost:eighty")).unwrap_err();
        assert!(format!("{err:#}").contains("MKP_DAEMON_ADDR"), "got {err:#}");
    }
}
