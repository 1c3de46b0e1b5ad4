use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::{config::OverlayConfig, kick, store::ConfigStore};

#[derive(Clone)]
struct ApiState {
    store: Arc<ConfigStore>,
    client: reqwest::Client,
}

/// Local config collaborator: saves shareable overlay configs under
/// short IDs and proxies Kick channel metadata so browser consumers
/// are not blocked by CORS. The overlay engine itself never calls
/// this; it receives a fully-resolved config at startup.
pub async fn run_api_server(bind: &str, store: ConfigStore) -> Result<()> {
    let state = ApiState {
        store: Arc::new(store),
        client: kick::http_client()?,
    };
    let app = Router::new()
        .route("/api/overlay/config", post(create_config))
        .route("/api/overlay/config/:id", get(get_config))
        .route("/api/kick/channel/:slug", get(kick_channel))
        .route("/health", get(|| async { "ok" }))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid api bind address: {bind}"))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed binding api listener on {addr}"))?;
    info!("config api listening on http://{addr}");
    axum::serve(listener, app)
        .await
        .context("axum serve failed")?;
    Ok(())
}

async fn create_config(
    State(state): State<ApiState>,
    Json(config): Json<OverlayConfig>,
) -> Result<Json<Value>, StatusCode> {
    match state.store.save(&config.sanitized()) {
        Ok(id) => Ok(Json(json!({ "id": id, "message": "Config saved" }))),
        Err(err) => {
            error!(?err, "failed saving overlay config");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn get_config(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<OverlayConfig>, StatusCode> {
    match state.store.load(&id) {
        Ok(Some(config)) => Ok(Json(config)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(err) => {
            warn!(?err, id = %id, "rejected config lookup");
            Err(StatusCode::NOT_FOUND)
        }
    }
}

async fn kick_channel(
    State(state): State<ApiState>,
    Path(slug): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    match kick::fetch_channel(&state.client, &slug).await {
        Ok(body) => Ok(Json(body)),
        Err(err) => {
            warn!(?err, slug = %slug, "kick channel proxy lookup failed");
            Err(StatusCode::BAD_GATEWAY)
        }
    }
}
