//! HTTP and websocket surface over the install engine.
//!
//! Every route is a GET. Mutating routes forward to `InstallManager` and map
//! its rejections onto status codes through `ApiError`.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use axum::extract::{Query, Request, State, WebSocketUpgrade};
use axum::middleware::{from_fn, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use lunapatch_core::{Options, OptionsRequest, RunSnapshot, ServerConfig, Step, TargetLayout};
use lunapatch_installer::{BroadcastSink, InstallManager, InstallPaths};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::api_errors::ApiError;
use crate::browser::open_url;
use crate::shutdown_signal::shutdown_signal;
use crate::socket::forward_events;

#[derive(Clone)]
pub(super) struct AppState {
    manager: InstallManager,
    sink: BroadcastSink,
    paths: InstallPaths,
}

impl AppState {
    pub(super) fn new(manager: InstallManager, sink: BroadcastSink, paths: InstallPaths) -> Self {
        Self {
            manager,
            sink,
            paths,
        }
    }
}

#[derive(Debug, Serialize)]
struct PlanResponse {
    steps: Vec<Step>,
}

#[derive(Debug, Serialize)]
struct StartResponse {
    started: bool,
    steps: Vec<Step>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstalledQuery {
    overwrite_path: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InstalledResponse {
    is_installed: bool,
    target_dir: Option<PathBuf>,
}

pub(super) fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(connect))
        .route("/state", get(run_state))
        .route("/setOptions", get(set_options))
        .route("/generateSteps", get(generate_steps))
        .route("/start", get(start))
        .route("/isInstalled", get(is_installed))
        .layer(from_fn(request_log_middleware))
        .with_state(state)
}

/// Binds the listener, optionally opens the browser, and serves until shutdown.
pub(super) async fn serve(config: &ServerConfig, state: AppState) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {}", addr))?;
    let local: SocketAddr = listener.local_addr().context("read listener address")?;
    let url = config.url();
    info!(%local, %url, "installer server listening");

    if config.open_browser {
        if let Err(err) = open_url(&url) {
            warn!(error = %format!("{:#}", err), %url, "failed to open browser");
        }
    }

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve http")?;
    info!("installer server stopped");
    Ok(())
}

async fn request_log_middleware(request: Request, next: Next) -> Response {
    info!(
        method = %request.method(),
        path = request.uri().path(),
        "installer_api_request"
    );
    next.run(request).await
}

async fn connect(State(state): State<AppState>, upgrade: Option<WebSocketUpgrade>) -> Response {
    match upgrade {
        Some(upgrade) => {
            let events = state.sink.subscribe();
            upgrade
                .on_upgrade(move |socket| forward_events(socket, events))
                .into_response()
        }
        None => "lunapatch installer: connect with a websocket for progress events".into_response(),
    }
}

async fn run_state(State(state): State<AppState>) -> Json<RunSnapshot> {
    Json(state.manager.snapshot())
}

async fn set_options(
    State(state): State<AppState>,
    Query(request): Query<OptionsRequest>,
) -> Result<Json<Options>, ApiError> {
    let options = state.manager.set_options(request)?;
    Ok(Json(options))
}

async fn generate_steps(State(state): State<AppState>) -> Result<Json<PlanResponse>, ApiError> {
    let steps = state.manager.generate_steps()?;
    Ok(Json(PlanResponse { steps }))
}

async fn start(State(state): State<AppState>) -> Result<Json<StartResponse>, ApiError> {
    let steps = state.manager.generate_steps()?;
    state.manager.start()?;
    Ok(Json(StartResponse {
        started: true,
        steps,
    }))
}

async fn is_installed(
    State(state): State<AppState>,
    Query(query): Query<InstalledQuery>,
) -> Result<Json<InstalledResponse>, ApiError> {
    let overwrite = query.overwrite_path.or_else(|| {
        state
            .manager
            .options()
            .and_then(|options| options.overwrite_path)
    });
    let paths = state.paths.clone();
    let response = tokio::task::spawn_blocking(move || {
        let target_dir = paths.target_dir_for(overwrite.as_deref());
        let is_installed = target_dir
            .as_ref()
            .map(|dir| TargetLayout::new(dir).is_installed())
            .unwrap_or(false);
        InstalledResponse {
            is_installed,
            target_dir,
        }
    })
    .await
    .map_err(|err| ApiError::internal(format!("install check failed: {}", err)))?;
    Ok(Json(response))
}
