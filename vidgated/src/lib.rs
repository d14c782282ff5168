use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{RawQuery, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use clap::Parser;
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;

use vidgate_core::{
    handle, load_vidgate_config, PlaybackContext, PlaybackError, PlaybackRequest, ResolveError,
};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] vidgate_core::ConfigError),
    #[error("playback setup error: {0}")]
    Playback(#[from] PlaybackError),
    #[error("invalid listen address: {0}")]
    ListenAddr(#[from] std::net::AddrParseError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Streaming reverse proxy for googlevideo playback", long_about = None)]
pub struct Cli {
    /// Path to vidgate.toml
    #[arg(long, default_value = "configs/vidgate.toml")]
    pub config: PathBuf,
}

#[derive(Clone)]
struct AppState {
    context: Arc<PlaybackContext>,
}

pub fn router(context: Arc<PlaybackContext>) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/videoplayback", get(videoplayback).options(preflight))
        .with_state(AppState { context })
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = load_vidgate_config(&cli.config)?;
    let context = Arc::new(PlaybackContext::from_config(&config)?);
    let app = router(context);
    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(target: "vidgated", %addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::warn!(target: "vidgated", "failed to install ctrl-c handler: {err}");
    }
}

async fn status() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "endpoint": "/videoplayback" }))
}

async fn preflight() -> Response {
    let mut response = Response::new(Body::from("OK"));
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Range"),
    );
    response
}

async fn videoplayback(
    State(state): State<AppState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    let request = PlaybackRequest {
        params: query_params(query.as_deref()),
        range: headers
            .get(header::RANGE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned),
    };
    match handle(&state.context, request).await {
        Ok(envelope) => {
            let mut response = Response::new(Body::from_stream(envelope.body));
            *response.status_mut() = envelope.status;
            *response.headers_mut() = envelope.headers;
            response
        }
        Err(error) => error_response(error),
    }
}

/// Query parameters with last-value-wins semantics on duplicate keys.
fn query_params(query: Option<&str>) -> HashMap<String, String> {
    let mut params = HashMap::new();
    if let Some(query) = query {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            params.insert(key.into_owned(), value.into_owned());
        }
    }
    params
}

fn error_response(error: PlaybackError) -> Response {
    match error {
        PlaybackError::Resolve(ResolveError::Forbidden { headers, body }) => {
            // The upstream refusal goes back to the client as-is.
            let mut response = Response::new(Body::from(body));
            *response.status_mut() = StatusCode::FORBIDDEN;
            *response.headers_mut() = headers;
            response
        }
        error => {
            let status = error.status();
            tracing::warn!(target: "vidgated", %error, %status, "playback request failed");
            (status, error.to_string()).into_response()
        }
    }
}
