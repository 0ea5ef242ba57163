use crate::error::{AppError, AppResult};
use crate::model_map::{self, ModelCache};
use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub const OPENROUTER_CHAT_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

const DEFAULT_LISTEN: &str = "127.0.0.1:8000";

#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<RuntimeConfig>,
    pub http: reqwest::Client,
    pub model_cache: ModelCache,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub listen: String,
    pub api_key: String,
    /// Fixed in production; overridable here so tests can point at an
    /// in-process upstream.
    pub upstream_url: String,
    pub verbose: bool,
}

impl RuntimeConfig {
    pub fn from_env() -> AppResult<Self> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                AppError::Config(
                    "OPENROUTER_API_KEY environment variable is not set. \
                     Please add it to your shell profile or environment."
                        .to_string(),
                )
            })?;
        let listen = std::env::var("PROXY_LISTEN")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LISTEN.to_string());
        Ok(Self {
            listen,
            api_key,
            upstream_url: OPENROUTER_CHAT_URL.to_string(),
            verbose: verbose_from_env(),
        })
    }
}

pub fn verbose_from_env() -> bool {
    std::env::var("PROXY_VERBOSE")
        .map(|v| v.to_ascii_lowercase() == "true")
        .unwrap_or(false)
}

pub fn load_state(runtime: RuntimeConfig) -> AppResult<AppState> {
    let http = reqwest::Client::builder()
        .user_agent("claude-code-proxy/0.1")
        .build()
        .map_err(|err| AppError::Config(format!("http client init failed: {err}")))?;
    Ok(AppState {
        runtime: Arc::new(runtime),
        http,
        model_cache: model_map::new_cache(),
    })
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/v1/messages", post(crate::handlers::create_message))
        .route(
            "/anthropic/v1/messages",
            post(crate::handlers::create_message),
        )
        .route("/health", get(crate::handlers::health))
        .with_state(state)
        .layer(SetRequestIdLayer::new(
            axum::http::header::HeaderName::from_static("x-request-id"),
            MakeRequestUuid,
        ))
        .layer(PropagateRequestIdLayer::new(
            axum::http::header::HeaderName::from_static("x-request-id"),
        ))
        .layer(TraceLayer::new_for_http())
}
