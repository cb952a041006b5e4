use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Request, StatusCode},
    middleware::{from_fn_with_state, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use turngate_llm::prelude::Registry;
use turngate_store::prelude::{ChatTurn, MemoryHistoryStore};
use turngate_types::prelude::{Timestamp, UserId};

use crate::config::GatewayConfig;
use crate::context::ContextAssembler;
use crate::errors::GatewayError;
use crate::moderation::TermListFilter;
use crate::throttle::SlidingWindowThrottle;
use crate::turns::{ChatTunables, ChatTurnService};

#[derive(Clone)]
pub struct AppState {
    turns: Arc<ChatTurnService>,
    metrics: GatewayMetrics,
    version: VersionInfo,
}

impl AppState {
    pub fn new(config: &GatewayConfig) -> anyhow::Result<Self> {
        let mut registry = Registry::new();
        config.llm.install_providers(&mut registry)?;

        let store = Arc::new(MemoryHistoryStore::new());
        let assembler = ContextAssembler::new(
            store.clone(),
            config.chat.system_prompt.clone(),
            config.chat.context_turns,
        );
        let turns = ChatTurnService::new(
            Arc::new(registry),
            store,
            Arc::new(SlidingWindowThrottle::new(config.throttle.clone())),
            Arc::new(TermListFilter::new(&config.moderation)),
            assembler,
            ChatTunables {
                model_id: config.llm.default_model.clone(),
                temperature: config.llm.temperature,
                top_p: config.llm.top_p,
                max_tokens: config.llm.max_tokens,
                mode: config.chat.mode,
                history_limit: config.chat.history_limit,
            },
        );

        Ok(Self {
            turns: Arc::new(turns),
            metrics: GatewayMetrics::default(),
            version: VersionInfo::from_env(),
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .route("/metrics", get(metrics))
        .route("/v1/chat", post(submit_chat))
        .route("/v1/chat/history", get(chat_history).delete(clear_history))
        .layer(from_fn_with_state(state.clone(), metrics_middleware))
        .with_state(state)
}

/// Caller identity comes from the upstream authenticator; this stub maps
/// the bearer token straight to a user id at the service boundary.
fn authenticate(headers: &HeaderMap) -> Result<UserId, GatewayError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| GatewayError::unauthenticated("authorization header missing"))?;
    let token = header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| GatewayError::unauthenticated("bearer token missing"))?;
    Ok(UserId(token.to_string()))
}

#[derive(Deserialize)]
struct ChatSubmitPayload {
    message: String,
}

/// The turn fields callers may see.
#[derive(Serialize)]
struct TurnView {
    id: String,
    user_message: String,
    bot_response: String,
    timestamp: Timestamp,
    is_flagged: bool,
    model_used: String,
}

impl From<ChatTurn> for TurnView {
    fn from(turn: ChatTurn) -> Self {
        Self {
            id: turn.id.0,
            user_message: turn.user_message,
            bot_response: turn.bot_response,
            timestamp: turn.timestamp,
            is_flagged: turn.is_flagged,
            model_used: turn.model_used,
        }
    }
}

async fn submit_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ChatSubmitPayload>,
) -> Response {
    let user = match authenticate(&headers) {
        Ok(user) => user,
        Err(err) => return error_response(err),
    };
    match state.turns.submit(&user, &payload.message).await {
        Ok(turn) => (StatusCode::CREATED, Json(TurnView::from(turn))).into_response(),
        Err(err) => error_response(err),
    }
}

async fn chat_history(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user = match authenticate(&headers) {
        Ok(user) => user,
        Err(err) => return error_response(err),
    };
    match state.turns.recent(&user).await {
        Ok(turns) => {
            let turns: Vec<TurnView> = turns.into_iter().map(TurnView::from).collect();
            Json(serde_json::json!({ "turns": turns })).into_response()
        }
        Err(err) => error_response(err),
    }
}

async fn clear_history(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user = match authenticate(&headers) {
        Ok(user) => user,
        Err(err) => return error_response(err),
    };
    match state.turns.clear(&user).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: GatewayError) -> Response {
    let status =
        StatusCode::from_u16(err.0.http_status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        error!(code = err.code(), "request failed: {err}");
    } else {
        debug!(code = err.code(), "request rejected: {err}");
    }
    (status, Json(err.0.to_public())).into_response()
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

#[derive(Clone, Serialize)]
pub struct VersionInfo {
    version: String,
    commit: Option<String>,
}

impl VersionInfo {
    fn from_env() -> Self {
        Self {
            version: std::env::var("TURNGATE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            commit: std::env::var("GIT_COMMIT_HASH").ok(),
        }
    }
}

async fn version(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.version.clone())
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}

async fn metrics_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let path = req.uri().path().to_string();
    let start = Instant::now();
    let response = next.run(req).await;
    let status = response.status();
    state.metrics.record(&path, status, start.elapsed());
    Ok(response)
}

#[derive(Clone, Default)]
pub struct GatewayMetrics {
    inner: Arc<parking_lot::Mutex<MetricsInner>>,
}

#[derive(Default)]
struct MetricsInner {
    total_requests: u64,
    total_errors: u64,
    routes: HashMap<String, RouteStats>,
}

#[derive(Default)]
struct RouteStats {
    request_count: u64,
    error_count: u64,
    total_latency_ms: u64,
}

impl GatewayMetrics {
    fn record(&self, route: &str, status: StatusCode, latency: Duration) {
        let mut inner = self.inner.lock();
        inner.total_requests += 1;
        if status.is_client_error() || status.is_server_error() {
            inner.total_errors += 1;
        }
        let stats = inner.routes.entry(route.to_string()).or_default();
        stats.request_count += 1;
        if status.is_client_error() || status.is_server_error() {
            stats.error_count += 1;
        }
        stats.total_latency_ms += latency.as_millis() as u64;
    }

    fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.lock();
        let routes = inner
            .routes
            .iter()
            .map(|(route, stats)| RouteMetrics {
                route: route.clone(),
                requests: stats.request_count,
                errors: stats.error_count,
                avg_latency_ms: if stats.request_count > 0 {
                    Some(stats.total_latency_ms as f64 / stats.request_count as f64)
                } else {
                    None
                },
            })
            .collect();
        MetricsSnapshot {
            total_requests: inner.total_requests,
            total_errors: inner.total_errors,
            routes,
        }
    }
}

#[derive(Serialize)]
struct MetricsSnapshot {
    total_requests: u64,
    total_errors: u64,
    routes: Vec<RouteMetrics>,
}

#[derive(Serialize)]
struct RouteMetrics {
    route: String,
    requests: u64,
    errors: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    avg_latency_ms: Option<f64>,
}
