//! Core library for pangpt. Wires the relay pipeline, shared state and the
//! HTTP handlers that receive firewall log events.

mod config;
pub mod completion;
pub mod error;
pub mod metrics;
pub mod prompt;
pub mod relay;
pub mod slack;

pub use config::AppConfig;

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{
    rejection::{BytesRejection, FailedToBufferBody, JsonRejection},
    DefaultBodyLimit, State,
};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::completion::{CompletionClient, OpenAiClient};
use crate::metrics::RelayMetrics;
use crate::prompt::{EndpointKind, LogEvent};
use crate::relay::Relay;
use crate::slack::{ChatPublisher, SlackPublisher};

/// Body of every non-success response.
#[derive(Debug, Serialize, Clone, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub detail: String,
}

/// State shared by all handlers. Cloned per request; everything inside is
/// either immutable or atomic.
#[derive(Clone)]
pub struct AppState {
    pub relay: Relay,
    pub metrics: Arc<RelayMetrics>,
    /// Maximum accepted request body size in bytes (None => axum default)
    pub max_request_bytes: Option<usize>,
    openapi: Arc<OnceCell<serde_json::Value>>,
}

impl AppState {
    pub fn new(relay: Relay, max_request_bytes: Option<usize>) -> Self {
        Self {
            relay,
            metrics: Arc::new(RelayMetrics::new()),
            max_request_bytes,
            openapi: Arc::new(OnceCell::new()),
        }
    }
}

/// Build state from an already loaded configuration, constructing the
/// OpenAI and Slack clients it describes.
pub fn build_state(config: AppConfig) -> anyhow::Result<AppState> {
    let completion: Arc<dyn CompletionClient> = Arc::new(OpenAiClient::new(&config.completion)?);
    let publisher: Arc<dyn ChatPublisher> = Arc::new(SlackPublisher::new(&config.slack)?);
    tracing::info!(
        model = %config.completion.model,
        channel = %config.slack.channel,
        completion_timeout_ms = config.completion.timeout_ms,
        chat_timeout_ms = config.slack.timeout_ms,
        "relay configured"
    );
    let relay = Relay::new(completion, publisher, config.slack.channel);
    Ok(AppState::new(relay, config.max_request_bytes))
}

/// Build state from environment variables. See [`AppConfig::from_env`] for
/// the variables read; missing credentials fail here rather than on the
/// first request.
pub async fn build_state_from_env() -> anyhow::Result<AppState> {
    build_state(AppConfig::from_env()?)
}

/// Build the Axum router and attach handlers.
pub fn app(state: AppState) -> Router {
    let max_request_bytes = state.max_request_bytes;

    let router = Router::new()
        .route(EndpointKind::Decryption.path(), post(decryption_handler))
        .route(EndpointKind::GlobalProtect.path(), post(globalprotect_handler))
        .route("/openapi.json", get(openapi_handler))
        .route("/healthz", get(healthz_handler))
        .route("/metrics", get(metrics_handler));

    let router = if let Some(limit) = max_request_bytes {
        router.layer(DefaultBodyLimit::max(limit))
    } else {
        router
    };

    router
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn respond_with_error(status: StatusCode, detail: impl Into<String>) -> Response {
    let err = ErrorResponse {
        detail: detail.into(),
    };
    (status, Json(err)).into_response()
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ChatGPT API",
        version = "0.1.0",
        description = "API for interacting with OpenAI's GPT-3 chatbot"
    ),
    paths(decryption_handler, globalprotect_handler),
    components(schemas(ErrorResponse, LogEvent))
)]
struct ApiDoc;

/// Decryption Message Receiver
///
/// Troubleshoots a PAN-OS decryption log and posts the answer to Slack.
#[utoipa::path(
    post,
    path = "/pangpt/decryption/",
    operation_id = "decryption_message_receiver",
    request_body = LogEvent,
    responses(
        (status = 200, description = "Relayed to Slack", body = u16),
        (status = 400, description = "Malformed log event", body = ErrorResponse),
        (status = 413, description = "Request body too large", body = ErrorResponse),
        (status = 500, description = "Internal Server Error", body = ErrorResponse)
    )
)]
async fn decryption_handler(
    State(state): State<AppState>,
    payload: Result<Json<LogEvent>, JsonRejection>,
) -> Response {
    relay_event(&state, EndpointKind::Decryption, payload).await
}

/// Globalprotect Message Receiver
///
/// Troubleshoots a GlobalProtect log and posts the answer to Slack.
#[utoipa::path(
    post,
    path = "/pangpt/globalprotect/",
    operation_id = "globalprotect_message_receiver",
    request_body = LogEvent,
    responses(
        (status = 200, description = "Relayed to Slack", body = u16),
        (status = 400, description = "Malformed log event", body = ErrorResponse),
        (status = 413, description = "Request body too large", body = ErrorResponse),
        (status = 500, description = "Internal Server Error", body = ErrorResponse)
    )
)]
async fn globalprotect_handler(
    State(state): State<AppState>,
    payload: Result<Json<LogEvent>, JsonRejection>,
) -> Response {
    relay_event(&state, EndpointKind::GlobalProtect, payload).await
}

/// Runs one log event through the relay. Upstream failures are logged with
/// full detail but the caller only ever sees a generic 500.
async fn relay_event(
    state: &AppState,
    kind: EndpointKind,
    payload: Result<Json<LogEvent>, JsonRejection>,
) -> Response {
    state.metrics.record_request(kind);
    let event = match payload {
        Ok(Json(inner)) => inner,
        Err(rejection) => {
            state.metrics.record_bad_request();
            return handle_json_rejection(state, kind, rejection);
        }
    };

    let start = Instant::now();
    let result = state.relay.handle(kind, &event).await;
    state
        .metrics
        .observe_latency_ms(start.elapsed().as_millis() as u64);

    match result {
        Ok(()) => {
            state.metrics.record_relayed(kind);
            (StatusCode::OK, Json(StatusCode::OK.as_u16())).into_response()
        }
        Err(err) => {
            let stage = err.stage();
            state.metrics.record_failure(stage);
            let upstream = err.upstream();
            tracing::error!(
                %kind,
                stage = stage.as_str(),
                service = %upstream.service(),
                timeout = upstream.is_timeout(),
                error = %err,
                "relay failed"
            );
            respond_with_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

fn handle_json_rejection(state: &AppState, kind: EndpointKind, rejection: JsonRejection) -> Response {
    match rejection {
        JsonRejection::BytesRejection(BytesRejection::FailedToBufferBody(
            FailedToBufferBody::LengthLimitError(_),
        )) => {
            tracing::warn!(%kind, limit = ?state.max_request_bytes, "request body exceeded limit");
            respond_with_error(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
        }
        other => {
            let detail = other.body_text();
            tracing::warn!(%kind, %detail, "rejected log event body");
            respond_with_error(StatusCode::BAD_REQUEST, detail)
        }
    }
}

/// Schema is generated on first request and reused afterwards.
async fn openapi_handler(State(state): State<AppState>) -> Response {
    let doc = state.openapi.get_or_init(openapi_document);
    (StatusCode::OK, Json(doc.clone())).into_response()
}

fn openapi_document() -> serde_json::Value {
    serde_json::to_value(ApiDoc::openapi()).unwrap_or_else(|err| {
        tracing::error!(error = %err, "failed to serialize openapi document");
        serde_json::json!({})
    })
}

/// Simple health endpoint for container readiness / liveness checks.
async fn healthz_handler(State(state): State<AppState>) -> Response {
    let json = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.relay.model(),
    });
    (StatusCode::OK, Json(json)).into_response()
}

/// Prometheus-style metrics exposition.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    let body = state.metrics.render(state.relay.model());
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4",
        )],
        body,
    )
        .into_response()
}
