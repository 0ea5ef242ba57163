use crate::app::AppState;
use crate::error::{AppError, AppResult};
use crate::protocol::anthropic::MessagesRequest;
use crate::protocol::openrouter::ChatResponse;
use crate::stream;
use crate::translate;
use crate::upstream;
use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::HeaderName;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::StreamExt;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Shared handler for `POST /v1/messages` and `POST /anthropic/v1/messages`.
pub async fn create_message(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> AppResult<Response> {
    if body.get("messages").is_none() {
        return Err(AppError::InvalidRequest(
            "Missing required field: messages".to_string(),
        ));
    }

    let req: MessagesRequest = serde_json::from_value(body)
        .map_err(|err| AppError::InvalidRequest(format!("invalid request body: {err}")))?;

    let original_model = req
        .model
        .clone()
        .unwrap_or_else(|| translate::DEFAULT_ECHO_MODEL.to_string());
    let outbound = translate::translate_request(&req, &state.model_cache);
    // Branch on the inbound flag, not anything the upstream reports.
    let is_streaming = outbound.stream.unwrap_or(false);

    tracing::debug!(
        model = %original_model,
        upstream_model = %outbound.model,
        streaming = is_streaming,
        "forwarding request to OpenRouter"
    );

    let upstream_resp = upstream::call_chat_completions(&state.http, &state.runtime, &outbound).await?;

    if is_streaming {
        return Ok(stream_response(upstream_resp, original_model));
    }

    let text = upstream_resp
        .text()
        .await
        .map_err(|err| AppError::Internal(format!("failed to read OpenRouter response: {err}")))?;
    let chat: ChatResponse = serde_json::from_str(&text).map_err(|err| {
        tracing::warn!(error = %err, "unparseable OpenRouter response body");
        AppError::MalformedUpstream("Invalid JSON response from OpenRouter".to_string())
    })?;

    let translated = translate::translate_response(&chat, &original_model)?;
    Ok(Json(translated).into_response())
}

/// Bridge the spawned stream translation into a raw SSE body. Frames are
/// written as `<json>\n\n` with the `data: [DONE]` terminator, so the body
/// is assembled by hand rather than through `axum::response::Sse`.
fn stream_response(upstream_resp: reqwest::Response, original_model: String) -> Response {
    let (tx, rx) = mpsc::channel::<Bytes>(64);
    tokio::spawn(stream::pump_upstream(upstream_resp, original_model, tx));

    let body = Body::from_stream(ReceiverStream::new(rx).map(Ok::<_, std::convert::Infallible>));
    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        body,
    )
        .into_response()
}

pub async fn health() -> Json<Value> {
    Json(json!({"status": "healthy", "service": "claude-code-proxy"}))
}
