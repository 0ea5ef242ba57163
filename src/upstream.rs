//! The single outbound call this proxy makes: OpenRouter chat completions.

use crate::app::RuntimeConfig;
use crate::error::AppError;
use crate::protocol::openrouter::ChatRequest;
use serde_json::Value;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// Static identification headers OpenRouter uses for app attribution.
const REFERER_HEADER: (&str, &str) = ("HTTP-Referer", "https://your-site.com");
const TITLE_HEADER: (&str, &str) = ("X-Title", "Claude Code Proxy");

/// POST the translated request upstream. Returns the raw response so the
/// caller can either read the JSON body or consume the SSE stream.
/// Non-2xx statuses become `AppError::Upstream` carrying the upstream's
/// own status code.
pub async fn call_chat_completions(
    client: &reqwest::Client,
    runtime: &RuntimeConfig,
    body: &ChatRequest,
) -> Result<reqwest::Response, AppError> {
    let resp = client
        .post(&runtime.upstream_url)
        .timeout(REQUEST_TIMEOUT)
        .bearer_auth(&runtime.api_key)
        .header(REFERER_HEADER.0, REFERER_HEADER.1)
        .header(TITLE_HEADER.0, TITLE_HEADER.1)
        .json(body)
        .send()
        .await
        .map_err(|err| AppError::Internal(format!("request to OpenRouter failed: {err}")))?;

    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        let (error_type, message) = decode_error_body(&text);
        tracing::warn!(status = %status, message = %message, "upstream returned an error");
        return Err(AppError::upstream(
            status,
            error_type,
            format!(
                "OpenRouter API returned status {}: {}",
                status.as_u16(),
                message
            ),
        ));
    }
    Ok(resp)
}

/// Best-effort decode of an upstream error body: the structured
/// `error.message`/`error.type` pair when the body is JSON, the raw text
/// otherwise.
fn decode_error_body(text: &str) -> (String, String) {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => {
            let error = value.get("error");
            let message = error
                .and_then(|e| e.get("message"))
                .and_then(|v| v.as_str())
                .unwrap_or("Unknown error")
                .to_string();
            let error_type = error
                .and_then(|e| e.get("type"))
                .and_then(|v| v.as_str())
                .unwrap_or("api_error")
                .to_string();
            (error_type, message)
        }
        Err(_) => ("api_error".to_string(), text.to_string()),
    }
}
