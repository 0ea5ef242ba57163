//! Request and synchronous-response translation between the two protocols.

use crate::error::AppError;
use crate::model_map::{self, FALLBACK_MODEL, ModelCache};
use crate::protocol::anthropic::{
    MessagesRequest, MessagesResponse, MessagesUsage, StopReason, TextBlock, new_message_id,
};
use crate::protocol::openrouter::{ChatMessage, ChatRequest, ChatResponse};
use axum::http::StatusCode;

pub const DEFAULT_MAX_TOKENS: u64 = 1000;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
/// Model echoed back when the inbound request carries none.
pub const DEFAULT_ECHO_MODEL: &str = "claude-3-sonnet-20240229";

/// Convert an inbound Messages request into an OpenRouter chat request.
/// Total: missing fields take defaults, unrecognized content degrades.
pub fn translate_request(req: &MessagesRequest, cache: &ModelCache) -> ChatRequest {
    let messages = req
        .messages
        .iter()
        .map(|msg| ChatMessage {
            role: msg.role.as_str(),
            content: msg.content.flatten(),
        })
        .collect();

    let model = match &req.model {
        Some(name) => model_map::resolve(cache, name),
        None => FALLBACK_MODEL.to_string(),
    };

    ChatRequest {
        model,
        messages,
        max_tokens: req.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        temperature: req.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        top_p: req.top_p,
        stream: req.stream,
    }
}

/// Convert a complete upstream response into a Messages response.
/// `original_model` is the inbound model string, echoed back untouched.
pub fn translate_response(
    resp: &ChatResponse,
    original_model: &str,
) -> Result<MessagesResponse, AppError> {
    if let Some(error) = &resp.error {
        return Err(AppError::upstream(
            StatusCode::BAD_REQUEST,
            "api_error",
            format!("OpenRouter API error: {error}"),
        ));
    }

    let Some(choice) = resp.choices.first() else {
        return Err(AppError::MalformedUpstream(
            "Unexpected response format from OpenRouter - missing 'choices' field".to_string(),
        ));
    };

    let content = match choice.message.content.as_deref() {
        Some(content) if !content.is_empty() => content.to_string(),
        _ => choice.message.reasoning.clone().unwrap_or_default(),
    };
    if content.is_empty() {
        return Err(AppError::MalformedUpstream(
            "Unexpected message format from OpenRouter - missing content".to_string(),
        ));
    }

    let stop_reason = match choice.finish_reason.as_deref() {
        Some("length") => StopReason::MaxTokens,
        _ => StopReason::EndTurn,
    };
    let usage = resp.usage.unwrap_or_default();

    Ok(MessagesResponse {
        id: new_message_id(),
        kind: "message",
        role: "assistant",
        content: vec![TextBlock::new(content)],
        model: original_model.to_string(),
        stop_reason,
        stop_sequence: None,
        usage: MessagesUsage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_map::new_cache;
    use serde_json::json;

    fn request(value: serde_json::Value) -> MessagesRequest {
        serde_json::from_value(value).expect("request should decode")
    }

    fn response(value: serde_json::Value) -> ChatResponse {
        serde_json::from_value(value).expect("response should decode")
    }

    #[test]
    fn request_defaults_are_applied() {
        let out = translate_request(
            &request(json!({
                "model": "claude-sonnet",
                "messages": [{"role": "user", "content": "hi"}]
            })),
            &new_cache(),
        );
        assert_eq!(out.model, "openai/gpt-oss-120b:free");
        assert_eq!(out.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(out.temperature, DEFAULT_TEMPERATURE);
        assert!(out.top_p.is_none());
        assert!(out.stream.is_none());
        assert_eq!(out.messages.len(), 1);
        assert_eq!(out.messages[0].role, "user");
        assert_eq!(out.messages[0].content, "hi");
    }

    #[test]
    fn explicit_parameters_are_forwarded() {
        let out = translate_request(
            &request(json!({
                "model": "openai/gpt-4o",
                "messages": [{"role": "assistant", "content": "ok"}],
                "max_tokens": 42,
                "temperature": 0.2,
                "top_p": 0.9,
                "stream": true
            })),
            &new_cache(),
        );
        assert_eq!(out.model, "openai/gpt-4o");
        assert_eq!(out.max_tokens, 42);
        assert_eq!(out.temperature, 0.2);
        assert_eq!(out.top_p, Some(0.9));
        assert_eq!(out.stream, Some(true));
        assert_eq!(out.messages[0].role, "assistant");
    }

    #[test]
    fn structured_content_is_flattened() {
        let out = translate_request(
            &request(json!({
                "model": "claude-sonnet",
                "messages": [{
                    "role": "user",
                    "content": [
                        {"type": "text", "text": "a"},
                        {"type": "image", "source": {"type": "url", "url": "x"}},
                        {"type": "text", "text": "b"}
                    ]
                }]
            })),
            &new_cache(),
        );
        assert_eq!(out.messages[0].content, "ab");
    }

    #[test]
    fn missing_model_uses_the_outbound_fallback() {
        let out = translate_request(
            &request(json!({"messages": [{"content": "hi"}]})),
            &new_cache(),
        );
        assert_eq!(out.model, FALLBACK_MODEL);
    }

    #[test]
    fn round_trip_produces_a_text_block_and_end_turn() {
        let translated = translate_response(
            &response(json!({
                "choices": [{"message": {"content": "hello"}, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 12, "completion_tokens": 5}
            })),
            "claude-sonnet-4-5-20250929",
        )
        .expect("translation should succeed");
        assert!(translated.id.starts_with("msg_"));
        assert_eq!(translated.role, "assistant");
        assert_eq!(translated.content.len(), 1);
        assert_eq!(translated.content[0].text, "hello");
        assert_eq!(translated.model, "claude-sonnet-4-5-20250929");
        assert_eq!(translated.stop_reason, StopReason::EndTurn);
        assert_eq!(translated.usage.input_tokens, 12);
        assert_eq!(translated.usage.output_tokens, 5);
    }

    #[test]
    fn length_finish_reason_maps_to_max_tokens() {
        let translated = translate_response(
            &response(json!({
                "choices": [{"message": {"content": "truncated"}, "finish_reason": "length"}]
            })),
            "m",
        )
        .expect("translation should succeed");
        assert_eq!(translated.stop_reason, StopReason::MaxTokens);
        // Absent usage defaults to zero.
        assert_eq!(translated.usage.input_tokens, 0);
        assert_eq!(translated.usage.output_tokens, 0);
    }

    #[test]
    fn absent_finish_reason_maps_to_end_turn() {
        let translated = translate_response(
            &response(json!({"choices": [{"message": {"content": "hi"}}]})),
            "m",
        )
        .expect("translation should succeed");
        assert_eq!(translated.stop_reason, StopReason::EndTurn);
    }

    #[test]
    fn reasoning_backfills_empty_content() {
        let translated = translate_response(
            &response(json!({
                "choices": [{"message": {"content": "", "reasoning": "thought"}}]
            })),
            "m",
        )
        .expect("translation should succeed");
        assert_eq!(translated.content[0].text, "thought");
    }

    #[test]
    fn in_body_error_fails_as_upstream_error() {
        let err = translate_response(
            &response(json!({"error": {"message": "quota exceeded"}})),
            "m",
        )
        .expect_err("translation should fail");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_type(), "api_error");
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn empty_choices_fail_as_malformed_upstream() {
        let err = translate_response(&response(json!({"choices": []})), "m")
            .expect_err("translation should fail");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn missing_content_and_reasoning_fail_as_malformed_upstream() {
        let err = translate_response(
            &response(json!({"choices": [{"message": {}, "finish_reason": "stop"}]})),
            "m",
        )
        .expect_err("translation should fail");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_type(), "api_error");
    }

    #[test]
    fn fresh_id_per_translation() {
        let payload = json!({"choices": [{"message": {"content": "hi"}}]});
        let first = translate_response(&response(payload.clone()), "m").unwrap();
        let second = translate_response(&response(payload), "m").unwrap();
        assert_ne!(first.id, second.id);
    }
}
