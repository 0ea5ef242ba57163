//! Streaming response translation: consumes the upstream SSE stream and
//! produces the downstream frame sequence, one upstream frame at a time.

use crate::protocol::anthropic::{StreamEvent, new_message_id};
use crate::protocol::openrouter::ChatChunk;
use bytes::Bytes;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use tokio::sync::mpsc;

/// Transport-level terminal sentinel; the only frame carrying a `data: `
/// prefix.
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Start,
    Streaming,
    Done,
}

/// Single-pass translator from upstream chat-completion chunks to
/// downstream message frames. One message id is generated per translator
/// and carried by every frame it emits.
pub struct StreamTranslator {
    message_id: String,
    model: String,
    phase: Phase,
}

impl StreamTranslator {
    /// `model` is the original inbound model name, echoed in `message_start`.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            message_id: new_message_id(),
            model: model.into(),
            phase: Phase::Start,
        }
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    /// Emit the opening `message_start` frame and enter the streaming
    /// phase. Returns `None` if the stream has already begun.
    pub fn begin(&mut self) -> Option<StreamEvent> {
        if self.phase != Phase::Start {
            return None;
        }
        self.phase = Phase::Streaming;
        Some(StreamEvent::message_start(
            self.message_id.clone(),
            self.model.clone(),
        ))
    }

    /// Translate one upstream `data:` payload. Unparseable payloads and
    /// empty deltas produce nothing; the done sentinel produces the
    /// closing `message_stop` frame and ends the stream.
    pub fn on_frame(&mut self, data: &str) -> Option<StreamEvent> {
        if self.phase != Phase::Streaming {
            return None;
        }
        let data = data.trim();
        if data == DONE_SENTINEL {
            self.phase = Phase::Done;
            return Some(StreamEvent::message_stop(self.message_id.clone()));
        }
        let chunk: ChatChunk = serde_json::from_str(data).ok()?;
        let text = chunk.choices.first()?.delta.content.as_deref()?;
        if text.is_empty() {
            return None;
        }
        Some(StreamEvent::text_delta(text))
    }
}

/// One downstream body frame: the JSON payload followed by a blank line.
pub fn frame(event: &StreamEvent) -> Bytes {
    let payload = serde_json::to_string(event).unwrap_or_default();
    Bytes::from(format!("{payload}\n\n"))
}

/// Drive a translator over the upstream response, writing frames into
/// `tx`. The terminal `data: [DONE]` frame is sent on every exit path and
/// the upstream connection is released when this returns. A send failure
/// means the downstream client went away; the pump stops immediately.
pub async fn pump_upstream(upstream: reqwest::Response, model: String, tx: mpsc::Sender<Bytes>) {
    let mut translator = StreamTranslator::new(model);
    if let Some(event) = translator.begin() {
        if tx.send(frame(&event)).await.is_err() {
            return;
        }
    }

    let mut frames = upstream.bytes_stream().eventsource();
    while let Some(next) = frames.next().await {
        match next {
            Ok(sse) => {
                if let Some(event) = translator.on_frame(&sse.data) {
                    if tx.send(frame(&event)).await.is_err() {
                        return;
                    }
                }
                if translator.is_done() {
                    break;
                }
            }
            Err(err) => {
                // Headers are long gone; report in-band and terminate.
                tracing::warn!(error = %err, "upstream stream failed mid-flight");
                let event = StreamEvent::error("internal_error", err.to_string());
                let _ = tx.send(frame(&event)).await;
                break;
            }
        }
    }

    let _ = tx.send(Bytes::from_static(DONE_FRAME.as_bytes())).await;
}
