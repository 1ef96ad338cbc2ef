//! Completion backends for the streaming endpoint
//!
//! A source turns a conversation into a stream of text deltas, one item per
//! backend event. An `Err` item ends the stream.

use std::time::Duration;

use eventsource_stream::Eventsource;
use futures_util::stream::{self, BoxStream};
use futures_util::{future, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::types::{ConversationItem, UpstreamError};

/// Stream of text deltas
pub type CompletionStream = BoxStream<'static, Result<String, UpstreamError>>;

/// Something that can generate a streamed reply to a conversation
pub trait CompletionSource: Send + Sync + 'static {
    fn stream(&self, conversation: Vec<ConversationItem>) -> CompletionStream;
}

// =============================================================================
// OpenAI-compatible chat completions
// =============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ConversationItem>,
    stream: bool,
}

/// Streams `/chat/completions` from an OpenAI-compatible API
#[derive(Debug, Clone)]
pub struct OpenAiSource {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiSource {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

impl CompletionSource for OpenAiSource {
    fn stream(&self, conversation: Vec<ConversationItem>) -> CompletionStream {
        let request = self
            .client
            .post(self.url())
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model: self.model.clone(),
                messages: conversation,
                stream: true,
            });

        stream::once(async move {
            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(UpstreamError::Status {
                    status: status.as_u16(),
                    body,
                });
            }
            Ok(response)
        })
        .flat_map(|response| match response {
            Ok(response) => completion_deltas(response),
            Err(e) => stream::iter(vec![Err(e)]).boxed(),
        })
        .boxed()
    }
}

fn completion_deltas(response: reqwest::Response) -> CompletionStream {
    let mut events = 0usize;
    response
        .bytes_stream()
        .eventsource()
        .take_while(|event| {
            let done = matches!(event, Ok(e) if e.data.trim() == "[DONE]");
            future::ready(!done)
        })
        .map(move |event| {
            events += 1;
            match event {
                Ok(e) => {
                    trace!(event = events, "completion event: {}", e.data);
                    parse_delta(&e.data)
                }
                Err(e) => Err(UpstreamError::Stream(e.to_string())),
            }
        })
        .boxed()
}

/// Concatenate `choices[].delta.content` of one chunk
pub fn parse_delta(data: &str) -> Result<String, UpstreamError> {
    let json: Value =
        serde_json::from_str(data).map_err(|e| UpstreamError::Malformed(format!("{}: {}", e, data)))?;

    if let Some(error) = json.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(UpstreamError::Stream(message));
    }

    let delta = json
        .get("choices")
        .and_then(Value::as_array)
        .map(|choices| {
            choices
                .iter()
                .filter_map(|c| c.pointer("/delta/content").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default();
    Ok(delta)
}

// =============================================================================
// Scripted source
// =============================================================================

/// Replays fixed fragments, optionally failing part way through
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    fragments: Vec<String>,
    fail_after: Option<(usize, String)>,
    delay: Option<Duration>,
}

impl ScriptedSource {
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Fail with `message` after emitting `count` fragments
    pub fn failing_after(mut self, count: usize, message: impl Into<String>) -> Self {
        self.fail_after = Some((count, message.into()));
        self
    }

    /// Pause before each fragment
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Offline demo: a glider on a 20x20 grid, cut into small fragments
    pub fn demo() -> Self {
        let glider = [(0, 1), (1, 2), (2, 0), (2, 1), (2, 2)];
        let rows: Vec<String> = (0..20)
            .map(|r| {
                (0..20)
                    .map(|c| if glider.contains(&(r, c)) { "1" } else { "0" })
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .collect();
        let text = format!("```\n{}\n```\n40", rows.join("\n"));
        let chars: Vec<char> = text.chars().collect();
        let fragments: Vec<String> = chars.chunks(16).map(|c| c.iter().collect()).collect();
        Self::new(fragments).with_delay(Duration::from_millis(15))
    }
}

impl CompletionSource for ScriptedSource {
    fn stream(&self, conversation: Vec<ConversationItem>) -> CompletionStream {
        debug!(items = conversation.len(), "scripted completion");
        let mut items: Vec<Result<String, UpstreamError>> = Vec::new();
        match &self.fail_after {
            Some((count, message)) => {
                items.extend(self.fragments.iter().take(*count).cloned().map(Ok));
                items.push(Err(UpstreamError::Scripted(message.clone())));
            }
            None => items.extend(self.fragments.iter().cloned().map(Ok)),
        }

        let delay = self.delay;
        stream::iter(items)
            .then(move |item| async move {
                if let Some(d) = delay {
                    tokio::time::sleep(d).await;
                }
                item
            })
            .boxed()
    }
}
