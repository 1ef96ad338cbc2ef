//! StreamTransport: one request, one long-lived framed response
//!
//! Every session ends with exactly one `Close`. Failure shapes:
//! - no token or HTTP 401/403: one `Error(Forbidden)`, no chunks
//! - connection failure: one `Error(Network)`
//! - error frame from the server: `Error(Upstream)`, chunks so far stay valid
//!
//! There is no retry; callers issue a fresh `open` for that.

use futures_util::StreamExt;
use reqwest::{header, StatusCode, Url};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::core::frame::{Frame, FrameDecoder};
use crate::types::{ConversationItem, ErrorKind, ErrorPayload, StreamEvent, TransportError};
use crate::EVENT_QUEUE_CAPACITY;

/// Request body of the streaming endpoint
#[derive(Debug, Serialize)]
struct StreamRequest<'a> {
    conversation: &'a [ConversationItem],
}

/// Client for the streaming chat endpoint
#[derive(Debug, Clone)]
pub struct StreamTransport {
    client: reqwest::Client,
    endpoint: Url,
    token: Option<String>,
}

impl StreamTransport {
    /// Create a transport for `endpoint` (e.g. `http://127.0.0.1:3000/api/sse`)
    pub fn new(endpoint: &str) -> Result<Self, TransportError> {
        let endpoint =
            Url::parse(endpoint).map_err(|e| TransportError::InvalidEndpoint(e.to_string()))?;
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            token: None,
        })
    }

    /// Attach the session token. `None` means the caller is not authorized.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn is_authorized(&self) -> bool {
        self.token.is_some()
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    /// Stream one turn into `sink`, one event per frame, in arrival order.
    /// Returns once `Close` has been sent or the receiver went away.
    pub async fn open(
        &self,
        conversation: &[ConversationItem],
        sink: &mpsc::Sender<StreamEvent>,
    ) -> Result<(), TransportError> {
        if conversation.is_empty() {
            return Err(TransportError::EmptyConversation);
        }

        self.run(conversation, sink).await;
        let _ = sink.send(StreamEvent::Close).await;
        Ok(())
    }

    /// Run `open` on a task and hand back the bounded event queue
    pub fn spawn(
        &self,
        conversation: Vec<ConversationItem>,
    ) -> Result<mpsc::Receiver<StreamEvent>, TransportError> {
        if conversation.is_empty() {
            return Err(TransportError::EmptyConversation);
        }
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let transport = self.clone();
        tokio::spawn(async move {
            // conversation was checked above
            let _ = transport.open(&conversation, &tx).await;
        });
        Ok(rx)
    }

    async fn run(&self, conversation: &[ConversationItem], sink: &mpsc::Sender<StreamEvent>) {
        let Some(token) = &self.token else {
            info!("no session token, refusing to open stream");
            let _ = sink
                .send(StreamEvent::error(ErrorKind::Forbidden, "Not authorized"))
                .await;
            return;
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(token)
            .header(header::ACCEPT, "text/event-stream")
            .json(&StreamRequest { conversation })
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                warn!("stream request failed: {}", e);
                let _ = sink
                    .send(StreamEvent::error(ErrorKind::Network, e.to_string()))
                    .await;
                return;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = first_error_message(&body).unwrap_or_else(|| status.to_string());
            let kind = match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorKind::Forbidden,
                _ => ErrorKind::Network,
            };
            info!(status = status.as_u16(), "stream refused: {}", detail);
            let _ = sink.send(StreamEvent::error(kind, detail)).await;
            return;
        }

        let mut decoder = FrameDecoder::new();
        let mut body = response.bytes_stream();
        let mut frames_seen = 0usize;

        while let Some(next) = body.next().await {
            let bytes = match next {
                Ok(b) => b,
                Err(e) => {
                    warn!(frames = frames_seen, "stream interrupted: {}", e);
                    let _ = sink
                        .send(StreamEvent::error(ErrorKind::Network, e.to_string()))
                        .await;
                    return;
                }
            };

            for frame in decoder.push(&bytes) {
                frames_seen += 1;
                if !forward(frame, sink).await {
                    debug!("event receiver dropped, abandoning stream");
                    return;
                }
            }
        }

        if let Some(frame) = decoder.finish() {
            frames_seen += 1;
            forward(frame, sink).await;
        }
        debug!(frames = frames_seen, "stream closed");
    }
}

/// Translate one frame into at most one event. False once the receiver is gone.
async fn forward(frame: Frame, sink: &mpsc::Sender<StreamEvent>) -> bool {
    let event = match frame {
        Frame::Data(raw) => match serde_json::from_str::<String>(&raw) {
            Ok(text) => StreamEvent::Chunk(text),
            Err(_) => {
                warn!("data frame is not a JSON string, passing it through verbatim");
                StreamEvent::Chunk(raw)
            }
        },
        Frame::Event(raw) => match serde_json::from_str::<ErrorPayload>(&raw) {
            Ok(payload) if payload.is_error() => {
                StreamEvent::error(ErrorKind::Upstream, payload.display_message())
            }
            Ok(_) => {
                debug!("ignoring event frame without error: {}", raw);
                return true;
            }
            Err(_) => StreamEvent::error(ErrorKind::Upstream, raw),
        },
    };
    sink.send(event).await.is_ok()
}

/// Message of the first error frame in a fully read body
fn first_error_message(body: &str) -> Option<String> {
    let mut decoder = FrameDecoder::new();
    let mut frames = decoder.push(body.as_bytes());
    frames.extend(decoder.finish());
    frames.into_iter().find_map(|frame| match frame {
        Frame::Event(raw) => Some(
            serde_json::from_str::<ErrorPayload>(&raw)
                .map(|p| p.display_message())
                .unwrap_or(raw),
        ),
        Frame::Data(_) => None,
    })
}
