//! ChatSession: one conversation, one transport, one worker slot
//!
//! A turn streams the response, appends both items to the log once the stream
//! closes cleanly, then hands the text to the worker. Transport failures end
//! the turn with the partial text and leave the log untouched. Pipeline
//! misses and worker faults only suppress the image.

use tracing::{info, warn};

use crate::core::accumulator::{Completion, ResponseAccumulator};
use crate::core::bridge::{Terminator, WorkerBridge};
use crate::core::transport::StreamTransport;
use crate::types::{
    BridgeError, ConversationItem, ConversationLog, Progress, TransportError, TurnOutcome,
    TurnStatus,
};

/// Diagnostic shown when the worker fails
pub const IMAGE_ERROR_MESSAGE: &str = "Image generation error";

/// Chat state for a single conversation
#[derive(Debug)]
pub struct ChatSession {
    log: ConversationLog,
    transport: StreamTransport,
    bridge: WorkerBridge,
}

impl ChatSession {
    pub fn new(transport: StreamTransport, bridge: WorkerBridge) -> Self {
        Self {
            log: ConversationLog::new(),
            transport,
            bridge,
        }
    }

    /// Continue an earlier conversation
    pub fn with_log(mut self, log: ConversationLog) -> Self {
        self.log = log;
        self
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    /// Delete the conversation
    pub fn clear(&mut self) {
        self.log.clear();
    }

    /// Handle that stops the worker from another task
    pub fn terminator(&self) -> Terminator {
        self.bridge.terminator()
    }

    /// Replace a terminated worker with a fresh one
    pub fn restart_worker(&mut self) -> Result<(), BridgeError> {
        if self.bridge.is_terminated() {
            self.bridge = WorkerBridge::spawn()?;
        }
        Ok(())
    }

    /// Run one turn. `on_chunk` sees text as it streams in, `on_progress`
    /// sees simulation progress.
    pub async fn send<C, P>(
        &mut self,
        prompt: &str,
        on_chunk: C,
        on_progress: P,
    ) -> Result<TurnOutcome, TransportError>
    where
        C: FnMut(&str),
        P: FnMut(Progress),
    {
        let conversation = self.log.with_prompt(prompt);
        let rx = self.transport.spawn(conversation)?;

        let text = match ResponseAccumulator::drain(rx, on_chunk).await {
            Completion::Completed(text) => text,
            Completion::Failed {
                partial,
                kind,
                message,
            } => {
                warn!(kind = kind.code(), "turn failed: {}", message);
                return Ok(TurnOutcome {
                    status: TurnStatus::Failed { kind, message },
                    text: partial,
                    image: None,
                    message: None,
                });
            }
        };

        self.log.push(ConversationItem::user(prompt));
        self.log.push(ConversationItem::assistant(text.clone()));
        info!(items = self.log.len(), chars = text.len(), "turn completed");

        let generation = match self.bridge.submit(text.clone()) {
            Ok(pending) => pending.wait_with_progress(on_progress).await,
            Err(e) => Err(e),
        };

        let (image, message) = match generation {
            Ok(result) => (result.image, result.message),
            Err(e) => {
                warn!("worker did not produce a result: {}", e);
                (None, Some(format!("{}: {}", IMAGE_ERROR_MESSAGE, e)))
            }
        };

        Ok(TurnOutcome {
            status: TurnStatus::Completed,
            text,
            image,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::api::{create_router, AppConfig};
    use crate::core::bridge::FAULT_TRIGGER;
    use crate::core::upstream::ScriptedSource;
    use std::sync::Arc;

    async fn session_for(source: ScriptedSource) -> ChatSession {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = create_router(AppConfig::new(Arc::new(source)));
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let transport = StreamTransport::new(&format!("http://{}/api/sse", addr))
            .unwrap()
            .with_token(Some("token".to_string()));
        ChatSession::new(transport, WorkerBridge::spawn().unwrap())
    }

    #[tokio::test]
    async fn test_worker_fault_keeps_text_and_reports_diagnostic() {
        let mut session = session_for(ScriptedSource::new([FAULT_TRIGGER])).await;

        let outcome = session.send("seed please", |_| {}, |_| {}).await.unwrap();

        assert!(outcome.is_completed());
        assert_eq!(outcome.text, FAULT_TRIGGER);
        assert!(outcome.image.is_none());
        let message = outcome.message.expect("diagnostic");
        assert!(message.starts_with(IMAGE_ERROR_MESSAGE), "{}", message);
        assert!(message.contains("forced pipeline fault"));
        assert_eq!(session.log().len(), 2);
    }

    #[tokio::test]
    async fn test_fault_differs_from_extraction_miss() {
        let mut session = session_for(ScriptedSource::new(["no grid here"])).await;

        let outcome = session.send("hi", |_| {}, |_| {}).await.unwrap();

        let message = outcome.message.expect("diagnostic");
        assert!(message.starts_with("No pattern found"));
        assert!(!message.starts_with(IMAGE_ERROR_MESSAGE));
    }

    #[tokio::test]
    async fn test_next_turn_works_after_fault() {
        let mut session = session_for(ScriptedSource::new([FAULT_TRIGGER])).await;
        session.send("one", |_| {}, |_| {}).await.unwrap();

        let second = session.send("two", |_| {}, |_| {}).await.unwrap();

        // worker survived the panic, so the slot was freed and the same fault repeats
        assert!(second.message.unwrap().contains("forced pipeline fault"));
        assert_eq!(session.log().len(), 4);
    }
}
