//! Integration tests for the client side of the stream
//!
//! Each test starts a server on a loopback port and talks to it over real HTTP.
//! Most use the real API; connection-drop tests use a hand-written HTTP/1.1 peer.

use std::sync::Arc;

use lifestream::core::{
    create_router, AppConfig, ChatSession, Completion, ResponseAccumulator, ScriptedSource,
    StreamTransport, WorkerBridge,
};
use lifestream::types::{
    ConversationItem, ErrorKind, Role, StreamEvent, TransportError, TurnStatus,
};
use lifestream::UPSTREAM_FAILURE_MESSAGE;
use pretty_assertions::assert_eq;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const TOKEN: &str = "session-token";

const BLINKER_REPLY: [&str; 4] = ["```\n0,0,0\n", "1,1,1\n", "0,0,0\n```\n", "1"];

/// Serve `source` on 127.0.0.1:0 and return the stream endpoint
async fn start_server(source: ScriptedSource) -> String {
    let config = AppConfig::new(Arc::new(source)).with_access_token(Some(TOKEN.to_string()));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, create_router(config)).await.unwrap();
    });
    format!("http://{}/api/sse", addr)
}

/// Hand-written HTTP/1.1 server: reads one request, answers with a chunked
/// event stream carrying `frames`, then drops the connection mid-body
async fn start_dropping_server(frames: &'static [&'static str]) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;

        let mut response = String::from(
            "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nTransfer-Encoding: chunked\r\n\r\n",
        );
        for frame in frames {
            response.push_str(&format!("{:x}\r\n{}\r\n", frame.len(), frame));
        }
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();
        // no terminating zero-length chunk
        drop(socket);
    });
    format!("http://{}/api/sse", addr)
}

/// Consume headers and a Content-Length body so closing does not reset the connection
async fn read_request(socket: &mut tokio::net::TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending a request");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let length: usize = headers
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0);
    while buf.len() < header_end + length {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

const DROPPED_FRAMES: &[&str] = &["data: \"first \"\n\n", "data: \"second\"\n\n"];

fn transport(endpoint: &str, token: Option<&str>) -> StreamTransport {
    StreamTransport::new(endpoint)
        .unwrap()
        .with_token(token.map(str::to_string))
}

async fn collect_events(transport: &StreamTransport) -> Vec<StreamEvent> {
    let mut rx = transport
        .spawn(vec![ConversationItem::user("seed please")])
        .unwrap();
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        let done = event == StreamEvent::Close;
        events.push(event);
        if done {
            break;
        }
    }
    events
}

#[tokio::test]
async fn test_chunks_arrive_in_order_then_close() {
    let endpoint = start_server(ScriptedSource::new(["Hel", "lo, ", "world"])).await;

    let events = collect_events(&transport(&endpoint, Some(TOKEN))).await;

    assert_eq!(
        events,
        vec![
            StreamEvent::Chunk("Hel".to_string()),
            StreamEvent::Chunk("lo, ".to_string()),
            StreamEvent::Chunk("world".to_string()),
            StreamEvent::Close,
        ]
    );
}

#[tokio::test]
async fn test_upstream_failure_keeps_partial_text() {
    let source = ScriptedSource::new(["partial ", "reply ", "lost"]).failing_after(2, "backend down");
    let endpoint = start_server(source).await;

    let rx = transport(&endpoint, Some(TOKEN))
        .spawn(vec![ConversationItem::user("seed please")])
        .unwrap();
    let completion = ResponseAccumulator::drain(rx, |_| {}).await;

    assert_eq!(
        completion,
        Completion::Failed {
            partial: "partial reply ".to_string(),
            kind: ErrorKind::Upstream,
            message: UPSTREAM_FAILURE_MESSAGE.to_string(),
        }
    );
}

#[tokio::test]
async fn test_wrong_token_yields_single_forbidden_error() {
    let endpoint = start_server(ScriptedSource::new(["never", "sent"])).await;

    let events = collect_events(&transport(&endpoint, Some("stolen"))).await;

    assert_eq!(events.len(), 2);
    assert!(matches!(
        events[0],
        StreamEvent::Error {
            kind: ErrorKind::Forbidden,
            ..
        }
    ));
    assert_eq!(events[1], StreamEvent::Close);
}

#[tokio::test]
async fn test_missing_token_never_reaches_server() {
    let endpoint = start_server(ScriptedSource::new(["never"])).await;

    let events = collect_events(&transport(&endpoint, None)).await;

    assert_eq!(
        events,
        vec![
            StreamEvent::error(ErrorKind::Forbidden, "Not authorized"),
            StreamEvent::Close,
        ]
    );
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let endpoint = format!("http://{}/api/sse", addr);
    let events = collect_events(&transport(&endpoint, Some(TOKEN))).await;

    assert_eq!(events.len(), 2);
    assert!(matches!(
        events[0],
        StreamEvent::Error {
            kind: ErrorKind::Network,
            ..
        }
    ));
    assert_eq!(events[1], StreamEvent::Close);
}

#[tokio::test]
async fn test_connection_drop_mid_stream_keeps_chunks() {
    let endpoint = start_dropping_server(DROPPED_FRAMES).await;

    let events = collect_events(&transport(&endpoint, Some(TOKEN))).await;

    assert_eq!(events.len(), 4);
    assert_eq!(events[0], StreamEvent::Chunk("first ".to_string()));
    assert_eq!(events[1], StreamEvent::Chunk("second".to_string()));
    assert!(matches!(
        events[2],
        StreamEvent::Error {
            kind: ErrorKind::Network,
            ..
        }
    ));
    assert_eq!(events[3], StreamEvent::Close);
}

#[tokio::test]
async fn test_connection_drop_yields_partial_network_failure() {
    let endpoint = start_dropping_server(DROPPED_FRAMES).await;

    let rx = transport(&endpoint, Some(TOKEN))
        .spawn(vec![ConversationItem::user("seed please")])
        .unwrap();
    let completion = ResponseAccumulator::drain(rx, |_| {}).await;

    match completion {
        Completion::Failed { partial, kind, .. } => {
            assert_eq!(partial, "first second");
            assert_eq!(kind, ErrorKind::Network);
        }
        other => panic!("expected a failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_conversation_is_rejected_before_connecting() {
    let t = transport("http://127.0.0.1:9/api/sse", Some(TOKEN));
    assert!(matches!(t.spawn(vec![]), Err(TransportError::EmptyConversation)));
}

#[tokio::test]
async fn test_session_turn_renders_image() {
    let endpoint = start_server(ScriptedSource::new(BLINKER_REPLY)).await;
    let mut session = ChatSession::new(
        transport(&endpoint, Some(TOKEN)),
        WorkerBridge::spawn().unwrap(),
    );

    let mut streamed = String::new();
    let outcome = session
        .send("seed please", |c| streamed.push_str(c), |_| {})
        .await
        .unwrap();

    assert_eq!(outcome.status, TurnStatus::Completed);
    assert_eq!(outcome.text, BLINKER_REPLY.concat());
    assert_eq!(streamed, outcome.text);

    let image = outcome.image.expect("rendered end state");
    assert_eq!(image.dimensions(), (3, 3));
    // horizontal blinker turned vertical after one generation
    assert_eq!(image.get_pixel(1, 0)[0], 0);
    assert_eq!(image.get_pixel(0, 1)[0], 255);

    let log = session.log().items();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].role, Role::User);
    assert_eq!(log[0].content, "seed please");
    assert_eq!(log[1].role, Role::Assistant);
    assert_eq!(log[1].content, outcome.text);
}

#[tokio::test]
async fn test_session_turn_without_pattern_has_no_image() {
    let endpoint = start_server(ScriptedSource::new(["Just ", "chatting."])).await;
    let mut session = ChatSession::new(
        transport(&endpoint, Some(TOKEN)),
        WorkerBridge::spawn().unwrap(),
    );

    let outcome = session.send("hi", |_| {}, |_| {}).await.unwrap();

    assert!(outcome.is_completed());
    assert!(outcome.image.is_none());
    assert!(outcome.message.unwrap().starts_with("No pattern found"));
    assert_eq!(session.log().len(), 2);
}

#[tokio::test]
async fn test_failed_turn_leaves_log_untouched() {
    let source = ScriptedSource::new(["half"]).failing_after(1, "backend down");
    let endpoint = start_server(source).await;
    let mut session = ChatSession::new(
        transport(&endpoint, Some(TOKEN)),
        WorkerBridge::spawn().unwrap(),
    );

    let outcome = session.send("seed please", |_| {}, |_| {}).await.unwrap();

    assert!(matches!(
        outcome.status,
        TurnStatus::Failed {
            kind: ErrorKind::Upstream,
            ..
        }
    ));
    assert_eq!(outcome.text, "half");
    assert!(outcome.image.is_none());
    assert!(session.log().is_empty());
}

#[tokio::test]
async fn test_conversation_grows_and_clears() {
    let endpoint = start_server(ScriptedSource::new(["ok"])).await;
    let mut session = ChatSession::new(
        transport(&endpoint, Some(TOKEN)),
        WorkerBridge::spawn().unwrap(),
    );

    session.send("one", |_| {}, |_| {}).await.unwrap();
    session.send("two", |_| {}, |_| {}).await.unwrap();
    assert_eq!(session.log().len(), 4);
    assert_eq!(session.log().items()[2].content, "two");

    session.clear();
    assert!(session.log().is_empty());
}
