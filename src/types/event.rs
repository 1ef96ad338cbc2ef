//! Stream events produced by the transport, in arrival order

use serde::{Deserialize, Serialize};

/// Classification of a failed or refused stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Connection failed or dropped
    Network,
    /// Caller has no valid session
    Forbidden,
    /// Text generation backend reported a failure
    Upstream,
}

impl ErrorKind {
    /// Stable code for logs and JSON output
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Upstream => "upstream",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// One event of a streaming session. Each is consumed exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// One text fragment
    Chunk(String),
    /// Structured error; the session may still deliver more events
    Error { kind: ErrorKind, message: String },
    /// Session finished, nothing follows
    Close,
}

impl StreamEvent {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        StreamEvent::Error {
            kind,
            message: message.into(),
        }
    }
}

/// JSON body carried by an `event:` frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub error: serde_json::Value,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorPayload {
    pub fn new(error: impl Into<serde_json::Value>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: Some(message.into()),
        }
    }

    /// Whether the payload actually reports an error.
    /// Missing, null, false, empty and zero values do not.
    pub fn is_error(&self) -> bool {
        match &self.error {
            serde_json::Value::Null => false,
            serde_json::Value::Bool(b) => *b,
            serde_json::Value::String(s) => !s.is_empty(),
            serde_json::Value::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(true),
            _ => true,
        }
    }

    /// Message to show the user, falling back to the error value itself
    pub fn display_message(&self) -> String {
        match (&self.message, &self.error) {
            (Some(m), _) if !m.is_empty() => m.clone(),
            (_, serde_json::Value::String(s)) => s.clone(),
            (_, other) => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        let p: ErrorPayload = serde_json::from_str(r#"{"error": {"code": 500}, "message": "boom"}"#).unwrap();
        assert!(p.is_error());
        let p: ErrorPayload = serde_json::from_str(r#"{"message": "just info"}"#).unwrap();
        assert!(!p.is_error());
        let p: ErrorPayload = serde_json::from_str(r#"{"error": false}"#).unwrap();
        assert!(!p.is_error());
        let p: ErrorPayload = serde_json::from_str(r#"{"error": ""}"#).unwrap();
        assert!(!p.is_error());
    }

    #[test]
    fn test_display_message_fallback() {
        let p: ErrorPayload = serde_json::from_str(r#"{"error": "quota"}"#).unwrap();
        assert_eq!(p.display_message(), "quota");
        let p = ErrorPayload::new("quota", "Something went wrong!");
        assert_eq!(p.display_message(), "Something went wrong!");
    }
}
