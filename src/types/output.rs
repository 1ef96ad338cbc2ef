//! Turn outcomes and their terminal / JSON summaries

use chrono::{DateTime, Utc};
use colored::Colorize;
use image::RgbaImage;
use serde::Serialize;
use crate::types::ErrorKind;

/// How the streaming part of a turn ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TurnStatus {
    /// Stream closed cleanly
    Completed,
    /// Stream reported an error; partial text is kept
    Failed { kind: ErrorKind, message: String },
}

/// Everything one chat turn produced
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub status: TurnStatus,
    /// Accumulated response text (partial on failure)
    pub text: String,
    /// Rendered end state, when a pattern was found and simulated
    pub image: Option<RgbaImage>,
    /// Pipeline diagnostic or worker fault
    pub message: Option<String>,
}

impl TurnOutcome {
    pub fn is_completed(&self) -> bool {
        self.status == TurnStatus::Completed
    }
}

/// Serializable summary of a turn
#[derive(Debug, Clone, Serialize)]
pub struct TurnReport {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub status: TurnStatus,
    pub text_chars: usize,
    pub image_width: Option<u32>,
    pub image_height: Option<u32>,
    pub diagnostic: Option<String>,
    pub image_path: Option<String>,
}

impl TurnReport {
    pub fn from_outcome(outcome: &TurnOutcome, image_path: Option<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            status: outcome.status.clone(),
            text_chars: outcome.text.chars().count(),
            image_width: outcome.image.as_ref().map(|i| i.width()),
            image_height: outcome.image.as_ref().map(|i| i.height()),
            diagnostic: outcome.message.clone(),
            image_path,
        }
    }

    fn image_summary(&self) -> String {
        match (self.image_width, self.image_height) {
            (Some(w), Some(h)) => format!("{}x{}", w, h),
            _ => "none".to_string(),
        }
    }

    /// Format for terminal display (with colors)
    pub fn to_terminal_string(&self) -> String {
        let status = match &self.status {
            TurnStatus::Completed => "COMPLETED".green().bold(),
            TurnStatus::Failed { kind, .. } => format!("FAILED({})", kind).red().bold(),
        };
        let mut line = format!(
            "{} | chars={} | image={}",
            status,
            self.text_chars,
            self.image_summary()
        );
        if let Some(path) = &self.image_path {
            line.push_str(&format!(" | saved={}", path.cyan()));
        }
        if let TurnStatus::Failed { message, .. } = &self.status {
            line.push_str(&format!("\n  {}", message.red()));
        }
        if let Some(diagnostic) = &self.diagnostic {
            line.push_str(&format!("\n  {}", diagnostic.bright_black()));
        }
        line
    }

    /// Format for parseable output (no colors)
    pub fn to_parseable_string(&self) -> String {
        let status = match &self.status {
            TurnStatus::Completed => "completed".to_string(),
            TurnStatus::Failed { kind, .. } => format!("failed:{}", kind),
        };
        format!(
            "status={} | chars={} | image={} | diagnostic={}",
            status,
            self.text_chars,
            self.image_summary(),
            self.diagnostic.as_deref().unwrap_or("-")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parseable_report() {
        let outcome = TurnOutcome {
            status: TurnStatus::Completed,
            text: "abc".to_string(),
            image: Some(RgbaImage::new(3, 2)),
            message: None,
        };
        let report = TurnReport::from_outcome(&outcome, None);
        assert_eq!(
            report.to_parseable_string(),
            "status=completed | chars=3 | image=3x2 | diagnostic=-"
        );
    }

    #[test]
    fn test_report_json_flattens_status() {
        let outcome = TurnOutcome {
            status: TurnStatus::Failed {
                kind: ErrorKind::Forbidden,
                message: "Unauthorized".to_string(),
            },
            text: String::new(),
            image: None,
            message: None,
        };
        let json = serde_json::to_value(TurnReport::from_outcome(&outcome, None)).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["kind"], "forbidden");
        assert_eq!(json["message"], "Unauthorized");
        assert_eq!(json["diagnostic"], serde_json::Value::Null);
    }
}
