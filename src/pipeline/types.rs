//! Shared types for the triage pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Email ───────────────────────────────────────────────────────────

/// An inbox email plus its processing results.
///
/// `category` and `action_items` start empty and are overwritten as a pair
/// each time the email is processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Email {
    pub id: String,
    pub sender: String,
    pub subject: String,
    pub body: String,
    /// When the email was received.
    #[serde(rename = "timestamp")]
    pub received_at: DateTime<Utc>,
    pub category: Option<String>,
    pub action_items: Option<ActionItems>,
    pub is_read: bool,
}

impl Email {
    /// A fresh, unprocessed email.
    pub fn new(
        id: impl Into<String>,
        sender: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            sender: sender.into(),
            subject: subject.into(),
            body: body.into(),
            received_at,
            category: None,
            action_items: None,
            is_read: false,
        }
    }
}

// ── Action items ────────────────────────────────────────────────────

/// Urgency of an extracted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    #[serde(alias = "high", alias = "HIGH")]
    High,
    #[serde(alias = "medium", alias = "MEDIUM")]
    Medium,
    #[serde(alias = "low", alias = "LOW")]
    Low,
}

/// A single task assigned to the recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub task: String,
    pub deadline: String,
    pub priority: Priority,
}

/// Action items the model extracted from an email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionItemPayload {
    #[serde(rename = "action_summary", alias = "summary", default)]
    pub summary: String,
    pub tasks: Vec<Task>,
}

/// Stored action-item value: the extracted payload, or an empty list when
/// the model's output could not be decoded.
///
/// Serializes as the payload object or as `[]`, never as raw model text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionItems {
    Extracted(ActionItemPayload),
    Fallback(Vec<Task>),
}

impl ActionItems {
    /// The safe default substituted for unparseable output.
    pub fn empty() -> Self {
        Self::Fallback(Vec::new())
    }

    pub fn tasks(&self) -> &[Task] {
        match self {
            Self::Extracted(payload) => &payload.tasks,
            Self::Fallback(tasks) => tasks,
        }
    }

    pub fn summary(&self) -> Option<&str> {
        match self {
            Self::Extracted(payload) => Some(payload.summary.as_str()),
            Self::Fallback(_) => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

/// Result of `EmailProcessor::process`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedEmail {
    pub email_id: String,
    pub category: String,
    pub action_items: ActionItems,
}

// ── Drafts ──────────────────────────────────────────────────────────

/// A saved reply draft. Independent of its source email once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub id: i64,
    /// Source email id; may not reference a stored email (e.g. `chat_gen`).
    pub email_id: String,
    pub subject: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Result of `DraftGenerator::draft`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedDraft {
    pub draft_id: i64,
    pub subject: String,
    pub body: String,
}

// ── Chat ────────────────────────────────────────────────────────────

/// Follow-up action the model suggested alongside a chat reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUp {
    pub task: String,
    #[serde(default)]
    pub deadline: String,
}

/// Outcome of one routed chat turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatResult {
    /// A reply draft for the selected email. Not persisted automatically.
    Draft { content: String },
    /// Free text. When the reply carried a parseable follow-up block,
    /// `content` is the narrative part and `follow_up` the parsed block.
    Text {
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        follow_up: Option<FollowUp>,
    },
}

impl ChatResult {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
            follow_up: None,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::Draft { content } | Self::Text { content, .. } => content,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Draft { .. } => "draft",
            Self::Text { .. } => "text",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_action_items_serialize_as_empty_list() {
        let json = serde_json::to_value(ActionItems::empty()).unwrap();
        assert_eq!(json, serde_json::json!([]));
    }

    #[test]
    fn empty_list_deserializes_to_fallback() {
        let items: ActionItems = serde_json::from_str("[]").unwrap();
        assert!(items.is_fallback());
        assert!(items.tasks().is_empty());
        assert!(items.summary().is_none());
    }

    #[test]
    fn payload_accepts_summary_alias() {
        let items: ActionItems = serde_json::from_str(
            r#"{"summary": "Pay it", "tasks": [{"task": "Pay", "deadline": "N/A", "priority": "low"}]}"#,
        )
        .unwrap();
        assert_eq!(items.summary(), Some("Pay it"));
        assert_eq!(items.tasks()[0].priority, Priority::Low);
    }

    #[test]
    fn payload_serializes_schema_field_name() {
        let items = ActionItems::Extracted(ActionItemPayload {
            summary: "Reply soon".into(),
            tasks: vec![],
        });
        let json = serde_json::to_value(&items).unwrap();
        assert_eq!(json["action_summary"], "Reply soon");
        assert!(json["tasks"].as_array().unwrap().is_empty());
    }

    #[test]
    fn email_timestamp_field_name() {
        let email = Email::new("e1", "a@x.com", "Hi", "Body", Utc::now());
        let json = serde_json::to_value(&email).unwrap();
        assert!(json.get("timestamp").is_some());
        assert!(json["category"].is_null());
        assert_eq!(json["is_read"], false);
    }

    #[test]
    fn chat_result_wire_shape() {
        let draft = serde_json::to_value(ChatResult::Draft {
            content: "Thanks!".into(),
        })
        .unwrap();
        assert_eq!(draft["type"], "draft");
        assert_eq!(draft["content"], "Thanks!");

        let text = serde_json::to_value(ChatResult::text("hello")).unwrap();
        assert_eq!(text["type"], "text");
        assert!(text.get("follow_up").is_none());
    }
}
