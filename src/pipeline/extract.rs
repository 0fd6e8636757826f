//! Response extraction: strips code fences and decodes structured payloads
//! out of free-form model text.
//!
//! Pure string parsing, no LLM calls. Decode failures come back as a typed
//! `ParseError` so callers can substitute a default.

use serde::de::DeserializeOwned;

use crate::error::ParseError;

const FENCE: &str = "```";

/// Max chars of failing text kept in a `ParseError`.
const EXCERPT_CHARS: usize = 200;

/// Remove one leading and one trailing code fence, if present.
///
/// The leading fence may carry a language tag (```` ```json ````). Each end
/// is checked on its own, so a fence at only the start or only the end is
/// still removed. Text without fences comes back trimmed.
pub fn strip_fences(text: &str) -> String {
    let mut out = text.trim();

    if let Some(rest) = out.strip_prefix(FENCE) {
        out = skip_language_tag(rest);
    }

    if let Some(rest) = out.strip_suffix(FENCE) {
        out = rest;
    }

    out.trim().to_string()
}

/// Drop a language tag such as `json` directly after an opening fence.
///
/// Only a first line followed by a newline can be a tag; text on the fence
/// line with nothing after it is content.
fn skip_language_tag(after_fence: &str) -> &str {
    let Some((first_line, remainder)) = after_fence.split_once('\n') else {
        return after_fence;
    };

    let tag = first_line.trim();
    let is_tag = tag.is_empty()
        || tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '.'));

    if is_tag { remainder } else { after_fence }
}

/// Decode fence-stripped `text` as `T`.
pub fn parse_structured<T: DeserializeOwned>(text: &str) -> Result<T, ParseError> {
    let cleaned = strip_fences(text);
    serde_json::from_str(&cleaned).map_err(|e| ParseError {
        reason: e.to_string(),
        excerpt: cleaned.chars().take(EXCERPT_CHARS).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::{ActionItemPayload, FollowUp, Priority, Task};

    #[test]
    fn strip_fence_with_language_tag() {
        let input = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_fences(input), "{\"a\": 1}");
    }

    #[test]
    fn strip_fence_without_tag() {
        let input = "```\n[1, 2]\n```";
        assert_eq!(strip_fences(input), "[1, 2]");
    }

    #[test]
    fn strip_no_fence_is_noop() {
        assert_eq!(strip_fences("  {\"a\": 1}  "), "{\"a\": 1}");
        assert_eq!(strip_fences("plain text"), "plain text");
    }

    #[test]
    fn strip_fence_only_at_start() {
        assert_eq!(strip_fences("```json\n{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn strip_fence_only_at_end() {
        assert_eq!(strip_fences("{\"a\": 1}\n```"), "{\"a\": 1}");
    }

    #[test]
    fn strip_fence_only_at_start_same_line_keeps_content() {
        assert_eq!(strip_fences("```true"), "true");
        assert_eq!(strip_fences("```42"), "42");
        assert_eq!(strip_fences("```{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn strip_fence_inline_content_is_kept() {
        assert_eq!(strip_fences("```{\"a\": 1}```"), "{\"a\": 1}");
    }

    #[test]
    fn strip_fences_is_idempotent() {
        for input in [
            "```json\n{\"a\": 1}\n```",
            "```\nhello\n```",
            "no fences here",
            "```yaml\nkey: value",
            "value\n```",
            "",
            "```",
            "```true",
        ] {
            let once = strip_fences(input);
            assert_eq!(strip_fences(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn parse_structured_payload() {
        let raw = r#"```json
{
  "action_summary": "Prepare the quarterly report.",
  "tasks": [
    {"task": "Draft report", "deadline": "Friday", "priority": "High"},
    {"task": "Book room", "deadline": "N/A", "priority": "Low"}
  ]
}
```"#;
        let payload: ActionItemPayload = parse_structured(raw).unwrap();
        assert_eq!(payload.summary, "Prepare the quarterly report.");
        assert_eq!(payload.tasks.len(), 2);
        assert_eq!(payload.tasks[0].priority, Priority::High);
    }

    #[test]
    fn parse_structured_malformed_is_error() {
        let err = parse_structured::<ActionItemPayload>("Sure! Here are the tasks: none")
            .unwrap_err();
        assert!(err.excerpt.starts_with("Sure!"));
        assert!(!err.reason.is_empty());
    }

    #[test]
    fn parse_structured_wrong_schema_is_error() {
        assert!(parse_structured::<ActionItemPayload>(r#"{"foo": 1}"#).is_err());
        assert!(parse_structured::<ActionItemPayload>(r#"{"tasks": [{"task": "x"}]}"#).is_err());
    }

    #[test]
    fn parse_structured_unknown_priority_is_error() {
        let raw = r#"{"action_summary": "", "tasks": [{"task": "x", "deadline": "y", "priority": "Urgent"}]}"#;
        assert!(parse_structured::<ActionItemPayload>(raw).is_err());
    }

    #[test]
    fn task_round_trip() {
        let task = Task {
            task: "Send invoice".into(),
            deadline: "EOD Friday".into(),
            priority: Priority::High,
        };
        let encoded = serde_json::to_string(&task).unwrap();
        let decoded: Task = parse_structured(&encoded).unwrap();
        assert_eq!(decoded, task);
    }

    #[test]
    fn parse_follow_up_block() {
        let follow_up: FollowUp =
            parse_structured("```json\n{\"task\": \"Call Bob\", \"deadline\": \"Monday\"}\n```")
                .unwrap();
        assert_eq!(follow_up.task, "Call Bob");
        assert_eq!(follow_up.deadline, "Monday");
    }
}
