//! Prompt composition.
//!
//! Two tiers: a fixed system skeleton per template (never user-editable,
//! compiled in) and a user-editable rule block (stored, passed in verbatim).
//! The two meet only in `compose`.

use std::fmt;
use std::str::FromStr;

/// Marker replaced by the user rule block.
pub const RULES_MARKER: &str = "[USER_RULES_PLACEHOLDER]";

/// Marker replaced by the email body (or query text).
pub const CONTENT_MARKER: &str = "{email_body}";

/// Marker for the chat follow-up block; everything after it is structured.
pub const FOLLOW_UP_MARKER: &str = "### Suggested Follow-Up Action (JSON)";

/// Header the model uses for the narrative part of a suggested reply.
pub const DRAFT_REPLY_HEADER: &str = "### Suggested Draft Reply";

/// Name of a rule-bearing prompt template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateName {
    Categorization,
    ActionItems,
    AutoReply,
}

impl TemplateName {
    pub const ALL: [TemplateName; 3] = [Self::Categorization, Self::ActionItems, Self::AutoReply];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Categorization => "categorization",
            Self::ActionItems => "action_items",
            Self::AutoReply => "auto_reply",
        }
    }

    /// The fixed system skeleton for this template.
    pub fn skeleton(self) -> &'static str {
        match self {
            Self::Categorization => CATEGORIZATION_SKELETON,
            Self::ActionItems => ACTION_ITEMS_SKELETON,
            Self::AutoReply => AUTO_REPLY_SKELETON,
        }
    }

    /// Rule block used when none has been stored.
    pub fn default_rules(self) -> &'static str {
        match self {
            Self::Categorization => DEFAULT_CATEGORIZATION_RULES,
            Self::ActionItems => DEFAULT_ACTION_ITEMS_RULES,
            Self::AutoReply => DEFAULT_AUTO_REPLY_RULES,
        }
    }
}

impl fmt::Display for TemplateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognised template name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown prompt template: {0}")]
pub struct UnknownTemplate(pub String);

impl FromStr for TemplateName {
    type Err = UnknownTemplate;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "categorization" => Ok(Self::Categorization),
            "action_items" => Ok(Self::ActionItems),
            "auto_reply" => Ok(Self::AutoReply),
            other => Err(UnknownTemplate(other.to_string())),
        }
    }
}

/// Merge a skeleton, a rule block, and subject content into one prompt.
///
/// Literal replacement, no escaping. Only the skeleton is scanned for
/// markers: marker text inside `user_rules` or `subject_content` is copied
/// through unchanged. `extra_query` is appended as a trailing `USER_QUERY:`
/// section, never merged into the content.
pub fn compose(
    system_template: &str,
    user_rules: &str,
    subject_content: &str,
    extra_query: Option<&str>,
) -> String {
    let mut prompt = fill(
        system_template,
        &[(RULES_MARKER, user_rules), (CONTENT_MARKER, subject_content)],
    );

    if let Some(query) = extra_query {
        prompt.push_str("\n\nUSER_QUERY: ");
        prompt.push_str(query);
    }
    prompt
}

/// Build the general chat prompt around an inbox summary and the user's message.
pub fn general_chat_prompt(inbox_context: &str, message: &str) -> String {
    fill(
        GENERAL_CHAT_SKELETON,
        &[(INBOX_CONTEXT_MARKER, inbox_context), (CONTENT_MARKER, message)],
    )
}

/// Single left-to-right pass over `template`; substituted values are never rescanned.
fn fill(template: &str, slots: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    loop {
        let next = slots
            .iter()
            .filter_map(|&(marker, value)| rest.find(marker).map(|pos| (pos, marker, value)))
            .min_by_key(|&(pos, _, _)| pos);
        match next {
            Some((pos, marker, value)) => {
                out.push_str(&rest[..pos]);
                out.push_str(value);
                rest = &rest[pos + marker.len()..];
            }
            None => {
                out.push_str(rest);
                return out;
            }
        }
    }
}

// ── Skeletons ───────────────────────────────────────────────────────

const INBOX_CONTEXT_MARKER: &str = "{inbox_context}";

const GENERAL_CHAT_SKELETON: &str = "You are an advanced email productivity agent.
You have access to the user's inbox metadata below.

INBOX CONTEXT:
{inbox_context}

USER QUERY: {email_body}

Answer the user's query based on the inbox context if relevant. Be concise.
If the user asks you to suggest a reply, write it under the header \"### Suggested Draft Reply\" \
and then add the header \"### Suggested Follow-Up Action (JSON)\" followed by a JSON object \
{\"task\": \"...\", \"deadline\": \"...\"} describing the follow-up the user should do.";

const CATEGORIZATION_SKELETON: &str = "You are an Email Classification Engine. Your single task is to classify the provided email text.

## Instructions
Analyze the EMAIL_CONTENT provided below. Your classification must strictly adhere to the following rules:

[USER_RULES_PLACEHOLDER]

EMAIL_CONTENT:
---
{email_body}
---

## Output Format
Respond with ONLY the single classification tag string. Do not include any other text, explanation, or punctuation.";

const ACTION_ITEMS_SKELETON: &str = r#"You are a Task Extraction Agent. Your task is to extract all assigned actions and their associated metadata from the EMAIL_CONTENT.

## Instructions
Process the EMAIL_CONTENT below. List all specific action items assigned to the recipient.
If no action items are found, the 'tasks' array must be empty.

[USER_RULES_PLACEHOLDER]

EMAIL_CONTENT:
---
{email_body}
---

## JSON Schema
{
  "type": "object",
  "properties": {
    "action_summary": {
      "type": "string",
      "description": "A one-sentence summary of the overall action required in the email."
    },
    "tasks": {
      "type": "array",
      "description": "A list of individual, specific tasks assigned to the recipient.",
      "items": {
        "type": "object",
        "properties": {
          "task": {"type": "string", "description": "The exact task to be performed."},
          "deadline": {"type": "string", "description": "The explicit or implied deadline (e.g., 'EOD Friday', 'Next Week', or 'N/A')."},
          "priority": {"type": "string", "enum": ["High", "Medium", "Low"], "description": "The urgency of the task."}
        },
        "required": ["task", "deadline", "priority"]
      }
    }
  },
  "required": ["action_summary", "tasks"]
}

Respond with ONLY the JSON object."#;

const AUTO_REPLY_SKELETON: &str = "You are an email drafting engine. Your task is to write the body of the reply email based on the context provided.

[USER_RULES_PLACEHOLDER]

EMAIL_CONTENT:
---
{email_body}
---

## Output Format
Output ONLY the email body text.
- Do not include a Subject line.
- Do not include 'To:' or 'From:' headers.
- Do not include markdown formatting like '###'.
- Do not include conversational text like 'Here is the draft'.";

// ── Default rules ───────────────────────────────────────────────────

const DEFAULT_CATEGORIZATION_RULES: &str = "Use exactly one of these tags: Important, Newsletter, Spam, To-Do, Meeting.
- To-Do: the email asks the recipient to do something.
- Meeting: the email schedules, moves, or cancels a meeting.
- Newsletter: bulk or subscription content.
- Spam: unsolicited promotions or phishing.
- Important: anything else that needs the recipient's attention.";

const DEFAULT_ACTION_ITEMS_RULES: &str = "Only include tasks addressed to the recipient.
Use 'N/A' when no deadline is stated.
Mark anything due within two days as High priority.";

const DEFAULT_AUTO_REPLY_RULES: &str = "Write a short, polite, professional reply.
If the email is a meeting request, ask for an agenda.
Never commit to dates or amounts that are not in the email.";
