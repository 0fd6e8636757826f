//! Interactive chat REPL on stdin/stdout.
//!
//! Commands: `/select <id>`, `/select` (clear selection), `/clear`, `/save`, `/quit`.
//! Anything else is routed through `ChatRouter`.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::pipeline::types::ChatResult;
use crate::pipeline::{ChatRouter, ChatSession};
use crate::store::Database;

/// A parsed REPL input line.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Select(Option<String>),
    Clear,
    Save,
    Quit,
    Message(String),
}

/// Parse one trimmed, non-empty input line.
pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    match line.split_once(char::is_whitespace) {
        Some(("/select", id)) => Command::Select(Some(id.trim().to_string())),
        _ => match line {
            "/select" => Command::Select(None),
            "/clear" => Command::Clear,
            "/save" => Command::Save,
            "/quit" | "/exit" => Command::Quit,
            _ => Command::Message(line.to_string()),
        },
    }
}

/// Text printed for a chat result.
pub fn render(result: &ChatResult) -> String {
    match result {
        ChatResult::Draft { content } => format!(
            "--- DRAFT PREVIEW (not sent) ---\n{content}\n--- /save to keep this draft ---"
        ),
        ChatResult::Text {
            content,
            follow_up: Some(follow_up),
        } => format!(
            "{content}\n\nSuggested follow-up:\n  Task: {}\n  Deadline: {}",
            follow_up.task, follow_up.deadline
        ),
        ChatResult::Text { content, .. } => content.clone(),
    }
}

/// Run the REPL until EOF or `/quit`.
pub async fn run_repl(router: Arc<ChatRouter>, db: Arc<dyn Database>) {
    let mut session = ChatSession::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    eprintln!("Chat ready. /select <id>, /clear, /save, /quit.");
    eprint!("> ");

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Error reading stdin: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            eprint!("> ");
            continue;
        }

        match parse_command(&line) {
            Command::Quit => break,
            Command::Select(id) => {
                match &id {
                    Some(id) => eprintln!("Selected email {id}"),
                    None => eprintln!("Selection cleared"),
                }
                session.select(id);
            }
            Command::Clear => {
                session.clear();
                eprintln!("History cleared");
            }
            Command::Save => match session.save_draft(db.as_ref()).await {
                Ok(Some(id)) => eprintln!("Draft saved (id {id})"),
                Ok(None) => eprintln!("No chat draft to save"),
                Err(e) => eprintln!("Failed to save draft: {e}"),
            },
            Command::Message(message) => match session.send(&router, &message).await {
                Ok(result) => println!("\n{}\n", render(&result)),
                Err(e) => eprintln!("Error: {e}"),
            },
        }
        eprint!("> ");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::FollowUp;

    #[test]
    fn parses_commands() {
        assert_eq!(
            parse_command("/select 42"),
            Command::Select(Some("42".into()))
        );
        assert_eq!(parse_command("/select"), Command::Select(None));
        assert_eq!(parse_command(" /clear "), Command::Clear);
        assert_eq!(parse_command("/save"), Command::Save);
        assert_eq!(parse_command("/quit"), Command::Quit);
        assert_eq!(
            parse_command("draft a reply"),
            Command::Message("draft a reply".into())
        );
    }

    #[test]
    fn renders_follow_up() {
        let out = render(&ChatResult::Text {
            content: "Reply text".into(),
            follow_up: Some(FollowUp {
                task: "Call Ann".into(),
                deadline: "Friday".into(),
            }),
        });
        assert!(out.starts_with("Reply text"));
        assert!(out.contains("Task: Call Ann"));
        assert!(out.contains("Deadline: Friday"));
    }

    #[test]
    fn renders_draft_preview() {
        let out = render(&ChatResult::Draft {
            content: "Hi Bob".into(),
        });
        assert!(out.contains("DRAFT PREVIEW"));
        assert!(out.contains("Hi Bob"));
    }
}
