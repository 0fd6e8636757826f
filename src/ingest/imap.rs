//! IMAP ingestion over raw TLS.
//!
//! Fetches the most recent messages from INBOX. The mailbox is opened with
//! `EXAMINE` and bodies are read with `BODY.PEEK[]`, so server-side `\Seen`
//! flags are never touched. Blocking I/O; run through `sync_imap`, which
//! moves the session onto the blocking pool.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mail_parser::{MessageParser, MimeHeaders};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use crate::error::IngestError;
use crate::ingest::{SyncReport, insert_new};
use crate::pipeline::types::Email;
use crate::store::Database;

// ── Configuration ───────────────────────────────────────────────────

/// IMAP account settings, built from environment variables.
#[derive(Debug, Clone)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    /// Number of most recent messages fetched per sync.
    pub fetch_limit: usize,
}

impl ImapConfig {
    /// Returns `None` unless host, username and password are all set.
    pub fn from_env() -> Option<Self> {
        let host = non_empty_var("EMAIL_IMAP_HOST")?;
        let username = non_empty_var("EMAIL_USERNAME")?;
        let password = non_empty_var("EMAIL_PASSWORD")?;

        let port: u16 = std::env::var("EMAIL_IMAP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(993);

        let fetch_limit: usize = std::env::var("EMAIL_IMAP_FETCH_LIMIT")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(10);

        Some(Self {
            host,
            port,
            username,
            password: SecretString::from(password),
            fetch_limit,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

// ── Sync ────────────────────────────────────────────────────────────

/// Fetch recent messages and store the ones not seen before.
pub async fn sync_imap(db: &dyn Database, config: &ImapConfig) -> Result<SyncReport, IngestError> {
    let config = config.clone();
    let emails = tokio::task::spawn_blocking(move || fetch_recent(&config))
        .await
        .map_err(|e| IngestError::Imap(format!("fetch task failed: {e}")))??;

    let report = insert_new(db, &emails).await?;
    info!(
        fetched = report.fetched,
        inserted = report.inserted,
        "IMAP sync complete"
    );
    Ok(report)
}

/// Connect, fetch the newest `fetch_limit` messages, log out.
pub fn fetch_recent(config: &ImapConfig) -> Result<Vec<Email>, IngestError> {
    let stream = connect_tls(config)?;
    let mut session = ImapSession::new(stream);
    session.fetch_recent(config)
}

fn connect_tls(
    config: &ImapConfig,
) -> Result<rustls::StreamOwned<rustls::ClientConnection, TcpStream>, IngestError> {
    let tcp = TcpStream::connect((config.host.as_str(), config.port))
        .map_err(|e| IngestError::Imap(format!("connect {}:{}: {e}", config.host, config.port)))?;
    tcp.set_read_timeout(Some(Duration::from_secs(30)))
        .map_err(|e| IngestError::Imap(e.to_string()))?;

    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = Arc::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth(),
    );
    let server_name = rustls_pki_types::ServerName::try_from(config.host.clone())
        .map_err(|e| IngestError::Imap(format!("invalid host name: {e}")))?;
    let conn = rustls::ClientConnection::new(tls_config, server_name)
        .map_err(|e| IngestError::Imap(format!("TLS setup: {e}")))?;

    Ok(rustls::StreamOwned::new(conn, tcp))
}

// ── Protocol ────────────────────────────────────────────────────────

/// Tagged response to one command.
#[derive(Debug, Default)]
struct Response {
    /// Untagged and tagged lines, CRLF stripped.
    lines: Vec<String>,
    /// Literal payloads in arrival order.
    literals: Vec<Vec<u8>>,
    ok: bool,
}

/// Minimal IMAP4rev1 client over any byte stream.
struct ImapSession<S> {
    stream: S,
    next_tag: u32,
}

impl<S: Read + Write> ImapSession<S> {
    fn new(stream: S) -> Self {
        Self {
            stream,
            next_tag: 1,
        }
    }

    fn fetch_recent(&mut self, config: &ImapConfig) -> Result<Vec<Email>, IngestError> {
        let greeting = self.read_line()?;
        if !greeting.starts_with("* OK") {
            return Err(IngestError::Imap(format!("unexpected greeting: {greeting}")));
        }

        let login = self.command(&format!(
            "LOGIN {} {}",
            quote(&config.username),
            quote(config.password.expose_secret())
        ))?;
        if !login.ok {
            return Err(IngestError::Imap("login failed".into()));
        }

        let examine = self.command("EXAMINE \"INBOX\"")?;
        if !examine.ok {
            return Err(IngestError::Imap("cannot open INBOX".into()));
        }

        let search = self.command("UID SEARCH ALL")?;
        let mut uids = parse_search(&search.lines);
        uids.sort_unstable();
        let newest: Vec<u32> = uids.into_iter().rev().take(config.fetch_limit).collect();
        debug!(count = newest.len(), "Fetching IMAP messages");

        let mut emails = Vec::with_capacity(newest.len());
        for uid in newest {
            let fetch = self.command(&format!("UID FETCH {uid} BODY.PEEK[]"))?;
            match fetch.literals.first() {
                Some(raw) if fetch.ok => match parse_message(&uid.to_string(), raw) {
                    Some(email) => emails.push(email),
                    None => warn!(uid, "Skipping unparseable message"),
                },
                _ => warn!(uid, "No body returned for message"),
            }
        }

        // Best-effort; the data is already in hand.
        let _ = self.command("LOGOUT");
        Ok(emails)
    }

    fn command(&mut self, cmd: &str) -> Result<Response, IngestError> {
        let tag = format!("A{}", self.next_tag);
        self.next_tag += 1;

        self.stream
            .write_all(format!("{tag} {cmd}\r\n").as_bytes())
            .and_then(|_| self.stream.flush())
            .map_err(|e| IngestError::Imap(format!("write: {e}")))?;

        let mut response = Response::default();
        loop {
            let line = self.read_line()?;
            if let Some(size) = literal_size(&line) {
                let mut literal = vec![0u8; size];
                self.stream
                    .read_exact(&mut literal)
                    .map_err(|e| IngestError::Imap(format!("read literal: {e}")))?;
                response.literals.push(literal);
            }
            if let Some(status) = line.strip_prefix(&format!("{tag} ")) {
                response.ok = status.starts_with("OK");
                response.lines.push(line);
                return Ok(response);
            }
            response.lines.push(line);
        }
    }

    fn read_line(&mut self) -> Result<String, IngestError> {
        let mut buf = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match self.stream.read(&mut byte) {
                Ok(0) => return Err(IngestError::Imap("connection closed".into())),
                Ok(_) => {
                    buf.push(byte[0]);
                    if buf.ends_with(b"\r\n") {
                        buf.truncate(buf.len() - 2);
                        return Ok(String::from_utf8_lossy(&buf).into_owned());
                    }
                }
                Err(e) => return Err(IngestError::Imap(format!("read: {e}"))),
            }
        }
    }
}

/// IMAP quoted string.
fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Size of a trailing `{n}` literal marker.
fn literal_size(line: &str) -> Option<usize> {
    let open = line.strip_suffix('}')?.rfind('{')?;
    line[open + 1..line.len() - 1].parse().ok()
}

fn parse_search(lines: &[String]) -> Vec<u32> {
    lines
        .iter()
        .filter_map(|l| l.strip_prefix("* SEARCH"))
        .flat_map(|rest| rest.split_whitespace())
        .filter_map(|n| n.parse().ok())
        .collect()
}

// ── Message parsing ─────────────────────────────────────────────────

/// Build an unread `Email` from a raw RFC 822 message.
fn parse_message(id: &str, raw: &[u8]) -> Option<Email> {
    let parsed = MessageParser::default().parse(raw)?;

    let received_at = parsed
        .date()
        .and_then(|d| DateTime::<Utc>::from_timestamp(d.to_timestamp(), 0))
        .unwrap_or_else(Utc::now);

    Some(Email::new(
        id,
        extract_sender(&parsed),
        parsed.subject().unwrap_or("(no subject)"),
        extract_text(&parsed),
        received_at,
    ))
}

fn extract_sender(parsed: &mail_parser::Message) -> String {
    parsed
        .from()
        .and_then(|addr| addr.first())
        .and_then(|a| a.address())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".into())
}

/// Plain-text body, else HTML reduced to text, else the first text attachment.
fn extract_text(parsed: &mail_parser::Message) -> String {
    if let Some(text) = parsed.body_text(0) {
        return text.trim().to_string();
    }
    if let Some(html) = parsed.body_html(0) {
        return strip_html(html.as_ref());
    }
    for part in parsed.attachments() {
        if let Some(ct) = MimeHeaders::content_type(part)
            && ct.ctype() == "text"
            && let Ok(text) = std::str::from_utf8(part.contents())
        {
            return text.trim().to_string();
        }
    }
    String::new()
}

/// Drop tags and collapse whitespace.
pub fn strip_html(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
