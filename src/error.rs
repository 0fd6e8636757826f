//! Error types for the inbox agent.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Model gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// No credential or provider configured.
    #[error("Model unavailable: {reason}")]
    Unavailable { reason: String },

    /// The call was made and failed (transport, provider, or timeout).
    #[error("Model call to {provider} failed: {reason}")]
    CallFailed { provider: String, reason: String },
}

/// Structured decode failure for a model response.
///
/// Recovered locally by callers; never surfaced as a request failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Failed to parse structured payload: {reason}")]
pub struct ParseError {
    pub reason: String,
    /// Leading slice of the text that failed to decode.
    pub excerpt: String,
}

/// Pipeline errors surfaced to callers of process / draft / chat.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Processing failed for email {email_id}: {source}")]
    ProcessingFailed {
        email_id: String,
        #[source]
        source: LlmError,
    },

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Storage failure: {0}")]
    Database(#[from] DatabaseError),
}

impl PipelineError {
    pub fn email_not_found(id: &str) -> Self {
        Self::NotFound {
            entity: "Email".to_string(),
            id: id.to_string(),
        }
    }
}

/// Email ingestion errors (mock file or IMAP).
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Failed to read mock inbox {path}: {reason}")]
    MockFile { path: String, reason: String },

    #[error("IMAP error: {0}")]
    Imap(String),

    #[error("IMAP is not configured (set EMAIL_IMAP_HOST, EMAIL_USERNAME, EMAIL_PASSWORD)")]
    NotConfigured,

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
