//! Configuration types.
//!
//! Read once at startup into an immutable `AppConfig`.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::ingest::ImapConfig;
use crate::llm::{GatewayConfig, LlmBackend, LlmConfig};

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Model settings. `None` when no API key is configured.
    pub llm: Option<LlmConfig>,
    pub gateway: GatewayConfig,
    /// HTTP listen port.
    pub port: u16,
    pub db_path: PathBuf,
    pub mock_inbox_path: PathBuf,
    /// IMAP account. `None` disables `/sync/real`.
    pub imap: Option<ImapConfig>,
    /// Run the interactive chat REPL on stdin.
    pub cli: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: None,
            gateway: GatewayConfig::default(),
            port: 8000,
            db_path: PathBuf::from("./data/inbox-agent.db"),
            mock_inbox_path: PathBuf::from("./data/mock_inbox.json"),
            imap: None,
            cli: false,
        }
    }
}

impl AppConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.imap = ImapConfig::from_env();
        Ok(config)
    }

    /// Build config from an arbitrary key lookup. IMAP is left unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let backend: LlmBackend = match get("INBOX_AGENT_LLM_BACKEND") {
            Some(raw) => raw.parse()?,
            None => LlmBackend::Anthropic,
        };
        let llm = get(backend.api_key_var()).map(|key| LlmConfig {
            backend,
            api_key: SecretString::from(key),
            model: get("INBOX_AGENT_MODEL").unwrap_or_else(|| backend.default_model().to_string()),
        });

        let port = match get("INBOX_AGENT_PORT") {
            Some(raw) => parse_value("INBOX_AGENT_PORT", &raw)?,
            None => defaults.port,
        };

        let timeout = match get("INBOX_AGENT_LLM_TIMEOUT_SECS") {
            Some(raw) => Some(Duration::from_secs(parse_value(
                "INBOX_AGENT_LLM_TIMEOUT_SECS",
                &raw,
            )?)),
            None => None,
        };

        let max_tokens = match get("INBOX_AGENT_LLM_MAX_TOKENS") {
            Some(raw) => parse_value("INBOX_AGENT_LLM_MAX_TOKENS", &raw)?,
            None => defaults.gateway.max_tokens,
        };

        let cli = get("INBOX_AGENT_CLI")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            llm,
            gateway: GatewayConfig {
                timeout,
                max_tokens,
                ..defaults.gateway
            },
            port,
            db_path: get("INBOX_AGENT_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            mock_inbox_path: get("INBOX_AGENT_MOCK_INBOX")
                .map(PathBuf::from)
                .unwrap_or(defaults.mock_inbox_path),
            imap: None,
            cli,
        })
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("'{raw}': {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert!(config.llm.is_none());
        assert_eq!(config.port, 8000);
        assert_eq!(config.db_path, PathBuf::from("./data/inbox-agent.db"));
        assert!(config.gateway.timeout.is_none());
        assert_eq!(config.gateway.max_tokens, crate::llm::DEFAULT_MAX_TOKENS);
        assert!(!config.cli);
    }

    #[test]
    fn anthropic_key_enables_model() {
        let config = AppConfig::from_lookup(lookup(&[("ANTHROPIC_API_KEY", "sk-ant-test")])).unwrap();
        let llm = config.llm.unwrap();
        assert_eq!(llm.backend, LlmBackend::Anthropic);
        assert_eq!(llm.model, "claude-sonnet-4-20250514");
    }

    #[test]
    fn openai_backend_reads_its_own_key() {
        let config = AppConfig::from_lookup(lookup(&[
            ("INBOX_AGENT_LLM_BACKEND", "openai"),
            ("ANTHROPIC_API_KEY", "sk-ant-test"),
        ]))
        .unwrap();
        assert!(config.llm.is_none());

        let config = AppConfig::from_lookup(lookup(&[
            ("INBOX_AGENT_LLM_BACKEND", "openai"),
            ("OPENAI_API_KEY", "sk-test"),
            ("INBOX_AGENT_MODEL", "gpt-4o-mini"),
        ]))
        .unwrap();
        assert_eq!(config.llm.unwrap().model, "gpt-4o-mini");
    }

    #[test]
    fn overrides_are_applied() {
        let config = AppConfig::from_lookup(lookup(&[
            ("INBOX_AGENT_PORT", "9100"),
            ("INBOX_AGENT_LLM_TIMEOUT_SECS", "30"),
            ("INBOX_AGENT_LLM_MAX_TOKENS", "8192"),
            ("INBOX_AGENT_CLI", "true"),
            ("INBOX_AGENT_MOCK_INBOX", "/tmp/inbox.json"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.gateway.timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.gateway.max_tokens, 8192);
        assert!(config.cli);
        assert_eq!(config.mock_inbox_path, PathBuf::from("/tmp/inbox.json"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = AppConfig::from_lookup(lookup(&[("INBOX_AGENT_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "INBOX_AGENT_PORT"));

        let err =
            AppConfig::from_lookup(lookup(&[("INBOX_AGENT_LLM_BACKEND", "gemini")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
