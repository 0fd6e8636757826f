//! Startup wiring: store, defaults, mock data and pipeline state.

use std::sync::Arc;

use tracing::info;

use crate::api::AppState;
use crate::config::AppConfig;
use crate::error::Result;
use crate::ingest;
use crate::llm::create_gateway;
use crate::pipeline::seed_default_rules;
use crate::store::{Database, LibSqlBackend};

/// Open the database, seed defaults, and build the shared state.
pub async fn bootstrap(config: &AppConfig) -> Result<AppState> {
    let gateway = create_gateway(config.llm.as_ref(), config.gateway.clone())?;

    let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_local(&config.db_path).await?);
    seed_default_rules(db.as_ref()).await?;

    let loaded = ingest::seed_if_empty(db.as_ref(), &config.mock_inbox_path).await?;
    if loaded > 0 {
        info!(count = loaded, "Loaded mock inbox into empty store");
    }

    Ok(AppState::new(
        db,
        gateway,
        config.imap.clone(),
        config.mock_inbox_path.clone(),
    ))
}
