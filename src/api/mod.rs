//! HTTP API: axum routes over the pipeline and the store.

mod error;
mod routes;

pub use error::ApiError;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::ingest::ImapConfig;
use crate::llm::ModelGateway;
use crate::pipeline::{ChatRouter, DraftGenerator, EmailProcessor};
use crate::store::Database;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Database>,
    pub processor: Arc<EmailProcessor>,
    pub drafts: Arc<DraftGenerator>,
    pub chat: Arc<ChatRouter>,
    /// IMAP account (None if `/sync/real` is disabled).
    pub imap: Option<ImapConfig>,
    pub mock_inbox_path: PathBuf,
}

impl AppState {
    /// Wire the pipeline components around one store and one gateway.
    pub fn new(
        db: Arc<dyn Database>,
        gateway: ModelGateway,
        imap: Option<ImapConfig>,
        mock_inbox_path: PathBuf,
    ) -> Self {
        Self {
            processor: Arc::new(EmailProcessor::new(db.clone(), gateway.clone())),
            drafts: Arc::new(DraftGenerator::new(db.clone(), gateway.clone())),
            chat: Arc::new(ChatRouter::new(db.clone(), gateway)),
            db,
            imap,
            mock_inbox_path,
        }
    }
}

/// Build the full router with tracing and permissive CORS.
pub fn app_router(state: AppState) -> Router {
    routes::routes(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    )
}
