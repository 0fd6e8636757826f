//! REST endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{ApiError, AppState};
use crate::error::IngestError;
use crate::ingest::{self, SyncReport};
use crate::pipeline::prompts::TemplateName;
use crate::pipeline::resolve_rules;

type ApiResult<T> = Result<T, ApiError>;

pub(super) fn routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/emails", get(list_emails))
        .route("/emails/{id}", get(get_email))
        .route("/emails/{id}/process", post(process_email))
        .route("/emails/{id}/draft", post(generate_draft))
        .route("/drafts", get(list_drafts).post(create_draft))
        .route("/drafts/{id}", put(update_draft).delete(delete_draft))
        .route("/chat", post(chat))
        .route("/prompts/{name}", get(get_prompt).post(update_prompt))
        .route("/sync/mock", post(sync_mock))
        .route("/sync/real", post(sync_real))
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "online",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ── Emails ──────────────────────────────────────────────────────────

async fn list_emails(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.db.list_emails().await?))
}

async fn get_email(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    match state.db.get_email(&id).await? {
        Some(email) => Ok(Json(email)),
        None => Err(ApiError::not_found("Email not found")),
    }
}

async fn process_email(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let processed = state.processor.process(&id).await?;
    Ok(Json(json!({
        "status": "success",
        "category": processed.category,
        "action_items": processed.action_items,
    })))
}

async fn generate_draft(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let draft = state.drafts.draft(&id).await?;
    Ok(Json(json!({
        "status": "success",
        "draft_id": draft.draft_id,
        "subject": draft.subject,
        "draft_body": draft.body,
    })))
}

// ── Drafts ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct NewDraft {
    email_id: String,
    subject: String,
    body: String,
}

#[derive(Deserialize)]
struct DraftEdit {
    subject: String,
    body: String,
}

async fn list_drafts(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.db.list_drafts().await?))
}

async fn create_draft(
    State(state): State<AppState>,
    Json(req): Json<NewDraft>,
) -> ApiResult<impl IntoResponse> {
    let id = state
        .db
        .insert_draft(&req.email_id, &req.subject, &req.body)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({"status": "success", "draft_id": id})),
    ))
}

async fn update_draft(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<DraftEdit>,
) -> ApiResult<impl IntoResponse> {
    state.db.update_draft(id, &req.subject, &req.body).await?;
    Ok(Json(json!({"status": "success"})))
}

async fn delete_draft(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    state.db.delete_draft(id).await?;
    Ok(Json(json!({"status": "success"})))
}

// ── Chat ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default)]
    selected_email_id: Option<String>,
}

async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<impl IntoResponse> {
    let result = state
        .chat
        .handle(&req.message, req.selected_email_id.as_deref())
        .await?;
    Ok(Json(result))
}

// ── Prompt rules ────────────────────────────────────────────────────

#[derive(Deserialize)]
struct PromptUpdate {
    content: String,
}

fn template(name: &str) -> ApiResult<TemplateName> {
    name.parse().map_err(|e: crate::pipeline::prompts::UnknownTemplate| {
        ApiError::not_found(e.to_string())
    })
}

async fn get_prompt(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let name = template(&name)?;
    let content = resolve_rules(state.db.as_ref(), name).await?;
    Ok(Json(json!({"name": name.as_str(), "content": content})))
}

async fn update_prompt(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<PromptUpdate>,
) -> ApiResult<impl IntoResponse> {
    let name = template(&name)?;
    state.db.put_prompt_rule(name, &req.content).await?;
    info!(template = %name, "Prompt rules updated");
    Ok(Json(json!({"status": "success"})))
}

// ── Sync ────────────────────────────────────────────────────────────

fn sync_response(report: SyncReport) -> impl IntoResponse {
    Json(json!({
        "status": "success",
        "count": report.fetched,
        "inserted": report.inserted,
    }))
}

async fn sync_mock(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let report = ingest::load_mock_inbox(state.db.as_ref(), &state.mock_inbox_path).await?;
    Ok(sync_response(report))
}

async fn sync_real(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let config = state.imap.as_ref().ok_or(IngestError::NotConfigured)?;
    let report = ingest::sync_imap(state.db.as_ref(), config).await?;
    Ok(sync_response(report))
}
