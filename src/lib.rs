//! Inbox Agent: LLM-assisted email triage.

pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod pipeline;
pub mod store;
