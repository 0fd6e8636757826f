use anyhow::Context;

use inbox_agent::api::app_router;
use inbox_agent::app::bootstrap;
use inbox_agent::cli::run_repl;
use inbox_agent::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;

    eprintln!("📬 Inbox Agent v{}", env!("CARGO_PKG_VERSION"));
    match &config.llm {
        Some(llm) => eprintln!("   Model: {} ({:?})", llm.model, llm.backend),
        None => eprintln!("   Model: not configured (model calls will fail)"),
    }
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   API: http://0.0.0.0:{}", config.port);
    eprintln!(
        "   IMAP: {}",
        if config.imap.is_some() { "configured" } else { "disabled" }
    );

    let state = bootstrap(&config).await.context("startup failed")?;

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "HTTP server started");

    let app = app_router(state.clone());

    if config.cli {
        let server = tokio::spawn(async move { axum::serve(listener, app).await });
        run_repl(state.chat.clone(), state.db.clone()).await;
        server.abort();
        eprintln!("Goodbye.");
    } else {
        axum::serve(listener, app).await.context("server error")?;
    }

    Ok(())
}
