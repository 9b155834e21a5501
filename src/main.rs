mod db;
mod export;
mod translate;
mod types;
mod upload;
mod web;
mod worker;

use anyhow::{Context, Result};
use clap::Parser;
use db::ConnectionManager;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use translate::{Translator, TranslatorConfig};
use upload::ScratchDir;
use web::AppState;
use worker::Worker;

#[derive(Parser)]
#[command(name = "duckdesk")]
#[command(about = "A web SQL editor for DuckDB database files", version)]
struct Cli {
    /// Database file opened at startup
    #[arg(long, env = "DUCKDB_PATH", default_value = "../duckdb-demo.duckdb")]
    database: PathBuf,

    /// Address to bind
    #[arg(long, env = "DUCKDESK_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to bind
    #[arg(long, env = "DUCKDESK_PORT", default_value_t = 5001)]
    port: u16,

    /// Directory for uploaded database files, removed at shutdown
    #[arg(long, env = "DUCKDESK_UPLOAD_DIR", default_value = "./temp_db")]
    upload_dir: PathBuf,

    /// Maximum rows returned by a query (0 for no limit)
    #[arg(long, env = "DUCKDESK_MAX_ROWS", default_value_t = 100)]
    max_rows: usize,

    /// Maximum upload size in megabytes
    #[arg(long, env = "DUCKDESK_UPLOAD_LIMIT_MB", default_value_t = 512)]
    upload_limit_mb: usize,

    /// Model used for natural-language translation
    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4o")]
    openai_model: String,

    /// Root of the chat-completions API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    openai_base_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("duckdesk=info,tower_http=info")
            }),
        )
        .init();

    let cli = Cli::parse();

    if !cli.database.is_file() {
        warn!(
            "Database file not found: {}. Upload a database to get started.",
            cli.database.display()
        );
    }
    let worker = Worker::new(ConnectionManager::new(&cli.database));

    let translator = Translator::new(TranslatorConfig {
        api_key: std::env::var("OPENAI_API_KEY").ok(),
        model: cli.openai_model,
        base_url: cli.openai_base_url,
    })
    .context("Failed to build translator client")?;
    if !translator.is_configured() {
        warn!("OPENAI_API_KEY is not set; natural-language translation is disabled");
    }

    let scratch = Arc::new(ScratchDir::new(cli.upload_dir));
    let state = AppState {
        worker: worker.handle(),
        translator: Arc::new(translator),
        scratch: scratch.clone(),
        max_rows: (cli.max_rows > 0).then_some(cli.max_rows),
    };
    let app = web::router(state, cli.upload_limit_mb * 1024 * 1024);

    let addr = format!("{}:{}", cli.host, cli.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Serving DuckDB SQL editor on http://{}", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error");

    finish(served, worker, &scratch)
}

/// Stop the worker and remove uploads, then report the server outcome.
/// Teardown runs even when the server failed.
fn finish(served: Result<()>, worker: Worker, scratch: &ScratchDir) -> Result<()> {
    let stopped = worker.shutdown();
    scratch.cleanup();
    info!("Shutdown complete");

    served?;
    stopped
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install CTRL+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
