mod analysis;
mod config;
mod error;
mod gemini;
mod server;
mod tools;
mod web;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rmcp::{transport::stdio, ServiceExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::Analyzer;
use crate::config::Config;
use crate::gemini::GeminiClient;
use crate::server::RankKvServer;
use crate::web::{create_router, AppState};

#[derive(Debug, Parser)]
#[command(name = "rankkv", version, about = "Keyword research backed by Gemini")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API (POST /api/analyze)
    Serve {
        /// Address to bind, overrides RANKKV_BIND
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Run as an MCP server over stdio
    Mcp,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout belongs to the MCP transport, so logs always go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    tracing::info!("Starting RankKV v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    tracing::debug!("Configuration loaded: model={} api_url={}", config.model, config.api_url);
    if config.api_key.resolve().is_none() {
        tracing::warn!("{} is not set; analyses will fail until it is configured", config.api_key.name());
    }

    let client = GeminiClient::new(&config)?;

    match cli.command {
        Command::Serve { bind } => serve_http(config, client, bind).await,
        Command::Mcp => serve_mcp(config, client).await,
    }
}

async fn serve_http(config: Config, client: GeminiClient, bind: Option<SocketAddr>) -> Result<()> {
    let analyzer = Analyzer::from_config(Arc::new(client), &config);
    let state = AppState::new(analyzer, Duration::from_secs(config.analyze_timeout));
    let app = create_router(state);

    let addr = bind.unwrap_or(config.bind);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("RankKV HTTP server stopped");
    Ok(())
}

async fn serve_mcp(config: Config, client: GeminiClient) -> Result<()> {
    let server = RankKvServer::new(config, client);
    let service = server.serve(stdio()).await?;

    tokio::select! {
        result = service.waiting() => {
            if let Err(e) = result {
                tracing::warn!("Service ended with error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("Shutdown signal received");
        }
    }

    tracing::info!("RankKV MCP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
