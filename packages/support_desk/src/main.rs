use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::prelude::*;

use support_desk::AppState;
use support_desk::config::{CliOverrides, FileConfig, ServerConfig, load_config};

#[derive(Parser)]
#[command(name = "desk")]
#[command(about = "Pairs support executives with clients and relays their chat over WebSocket")]
struct Args {
    /// Config file (defaults to ./desk.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port for the HTTP/WebSocket server (0 = auto-select)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to
    #[arg(short = 'b', long)]
    host: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    let default_directive = if args.debug {
        "support_desk=debug,pairing_broker=debug,tower_http=debug,info"
    } else {
        "support_desk=info,pairing_broker=info,tower_http=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    let file_config: FileConfig = load_config(args.config.as_deref())
        .extract()
        .context("Failed to load configuration")?;
    let server_config = ServerConfig::from_file(
        &file_config,
        &CliOverrides {
            host: args.host,
            port: args.port,
        },
    );
    let addr = server_config.bind_addr()?;

    info!(
        "Server config: max_message={}KB, ping_interval={:?}",
        server_config.websocket.max_message_bytes / 1024,
        server_config.websocket.ping_interval
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    // Get the actual bound address (important when port was 0)
    let actual_addr = listener.local_addr()?;

    // Output address information in a machine-readable format first
    println!("DESK_PORT={}", actual_addr.port());
    println!("DESK_ADDR={}", actual_addr);

    info!("Support desk listening on http://{}", actual_addr);
    info!("Endpoints:");
    info!("  GET  /health     - Liveness check");
    info!("  GET  /api/stats  - Connection, pairing and relay counters");
    info!("  GET  /ws         - WebSocket for registration and chat relay");

    let state = AppState::new(server_config);
    support_desk::serve(listener, state, shutdown_signal()).await?;

    info!("Support desk stopped");
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
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
