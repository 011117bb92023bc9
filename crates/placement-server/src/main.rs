use tracing::info;
use tracing_subscriber::EnvFilter;

use placement_server::{AppState, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,placement_server=debug")),
        )
        .init();

    info!("Starting placement backend v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(
        instance = %config.instance_name,
        addr = %config.http_addr,
        admin_enabled = config.admin_token.is_some(),
        seed_demo = config.seed_demo,
        "Loaded configuration"
    );

    // -----------------------------------------------------------------------
    // 3. Initialize state
    // -----------------------------------------------------------------------
    let http_addr = config.http_addr;
    let seed_demo = config.seed_demo;
    let state = AppState::new(config);

    if seed_demo {
        state.backend.seed_demo().await;
    }

    // -----------------------------------------------------------------------
    // 4. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = placement_server::serve(state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
