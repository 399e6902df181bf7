use anyhow::Result;
use clap::Parser;
use plm_mcp::config::timeout_from_secs;
use plm_mcp::server::{router, AppState, DEFAULT_PORT};
use plm_mcp::GatewayConfig;
use std::path::PathBuf;

/// PLM MCP HTTP Server
#[derive(Parser)]
#[command(name = "plm-mcp-http")]
#[command(author, version, about)]
struct Args {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// HTTP server port
    #[arg(short = 'P', long = "port", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// JSON configuration file (or PLM_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Backend request timeout in seconds, overrides PLM_TIMEOUT_SECS
    #[arg(long)]
    timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    plm_mcp::init_tracing("info");

    let mut config = GatewayConfig::load(args.config.as_deref())?;
    if let Some(secs) = args.timeout {
        config = config.with_timeout(timeout_from_secs(secs)?);
    }
    tracing::info!(
        "Starting PLM MCP HTTP server for {}",
        config.credentials.base_url
    );

    let app = router(AppState::new(config)?);

    let listener = tokio::net::TcpListener::bind((args.host.as_str(), args.port)).await?;
    let addr = listener.local_addr()?;

    tracing::info!("HTTP server listening on http://{addr}");
    tracing::info!("MCP endpoint: http://{addr}/mcp");

    axum::serve(listener, app).await?;

    Ok(())
}
