use anyhow::Result;
use clap::Parser;
use plm_mcp::config::timeout_from_secs;
use plm_mcp::{ApiGateway, GatewayConfig, StdioServer};
use std::path::PathBuf;
use std::sync::Arc;

/// PLM MCP Server
///
/// Exposes the PLM backend's OData API as MCP tools over stdin/stdout.
/// Credentials come from PLM_URL, PLM_DATABASE, PLM_USERNAME and PLM_PASSWORD
/// (or a JSON config file).
#[derive(Parser)]
#[command(name = "plm-mcp")]
#[command(about = "PLM MCP Server - stdio transport")]
#[command(version)]
struct Args {
    /// JSON configuration file
    ///
    /// Can also be set via PLM_CONFIG environment variable.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Backend request timeout in seconds, overrides PLM_TIMEOUT_SECS
    #[arg(long)]
    timeout: Option<u64>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    plm_mcp::init_tracing("info");

    let mut config = GatewayConfig::load(args.config.as_deref())?;
    if let Some(secs) = args.timeout {
        config = config.with_timeout(timeout_from_secs(secs)?);
    }

    tracing::info!(
        "Starting PLM MCP server for {} (database {})",
        config.credentials.base_url,
        config.credentials.database
    );

    let gateway = Arc::new(ApiGateway::new(config)?);
    let server = StdioServer::new(gateway)?;
    server.run()?;

    Ok(())
}
