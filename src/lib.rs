// OAuth discovery and password-grant token acquisition
pub mod auth;

// BOM tree flattening
pub mod bom;

// HTTP client for a running plm-mcp-http server
pub mod client;

// Configuration management
pub mod config;

// Error taxonomy and logging context
pub mod errors;

// Authenticated OData operations
pub mod gateway;

// OData URL construction
pub mod odata;

// JSON-RPC handling shared by both transports
pub mod protocol;

// HTTP transport
pub mod server;

// stdio transport
pub mod stdio_server;

// Tool catalog and dispatch
pub mod tools;

#[cfg(test)]
mod test_support;

// Re-export key types for convenience
pub use bom::BomRow;
pub use client::McpHttpClient;
pub use config::{Credentials, GatewayConfig, MethodAddressing};
pub use errors::{ErrorContext, GatewayError, GatewayResult};
pub use gateway::{ApiGateway, NewRelationship, ToolResult};
pub use odata::ItemQuery;
pub use protocol::{JsonRpcRequest, JsonRpcResponse, McpServer};
pub use stdio_server::StdioServer;
pub use tools::{CallToolResult, ToolDefinition, ToolDispatcher};

/// Install the stderr tracing subscriber used by every binary.
///
/// `RUST_LOG` wins; otherwise `default_filter` applies.
pub fn init_tracing(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    // A second call (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
