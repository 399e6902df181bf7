use crate::gateway::ApiGateway;
use crate::protocol::{JsonRpcResponse, McpServer};
use anyhow::Result;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tokio::runtime::Runtime;

/// Line-delimited JSON-RPC over stdin/stdout.
///
/// Requests are answered one at a time in arrival order. Stdout carries
/// protocol frames only; everything else goes to the tracing subscriber.
pub struct StdioServer {
    server: McpServer,
    rt: Runtime,
}

impl StdioServer {
    pub fn new(gateway: Arc<ApiGateway>) -> Result<Self> {
        let rt = Runtime::new()?;

        Ok(Self {
            server: McpServer::new(gateway),
            rt,
        })
    }

    pub fn run(&self) -> Result<()> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        self.serve(stdin.lock(), stdout.lock())
    }

    /// Serve until `input` reaches EOF.
    pub fn serve<R: BufRead, W: Write>(&self, input: R, mut output: W) -> Result<()> {
        tracing::info!("Serving MCP over stdio");

        for line in input.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            if let Some(response) = self.rt.block_on(self.server.handle_text(&line)) {
                write_response(&mut output, &response)?;
            }
        }

        tracing::info!("stdin closed, shutting down");
        Ok(())
    }
}

fn write_response<W: Write>(output: &mut W, response: &JsonRpcResponse) -> Result<()> {
    writeln!(output, "{}", serde_json::to_string(response)?)?;
    output.flush()?;
    Ok(())
}
