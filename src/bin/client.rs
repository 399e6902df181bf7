use anyhow::{Context, Result};
use clap::Parser;
use plm_mcp::McpHttpClient;
use serde_json::{json, Value};
use std::io::{self, BufRead, Write};
use tokio::runtime::Runtime;

/// PLM MCP Client
///
/// Interactive shell for a running plm-mcp-http server.
#[derive(Parser)]
#[command(name = "plm-mcp-client")]
#[command(about = "PLM MCP Client - interactive HTTP tool client")]
#[command(version)]
struct Args {
    /// Server URL. Can also be set via PLM_MCP_SERVER_URL environment variable.
    #[arg(long, env = "PLM_MCP_SERVER_URL", default_value = "http://localhost:8123")]
    url: String,
}

const HELP: &str = "\
Commands:
  tools                  list available tools
  call <tool> [json]     call a tool, e.g. call get_items {\"endpoint\": \"Part\"}
  test                   run test_connection
  health                 GET /health
  status                 GET /status
  help                   show this help
  quit                   exit";

enum Command {
    Tools,
    Call { tool: String, arguments: Value },
    Test,
    Health,
    Status,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<Command> {
    let line = line.trim();
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));

    let command = match word {
        "tools" => Command::Tools,
        "test" => Command::Test,
        "health" => Command::Health,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        "call" => {
            let rest = rest.trim();
            let (tool, raw_args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            if tool.is_empty() {
                anyhow::bail!("usage: call <tool> [json-args]");
            }
            let arguments = if raw_args.trim().is_empty() {
                json!({})
            } else {
                serde_json::from_str(raw_args.trim()).context("arguments must be a JSON object")?
            };
            Command::Call {
                tool: tool.to_string(),
                arguments,
            }
        }
        other => anyhow::bail!("unknown command '{other}', try 'help'"),
    };
    Ok(command)
}

async fn execute(client: &McpHttpClient, command: Command) -> Result<()> {
    match command {
        Command::Tools => {
            for tool in client.list_tools().await? {
                println!("  {:<28} {}", tool.name, tool.description);
            }
        }
        Command::Call { tool, arguments } => {
            let result = client.call_tool(&tool, arguments).await?;
            println!("{}", result.first_text());
        }
        Command::Test => {
            let result = client.call_tool("test_connection", json!({})).await?;
            println!("{}", result.first_text());
        }
        Command::Health => println!("{}", serde_json::to_string_pretty(&client.health().await?)?),
        Command::Status => println!("{}", serde_json::to_string_pretty(&client.status().await?)?),
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    plm_mcp::init_tracing("warn");

    let rt = Runtime::new()?;
    let client = McpHttpClient::new(args.url);

    match rt.block_on(client.initialize()) {
        Ok(info) => println!(
            "Connected to {} {} at {}",
            info["serverInfo"]["name"].as_str().unwrap_or("server"),
            info["serverInfo"]["version"].as_str().unwrap_or("?"),
            client.base_url()
        ),
        Err(e) => eprintln!("Warning: initialize failed: {e:#}"),
    }
    println!("Type 'help' for commands.");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("plm> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        match parse_command(&line) {
            Ok(Command::Quit) => break,
            Ok(command) => {
                if let Err(e) = rt.block_on(execute(&client, command)) {
                    eprintln!("Error: {e:#}");
                }
            }
            Err(e) => eprintln!("{e:#}"),
        }
    }

    Ok(())
}
