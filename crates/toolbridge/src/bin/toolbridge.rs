//! Toolbridge CLI
//!
//! Usage:
//!   toolbridge serve                       # MCP server on http://127.0.0.1:8000/mcp
//!   toolbridge serve --stdio               # MCP server over stdin/stdout
//!   toolbridge list                        # Print available backend tools
//!   toolbridge describe <tool_id>          # Print a tool's parameter format
//!   toolbridge invoke <tool_id> -a K=V     # Run a tool with flat arguments
//!   toolbridge cache list                  # Show cached parameter schemas
//!   toolbridge cache remove <tool_id>      # Drop a cached schema

use std::sync::Arc;

use argh::FromArgs;
use toolbridge::cli::{self, CacheCommand, DescribeCommand, InvokeCommand, ListCommand};
use toolbridge::config::toolbridge_home;
use toolbridge::Bridge;

/// Toolbridge - MCP bridge to enterprise backend tools
#[derive(FromArgs)]
struct Args {
    /// show version information
    #[argh(switch, short = 'V')]
    version: bool,

    #[argh(subcommand)]
    command: Option<Command>,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Serve(ServeArgs),
    List(ListCommand),
    Describe(DescribeCommand),
    Invoke(InvokeCommand),
    Cache(CacheCommand),
}

/// Run the MCP server
#[derive(FromArgs)]
#[argh(subcommand, name = "serve")]
struct ServeArgs {
    /// run in stdio mode (reads JSON-RPC from stdin, writes to stdout)
    #[argh(switch)]
    stdio: bool,

    /// HTTP port, overrides server.port (only used without --stdio)
    #[argh(option, short = 'p')]
    port: Option<u16>,

    /// config file (default: ~/.toolbridge/config.yaml)
    #[argh(option, short = 'c')]
    config: Option<String>,
}

fn init_logging(default_filter: &str) {
    drop(
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
            .target(env_logger::Target::Stderr)
            .try_init(),
    );
}

/// Run the MCP server (stdio or HTTP mode).
///
/// In stdio mode, logs go to ~/.toolbridge/toolbridge.log so stdout and
/// stderr stay clean for JSON-RPC.
async fn run_serve(args: ServeArgs) -> anyhow::Result<()> {
    if args.stdio {
        let home = toolbridge_home();
        std::fs::create_dir_all(&home).ok();
        let log_path = home.join("toolbridge.log");
        let log_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(|e| anyhow::anyhow!("Failed to open log file {}: {}", log_path.display(), e))?;
        drop(
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
                .target(env_logger::Target::Pipe(Box::new(log_file)))
                .try_init(),
        );
        log::info!(
            "MCP stdio server starting (logs redirected to {})",
            log_path.display()
        );
    } else {
        init_logging("info");
    }

    let mut config = cli::load_config(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate()?;

    log::info!(
        "Backend {} (client {}, timeout {}s, cache {:?}, on miss {:?})",
        config.backend.base_url,
        config.backend.client_id,
        config.backend.timeout_secs,
        config.cache.backend,
        config.cache.on_miss
    );
    let bridge = Arc::new(Bridge::from_config(&config)?);

    if args.stdio {
        toolbridge::mcp::run_mcp_stdio(bridge)
            .await
            .map_err(|e| anyhow::anyhow!(e))?;
    } else {
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(());
        ctrlc::set_handler(move || {
            log::info!("Shutdown requested");
            shutdown_tx.send(()).ok();
        })?;

        toolbridge::mcp::run_mcp_server(bridge, &config.server, shutdown_rx)
            .await
            .map_err(|e| anyhow::anyhow!(e))?;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();

    if args.version {
        println!("toolbridge {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    match args.command {
        // No subcommand = show help
        None => {
            eprintln!("Toolbridge - MCP bridge to enterprise backend tools\n");
            eprintln!("Usage: toolbridge <command>\n");
            eprintln!("Commands:");
            eprintln!("  serve     Run the MCP server:");
            eprintln!("              --stdio: JSON-RPC over stdin/stdout");
            eprintln!("              -p, --port <port>: HTTP mode (default: 8000)");
            eprintln!("  list      Print available backend tools");
            eprintln!("  describe  Print a tool's parameter format and cache it");
            eprintln!("  invoke    Run a tool:");
            eprintln!("              -a, --arg KEY=VALUE (repeatable)");
            eprintln!("              --describe-first: fetch the parameter format first");
            eprintln!("  cache     Inspect the schema cache:");
            eprintln!("              list, remove");
            eprintln!("\nAll commands accept -c, --config <path> (default: ~/.toolbridge/config.yaml).");
            eprintln!("Run 'toolbridge <command> --help' for more information.");
            return Ok(());
        }
        Some(Command::Serve(args)) => run_serve(args).await?,
        Some(Command::List(cmd)) => {
            init_logging("warn");
            cmd.run().await?;
        }
        Some(Command::Describe(cmd)) => {
            init_logging("warn");
            cmd.run().await?;
        }
        Some(Command::Invoke(cmd)) => {
            init_logging("warn");
            cmd.run().await?;
        }
        Some(Command::Cache(cmd)) => {
            init_logging("warn");
            cmd.run().await?;
        }
    }

    Ok(())
}
