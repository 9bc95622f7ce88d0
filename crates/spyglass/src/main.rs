//! Spyglass - live inspector for pipeline traffic
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default endpoint (127.0.0.1:8081)
//! spyglass
//! spyglass --config configs/spyglass.toml
//!
//! # Switch nodes on as soon as they register
//! spyglass --inspect tpc-clusterer --inspect its-tracker
//! spyglass --inspect-all --output json
//! ```
//!
//! While running, commands on stdin switch nodes on and off:
//! `on <node>`, `off <node>`, `on all`, `off all`, `list`.

mod commands;
mod logging;
mod output;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::Parser;
use spyglass_config::{Config, LogLevel};
use spyglass_tap::{InspectorHandle, InspectorServer};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use commands::Command;
use output::Formatter;

/// Spyglass - live inspector for pipeline traffic
#[derive(Parser, Debug)]
#[command(name = "spyglass")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (error if specified but not found)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on. Overrides config file.
    #[arg(short, long)]
    address: Option<String>,

    /// Port to listen on. Overrides config file.
    #[arg(short, long)]
    port: Option<u16>,

    /// Inspect this node as soon as it registers (can be repeated)
    #[arg(short, long = "inspect", value_name = "NODE")]
    inspect: Vec<String>,

    /// Inspect every node as soon as it registers
    #[arg(long)]
    inspect_all: bool,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long)]
    log_level: Option<String>,

    /// Output format: text (default), json, compact
    #[arg(short = 'o', long = "output", default_value = "text")]
    format: String,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli)?;
    logging::init_logging(&config.log)?;

    let formatter = Formatter::new(&cli.format).with_color(output::stdout_is_terminal() && !cli.no_color);

    run(config, formatter).await
}

/// Config file (or defaults) with command-line overrides applied
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match cli.config.as_deref() {
        Some(path) => read_config(path)?,
        None => Config::default(),
    };

    if let Some(address) = &cli.address {
        config.inspector.address = address.clone();
    }
    if let Some(port) = cli.port {
        config.inspector.port = port;
    }
    if cli.inspect_all {
        config.inspector.inspect_all = true;
    }
    config.inspector.inspect.extend(cli.inspect.iter().cloned());

    if let Some(level) = cli.log_level.as_deref() {
        config.log.level = LogLevel::from_str(level)
            .map_err(anyhow::Error::msg)
            .context("invalid --log-level")?;
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn read_config(path: &Path) -> Result<Config> {
    Config::from_file(path).with_context(|| format!("failed to load config from {}", path.display()))
}

/// Serve nodes until Ctrl+C
async fn run(config: Config, formatter: Formatter) -> Result<()> {
    let endpoint = config.inspector.endpoint();
    let (server, mut events) = InspectorServer::bind(config.inspector)
        .await
        .with_context(|| format!("failed to listen on {endpoint}"))?;

    let handle = server.handle();
    let server_task = server.spawn();

    info!(address = %handle.local_addr(), "waiting for nodes (Ctrl+C to stop)");

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => formatter.print(&event),
                None => break,
            },
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) => execute(&line, &handle, &formatter),
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!(error = %e, "stdin closed");
                    stdin_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, shutting down");
                break;
            }
        }
    }

    handle.stop();
    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "inspector server failed"),
        Err(e) => warn!(error = %e, "inspector server task failed"),
    }

    Ok(())
}

/// Run one stdin command against the server
fn execute(line: &str, handle: &InspectorHandle, formatter: &Formatter) {
    let command = match Command::parse(line) {
        Ok(Some(command)) => command,
        Ok(None) => return,
        Err(e) => {
            warn!(error = %e, "{}", commands::USAGE);
            return;
        }
    };

    match command {
        Command::Inspect { node, on } => match handle.set_inspected(&node, on) {
            Ok(()) => info!(node = %node, inspected = on, "control sent"),
            Err(e) => warn!(node = %node, error = %e, "control not sent"),
        },
        Command::InspectAll { on } => {
            let queued = handle.set_all_inspected(on);
            info!(nodes = queued, inspected = on, "control sent");
        }
        Command::List => formatter.print_devices(&handle.devices()),
    }
}
