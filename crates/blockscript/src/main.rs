//! Blockscript
//!
//! Interactive block program editor and interpreter.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use blockscript::config::{HostConfig, LoggingSection};
use blockscript::console::{Command, Console, ConsoleError};
use blockscript_runtime::{cancel_pair, CancelSignal, ScriptSession};

/// Block program console
#[derive(Parser, Debug)]
#[command(name = "blockscript")]
#[command(about = "Build and run block programs from the command line", long_about = None)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "blockscript.toml")]
    config: PathBuf,

    /// Print run results as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = HostConfig::load(&args.config)?;

    init_tracing(&config.logging);

    info!(config = %args.config.display(), "Starting blockscript v{}", env!("CARGO_PKG_VERSION"));

    let session = ScriptSession::new(config.interpreter_config());
    let mut console = Console::new(session, args.json);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("Type 'help' for commands.");

    while let Some(line) = lines.next_line().await? {
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(ConsoleError::Empty) => continue,
            Err(e) => {
                eprintln!("error: {}", e);
                continue;
            }
        };

        if command == Command::Quit {
            break;
        }

        let outcome = if command == Command::Run {
            run_cancellable(&mut console, command).await
        } else {
            console.execute(command, CancelSignal::never()).await
        };

        match outcome {
            Ok(output) if output.is_empty() => {}
            Ok(output) => println!("{}", output),
            Err(e) => eprintln!("error: {}", e),
        }
    }

    info!("Blockscript stopped");
    Ok(())
}

/// Execute a run that Ctrl-C cancels at the next loop boundary
async fn run_cancellable(console: &mut Console, command: Command) -> Result<String, ConsoleError> {
    let (handle, signal) = cancel_pair();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, cancelling run");
            handle.cancel();
        }
    });

    let outcome = console.execute(command, signal).await;
    watcher.abort();
    outcome
}

fn init_tracing(logging: &LoggingSection) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));

    let json_layer = logging
        .json
        .then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr));
    let text_layer = (!logging.json)
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}
