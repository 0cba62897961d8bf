use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde_json::json;

use navsync::config::Config;
use navsync::error::{AppError, AppResult};
use navsync::event::{UiBus, UiEvent};
use navsync::script::{ScriptRunner, parse_script};
use navsync::session::Session;

#[derive(Parser, Debug)]
#[command(name = "navsync", version)]
#[command(about = "Replays navigation scripts and prints the resulting UI events")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a script and print every bus event as one JSON line.
    Replay {
        script: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    navsync::logging::init();
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> AppResult<()> {
    match cli.command {
        Command::Replay { script, config } => replay(&script, config.as_deref()).await,
    }
}

async fn replay(script: &Path, config: Option<&Path>) -> AppResult<()> {
    let config = match config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    let text = std::fs::read_to_string(script).map_err(|source| {
        AppError::io_with_context(source, format!("failed to read script: {}", script.display()))
    })?;
    let steps = parse_script(&text)?;

    let bus = UiBus::new();
    let _printer = bus.subscribe(|event: &UiEvent| print_line(serde_json::to_value(event)));
    let session = Session::with_bus(config, bus)?;
    let mut runner = ScriptRunner::new(&session);
    for step in &steps {
        if let Some(restore) = runner.run(step).await? {
            print_line(Ok(json!({ "topic": "scroll-restore", "payload": restore })));
        }
    }
    runner.drain().await;
    Ok(())
}

fn print_line(value: serde_json::Result<serde_json::Value>) {
    match value {
        Ok(value) => println!("{value}"),
        Err(err) => tracing::warn!(error = %err, "event could not be serialized"),
    }
}
