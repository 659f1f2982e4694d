use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use futures_util::StreamExt;
use tracing_subscriber::EnvFilter;
use turnloom_domain::{Config, EventKind};
use turnloom_gateway::bootstrap::build_app_state;
use turnloom_protocol::to_sse_frame;

#[derive(Parser, Debug)]
#[command(name = "turnloom", about = "Chat-loop front end for the turnloom core")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, default_value = "turnloom.toml")]
    config: PathBuf,

    /// Model to use for the session (provider-qualified if needed).
    #[arg(long)]
    model: Option<String>,

    /// User id the session runs as.
    #[arg(long, default_value = "local")]
    user: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = if cli.config.exists() {
        Arc::new(Config::load(&cli.config)?)
    } else {
        tracing::info!(path = %cli.config.display(), "no config file found, using defaults");
        Arc::new(Config::default())
    };

    let state = build_app_state(config)?;
    run_chat_loop(state, cli.user, cli.model).await
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();
}

/// A minimal REPL: read a line, run one turn, print the rendered event
/// stream, repeat. `thread_id` starts empty (a new thread) and is then
/// pinned to whatever thread the first turn created.
async fn run_chat_loop(
    state: turnloom_gateway::AppState,
    user_id: String,
    model: Option<String>,
) -> anyhow::Result<()> {
    let mut thread_id = String::new();
    let stdin = std::io::stdin();
    let mut line = String::new();

    loop {
        print!("you> ");
        std::io::stdout().flush().ok();
        line.clear();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "/exit" || input == "/quit" {
            break;
        }

        let processor = state.registry.message_processor()?.clone();
        let mut stream = processor
            .process_turn(
                user_id.clone(),
                thread_id.clone(),
                input.to_string(),
                model.clone(),
            )
            .await?;

        print!("assistant> ");
        std::io::stdout().flush().ok();
        while let Some(event) = stream.next().await {
            match event.event {
                EventKind::ThreadId => {
                    if let Some(id) = &event.data.thread_id {
                        thread_id = id.clone();
                    }
                }
                EventKind::MessageTokens => {
                    if let Some(content) = &event.data.content {
                        print!("{content}");
                        std::io::stdout().flush().ok();
                    }
                }
                EventKind::ThinkingTokens => {
                    if let Some(content) = &event.data.content {
                        eprint!("\x1b[2m{content}\x1b[0m");
                    }
                }
                EventKind::ToolUpdate => {
                    if let Some(content) = &event.data.content {
                        eprintln!("\n\x1b[2m{content}\x1b[0m");
                    }
                }
                EventKind::Error => {
                    if let Some(message) = &event.data.message {
                        eprintln!("\n\x1b[31merror: {message}\x1b[0m");
                    }
                }
                EventKind::StreamEnd => {
                    println!();
                }
            }
            tracing::trace!(frame = %to_sse_frame(&event), "event frame");
        }
    }
    Ok(())
}
