//! TaskPilot command-line entry point
//!
//! Runs the command agent against the in-memory demo workspace. Provider
//! credentials come from the environment (`ANTHROPIC_API_KEY`,
//! `OPENAI_API_KEY`, `DEEPSEEK_API_KEY`, `GLM_API_KEY`).

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use taskpilot::{AppState, CommandResult, InMemoryWorkspace};
use taskpilot_core::ActionSource;
use taskpilot_llm::ProviderType;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// TaskPilot - natural-language commands for your project board
#[derive(Parser, Debug)]
#[command(name = "taskpilot")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Provider to use for this session (anthropic, openai, deepseek, glm)
    #[arg(long, global = true)]
    provider: Option<ProviderType>,

    /// Settings file (default ~/.taskpilot/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Session storage file (default ~/.taskpilot/storage.json)
    #[arg(long, global = true)]
    storage: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single command
    Run {
        /// The command, e.g. "create a high priority task to fix the login bug"
        #[arg(required = true)]
        words: Vec<String>,
    },
    /// Interactive session
    Repl,
    /// Print command history, most recent first
    History {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

/// Log directive used when RUST_LOG is unset or unparsable.
const DEFAULT_LOG_FILTER: &str = "info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let state = open_state(&cli)?;
    if let Some(provider) = cli.provider {
        state.session().set_active_provider(Some(provider));
    }

    match cli.command {
        Command::Run { words } => {
            let result = state
                .agent()
                .process_command(&words.join(" "), ActionSource::Terminal)
                .await;
            print_result(&state, &result);
            if !result.success {
                std::process::exit(1);
            }
        }
        Command::Repl => repl(&state).await?,
        Command::History { limit } => {
            for entry in state.session().history().iter().take(limit) {
                let mark = if entry.success { "ok" } else { "!!" };
                println!(
                    "[{}] {} > {}",
                    mark,
                    entry.timestamp.format("%Y-%m-%d %H:%M"),
                    entry.input
                );
                println!("     {}", entry.response.replace('\n', "\n     "));
            }
        }
    }
    Ok(())
}

fn open_state(cli: &Cli) -> anyhow::Result<AppState> {
    let state = match (&cli.config, &cli.storage) {
        (None, None) => AppState::initialize()?,
        (config, storage) => {
            let config = match config {
                Some(path) => path.clone(),
                None => taskpilot::utils::config_path()?,
            };
            let storage = match storage {
                Some(path) => path.clone(),
                None => taskpilot::utils::storage_path()?,
            };
            AppState::open(config, storage, Arc::new(InMemoryWorkspace::seeded()))?
        }
    };
    Ok(state)
}

async fn repl(state: &AppState) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    println!("TaskPilot. Type a command, /help for options, /quit to leave.");

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(command) = line.strip_prefix('/') {
            if !slash_command(state, command) {
                break;
            }
            continue;
        }
        let result = state
            .agent()
            .process_command(line, ActionSource::Terminal)
            .await;
        print_result(state, &result);
    }
    Ok(())
}

/// Handle a `/command`. Returns false when the session should end.
fn slash_command(state: &AppState, command: &str) -> bool {
    let mut parts = command.splitn(3, ' ');
    let name = parts.next().unwrap_or_default();
    let session = state.session();
    match name {
        "quit" | "exit" => return false,
        "provider" => match parts.next().map(str::parse::<ProviderType>) {
            Some(Ok(provider)) => {
                session.set_active_provider(Some(provider));
                println!("Using {}.", provider);
            }
            Some(Err(e)) => println!("{}", e),
            None => match state.agent().resolve_provider() {
                Some(p) => println!("Active provider: {} ({})", p.provider_type(), p.model()),
                None => println!("No provider available."),
            },
        },
        "remember" => match (parts.next(), parts.next()) {
            (Some(key), Some(value)) => {
                session.remember(key, value);
                println!("Remembered {}.", key);
            }
            _ => println!("Usage: /remember <key> <value>"),
        },
        "forget" => match parts.next() {
            Some(key) if session.forget(key) => println!("Forgot {}.", key),
            Some(key) => println!("Nothing remembered under {}.", key),
            None => println!("Usage: /forget <key>"),
        },
        "history" => {
            for entry in session.history().iter().take(10) {
                println!("- {} -> {}", entry.input, entry.response.lines().next().unwrap_or_default());
            }
        }
        "clear" => {
            session.clear_history();
            println!("History cleared.");
        }
        "board" => {
            let snapshot = state.workspace().snapshot();
            println!("Mode: {}", snapshot.workflow_mode.label());
            for task in &snapshot.tasks {
                println!("- [{}] {} ({}, {})", task.status, task.title, task.priority, task.id);
            }
        }
        _ => println!(
            "Commands: /provider [name], /remember <key> <value>, /forget <key>, /history, /clear, /board, /quit"
        ),
    }
    true
}

fn print_result(state: &AppState, result: &CommandResult) {
    println!("{}", result.response);
    if state.session().toggles().show_tool_details {
        for tool in &result.tool_results {
            let mark = if tool.success { "ok" } else { "failed" };
            println!(
                "  [{}] {}: {}",
                mark,
                tool.name,
                tool.message.lines().next().unwrap_or_default()
            );
        }
    }
    if let Some(error) = &result.error {
        tracing::debug!(category = ?error.category, raw = %error.raw, "command error");
    }
}
