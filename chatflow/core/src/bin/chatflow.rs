//! Chatflow - Interactive Chat Client
//!
//! Line-oriented client for a chatflow chat proxy. Answers are printed as
//! they stream in.
//!
//! # Usage
//!
//! ```bash
//! # Use ~/.config/chatflow/client.toml and CHATFLOW_* variables
//! chatflow
//!
//! # Point at a specific proxy
//! chatflow --base-url http://grafana.internal:3000
//!
//! # Verbose logging (written to stderr)
//! RUST_LOG=debug chatflow
//! ```
//!
//! # Commands
//!
//! - `/list`: refresh and show prior conversations
//! - `/open <id>`: continue a prior conversation
//! - `/new`: start a new conversation
//! - `/cancel`: stop the answer being streamed
//! - `/quit`: exit
//!
//! Anything else is sent as a question. Ctrl+C while an answer streams
//! cancels it.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use chatflow_core::config::{default_config_path, load_config_from_path};
use chatflow_core::{
    ChatBackend, ChatUpdate, ConfigOverrides, ControllerConfig, MessageRole, NotifyLevel,
    ProxyBackend, SessionController, SessionState, UserAction,
};

/// Chatflow - streaming chat client
#[derive(Parser, Debug)]
#[command(name = "chatflow")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Chat proxy base URL
    #[arg(short = 'u', long, value_name = "URL")]
    base_url: Option<String>,

    /// Configuration file path
    #[arg(short = 'c', long, env = "CHATFLOW_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Idle timeout between chunks in milliseconds (0 disables)
    #[arg(long, value_name = "MS")]
    idle_timeout_ms: Option<u64>,

    /// Connect timeout in milliseconds
    #[arg(long, value_name = "MS")]
    connect_timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "CHATFLOW_LOG_LEVEL", default_value = "warn")]
    log_level: String,
}

/// A parsed input line
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Action(UserAction),
    Help,
    Quit,
    Unknown(String),
}

fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Some(Command::Action(UserAction::send(line)));
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };
    let parsed = match name {
        "list" | "ls" => Command::Action(UserAction::RefreshConversations),
        "open" if !arg.is_empty() => Command::Action(UserAction::switch(arg)),
        "new" => Command::Action(UserAction::NewConversation),
        "cancel" => Command::Action(UserAction::Cancel),
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        _ => Command::Unknown(line.to_string()),
    };
    Some(parsed)
}

fn print_help() {
    println!("Commands:");
    println!("  /list         show prior conversations");
    println!("  /open <id>    continue a prior conversation");
    println!("  /new          start a new conversation");
    println!("  /cancel       stop the current answer");
    println!("  /quit         exit");
    println!("Anything else is sent as a question.");
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("chatflow={level},chatflow_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Print updates as they arrive
async fn render(mut rx: mpsc::Receiver<ChatUpdate>) {
    // Bytes of the current answer already printed
    let mut printed = 0usize;

    while let Some(update) = rx.recv().await {
        match update {
            ChatUpdate::StreamingText { text, .. } => {
                if let Some(suffix) = text.get(printed..) {
                    print!("{suffix}");
                    printed = text.len();
                }
            }
            ChatUpdate::MessageAppended { message, .. } => {
                if message.role == MessageRole::Assistant {
                    if printed == 0 {
                        print!("{}", message.content);
                    }
                    println!();
                }
            }
            ChatUpdate::SessionState { state, .. } => match state {
                SessionState::Sending => printed = 0,
                SessionState::Cancelled => {
                    println!();
                    println!("[cancelled]");
                }
                _ => {}
            },
            ChatUpdate::ConversationLoaded {
                conversation_id,
                messages,
            } => {
                match conversation_id {
                    Some(id) => println!("── conversation {id} ──"),
                    None => println!("── new conversation ──"),
                }
                for message in messages {
                    println!("{}> {}", message.role.label(), message.content);
                }
            }
            ChatUpdate::ConversationAdopted { conversation_id } => {
                debug!(conversation_id = %conversation_id, "Conversation saved");
            }
            ChatUpdate::ConversationList {
                conversations,
                loading,
            } => {
                if loading {
                    continue;
                }
                if conversations.is_empty() {
                    println!("No conversations.");
                }
                for summary in conversations {
                    println!("  {}  {}", summary.id, summary.title());
                }
            }
            ChatUpdate::Notify { level, message } => match level {
                NotifyLevel::Info => println!("{message}"),
                NotifyLevel::Warning => eprintln!("warning: {message}"),
                NotifyLevel::Error => eprintln!("error: {message}"),
            },
        }
        let _ = std::io::stdout().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config_path = args.config.clone().or_else(default_config_path);
    let mut config = load_config_from_path(config_path).context("Failed to load configuration")?;

    let mut overrides = ConfigOverrides::new();
    if let Some(url) = args.base_url {
        overrides = overrides.with_base_url(url);
    }
    if let Some(ms) = args.idle_timeout_ms {
        overrides = overrides.with_idle_timeout_ms(ms);
    }
    if let Some(ms) = args.connect_timeout_ms {
        overrides = overrides.with_connect_timeout_ms(ms);
    }
    overrides.apply(&mut config);
    config.validate()?;

    info!(
        base_url = %config.backend.base_url,
        source = %config.source(),
        "Configuration loaded"
    );

    let backend = ProxyBackend::new(config.backend.clone()).context("Failed to build HTTP client")?;
    if !backend.health_check().await {
        warn!(base_url = %config.backend.base_url, "Chat proxy is not reachable");
        eprintln!(
            "warning: chat proxy at {} is not responding",
            config.backend.base_url
        );
    }

    let (tx, rx) = mpsc::channel(100);
    let renderer = tokio::spawn(render(rx));
    let mut controller = SessionController::new(backend, ControllerConfig::from(&config), tx);

    println!("Connected to {}. Type /help for commands.", config.backend.base_url);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("you> ");
        let _ = std::io::stdout().flush();

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let action = match parse_command(&line) {
            None => continue,
            Some(Command::Quit) => break,
            Some(Command::Help) => {
                print_help();
                continue;
            }
            Some(Command::Unknown(input)) => {
                eprintln!("unknown command: {input} (try /help)");
                continue;
            }
            Some(Command::Action(action)) => action,
        };

        let is_send = matches!(action, UserAction::Send { .. });
        if let Err(e) = controller.handle_action(action).await {
            debug!(error = %e, "Action failed");
        }

        if is_send && controller.is_busy() {
            tokio::select! {
                state = controller.wait_session() => {
                    debug!(state = ?state, "Answer finished");
                }
                _ = tokio::signal::ctrl_c() => {
                    controller.cancel().await;
                }
            }
        }
        // Let the renderer catch up before the next prompt
        tokio::task::yield_now().await;
    }

    controller.dispose();
    drop(controller);
    renderer.await.context("Renderer task failed")?;
    Ok(())
}
