//! Banksie CLI
//!
//! Terminal client for the Banksie chat backend.
//!
//! Usage:
//! ```bash
//! # Obtain and store a token
//! banksie login --username admin --password password123
//!
//! # Ask a single question
//! banksie chat "What were my largest expenses last month?"
//!
//! # Interactive chat (/new starts a new chat, /quit exits)
//! banksie chat
//!
//! # Show stored history against a non-default backend
//! banksie --api-url http://backend:8000 history
//! ```

mod config;
mod display;

use anyhow::Context;
use banksie_core::ResponderSource;
use banksie_egress::chat::{ChatClient, HistoryEntry};
use banksie_session::Conversation;
use clap::{Parser, Subcommand};
use config::CliConfig;
use display::TerminalSink;
use futures::StreamExt;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "banksie")]
#[command(about = "Banksie - chat with your transaction assistant", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (YAML or TOML)
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "BANKSIE_CONFIG",
        global = true
    )]
    config: Option<String>,

    /// Backend base URL
    #[arg(long, value_name = "URL", global = true)]
    api_url: Option<String>,

    /// Session timeout in seconds
    #[arg(long, value_name = "SECS", global = true)]
    timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the bearer token
    Login {
        #[arg(short, long)]
        username: String,

        #[arg(short, long, env = "BANKSIE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Print the stored chat history
    History {
        /// Only show the most recent N exchanges
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Send a message, or start an interactive chat when none is given
    Chat {
        message: Option<String>,

        /// Print stored history before an interactive chat
        #[arg(long, default_value = "false")]
        with_history: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => CliConfig::from_file(path)?,
        None => CliConfig::default(),
    };

    // Merge environment variables (they override config file)
    config.merge_env();

    // CLI flags have the highest precedence
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url;
    }
    if let Some(timeout) = cli.timeout {
        config.session.timeout_secs = timeout;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    init_tracing(&config.logging.level)?;
    debug!("Using backend {}", config.api_url);

    match cli.command {
        Commands::Login { username, password } => login(&config, &username, &password).await,
        Commands::History { limit } => history(&config, limit).await,
        Commands::Chat {
            message,
            with_history,
        } => chat(&config, message, with_history).await,
    }
}

/// Logs go to stderr so they never interleave with the streamed reply
fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn authenticated_client(config: &CliConfig) -> anyhow::Result<ChatClient> {
    let token = config
        .resolve_token()?
        .context("Not logged in. Run `banksie login` or set BANKSIE_TOKEN")?;
    Ok(ChatClient::new(config.client_config().with_token(token))?)
}

async fn login(config: &CliConfig, username: &str, password: &str) -> anyhow::Result<()> {
    let client = ChatClient::new(config.client_config())?;
    let login = client.login(username, password).await?;

    let path = config.save_token(&login.token)?;
    info!("Token stored in {}", path.display());
    println!("Logged in as {}", login.user.username);
    Ok(())
}

async fn history(config: &CliConfig, limit: Option<usize>) -> anyhow::Result<()> {
    let client = authenticated_client(config)?;
    let entries = client.history().await?;

    let skip = limit.map_or(0, |n| entries.len().saturating_sub(n));
    let mut sink = TerminalSink::new(std::io::stdout().lock());
    for message in entries
        .into_iter()
        .skip(skip)
        .flat_map(HistoryEntry::into_messages)
    {
        sink.message(&message)?;
    }
    Ok(())
}

async fn chat(
    config: &CliConfig,
    message: Option<String>,
    with_history: bool,
) -> anyhow::Result<()> {
    let client = authenticated_client(config)?;
    let mut conversation = Conversation::new(config.session_config());

    if with_history || message.is_none() {
        let entries = client.history().await?;
        conversation.load_history(entries.into_iter().flat_map(HistoryEntry::into_messages));
        if with_history {
            let mut sink = TerminalSink::new(std::io::stdout().lock());
            for entry in conversation.messages() {
                sink.message(entry)?;
            }
        }
    }

    let source: Arc<dyn ResponderSource> = Arc::new(client);

    if let Some(message) = message {
        return exchange(&mut conversation, source, &message).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("you> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            break;
        };

        match line.trim() {
            "/quit" | "/exit" => break,
            "/new" => {
                conversation.reset();
                println!("Started a new chat");
            }
            "" => continue,
            _ => exchange(&mut conversation, source.clone(), &line).await?,
        }
    }

    Ok(())
}

/// Run one session to completion, rendering updates as they are applied.
/// Ctrl-C abandons the reply without leaving the chat.
async fn exchange(
    conversation: &mut Conversation,
    source: Arc<dyn ResponderSource>,
    message: &str,
) -> anyhow::Result<()> {
    let mut sink = TerminalSink::new(std::io::stdout());
    drive(
        conversation,
        source,
        message,
        tokio::signal::ctrl_c(),
        &mut sink,
    )
    .await?;
    Ok(())
}

/// Drive one session until it ends or `interrupt` resolves.
///
/// The interrupt future lives for the whole session, so a signal that
/// arrives while an update is being rendered is still observed.
async fn drive<W, F, T>(
    conversation: &mut Conversation,
    source: Arc<dyn ResponderSource>,
    message: &str,
    interrupt: F,
    sink: &mut TerminalSink<W>,
) -> std::io::Result<()>
where
    W: Write,
    F: std::future::Future<Output = T>,
{
    let Some(session) = conversation.send(source, message) else {
        return Ok(());
    };

    let mut updates = Box::pin(session.into_tagged_stream());
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            update = updates.next() => {
                let Some(update) = update else {
                    break;
                };
                if !conversation.apply(update) {
                    continue;
                }
                if conversation.is_streaming() {
                    sink.partial(conversation.streaming_text())?;
                } else if let Some(last) = conversation.messages().last() {
                    sink.finish(last)?;
                }
            }
            _ = &mut interrupt => {
                debug!("Interrupted, cancelling active session");
                conversation.cancel_active();
                sink.interrupted()?;
                break;
            }
        }
    }

    Ok(())
}
