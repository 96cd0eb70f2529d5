//! ragchat - Streaming chat client for retrieval-augmented document Q&A.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ragchat::config::{ClientConfig, ConfigError, ConfigLoader};
use ragchat::display::{self, TerminalObserver};
use ragchat::documents::{DocumentClient, DocumentError};
use ragchat::session::{ChatSession, SessionError};
use ragchat::transport::{HttpTransport, TransportError};

#[derive(Parser)]
#[command(
    name = "ragchat",
    about = "Chat with a language model grounded in your documents",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file (default: .ragchat.toml, then the user config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// API base URL, overriding the config file.
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Print skipped protocol lines without truncation.
    #[arg(long, global = true)]
    raw: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask one question and stream the answer.
    Ask {
        /// The question to ask.
        prompt: String,
        /// Answer without consulting uploaded documents.
        #[arg(long)]
        no_rag: bool,
        /// Wait for the complete answer instead of streaming it.
        #[arg(long)]
        no_stream: bool,
    },
    /// Interactive chat. Ctrl-C cancels the answer in progress; Ctrl-D or /quit exits.
    Chat {
        /// Answer without consulting uploaded documents.
        #[arg(long)]
        no_rag: bool,
    },
    /// Manage the documents answers are grounded in.
    Docs {
        #[command(subcommand)]
        action: DocsAction,
    },
}

#[derive(Subcommand)]
enum DocsAction {
    /// List indexed documents.
    List,
    /// Upload and index a file.
    Upload { path: PathBuf },
    /// Remove a document by filename.
    Delete { filename: String },
    /// Remove every document.
    Clear,
    /// Show knowledge base status.
    Status,
}

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(cli: &Cli) -> Result<ClientConfig, ConfigError> {
    let loader = cli
        .config
        .clone()
        .map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    let mut config = loader.load()?;
    if let Some(base_url) = &cli.base_url {
        config.base_url.clone_from(base_url);
    }
    Ok(config)
}

fn open_session(config: &ClientConfig) -> Result<ChatSession, TransportError> {
    let transport = HttpTransport::from_config(config)?;
    Ok(ChatSession::new(Arc::new(transport)).with_idle_timeout(config.idle_timeout()))
}

/// Stream one answer to the terminal, cancelling it on Ctrl-C.
async fn stream_answer(
    session: &ChatSession,
    prompt: &str,
    use_rag: bool,
    raw: bool,
) -> Result<(), SessionError> {
    let handle = session.send(prompt, use_rag, TerminalObserver::new(raw))?;
    let canceller = handle.canceller();
    let wait = handle.wait();
    tokio::pin!(wait);

    tokio::select! {
        result = &mut wait => result,
        Ok(()) = tokio::signal::ctrl_c() => {
            canceller.cancel();
            wait.await
        }
    }
}

async fn run_ask(
    config: &ClientConfig,
    prompt: &str,
    use_rag: bool,
    stream: bool,
    raw: bool,
) -> Result<(), AppError> {
    if !stream {
        let transport = HttpTransport::from_config(config)?;
        let reply = transport.chat_once(prompt, use_rag).await?;
        display::print_reply(&reply.response, &reply.sources);
        return Ok(());
    }

    let session = open_session(config)?;
    match stream_answer(&session, prompt, use_rag, raw).await {
        Err(SessionError::Cancelled) => {
            display::print_cancelled();
            Ok(())
        }
        other => other.map_err(AppError::from),
    }
}

async fn run_chat(config: &ClientConfig, use_rag: bool, raw: bool) -> Result<(), AppError> {
    let session = open_session(config)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }
        if matches!(prompt, "/quit" | "/exit") {
            break;
        }

        match stream_answer(&session, prompt, use_rag, raw).await {
            // Failures are already rendered into the transcript by the observer.
            Ok(()) | Err(SessionError::Transport(_) | SessionError::Decode(_)) => {}
            Err(SessionError::Cancelled) => display::print_cancelled(),
            Err(e) => display::print_error(&e.to_string()),
        }
    }

    tracing::info!(messages = session.transcript().len(), "Chat ended");
    Ok(())
}

async fn run_docs(config: &ClientConfig, action: DocsAction) -> Result<(), AppError> {
    let client = DocumentClient::from_config(config)?;
    match action {
        DocsAction::List => display::print_documents(&client.list().await?),
        DocsAction::Upload { path } => display::print_uploaded(&client.upload(&path).await?),
        DocsAction::Delete { filename } => {
            client.delete(&filename).await?;
            println!("Deleted {filename}");
        }
        DocsAction::Clear => {
            client.clear().await?;
            println!("Knowledge base cleared");
        }
        DocsAction::Status => display::print_status(&client.status().await?),
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let config = load_config(&cli)?;
    tracing::debug!(base_url = %config.base_url, "Loaded configuration");

    match cli.command {
        Commands::Ask {
            prompt,
            no_rag,
            no_stream,
        } => {
            let use_rag = config.use_rag && !no_rag;
            run_ask(&config, &prompt, use_rag, !no_stream, cli.raw).await
        }
        Commands::Chat { no_rag } => run_chat(&config, config.use_rag && !no_rag, cli.raw).await,
        Commands::Docs { action } => run_docs(&config, action).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        // Already shown by the terminal observer.
        Err(AppError::Session(SessionError::Transport(_) | SessionError::Decode(_))) => {
            ExitCode::FAILURE
        }
        Err(e) => {
            display::print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}
