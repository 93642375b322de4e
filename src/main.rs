mod server;
mod tui;

use std::io::{self, BufRead, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rag::{Assistant, Config};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "personal-ai", version, about = "Ask questions about a personal text corpus")]
struct Cli {
    /// Corpus folder (overrides RAG_SOURCE_DIR)
    #[arg(long, global = true)]
    source_dir: Option<PathBuf>,

    /// Number of chunks retrieved per question (overrides RAG_TOP_K)
    #[arg(long, global = true)]
    top_k: Option<usize>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve `POST /ask` over HTTP
    Serve {
        /// Listen address; defaults to 0.0.0.0:$PORT (PORT defaults to 5000)
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Interactive chat in the terminal
    Chat {
        /// Read questions line by line from stdin instead of the full-screen UI
        #[arg(long)]
        plain: bool,
    },
    /// Answer a single question and exit
    Ask { question: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let full_screen = matches!(cli.command, Command::Chat { plain: false });
    init_logging(cli.verbose, full_screen);

    let mut cfg = Config::from_env().context("invalid configuration")?;
    if let Some(dir) = cli.source_dir {
        cfg.source_dir = dir;
    }
    if let Some(top_k) = cli.top_k {
        cfg.top_k = top_k;
    }

    let build_cfg = cfg.clone();
    let assistant = tokio::task::spawn_blocking(move || Assistant::from_config(&build_cfg))
        .await?
        .context("failed to start the assistant")?;
    let assistant = Arc::new(assistant);

    match cli.command {
        Command::Serve { bind } => {
            let addr = match bind {
                Some(addr) => addr,
                None => default_bind()?,
            };
            server::run_server(assistant, addr, cfg.request_timeout).await
        }
        Command::Chat { plain: false } => tui::run(assistant).await.map_err(Into::into),
        Command::Chat { plain: true } => {
            tokio::task::spawn_blocking(move || run_plain(&assistant)).await?
        }
        Command::Ask { question } => {
            let answer = tokio::task::spawn_blocking(move || assistant.answer(&question)).await??;
            println!("{}", answer);
            Ok(())
        }
    }
}

fn init_logging(verbose: bool, full_screen: bool) {
    let filter = if verbose {
        "personal_ai=debug,rag=debug,tower_http=debug"
    } else {
        "personal_ai=info,rag=info"
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false);
    if full_screen {
        builder.with_writer(io::sink).init();
    } else {
        builder.with_writer(io::stderr).init();
    }
}

fn default_bind() -> Result<SocketAddr> {
    let port: u16 = match std::env::var("PORT") {
        Ok(raw) => raw.trim().parse().context("PORT must be a port number")?,
        Err(_) => 5000,
    };
    Ok(SocketAddr::from(([0, 0, 0, 0], port)))
}

pub(crate) fn is_exit_command(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "quit" | "exit")
}

fn run_plain(assistant: &Assistant) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    println!("Personal AI is ready! Type 'quit' or 'exit' to stop.\n");

    let mut lines = stdin.lock().lines();
    loop {
        print!("Ask something: ");
        stdout.flush()?;
        let Some(line) = lines.next() else {
            return Ok(());
        };
        let question = line?;
        let question = question.trim();
        if is_exit_command(question) {
            return Ok(());
        }
        if question.is_empty() {
            continue;
        }
        match assistant.answer(question) {
            Ok(answer) => println!("\nAI: {}\n", answer),
            Err(err) => {
                tracing::error!(error = %err, "failed to answer");
                println!("\nAI: Sorry, something went wrong: {}\n", err);
            }
        }
    }
}
