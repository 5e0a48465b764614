//! # docchat CLI
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat chat [PATHS...]` | Interactive chat over the given files |
//! | `docchat ask --question Q PATHS...` | Ingest, answer once, exit |
//! | `docchat serve` | Start the multi-session HTTP server |
//!
//! The provider key is read from the environment variable named in
//! `[credentials].api_key_env` (default `OPENAI_API_KEY`), after loading a
//! `.env` file from the working directory if one exists. Startup fails when
//! it is missing.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use clap::{Parser, Subcommand};
use docchat::config::{self, Credentials};
use docchat::ingest::Ingestor;
use docchat::session::ChatSession;
use docchat::{chat, logging, server};

/// docchat: ask questions about your PDF, TXT, XLSX, and DOCX files.
#[derive(Parser)]
#[command(
    name = "docchat",
    about = "Chat with your documents using retrieval-augmented generation",
    version
)]
struct Cli {
    /// Path to a TOML configuration file. Built-in defaults apply without one.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat. Optional paths are uploaded before the first prompt.
    ///
    /// Directories are searched recursively for supported files.
    Chat {
        paths: Vec<PathBuf>,
    },

    /// Upload the given files, answer one question, and exit.
    Ask {
        /// The question to ask.
        #[arg(long, short)]
        question: String,

        /// Files or directories to upload.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _ = dotenvy::dotenv();
    logging::init(cli.verbose);

    let cfg = config::load_config(cli.config.as_deref())?;
    let credentials = Credentials::from_env(&cfg.credentials.api_key_env)?;
    let ingestor = Ingestor::from_config(&cfg, &credentials)?;

    match cli.command {
        Commands::Chat { paths } => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let mut stdout = std::io::stdout();
            chat::run_chat(&ingestor, &paths, stdin, &mut stdout).await?;
        }
        Commands::Ask { question, paths } => {
            let mut session = ChatSession::new();
            let mut stderr = std::io::stderr();
            if !chat::upload(&mut session, &ingestor, &paths, &mut stderr).await? {
                bail!("No documents could be indexed.");
            }
            match session.ask(&question).await {
                Ok(reply) => println!("{}", reply.content),
                Err(e) => bail!("{}", e.user_message()),
            }
        }
        Commands::Serve => {
            server::run_server(&cfg, Arc::new(ingestor)).await?;
        }
    }

    Ok(())
}
