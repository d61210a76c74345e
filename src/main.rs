//! besthit CLI - best-of-N document summarisation
//!
//! The application logic is contained in lib.rs, and this file is responsible
//! for parsing arguments and handling top-level errors.

use anyhow::Context;
use besthit::server::{self, AppState};
use besthit::{
    BestHitSummarizer, Config, Document, GeminiLlmClient, LlmClient, PromptRenderer,
    SelectionPolicy, Summarizer, TemplateRenderer,
};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "besthit")]
#[command(
    author,
    version,
    about = "Best-of-N document summarisation with LLM judges",
    long_about = None
)]
struct Cli {
    /// Path to besthit.toml (defaults to ./besthit.toml, then ~/.config/besthit/)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarise a local text document
    Summarize {
        /// Document to summarise
        path: PathBuf,
        /// Number of generation attempts
        #[arg(long)]
        num_tries: Option<usize>,
        /// Pick the highest-scoring valid candidate instead of the first
        #[arg(long)]
        best_scored: bool,
        /// Add LLM-judged correctness and completeness requirements
        #[arg(long)]
        judge: bool,
    },
    /// Serve the summarisation endpoint over HTTP
    Serve {
        /// Address to listen on, overrides the config
        #[arg(long)]
        addr: Option<SocketAddr>,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let client: Arc<dyn LlmClient> = Arc::new(GeminiLlmClient::from_config(&config)?);
    let renderer: Arc<dyn PromptRenderer> =
        Arc::new(TemplateRenderer::with_overrides(&config.templates));
    let mut settings = config.summarizer_settings();

    match cli.command {
        Commands::Summarize {
            path,
            num_tries,
            best_scored,
            judge,
        } => {
            let document = Document::load_from_local(&path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            info!(path = %path.display(), tokens = document.num_tokens(), "loaded document");

            if let Some(n) = num_tries {
                settings.num_tries = n;
            }
            if best_scored {
                settings.selection = SelectionPolicy::BestScored;
            }
            settings.judge_augmented |= judge;

            let summarizer = BestHitSummarizer::new(client, renderer, settings);
            let report = summarizer.summarize(&document).await?;

            println!("=== {} ===\n", report.title.bold());
            println!("{}", report.content);
        }
        Commands::Serve { addr } => {
            let addr = match addr {
                Some(addr) => addr,
                None => config
                    .server
                    .addr
                    .parse()
                    .with_context(|| format!("invalid server address: {}", config.server.addr))?,
            };

            server::serve(
                addr,
                AppState {
                    client,
                    renderer,
                    settings,
                },
            )
            .await;
        }
    }

    Ok(())
}
