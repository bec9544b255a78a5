use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use dg_client::RateLimitedClient;
use dg_config::Config;
use dg_core::{init_logging_from_config, CancelSignal};
use dg_types::{Document, WindowUnit};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "dg", about = "DocGate - rate-limited document submission", version)]
struct Cli {
    /// Read settings from this env file instead of .env / the environment
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit JSON documents through the rate limiter
    Submit {
        /// Detached signature sent in the X-Signature header
        #[arg(short, long, env = "DOCUMENT_SIGNATURE")]
        signature: String,

        /// Override RATE_LIMIT
        #[arg(long)]
        limit: Option<usize>,

        /// Override RATE_WINDOW_UNIT (second, minute, hour)
        #[arg(long)]
        unit: Option<WindowUnit>,

        /// Files holding one JSON document each
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.env_file.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Submit {
            signature,
            limit,
            unit,
            files,
        } => submit(config, signature, limit, unit, files).await?,
        Commands::Config => println!("{}", serde_json::to_string_pretty(&config)?),
    }
    Ok(())
}

fn load_config(env_file: Option<&Path>) -> dg_types::Result<Config> {
    match env_file {
        Some(path) => Config::load_from_file(path),
        None => Config::load(),
    }
}

async fn submit(
    mut config: Config,
    signature: String,
    limit: Option<usize>,
    unit: Option<WindowUnit>,
    files: Vec<PathBuf>,
) -> anyhow::Result<()> {
    if let Some(limit) = limit {
        config.rate_limit = limit;
    }
    if let Some(unit) = unit {
        config.window_unit = unit;
    }

    // 1. Init logging
    init_logging_from_config(&config).context("Failed to initialize logging")?;

    // 2. Build the client
    let client = RateLimitedClient::from_config(&config).context("Failed to create client")?;
    info!(
        url = %config.api_url,
        limit = config.rate_limit,
        window = %config.window_unit,
        "Client ready"
    );

    // 3. Read documents up front so a bad file fails before anything is sent
    let mut documents = Vec::with_capacity(files.len());
    for file in files {
        let text = tokio::fs::read_to_string(&file)
            .await
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let document = Document::from_json(&text)
            .with_context(|| format!("Failed to parse {}", file.display()))?;
        documents.push((file, document));
    }
    let total = documents.len();

    // 4. Ctrl+C releases everything still waiting for a slot
    let cancel = Arc::new(CancelSignal::new());
    let signal_task = {
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            if let Err(e) = cancel.wait_for_signal().await {
                error!(error = %e, "Failed to listen for shutdown signals");
            }
        })
    };

    // 5. Submit concurrently; the limiter does the pacing
    let signature = Arc::new(signature);
    let handles: Vec<_> = documents
        .into_iter()
        .map(|(file, document)| {
            let client = client.clone();
            let cancel = Arc::clone(&cancel);
            let signature = Arc::clone(&signature);
            tokio::spawn(async move {
                let result = client
                    .create_document_cancellable(&document, &signature, cancel.cancelled())
                    .await;
                (file, result)
            })
        })
        .collect();

    let mut failed = 0usize;
    for handle in handles {
        let (file, result) = handle.await.context("Submission task panicked")?;
        match result {
            Ok(()) => info!(file = %file.display(), "Document submitted"),
            Err(dg_types::DocGateError::Cancelled) => {
                failed += 1;
                warn!(file = %file.display(), "Submission cancelled before admission");
            }
            Err(e) => {
                failed += 1;
                error!(file = %file.display(), error = %e, "Document submission failed");
            }
        }
    }
    signal_task.abort();

    if failed > 0 {
        bail!("{failed} of {total} documents were not submitted");
    }
    info!(total, "All documents submitted");
    Ok(())
}
