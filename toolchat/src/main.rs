//! `toolchat` interactive front end.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use toolchat::adapters::anthropic::{AnthropicAdapter, AnthropicConfig};
use toolchat::config::AppConfig;
use toolchat::kernel::{Orchestrator, Step};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const BANNER: &str = "toolchat ready. Type `help` for commands, `exit` to leave.";

/// Chat with a model that can call QR, file-system, git and remote tools.
#[derive(Debug, Parser)]
#[command(name = "toolchat", version, about)]
struct Cli {
    /// Model identifier (overrides TOOLCHAT_MODEL).
    #[arg(long)]
    model: Option<String>,

    /// Output token cap per request (overrides TOOLCHAT_MAX_TOKENS).
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    max_tokens: Option<u32>,

    /// Directory new repositories are created in (overrides TOOLCHAT_WORKSPACE).
    #[arg(long)]
    workspace: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env().context("invalid configuration")?;
    if let Some(model) = cli.model {
        config = config.with_model(model);
    }
    if let Some(max_tokens) = cli.max_tokens {
        config = config.with_max_tokens(max_tokens);
    }
    if let Some(workspace) = cli.workspace {
        config = config.with_workspace_root(workspace);
    }

    let api_key = config.require_api_key()?;
    let adapter = AnthropicAdapter::new(
        AnthropicConfig::new(config.model())
            .with_api_key(api_key)
            .with_default_max_tokens(config.max_tokens()),
    )
    .context("cannot build the model adapter")?;
    let mut orchestrator = Orchestrator::from_config(&config, Arc::new(adapter))
        .context("invalid backend configuration")?;
    info!(
        model = config.model(),
        workspace = %config.workspace_root().display(),
        "toolchat started"
    );

    tokio::select! {
        result = repl(&mut orchestrator) => result?,
        _ = tokio::signal::ctrl_c() => warn!("interrupted"),
    }
    Ok(())
}

async fn repl(orchestrator: &mut Orchestrator) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    stdout.write_all(format!("{BANNER}\n").as_bytes()).await?;

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await.context("failed to read stdin")? else {
            break;
        };

        match orchestrator.handle_line(&line).await {
            Step::Silent => {}
            Step::Exit => break,
            Step::Reply(text) => {
                stdout.write_all(format!("{text}\n").as_bytes()).await?;
            }
        }
    }

    stdout.write_all(b"Bye.\n").await?;
    stdout.flush().await?;
    Ok(())
}
