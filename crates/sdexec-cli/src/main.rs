//! sdexec CLI tool.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "sdexec")]
#[command(about = "Build executor toolkit", long_about = None)]
struct Cli {
    /// Executor settings file
    #[arg(long, global = true, env = "SDEXEC_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resource hints derived from job annotations
    Annotations {
        /// JSON object, `@file` or `-` for stdin
        input: String,
    },
    /// Check an executor configuration against an operation schema
    Validate {
        /// Operation name (start, stop, status, verify, startPeriodic, ...)
        operation: String,
        /// JSON object, `@file` or `-` for stdin
        input: String,
    },
    /// Exchange a temporal token for a build-scoped token
    ExchangeToken {
        /// Build ID
        #[arg(long)]
        build_id: String,
        /// Pipeline API base URI
        #[arg(long, env = "SD_API_URI")]
        api_uri: Option<String>,
        /// Temporal token
        #[arg(long, env = "SD_TOKEN", hide_env_values = true)]
        token: String,
        /// Build timeout in minutes
        #[arg(long)]
        timeout: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Annotations { input } => {
            commands::annotations(&input)?;
        }
        Commands::Validate { operation, input } => {
            commands::validate(&operation, &input)?;
        }
        Commands::ExchangeToken {
            build_id,
            api_uri,
            token,
            timeout,
        } => {
            commands::token::exchange(
                cli.config.as_deref(),
                &build_id,
                api_uri,
                token,
                timeout.as_deref(),
            )
            .await?;
        }
    }

    Ok(())
}
