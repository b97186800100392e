//! Token exchange command.

use anyhow::{Context, Result};
use sdexec_config::{ExecutorSettings, load_settings};
use sdexec_core::ExecutorConfig;
use sdexec_executor::{ReqwestClient, RetryPolicy, TokenExchanger, parse_build_timeout};
use serde_json::Value;
use std::path::Path;
use tracing::info;

/// Exchange a temporal token and print the build-scoped token.
pub async fn exchange(
    config_path: Option<&Path>,
    build_id: &str,
    api_uri: Option<String>,
    token: String,
    timeout: Option<&str>,
) -> Result<()> {
    let settings = match config_path {
        Some(path) => load_settings(path)
            .with_context(|| format!("Failed to load settings: {}", path.display()))?,
        None => ExecutorSettings::default(),
    };

    let api_uri = api_uri
        .or_else(|| settings.api_uri.clone())
        .context("No API URI given (use --api-uri or set api-uri in the settings file)")?;
    let build_timeout = match timeout {
        Some(raw) => parse_build_timeout(raw)?,
        None => settings.build_timeout,
    };

    let client = ReqwestClient::new(
        settings.http.timeout(),
        RetryPolicy {
            max_attempts: settings.http.max_attempts,
            retry_delay: settings.http.retry_delay(),
        },
    )?;
    let exchanger = TokenExchanger::new(client);

    let config = ExecutorConfig {
        build_id: Some(Value::String(build_id.to_string())),
        api_uri: Some(api_uri),
        token: Some(token),
        ..Default::default()
    };

    info!(build_id = %build_id, "Requesting build token");
    let build_token = exchanger
        .exchange_token_for_build(&config, Some(build_timeout))
        .await?;
    println!("{}", build_token);

    Ok(())
}
