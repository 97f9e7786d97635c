use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use gmail_mcp::cli::{handle_token_clear, run_diagnostics, Cli};
use gmail_mcp::gmail_api::{CredentialProvider, GmailClient, Mailbox};
use gmail_mcp::server::run_server;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    // Stdout carries the MCP protocol, so logs go to stderr.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gmail_mcp=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let paths = cli.auth_paths();

    if cli.clear_token {
        return handle_token_clear(&paths);
    }

    info!(
        client_secret = %paths.client_secret.display(),
        token = %paths.token.display(),
        "Starting Gmail MCP server"
    );

    let http = reqwest::Client::new();
    let credentials = Arc::new(CredentialProvider::from_paths(&paths, http.clone()));
    credentials
        .obtain()
        .await
        .context("Gmail authentication failed")?;
    info!("Gmail API client initialized");

    let mailbox: Arc<dyn Mailbox> = Arc::new(GmailClient::new(http, credentials));

    if cli.diagnostic {
        run_diagnostics(mailbox.as_ref()).await;
        return Ok(());
    }

    run_server(mailbox).await
}
