use std::path::PathBuf;

use clap::Parser;

use crate::config::AuthPaths;
use crate::gmail_api::{CredentialStore, FileCredentialStore, Mailbox};

/// Threads fetched by the diagnostic run.
const DIAGNOSTIC_THREAD_LIMIT: u32 = 5;
const BODY_PREVIEW_CHARS: usize = 100;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Read-only Gmail MCP server", long_about = None)]
pub struct Cli {
    /// Authenticate, print a few threads and messages to stdout, and exit.
    #[clap(long = "test")]
    pub diagnostic: bool,

    /// Delete the cached OAuth token and exit.
    #[clap(long)]
    pub clear_token: bool,

    /// OAuth client secret downloaded from Google Cloud Console.
    #[clap(long, env = "GMAIL_MCP_CREDENTIALS", value_name = "PATH")]
    pub credentials: Option<PathBuf>,

    /// Where the OAuth token is cached between runs.
    #[clap(long, env = "GMAIL_MCP_TOKEN", value_name = "PATH")]
    pub token: Option<PathBuf>,
}

impl Cli {
    pub fn auth_paths(&self) -> AuthPaths {
        AuthPaths::beside_executable().with_overrides(self.credentials.clone(), self.token.clone())
    }
}

pub fn handle_token_clear(paths: &AuthPaths) -> anyhow::Result<()> {
    let store = FileCredentialStore::new(&paths.token);

    if let Err(e) = store.clear() {
        eprintln!(
            "Failed to delete cached token {}: {}",
            store.path().display(),
            e
        );
    } else {
        println!("Removed cached token {}. Exiting.", store.path().display());
    }
    Ok(())
}

fn body_preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}

/// Manual check that authentication and the Gmail reads work end to end.
pub async fn run_diagnostics(mailbox: &dyn Mailbox) {
    if let Err(e) = print_sample(mailbox).await {
        println!("Error accessing Gmail: {}", e);
    }
}

async fn print_sample(mailbox: &dyn Mailbox) -> crate::error::Result<()> {
    let threads = mailbox.list_threads(DIAGNOSTIC_THREAD_LIMIT).await?;
    println!("Found {} email threads:", threads.len());
    for thread in &threads {
        println!(
            "Thread: {} (Unread: {})",
            thread.subject, thread.unread_count
        );
    }

    if let Some(first) = threads.first() {
        let messages = mailbox.list_messages(&first.id).await?;
        println!("\nMessages in thread '{}':", first.subject);
        for message in &messages {
            println!("From: {} <{}>", message.sender.name, message.sender.email);
            println!("Date: {}", message.timestamp);
            if message.body.is_empty() {
                println!("No body content\n");
            } else {
                println!("Preview: {}...\n", body_preview(&message.body));
            }
        }
    }
    Ok(())
}
