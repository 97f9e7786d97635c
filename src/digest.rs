use serde::Serialize;
use tracing::{error, info};

use crate::error::Result;
use crate::gmail_api::Mailbox;
use crate::types::{Message, ThreadSummary};

pub const DEFAULT_THREAD_LIMIT: u32 = 20;

#[derive(Debug, Serialize)]
pub struct ThreadDigest {
    pub thread_info: ThreadSummary,
    pub messages: Vec<Message>,
}

/// What the tool hands back: either every requested thread or a single error.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Envelope {
    Digest { threads: Vec<ThreadDigest> },
    Failure { error: String },
}

impl Envelope {
    pub fn to_json(&self) -> String {
        match self {
            Envelope::Digest { .. } => serde_json::to_string_pretty(self)
                .unwrap_or_else(|e| Envelope::failure_json(&format!("Error encoding digest: {e}"))),
            Envelope::Failure { error } => Envelope::failure_json(error),
        }
    }

    fn failure_json(message: &str) -> String {
        serde_json::json!({ "error": message }).to_string()
    }
}

/// Fetches up to `limit` threads and then each thread's messages, one request at a time.
pub async fn collect_digest(mailbox: &dyn Mailbox, limit: u32) -> Result<Vec<ThreadDigest>> {
    let summaries = mailbox.list_threads(limit).await?;

    let mut threads = Vec::with_capacity(summaries.len());
    for thread_info in summaries.into_iter().take(limit as usize) {
        let messages = mailbox.list_messages(&thread_info.id).await?;
        threads.push(ThreadDigest {
            thread_info,
            messages,
        });
    }
    Ok(threads)
}

/// Builds the digest envelope. Failures are logged and folded into the
/// envelope's `error` field, so this never fails.
pub async fn build_envelope(mailbox: &dyn Mailbox, limit: u32) -> Envelope {
    match collect_digest(mailbox, limit).await {
        Ok(threads) => {
            info!(threads = threads.len(), limit, "Built mail digest");
            Envelope::Digest { threads }
        }
        Err(e) => {
            let message = format!("Error accessing Gmail: {}", e);
            error!("{}", message);
            Envelope::Failure { error: message }
        }
    }
}

/// The digest as a JSON string, ready to return from the tool.
pub async fn fetch_mail_digest(mailbox: &dyn Mailbox, limit: u32) -> String {
    build_envelope(mailbox, limit).await.to_json()
}
