//! Gmail API module split into logical submodules
//!
//! - auth: OAuth credential loading, refresh, consent flow and token cache
//! - client: HTTP access to the Gmail REST API and the `Mailbox` trait
//! - threads: Conversion of thread payloads into summaries and messages

pub mod auth;
pub mod client;
pub mod threads;

pub use auth::{
    AccessTokenSource, CredentialProvider, CredentialStore, FileCredentialStore,
    GMAIL_READONLY_SCOPE,
};
pub use client::{GmailClient, Mailbox};
pub use threads::NO_SUBJECT;

#[cfg(test)]
pub use client::MockMailbox;
