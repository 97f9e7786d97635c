//! Read-only Gmail access for agent frameworks, exposed as a single MCP tool.

pub mod cli;
pub mod config;
pub mod digest;
pub mod email_content;
pub mod error;
pub mod gmail_api;
pub mod server;
pub mod types;

pub use error::{GmailError, Result};
