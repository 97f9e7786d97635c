//! MCP server exposing the Gmail digest tool over stdio.

use std::sync::Arc;

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler,
};
use tracing::info;

use crate::digest::{fetch_mail_digest, DEFAULT_THREAD_LIMIT};
use crate::gmail_api::Mailbox;

#[derive(Debug, Default, serde::Deserialize, schemars::JsonSchema)]
pub struct GmailContentRequest {
    /// Maximum number of threads to fetch (default 20)
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Holds the mailbox built at startup; every tool call reuses it.
#[derive(Clone)]
pub struct GmailMcp {
    mailbox: Arc<dyn Mailbox>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl GmailMcp {
    pub fn new(mailbox: Arc<dyn Mailbox>) -> Self {
        Self {
            mailbox,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        name = "get_gmail_content",
        description = "Fetch recent Gmail threads with all of their messages and return them as a JSON string. Each thread has `thread_info` (subject, unread_count, last_updated, message_count) and `messages` (sender, timestamp, subject, plain-text body). On failure the JSON contains only an `error` field."
    )]
    async fn get_gmail_content(
        &self,
        Parameters(request): Parameters<GmailContentRequest>,
    ) -> Result<CallToolResult, McpError> {
        let limit = request.limit.unwrap_or(DEFAULT_THREAD_LIMIT);
        let digest = fetch_mail_digest(self.mailbox.as_ref(), limit).await;
        Ok(CallToolResult::success(vec![Content::text(digest)]))
    }
}

#[tool_handler]
impl ServerHandler for GmailMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Read-only Gmail access. Call `get_gmail_content` with an optional `limit` \
                 to receive the most recent threads and their messages as JSON."
                    .to_string(),
            ),
            ..Default::default()
        }
    }
}

/// Serve the MCP protocol on stdin/stdout until the client disconnects.
pub async fn run_server(mailbox: Arc<dyn Mailbox>) -> anyhow::Result<()> {
    use rmcp::{transport::stdio, ServiceExt};

    info!("Starting MCP server on stdio");
    let service = GmailMcp::new(mailbox)
        .serve(stdio())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start MCP server: {}", e))?;

    service
        .waiting()
        .await
        .map_err(|e| anyhow::anyhow!("MCP server error: {}", e))?;

    info!("MCP client disconnected");
    Ok(())
}
