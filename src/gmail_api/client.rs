use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::auth::AccessTokenSource;
use super::threads::{summarize_thread, thread_messages};
use crate::error::{GmailError, Result};
use crate::types::{ApiErrorResponse, Message, Thread, ThreadList, ThreadSummary};

const DEFAULT_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users";

/// Largest `maxResults` the threads.list endpoint accepts.
pub const MAX_THREADS_PER_REQUEST: u32 = 500;

/// The read-only mailbox operations the digest tool is built from.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Most recent threads first, at most `limit` of them.
    async fn list_threads(&self, limit: u32) -> Result<Vec<ThreadSummary>>;
    /// Every message in the thread, in conversation order.
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<Message>>;
}

pub struct GmailClient {
    http: reqwest::Client,
    tokens: Arc<dyn AccessTokenSource>,
    user_id: String,
    api_base: String,
}

impl GmailClient {
    pub fn new(http: reqwest::Client, tokens: Arc<dyn AccessTokenSource>) -> Self {
        Self {
            http,
            tokens,
            user_id: "me".to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        resource: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}/{}/{}", self.api_base, self.user_id, resource);
        let token = self.tokens.access_token().await?;

        debug!(%url, "Gmail API request");
        let response = self
            .http
            .get(&url)
            .query(query)
            .bearer_auth(&token)
            .send()
            .await?;

        if response.status().is_success() {
            let body = response.text().await?;
            Ok(serde_json::from_str(&body)?)
        } else {
            Err(remote_error(response).await)
        }
    }

    async fn fetch_thread(&self, thread_id: &str) -> Result<Thread> {
        self.get_json(
            &format!("threads/{}", thread_id),
            &[("format", "full".to_string())],
        )
        .await
    }
}

// Prefer the message from Google's JSON error body over the bare status line
async fn remote_error(response: reqwest::Response) -> GmailError {
    let status = response.status();
    let error_text = response.text().await.unwrap_or_default();

    let message = match serde_json::from_str::<ApiErrorResponse>(&error_text) {
        Ok(parsed) => match parsed.error.status {
            Some(reason) => format!("{} ({})", parsed.error.message, reason),
            None => parsed.error.message,
        },
        Err(_) if error_text.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string(),
        Err(_) => error_text,
    };

    GmailError::RemoteApi {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl Mailbox for GmailClient {
    async fn list_threads(&self, limit: u32) -> Result<Vec<ThreadSummary>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let max_results = limit.min(MAX_THREADS_PER_REQUEST);
        let listing: ThreadList = self
            .get_json("threads", &[("maxResults", max_results.to_string())])
            .await?;

        // One extra round trip per thread to read its messages.
        let mut summaries = Vec::with_capacity(listing.threads.len());
        for thread_ref in listing.threads.iter().take(max_results as usize) {
            let thread = self.fetch_thread(&thread_ref.id).await?;
            summaries.push(summarize_thread(&thread)?);
        }

        debug!(count = summaries.len(), "Listed threads");
        Ok(summaries)
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<Message>> {
        let thread = self.fetch_thread(thread_id).await?;
        thread_messages(thread_id, &thread)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE;
    use base64::engine::Engine;
    use serde_json::{json, Value};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StaticToken(&'static str);

    #[async_trait]
    impl AccessTokenSource for StaticToken {
        async fn access_token(&self) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct DeniedToken;

    #[async_trait]
    impl AccessTokenSource for DeniedToken {
        async fn access_token(&self) -> Result<String> {
            Err(GmailError::AuthFlow("consent declined".to_string()))
        }
    }

    fn make_client(server: &MockServer) -> GmailClient {
        GmailClient::new(reqwest::Client::new(), Arc::new(StaticToken("test_token")))
            .with_api_base(format!("{}/gmail/v1/users", server.uri()))
    }

    fn thread_json(id: &str, subjects: &[&str]) -> Value {
        let messages: Vec<Value> = subjects
            .iter()
            .enumerate()
            .map(|(i, subject)| {
                json!({
                    "id": format!("{id}-m{i}"),
                    "threadId": id,
                    "labelIds": ["INBOX"],
                    "internalDate": "1700000000000",
                    "payload": {
                        "mimeType": "multipart/alternative",
                        "headers": [
                            {"name": "Subject", "value": subject},
                            {"name": "From", "value": "Bob <bob@example.com>"}
                        ],
                        "parts": [
                            {"mimeType": "text/html", "body": {"data": URL_SAFE.encode("<p>html</p>")}},
                            {"mimeType": "text/plain", "body": {"data": URL_SAFE.encode("plain text")}}
                        ]
                    }
                })
            })
            .collect();
        json!({"id": id, "messages": messages})
    }

    async fn mount_thread(server: &MockServer, id: &str, subjects: &[&str]) {
        Mock::given(method("GET"))
            .and(path(format!("/gmail/v1/users/me/threads/{id}")))
            .and(query_param("format", "full"))
            .respond_with(ResponseTemplate::new(200).set_body_json(thread_json(id, subjects)))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn lists_threads_in_api_order_with_bearer_token() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/threads"))
            .and(query_param("maxResults", "5"))
            .and(header("authorization", "Bearer test_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "threads": [{"id": "b"}, {"id": "a"}],
                "resultSizeEstimate": 2
            })))
            .expect(1)
            .mount(&server)
            .await;
        mount_thread(&server, "a", &["Older"]).await;
        mount_thread(&server, "b", &["Newer", "Re: Newer"]).await;

        let threads = make_client(&server).list_threads(5).await.unwrap();

        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0].id, "b");
        assert_eq!(threads[0].subject, "Newer");
        assert_eq!(threads[0].message_count, 2);
        assert_eq!(threads[1].id, "a");
    }

    #[tokio::test]
    async fn empty_mailbox_has_no_threads() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/threads"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "resultSizeEstimate": 0
            })))
            .mount(&server)
            .await;

        assert!(make_client(&server).list_threads(20).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_limit_skips_the_api() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        assert!(make_client(&server).list_threads(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversized_limit_is_clamped_and_respected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/threads"))
            .and(query_param("maxResults", "500"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "threads": [{"id": "a"}]
            })))
            .expect(1)
            .mount(&server)
            .await;
        mount_thread(&server, "a", &["Only"]).await;

        let threads = make_client(&server).list_threads(10_000).await.unwrap();
        assert_eq!(threads.len(), 1);
    }

    #[tokio::test]
    async fn list_messages_extracts_plain_text_and_sender() {
        let server = MockServer::start().await;
        mount_thread(&server, "t1", &["Hello", "Re: Hello"]).await;

        let messages = make_client(&server).list_messages("t1").await.unwrap();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, "t1-m0");
        assert_eq!(messages[0].thread_id, "t1");
        assert_eq!(messages[0].body, "plain text");
        assert_eq!(messages[0].sender.name, "Bob");
        assert_eq!(messages[0].sender.email, "bob@example.com");
        assert_eq!(messages[1].subject, "Re: Hello");
    }

    #[tokio::test]
    async fn unknown_thread_is_remote_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/threads/nope"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {
                    "code": 404,
                    "message": "Requested entity was not found.",
                    "status": "NOT_FOUND"
                }
            })))
            .mount(&server)
            .await;

        let err = make_client(&server).list_messages("nope").await.unwrap_err();
        match err {
            GmailError::RemoteApi { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Requested entity was not found. (NOT_FOUND)");
            }
            other => panic!("expected RemoteApi, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn quota_error_without_json_body_uses_reason_phrase() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/threads"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = make_client(&server).list_threads(3).await.unwrap_err();
        assert!(matches!(
            err,
            GmailError::RemoteApi { status: 429, ref message } if message == "Too Many Requests"
        ));
    }

    #[tokio::test]
    async fn unexpected_shape_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/threads/t1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "t1",
                "messages": [{"id": "m1"}]
            })))
            .mount(&server)
            .await;

        let err = make_client(&server).list_messages("t1").await.unwrap_err();
        assert!(matches!(err, GmailError::Malformed(_)));
    }

    #[tokio::test]
    async fn credential_failure_stops_before_any_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = GmailClient::new(reqwest::Client::new(), Arc::new(DeniedToken))
            .with_api_base(format!("{}/gmail/v1/users", server.uri()));

        let err = client.list_threads(5).await.unwrap_err();
        assert!(matches!(err, GmailError::AuthFlow(_)));
    }
}
