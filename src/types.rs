use serde::{Deserialize, Serialize};

// Gmail REST wire records

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ThreadList {
    #[serde(default)]
    pub threads: Vec<ThreadRef>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ThreadRef {
    pub id: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Thread {
    pub id: String,
    #[serde(default)]
    pub messages: Vec<RemoteMessage>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RemoteMessage {
    pub id: String,
    #[serde(rename = "labelIds", default)]
    pub label_ids: Vec<String>,
    /// Milliseconds since the epoch, sent as a decimal string.
    #[serde(rename = "internalDate")]
    pub internal_date: String,
    pub payload: MessagePart,
}

impl RemoteMessage {
    pub fn is_unread(&self) -> bool {
        self.label_ids.iter().any(|label| label == "UNREAD")
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MessagePart {
    #[serde(rename = "mimeType")]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub headers: Vec<Header>,
    pub body: Option<MessagePartBody>,
    pub parts: Option<Vec<MessagePart>>,
}

impl MessagePart {
    /// Looks up a header by exact name. A repeated header resolves to its last value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|h| h.name == name)
            .map(|h| h.value.as_str())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MessagePartBody {
    pub data: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub message: String,
    pub status: Option<String>,
}

// Normalized records returned to tool callers

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ThreadSummary {
    pub id: String,
    pub subject: String,
    pub preview: String,
    pub unread_count: usize,
    pub last_updated: String,
    pub message_count: usize,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Sender {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub thread_id: String,
    pub body: String,
    pub sender: Sender,
    pub timestamp: String,
    pub subject: String,
}
