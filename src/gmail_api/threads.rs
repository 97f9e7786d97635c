use crate::email_content::{extract_plain_text_body, format_internal_date, parse_sender};
use crate::error::{GmailError, Result};
use crate::types::{Message, RemoteMessage, Thread, ThreadSummary};

/// Stand-in when a message carries no Subject header.
pub const NO_SUBJECT: &str = "(No Subject)";

fn subject_of(message: &RemoteMessage) -> String {
    message
        .payload
        .header("Subject")
        .unwrap_or(NO_SUBJECT)
        .to_string()
}

// Build the thread list entry from a fully fetched thread
pub fn summarize_thread(thread: &Thread) -> Result<ThreadSummary> {
    let (first, last) = match (thread.messages.first(), thread.messages.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => {
            return Err(GmailError::Malformed(format!(
                "thread {} has no messages",
                thread.id
            )))
        }
    };

    let subject = subject_of(first);
    Ok(ThreadSummary {
        id: thread.id.clone(),
        // Preview mirrors the subject; there is no body excerpt yet.
        preview: subject.clone(),
        subject,
        unread_count: thread.messages.iter().filter(|m| m.is_unread()).count(),
        last_updated: format_internal_date(&last.internal_date)?,
        message_count: thread.messages.len(),
    })
}

pub fn thread_messages(thread_id: &str, thread: &Thread) -> Result<Vec<Message>> {
    thread
        .messages
        .iter()
        .map(|message| to_message(thread_id, message))
        .collect()
}

fn to_message(thread_id: &str, message: &RemoteMessage) -> Result<Message> {
    let from_header = message.payload.header("From").unwrap_or_default();

    Ok(Message {
        id: message.id.clone(),
        thread_id: thread_id.to_string(),
        body: extract_plain_text_body(&message.payload),
        sender: parse_sender(from_header),
        timestamp: format_internal_date(&message.internal_date)?,
        subject: subject_of(message),
    })
}
