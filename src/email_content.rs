use crate::error::{GmailError, Result};
use crate::types::{MessagePart, Sender};
use base64::alphabet;
use base64::engine::{DecodePaddingMode, Engine, GeneralPurpose, GeneralPurposeConfig};
use chrono::{DateTime, Local};

// Gmail pads body data, but tolerate unpadded input as well.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn decode_text(part: &MessagePart) -> Option<String> {
    let data = part.body.as_ref()?.data.as_ref()?;
    let decoded = URL_SAFE_LENIENT.decode(data).ok()?;
    String::from_utf8(decoded).ok()
}

/// Pulls the plain-text body out of a message payload.
///
/// A multipart payload yields its first direct `text/plain` child that decodes
/// cleanly; HTML alternatives and attachments are skipped. A single-part payload
/// yields its own body data whatever its MIME type. Anything else is empty.
pub fn extract_plain_text_body(payload: &MessagePart) -> String {
    if let Some(parts) = &payload.parts {
        return parts
            .iter()
            .filter(|part| part.mime_type.as_deref() == Some("text/plain"))
            .find_map(decode_text)
            .unwrap_or_default();
    }

    decode_text(payload).unwrap_or_default()
}

/// Splits a `From` header into display name and address.
///
/// `Jane Doe <jane@x.com>` gives both parts. Without a bracketed address the
/// whole header is taken as the email.
pub fn parse_sender(from_header: &str) -> Sender {
    let mut segments = from_header.split('<');
    let name = segments.next().unwrap_or_default().trim().to_string();

    let email = if from_header.contains('<') && from_header.contains('>') {
        segments
            .next()
            .and_then(|rest| rest.split('>').next())
            .unwrap_or_default()
            .to_string()
    } else {
        from_header.to_string()
    };

    Sender { name, email }
}

/// Renders Gmail's `internalDate` (epoch milliseconds) in local time.
pub fn format_internal_date(internal_date: &str) -> Result<String> {
    let millis: i64 = internal_date.trim().parse().map_err(|_| {
        GmailError::Malformed(format!("internalDate is not a number: {internal_date:?}"))
    })?;

    let utc = DateTime::from_timestamp(millis.div_euclid(1000), 0).ok_or_else(|| {
        GmailError::Malformed(format!("internalDate out of range: {internal_date}"))
    })?;

    Ok(utc.with_timezone(&Local).format(TIMESTAMP_FORMAT).to_string())
}
