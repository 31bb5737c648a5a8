//! Conversion of API payloads into the crate's message model.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

use tracing::warn;

use crate::error::{FetchError, Result};
use crate::model::message::Message;
use crate::model::part::{Part, PartBody};
use crate::parser::header::{charset_param, get_header, parse_date, parse_internal_date};

use super::api;

/// Gmail emits URL-safe base64, sometimes padded and sometimes not.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode a base64url payload as returned in `body.data`.
pub fn decode_base64url(data: &str) -> Result<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    URL_SAFE_LENIENT
        .decode(cleaned.as_bytes())
        .map_err(|e| FetchError::Decode(format!("invalid base64url payload: {e}")))
}

/// Build a [`Message`] from a `format=full` response.
pub fn message_from_api(msg: api::GmailMessage) -> Result<Message> {
    let root = msg.payload.unwrap_or_default();
    let headers = header_pairs(&root.headers);

    let subject = get_header(&headers, "Subject").map(String::from);
    let sender = get_header(&headers, "From").map(String::from);
    let timestamp = msg
        .internal_date
        .as_deref()
        .and_then(parse_internal_date)
        .or_else(|| get_header(&headers, "Date").and_then(parse_date));

    Ok(Message {
        id: msg.id,
        subject,
        sender,
        timestamp,
        payload: part_from_api(root),
    })
}

/// Convert one payload node and its descendants.
///
/// Recursion depth is bounded by what the API returns, which is itself a
/// parsed MIME structure of modest depth. A node whose inline data does not
/// decode keeps no data; its siblings are unaffected.
pub fn part_from_api(part: api::MessagePart) -> Part {
    let headers = header_pairs(&part.headers);
    let charset = get_header(&headers, "Content-Type").and_then(charset_param);

    let body = part.body.unwrap_or_default();
    let data = body.data.as_deref().and_then(|raw| match decode_base64url(raw) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!(
                part_id = part.part_id.as_deref().unwrap_or("?"),
                mime_type = %part.mime_type,
                error = %e,
                "Dropping undecodable part data"
            );
            None
        }
    });

    let children = part.parts.into_iter().map(part_from_api).collect();

    Part {
        mime_type: part.mime_type.to_ascii_lowercase(),
        filename: Some(part.filename).filter(|f| !f.trim().is_empty()),
        charset,
        body: PartBody {
            size: body.size,
            data,
            attachment_id: body.attachment_id.filter(|id| !id.is_empty()),
        },
        children,
    }
}

fn header_pairs(headers: &[api::Header]) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|h| (h.name.clone(), h.value.clone()))
        .collect()
}
