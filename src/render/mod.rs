//! Message body to PDF rendering.
//!
//! Used as the fallback artifact when a message has no attachment that
//! passed the filename filter. HTML bodies keep their structure (headings,
//! paragraphs, lists, quotes); plain-text bodies keep their line breaks.

pub mod html;
pub mod layout;
pub mod pdf;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::part::{Body, BodyKind};

use layout::{DocumentHeader, Line};

const UNKNOWN: &str = "Unknown";

/// Lay out the document for a body without producing PDF bytes.
pub fn compose(
    subject: Option<&str>,
    sender: Option<&str>,
    timestamp: Option<DateTime<Utc>>,
    body: &Body,
) -> Result<Vec<Line>> {
    let header = DocumentHeader {
        subject: non_blank(subject).unwrap_or(UNKNOWN).to_string(),
        sender: non_blank(sender).unwrap_or(UNKNOWN).to_string(),
        date: timestamp
            .map(|t| t.format("%a, %d %b %Y %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| UNKNOWN.to_string()),
    };
    let blocks = match body.kind {
        BodyKind::Html => html::html_to_blocks(&body.text)?,
        BodyKind::Plain => layout::plain_to_blocks(&body.text),
    };
    Ok(layout::compose(&header, &blocks))
}

/// Render a body into a standalone PDF document with a header block
/// (subject, sender, date).
pub fn render(
    subject: Option<&str>,
    sender: Option<&str>,
    timestamp: Option<DateTime<Utc>>,
    body: &Body,
) -> Result<Vec<u8>> {
    let lines = compose(subject, sender, timestamp, body)?;
    let title = non_blank(subject).unwrap_or(UNKNOWN);
    pdf::write_pdf(title, &lines)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use chrono::TimeZone;

    fn html(text: &str) -> Body {
        Body {
            kind: BodyKind::Html,
            text: text.into(),
        }
    }

    #[test]
    fn test_compose_header_and_body() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        let lines = compose(
            Some("Invoice #4421"),
            Some("billing@example.com"),
            Some(ts),
            &html("<h1>Thanks</h1><p>Amount due: 42</p>"),
        )
        .unwrap();
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts[0], "Subject: Invoice #4421");
        assert_eq!(texts[1], "From: billing@example.com");
        assert_eq!(texts[2], "Date: Fri, 15 Mar 2024 10:00:00 UTC");
        assert!(texts.contains(&"Thanks"));
        assert!(texts.contains(&"Amount due: 42"));
    }

    #[test]
    fn test_missing_metadata_shows_unknown() {
        let lines = compose(None, Some("  "), None, &html("<p>x</p>")).unwrap();
        assert_eq!(lines[0].text, "Subject: Unknown");
        assert_eq!(lines[1].text, "From: Unknown");
        assert_eq!(lines[2].text, "Date: Unknown");
    }

    #[test]
    fn test_render_produces_pdf() {
        let body = Body {
            kind: BodyKind::Plain,
            text: "Hello\n\nSee you".into(),
        };
        let bytes = render(Some("Hi"), None, None, &body).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn test_malformed_html_fails() {
        let err = render(Some("x"), None, None, &html("<p>ok</p><a href=\"x")).unwrap_err();
        assert!(matches!(err, FetchError::Render(_)));
    }
}
