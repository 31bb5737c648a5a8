//! Composite message/attachment filter built once per run.
//!
//! Date and subject filters reject whole messages; the filename filter
//! rejects individual attachments and never disqualifies siblings.

pub mod date;
pub mod pattern;

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::error::{FetchError, Result};
use crate::model::message::Message;

use self::date::{end_of_day, parse_config_date, passes_date_window, start_of_day};
use self::pattern::{passes_filename_pattern, passes_subject_pattern, Pattern};

/// Immutable filter configuration for one run.
#[derive(Debug, Clone)]
pub struct FilterSpec {
    /// Server-side search query.
    pub query: String,
    /// Upper bound on enumerated messages.
    pub max_messages: usize,
    /// Inclusive lower bound.
    pub date_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound (last instant of the configured day).
    pub date_to: Option<DateTime<Utc>>,
    pub subject_pattern: Option<Pattern>,
    pub filename_pattern: Option<Pattern>,
    /// Per-message `{subject}_{id}` directories.
    pub subject_folders: bool,
    /// Render the body to PDF when no attachment survives.
    pub pdf_fallback: bool,
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self {
            query: String::new(),
            max_messages: 100,
            date_from: None,
            date_to: None,
            subject_pattern: None,
            filename_pattern: None,
            subject_folders: true,
            pdf_fallback: false,
        }
    }
}

impl FilterSpec {
    /// Validate and compile the filter options of `config`.
    ///
    /// Every failure is a [`FetchError::Config`].
    pub fn from_config(config: &Config) -> Result<Self> {
        let f = &config.filter;

        let date_from = f
            .date_from
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| parse_config_date(s, "date_from"))
            .transpose()?;
        let date_to = f
            .date_to
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| parse_config_date(s, "date_to"))
            .transpose()?;

        if let (Some(from), Some(to)) = (date_from, date_to) {
            if from > to {
                return Err(FetchError::Config(format!(
                    "date_from ({from}) is after date_to ({to})"
                )));
            }
        }

        Ok(Self {
            query: config.gmail.search_query.clone(),
            max_messages: config.gmail.max_messages,
            date_from: date_from.map(start_of_day),
            date_to: date_to.map(end_of_day),
            subject_pattern: Pattern::compile(f.subject_pattern.as_deref(), "subject")?,
            filename_pattern: Pattern::compile(f.filename_pattern.as_deref(), "filename")?,
            subject_folders: config.output.create_subject_folders,
            pdf_fallback: config.output.convert_body_if_no_attachment,
        })
    }

    /// Message-level date check.
    pub fn accepts_date(&self, message: &Message) -> bool {
        passes_date_window(message.timestamp, self.date_from, self.date_to)
    }

    /// Message-level subject check (absent subject = empty string).
    pub fn accepts_subject(&self, message: &Message) -> bool {
        passes_subject_pattern(message.subject.as_deref(), self.subject_pattern.as_ref())
    }

    /// Attachment-level filename check.
    pub fn accepts_filename(&self, filename: &str) -> bool {
        passes_filename_pattern(filename, self.filename_pattern.as_ref())
    }
}
