//! Per-run counters, reported once at the end of a run.

use serde::Serialize;

/// Counters for one invocation. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Messages fetched successfully (whatever happened to them next).
    pub messages_processed: u64,
    pub skipped_by_date: u64,
    pub skipped_by_subject: u64,
    /// Fetch failed after the retry budget, or with a non-retryable error.
    pub messages_failed: u64,
    /// Listed, but gone by the time it was fetched.
    pub messages_not_found: u64,
    /// Passed the filters but had nothing to write.
    pub messages_without_content: u64,
    pub attachments_saved: u64,
    pub attachments_skipped_by_filename: u64,
    /// Accepted attachments whose bytes could not be downloaded.
    pub attachments_failed: u64,
    /// Files (attachments or PDFs) that could not be written to disk.
    pub write_failures: u64,
    pub pdfs_generated: u64,
    pub render_failures: u64,
    pub bytes_written: u64,
}

impl RunStats {
    /// Messages that passed every message-level filter.
    pub fn messages_accepted(&self) -> u64 {
        self.messages_processed
            .saturating_sub(self.skipped_by_date)
            .saturating_sub(self.skipped_by_subject)
    }

    /// Files written, attachments and PDFs alike.
    pub fn files_written(&self) -> u64 {
        self.attachments_saved + self.pdfs_generated
    }

    /// `true` if anything went wrong during the run.
    pub fn has_failures(&self) -> bool {
        self.messages_failed > 0
            || self.attachments_failed > 0
            || self.write_failures > 0
            || self.render_failures > 0
    }

    /// Label/value rows for the end-of-run summary.
    pub fn rows(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("Messages processed", self.messages_processed),
            ("Skipped by date", self.skipped_by_date),
            ("Skipped by subject", self.skipped_by_subject),
            ("Not found", self.messages_not_found),
            ("Failed", self.messages_failed),
            ("Without content", self.messages_without_content),
            ("Attachments saved", self.attachments_saved),
            ("Attachments skipped by filename", self.attachments_skipped_by_filename),
            ("Attachments failed", self.attachments_failed),
            ("Write failures", self.write_failures),
            ("PDFs generated", self.pdfs_generated),
            ("Render failures", self.render_failures),
        ]
    }
}
