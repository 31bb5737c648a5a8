//! The selection-and-materialization pipeline.
//!
//! One message at a time: fetch, filter by date and subject, extract parts,
//! filter attachments by filename, download, write, and fall back to a PDF
//! of the body when nothing survived. Only listing, configuration and
//! authentication errors end a run early; anything else is counted against
//! the message it happened to.

use tracing::{debug, info, info_span, warn};

use crate::config::Config;
use crate::error::{FetchError, Result};
use crate::export::materialize::{Materializer, OutputFile};
use crate::filter::FilterSpec;
use crate::gmail::{list_candidate_ids, MailClient, RetryPolicy};
use crate::model::message::Message;
use crate::model::part::Body;
use crate::parser::extract::{extract_parts, Extracted};
use crate::render;
use crate::stats::RunStats;

/// A configured run over one mailbox.
pub struct Pipeline<C: MailClient> {
    client: C,
    spec: FilterSpec,
    materializer: Materializer,
    retry: RetryPolicy,
}

impl<C: MailClient> Pipeline<C> {
    pub fn new(client: C, spec: FilterSpec, materializer: Materializer, retry: RetryPolicy) -> Self {
        Self {
            client,
            spec,
            materializer,
            retry,
        }
    }

    /// Build a pipeline from validated configuration.
    pub fn from_config(client: C, config: &Config) -> Result<Self> {
        let spec = FilterSpec::from_config(config)?;
        let materializer = Materializer::new(&config.output.download_path, spec.subject_folders);
        Ok(Self::new(
            client,
            spec,
            materializer,
            RetryPolicy::from_config(&config.retry),
        ))
    }

    pub fn spec(&self) -> &FilterSpec {
        &self.spec
    }

    pub fn materializer(&self) -> &Materializer {
        &self.materializer
    }

    /// Process every candidate message.
    ///
    /// `on_message` is called after each message with its id and the
    /// counters so far.
    pub fn run(&self, on_message: &mut dyn FnMut(&str, &RunStats)) -> Result<RunStats> {
        let span = info_span!("run", query = %self.spec.query, max = self.spec.max_messages);
        let _enter = span.enter();

        self.materializer.prepare()?;
        info!(
            root = %self.materializer.root().display(),
            "Searching for messages"
        );

        let mut stats = RunStats::default();
        let ids = list_candidate_ids(
            &self.client,
            &self.spec.query,
            self.spec.max_messages,
            &self.retry,
        );
        for id in ids {
            let id = id.map_err(|e| {
                warn!(error = %e, "Listing messages failed");
                e
            })?;
            let span = info_span!("message", id = %id);
            let _enter = span.enter();
            self.process_message(&id, &mut stats)?;
            on_message(&id, &stats);
        }

        info!(
            processed = stats.messages_processed,
            accepted = stats.messages_accepted(),
            attachments = stats.attachments_saved,
            pdfs = stats.pdfs_generated,
            failed = stats.messages_failed,
            "Run complete"
        );
        Ok(stats)
    }

    /// Handle one message id. Returns `Err` only for run-fatal errors.
    fn process_message(&self, id: &str, stats: &mut RunStats) -> Result<()> {
        let message = match self.retry.run("fetch message", || self.client.fetch_message(id)) {
            Ok(message) => message,
            Err(FetchError::NotFound(detail)) => {
                info!(%detail, "Message no longer exists, skipping");
                stats.messages_not_found += 1;
                return Ok(());
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(error = %e, "Failed to fetch message");
                stats.messages_failed += 1;
                return Ok(());
            }
        };
        stats.messages_processed += 1;

        if !self.spec.accepts_date(&message) {
            debug!(timestamp = ?message.timestamp, "Outside date window");
            stats.skipped_by_date += 1;
            return Ok(());
        }
        if !self.spec.accepts_subject(&message) {
            debug!(subject = message.subject_or_empty(), "Subject does not match");
            stats.skipped_by_subject += 1;
            return Ok(());
        }

        let Extracted { attachments, body } = extract_parts(&message.payload);
        debug!(
            attachments = attachments.len(),
            has_body = body.is_some(),
            "Extracted parts"
        );

        let mut files = Vec::new();
        let mut accepted = 0usize;
        for attachment in &attachments {
            if !self.spec.accepts_filename(&attachment.filename) {
                debug!(filename = %attachment.filename, "Filename does not match");
                stats.attachments_skipped_by_filename += 1;
                continue;
            }
            accepted += 1;
            let bytes = self.retry.run("download attachment", || {
                self.client.fetch_attachment_bytes(&message.id, attachment)
            });
            match bytes {
                Ok(bytes) => files.push(OutputFile::new(attachment.filename.clone(), bytes)),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(filename = %attachment.filename, error = %e, "Failed to download attachment");
                    stats.attachments_failed += 1;
                }
            }
        }

        if !files.is_empty() {
            let outcome = self.materializer.materialize(&message, &files, None);
            for path in &outcome.written {
                info!(path = %path.display(), "Saved attachment");
            }
            stats.attachments_saved += outcome.written.len() as u64;
            stats.write_failures += outcome.failed as u64;
            stats.bytes_written += outcome.bytes_written;
        }

        if accepted > 0 {
            return Ok(());
        }

        match (&body, self.spec.pdf_fallback) {
            (Some(body), true) => self.write_pdf(&message, body, stats),
            _ => {
                debug!("Nothing to save");
                stats.messages_without_content += 1;
                Ok(())
            }
        }
    }

    fn write_pdf(
        &self,
        message: &Message,
        body: &Body,
        stats: &mut RunStats,
    ) -> Result<()> {
        let pdf = match render::render(
            message.subject.as_deref(),
            message.sender.as_deref(),
            message.timestamp,
            body,
        ) {
            Ok(pdf) => pdf,
            Err(e) => {
                warn!(error = %e, "Failed to render body");
                stats.render_failures += 1;
                return Ok(());
            }
        };

        let outcome = self.materializer.materialize(message, &[], Some(pdf.as_slice()));
        if let Some(path) = outcome.written.first() {
            info!(path = %path.display(), "Saved body as PDF");
        }
        stats.pdfs_generated += outcome.written.len() as u64;
        stats.write_failures += outcome.failed as u64;
        stats.bytes_written += outcome.bytes_written;
        Ok(())
    }
}
