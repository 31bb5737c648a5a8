//! Write accepted attachments and fallback PDFs to disk.
//!
//! Layout: `{root}/{subject}_{id}/{file}` with subject folders on, or
//! `{root}/{file}` with them off. Existing files are never overwritten; a
//! name that is taken gets the lowest free `_N` suffix before its
//! extension. Each file is written to a temporary sibling and renamed into
//! place, so a reader never sees half a file under its final name.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{FetchError, Result};
use crate::model::message::Message;

use super::sanitize::{message_folder_name, sanitize_filename};

/// Bytes to be written under a (not yet sanitized) filename.
#[derive(Debug, Clone)]
pub struct OutputFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl OutputFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// What happened to one message's files.
#[derive(Debug, Default)]
pub struct MaterializeOutcome {
    /// Paths actually written, in input order.
    pub written: Vec<PathBuf>,
    /// Number of files that could not be written.
    pub failed: usize,
    /// Total bytes across `written`.
    pub bytes_written: u64,
}

/// Decides where files go and writes them.
#[derive(Debug, Clone)]
pub struct Materializer {
    root: PathBuf,
    subject_folders: bool,
}

impl Materializer {
    pub fn new(root: impl Into<PathBuf>, subject_folders: bool) -> Self {
        Self {
            root: root.into(),
            subject_folders,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the download root if it does not exist yet.
    pub fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(|e| FetchError::io(&self.root, e))
    }

    /// Directory that receives `message`'s files.
    pub fn target_dir(&self, message: &Message) -> PathBuf {
        if self.subject_folders {
            self.root.join(folder_name(message))
        } else {
            self.root.clone()
        }
    }

    /// Filename used for a message's fallback PDF.
    pub fn pdf_name(&self, message: &Message) -> String {
        format!("{}.pdf", folder_name(message))
    }

    /// Write `attachments` and, if given, the fallback PDF.
    ///
    /// A failed file is logged and counted; files already written stay in
    /// place and the remaining files are still attempted.
    pub fn materialize(
        &self,
        message: &Message,
        attachments: &[OutputFile],
        pdf: Option<&[u8]>,
    ) -> MaterializeOutcome {
        let mut outcome = MaterializeOutcome::default();
        let pdf_file = pdf.map(|bytes| (self.pdf_name(message), bytes));
        let files = attachments
            .iter()
            .map(|f| (f.name.clone(), f.bytes.as_slice()))
            .chain(pdf_file);

        let dir = self.target_dir(message);
        let total = attachments.len() + usize::from(pdf.is_some());
        if total == 0 {
            return outcome;
        }
        if let Err(e) = fs::create_dir_all(&dir) {
            warn!(dir = %dir.display(), error = %e, "Cannot create target directory");
            outcome.failed = total;
            return outcome;
        }

        for (name, bytes) in files {
            match write_unique(&dir, &sanitize_filename(&name), bytes) {
                Ok(path) => {
                    debug!(path = %path.display(), bytes = bytes.len(), "Wrote file");
                    outcome.bytes_written += bytes.len() as u64;
                    outcome.written.push(path);
                }
                Err(e) => {
                    warn!(filename = %name, error = %e, "Failed to write file");
                    outcome.failed += 1;
                }
            }
        }
        outcome
    }
}

fn folder_name(message: &Message) -> String {
    message_folder_name(message.subject.as_deref(), &message.id)
}

/// Write `bytes` to `dir/name`, or the first free `_N` variant of it.
fn write_unique(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf> {
    let path = unique_path(&dir.join(name));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("attachment");
    let tmp = dir.join(format!(".{file_name}.part"));

    let result = fs::File::create(&tmp)
        .and_then(|mut f| {
            f.write_all(bytes)?;
            f.sync_all()
        })
        .and_then(|()| fs::rename(&tmp, &path));

    match result {
        Ok(()) => Ok(path),
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(FetchError::io(&path, e))
        }
    }
}

/// If `path` already exists, append the lowest unused counter.
pub fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let parent = path.parent().unwrap_or(Path::new("."));

    (1u64..)
        .map(|i| {
            if ext.is_empty() {
                parent.join(format!("{stem}_{i}"))
            } else {
                parent.join(format!("{stem}_{i}.{ext}"))
            }
        })
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| parent.join(format!("{stem}_dup.{ext}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::part::Part;

    fn message(subject: Option<&str>) -> Message {
        Message {
            id: "18e4f0a1b2c3".into(),
            subject: subject.map(String::from),
            sender: None,
            timestamp: None,
            payload: Part::default(),
        }
    }

    #[test]
    fn test_subject_folder_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let m = Materializer::new(tmp.path(), true);
        let out = m.materialize(
            &message(Some("Invoice #4421")),
            &[OutputFile::new("inv.pdf", b"%PDF-1.4".to_vec())],
            None,
        );
        let expected = tmp.path().join("Invoice_4421_18e4f0a1b2c3").join("inv.pdf");
        assert_eq!(out.written, vec![expected.clone()]);
        assert_eq!(fs::read(expected).unwrap(), b"%PDF-1.4");
        assert_eq!(out.bytes_written, 8);
        assert_eq!(out.failed, 0);
    }

    #[test]
    fn test_flat_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let m = Materializer::new(tmp.path(), false);
        let out = m.materialize(&message(Some("x")), &[OutputFile::new("a.txt", vec![1])], None);
        assert_eq!(out.written[0], tmp.path().join("a.txt"));
    }

    #[test]
    fn test_collisions_get_lowest_free_suffix() {
        let tmp = tempfile::tempdir().unwrap();
        let m = Materializer::new(tmp.path(), false);
        let files = [
            OutputFile::new("report.pdf", b"one".to_vec()),
            OutputFile::new("report.pdf", b"two".to_vec()),
            OutputFile::new("report.pdf", b"three".to_vec()),
        ];
        let out = m.materialize(&message(None), &files, None);
        let names: Vec<_> = out
            .written
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["report.pdf", "report_1.pdf", "report_2.pdf"]);
        assert_eq!(fs::read(tmp.path().join("report_1.pdf")).unwrap(), b"two");

        // A gap is filled before higher numbers are used.
        fs::remove_file(tmp.path().join("report_1.pdf")).unwrap();
        assert_eq!(
            unique_path(&tmp.path().join("report.pdf")),
            tmp.path().join("report_1.pdf")
        );
    }

    #[test]
    fn test_existing_files_never_overwritten() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("notes"), b"keep").unwrap();
        let m = Materializer::new(tmp.path(), false);
        let out = m.materialize(&message(None), &[OutputFile::new("notes", b"new".to_vec())], None);
        assert_eq!(out.written[0], tmp.path().join("notes_1"));
        assert_eq!(fs::read(tmp.path().join("notes")).unwrap(), b"keep");
    }

    #[test]
    fn test_traversal_names_stay_inside_target() {
        let tmp = tempfile::tempdir().unwrap();
        let m = Materializer::new(tmp.path().join("root"), true);
        let out = m.materialize(
            &message(Some("s")),
            &[OutputFile::new("../../escape.sh", b"x".to_vec())],
            None,
        );
        assert!(out.written[0].starts_with(tmp.path().join("root")));
        assert!(!tmp.path().join("escape.sh").exists());
    }

    #[test]
    fn test_pdf_named_after_folder() {
        let tmp = tempfile::tempdir().unwrap();
        let m = Materializer::new(tmp.path(), true);
        let msg = message(Some("Invoice #4421"));
        let out = m.materialize(&msg, &[], Some(b"%PDF-".as_slice()));
        assert_eq!(
            out.written[0],
            tmp.path()
                .join("Invoice_4421_18e4f0a1b2c3")
                .join("Invoice_4421_18e4f0a1b2c3.pdf")
        );
    }

    #[test]
    fn test_long_multibyte_names_are_written() {
        let tmp = tempfile::tempdir().unwrap();
        let m = Materializer::new(tmp.path(), true);
        let msg = message(Some("請求書 ".repeat(40).as_str()));
        let name = format!("{}.pdf", "請求書".repeat(40));
        let files = [
            OutputFile::new(name.clone(), b"one".to_vec()),
            OutputFile::new(name, b"two".to_vec()),
        ];
        let out = m.materialize(&msg, &files, None);
        assert_eq!(out.failed, 0);
        assert_eq!(out.written.len(), 2);
        for path in &out.written {
            let file_name = path.file_name().unwrap().to_str().unwrap();
            assert!(file_name.len() <= 255);
            assert!(file_name.ends_with(".pdf"));
        }
        assert_eq!(fs::read(&out.written[1]).unwrap(), b"two");

        let pdf = m.materialize(&msg, &[], Some(b"%PDF-".as_slice()));
        assert_eq!(pdf.failed, 0);
        assert_eq!(pdf.written.len(), 1);
    }

    #[test]
    fn test_nothing_to_write_creates_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let m = Materializer::new(tmp.path(), true);
        let out = m.materialize(&message(Some("empty")), &[], None);
        assert!(out.written.is_empty());
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_unwritable_directory_counts_failures() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let locked = tmp.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o500)).unwrap();
        // Root ignores permission bits; nothing to check in that case.
        if fs::write(locked.join("canary"), b"").is_ok() {
            return;
        }
        let m = Materializer::new(&locked, false);
        let out = m.materialize(
            &message(None),
            &[OutputFile::new("a", vec![1]), OutputFile::new("b", vec![2])],
            None,
        );
        assert_eq!(out.failed, 2);
        assert!(out.written.is_empty());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o700)).unwrap();
    }
}
