//! Filesystem-safe names for message folders and attachment files.

/// Longest subject prefix used in a folder name, in bytes.
pub const MAX_SUBJECT_LEN: usize = 50;

/// Longest message id used in a folder name, in bytes.
const MAX_ID_LEN: usize = 64;

/// Longest attachment filename kept, in bytes. Leaves room under the
/// common 255-byte name limit for the `.{name}.part` temporary and an
/// `_N` collision suffix.
pub const MAX_FILENAME_LEN: usize = 200;

const FALLBACK_FILENAME: &str = "attachment";

const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Reduce a subject to `[A-Za-z0-9._-]`-style characters joined by single
/// underscores, at most `max_len` bytes of UTF-8. May return an empty
/// string.
pub fn sanitize_subject(subject: &str, max_len: usize) -> String {
    let mut out = String::with_capacity(subject.len().min(max_len));
    let mut pending_sep = false;

    for c in subject.chars() {
        if c.is_alphanumeric() || c == '-' || c == '.' {
            let sep = usize::from(pending_sep && !out.is_empty());
            if out.len() + sep + c.len_utf8() > max_len {
                break;
            }
            if sep == 1 {
                out.push('_');
            }
            out.push(c);
            pending_sep = false;
        } else {
            pending_sep = true;
        }
    }

    out.trim_matches(['.', '-', '_']).to_string()
}

/// Folder name for a message: `{subject}_{id}`, or just the id when the
/// subject has nothing usable.
pub fn message_folder_name(subject: Option<&str>, message_id: &str) -> String {
    let id = sanitize_subject(message_id, MAX_ID_LEN);
    let id = if id.is_empty() { "message" } else { id.as_str() };
    let subject = sanitize_subject(subject.unwrap_or(""), MAX_SUBJECT_LEN);
    if subject.is_empty() {
        id.to_string()
    } else {
        format!("{subject}_{id}")
    }
}

/// Make an attachment filename safe to join onto a directory.
///
/// Only the last path component survives, characters that are illegal on
/// common filesystems become `_`, and leading dots are dropped so the
/// result can never be `.`/`..` or a hidden file.
pub fn sanitize_filename(name: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or("");

    let replaced: String = last
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = replaced
        .trim()
        .trim_start_matches('.')
        .trim_end_matches(['.', ' '])
        .trim_start();
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '_') {
        return FALLBACK_FILENAME.to_string();
    }

    let mut result = truncate_keeping_extension(trimmed, MAX_FILENAME_LEN);

    let stem = result.split('.').next().unwrap_or("");
    if RESERVED_NAMES.iter().any(|r| r.eq_ignore_ascii_case(stem)) {
        let at = stem.len();
        result.insert(at, '_');
    }
    result
}

fn truncate_keeping_extension(name: &str, max_bytes: usize) -> String {
    if name.len() <= max_bytes {
        return name.to_string();
    }
    let (stem, ext) = match name.rfind('.') {
        Some(dot) if dot > 0 && name.len() - dot <= 16 => (&name[..dot], &name[dot..]),
        _ => (name, ""),
    };
    let mut end = max_bytes.saturating_sub(ext.len()).min(stem.len());
    while !stem.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = String::with_capacity(end + ext.len());
    out.push_str(&stem[..end]);
    out.push_str(ext);
    out
}
