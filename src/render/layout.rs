//! Line layout: header block, block styling, word wrapping.
//!
//! Layout is pure: it produces styled lines with vertical spacing, and the
//! PDF writer only has to place them on pages.

use unicode_width::UnicodeWidthChar;

use super::html::{Block, BlockStyle};

/// Usable text width on an A4 page with 20 mm margins.
pub const TEXT_WIDTH_MM: f32 = 170.0;

pub const PT_TO_MM: f32 = 0.352_778;

/// Font faces used by the renderer (all PDF builtin fonts).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontKind {
    Regular,
    Bold,
    Oblique,
    Mono,
}

impl FontKind {
    /// Average glyph advance as a fraction of the font size.
    fn average_advance(self) -> f32 {
        match self {
            FontKind::Mono => 0.6,
            FontKind::Bold => 0.55,
            FontKind::Regular | FontKind::Oblique => 0.5,
        }
    }
}

/// One laid-out line.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub font: FontKind,
    /// Font size in points.
    pub size: f32,
    /// Left indent in millimetres.
    pub indent: f32,
    /// Extra vertical space above this line, in millimetres.
    pub space_before: f32,
    /// Muted (grey) text.
    pub muted: bool,
    /// Horizontal rule instead of text.
    pub rule: bool,
    pub text: String,
}

impl Line {
    fn text(font: FontKind, size: f32, text: String) -> Self {
        Self {
            font,
            size,
            indent: 0.0,
            space_before: 0.0,
            muted: false,
            rule: false,
            text,
        }
    }

    fn rule(space_before: f32) -> Self {
        Self {
            rule: true,
            space_before,
            ..Self::text(FontKind::Regular, BODY_SIZE, String::new())
        }
    }
}

/// The message metadata printed above the body.
#[derive(Debug, Clone)]
pub struct DocumentHeader {
    pub subject: String,
    pub sender: String,
    pub date: String,
}

const BODY_SIZE: f32 = 10.5;
const PARAGRAPH_GAP: f32 = 2.5;
const LIST_INDENT: f32 = 6.0;
const QUOTE_INDENT: f32 = 8.0;

/// Lay out the header block followed by the body blocks.
pub fn compose(header: &DocumentHeader, blocks: &[Block]) -> Vec<Line> {
    let mut lines = Vec::new();

    let subject = format!("Subject: {}", header.subject);
    push_wrapped(&mut lines, FontKind::Bold, 14.0, 0.0, 0.0, false, &subject);
    for (label, value) in [("From", &header.sender), ("Date", &header.date)] {
        let mut first = true;
        for text in wrap(&format!("{label}: {value}"), columns(FontKind::Regular, 9.5, 0.0)) {
            let mut line = Line::text(FontKind::Regular, 9.5, text);
            line.muted = true;
            line.space_before = if first { 1.0 } else { 0.0 };
            first = false;
            lines.push(line);
        }
    }
    lines.push(Line::rule(3.0));

    let mut gap = 4.0;
    for block in blocks {
        match block.style {
            BlockStyle::Rule => {
                lines.push(Line::rule(PARAGRAPH_GAP));
            }
            BlockStyle::Heading(level) => {
                let size = match level {
                    1 => 14.0,
                    2 => 13.0,
                    3 => 12.0,
                    _ => 11.0,
                };
                push_wrapped(&mut lines, FontKind::Bold, size, 0.0, gap + 1.5, false, &block.text);
            }
            BlockStyle::Paragraph => {
                push_wrapped(&mut lines, FontKind::Regular, BODY_SIZE, 0.0, gap, false, &block.text);
            }
            BlockStyle::ListItem => {
                let text = format!("- {}", block.text);
                push_wrapped(&mut lines, FontKind::Regular, BODY_SIZE, LIST_INDENT, gap, false, &text);
            }
            BlockStyle::Quote => {
                push_wrapped(&mut lines, FontKind::Oblique, BODY_SIZE, QUOTE_INDENT, gap, true, &block.text);
            }
            BlockStyle::Preformatted => {
                push_wrapped(&mut lines, FontKind::Mono, 9.0, 0.0, gap, false, &block.text);
            }
        }
        gap = if block.style == BlockStyle::ListItem {
            0.8
        } else {
            PARAGRAPH_GAP
        };
    }

    lines
}

/// Blocks for a plain-text body: paragraphs split on blank lines, line
/// breaks inside a paragraph kept.
pub fn plain_to_blocks(text: &str) -> Vec<Block> {
    let normalized = text.replace("\r\n", "\n");
    normalized
        .split("\n\n")
        .map(|p| p.trim_matches('\n').trim_end())
        .filter(|p| !p.trim().is_empty())
        .map(|p| Block {
            style: BlockStyle::Preformatted,
            text: p.to_string(),
        })
        .collect()
}

fn push_wrapped(
    lines: &mut Vec<Line>,
    font: FontKind,
    size: f32,
    indent: f32,
    space_before: f32,
    muted: bool,
    text: &str,
) {
    let cols = columns(font, size, indent);
    for (i, piece) in wrap(text, cols).into_iter().enumerate() {
        let mut line = Line::text(font, size, piece);
        line.indent = indent;
        line.muted = muted;
        if i == 0 {
            line.space_before = space_before;
        }
        lines.push(line);
    }
}

/// Approximate number of columns that fit on one line.
pub fn columns(font: FontKind, size: f32, indent: f32) -> usize {
    let advance_mm = size * font.average_advance() * PT_TO_MM;
    (((TEXT_WIDTH_MM - indent) / advance_mm) as usize).max(10)
}

/// Greedy word wrap by display width. Explicit newlines are kept, blank
/// lines survive as empty strings, and words wider than a line are split.
pub fn wrap(text: &str, max_cols: usize) -> Vec<String> {
    let max_cols = max_cols.max(1);
    let mut out = Vec::new();

    for source_line in text.split('\n') {
        let source_line = source_line.trim_end_matches('\r').replace('\t', "    ");
        if source_line.trim().is_empty() {
            out.push(String::new());
            continue;
        }

        // Keep leading indentation of the source line.
        let indent: String = source_line.chars().take_while(|c| *c == ' ').collect();
        let mut current = indent.clone();
        let mut width = indent.len();

        for word in source_line.split(' ').filter(|w| !w.is_empty()) {
            let word_width = display_width(word);
            let sep = usize::from(width > indent.len());

            if width + sep + word_width <= max_cols {
                if sep == 1 {
                    current.push(' ');
                }
                current.push_str(word);
                width += sep + word_width;
                continue;
            }

            if width > indent.len() {
                out.push(std::mem::take(&mut current));
                width = 0;
            }

            // Hard-split words that do not fit on an empty line.
            for ch in word.chars() {
                let w = ch.width().unwrap_or(0);
                if width + w > max_cols && width > 0 {
                    out.push(std::mem::take(&mut current));
                    width = 0;
                }
                current.push(ch);
                width += w;
            }
        }

        if !current.trim().is_empty() {
            out.push(current);
        }
    }

    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out
}

fn display_width(s: &str) -> usize {
    s.chars().map(|c| c.width().unwrap_or(0)).sum()
}
