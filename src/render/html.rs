//! HTML to styled text blocks for the PDF renderer.
//!
//! - Headings, paragraphs, list items, quotes and `<pre>` become blocks
//! - `<a href="url">text</a>` becomes `"text [url]"`
//! - `<img alt="x">` becomes `"[image: x]"`
//! - `<script>`, `<style>`, `<head>` and comments are removed
//! - Named and numeric entities are decoded
//!
//! The tokenizer is forgiving about unknown or unbalanced tags, but a tag
//! or comment that never closes is an error: the remaining input cannot be
//! told apart from markup.

use crate::error::{FetchError, Result};

/// Visual role of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStyle {
    Heading(u8),
    Paragraph,
    ListItem,
    Quote,
    Preformatted,
    Rule,
}

/// A run of text sharing one style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub style: BlockStyle,
    pub text: String,
}

/// Elements whose content is never rendered.
const SKIPPED: &[&str] = &["script", "style", "head", "title", "noscript", "template"];

/// Elements that start a new block.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "header", "footer", "table", "tr", "ul", "ol", "dl", "dt",
    "dd", "center", "form", "address", "figure", "main", "nav", "aside", "body", "html",
];

struct Builder {
    blocks: Vec<Block>,
    style: BlockStyle,
    current: String,
    href: Option<String>,
    link_text_start: usize,
    quote_depth: usize,
    pre_depth: usize,
}

impl Builder {
    fn new() -> Self {
        Self {
            blocks: Vec::new(),
            style: BlockStyle::Paragraph,
            current: String::new(),
            href: None,
            link_text_start: 0,
            quote_depth: 0,
            pre_depth: 0,
        }
    }

    fn base_style(&self) -> BlockStyle {
        if self.pre_depth > 0 {
            BlockStyle::Preformatted
        } else if self.quote_depth > 0 {
            BlockStyle::Quote
        } else {
            BlockStyle::Paragraph
        }
    }

    fn flush(&mut self) {
        let text = if self.style == BlockStyle::Preformatted {
            self.current.trim_matches('\n').to_string()
        } else {
            self.current.trim().to_string()
        };
        if !text.is_empty() {
            self.blocks.push(Block {
                style: self.style,
                text,
            });
        }
        self.current.clear();
    }

    fn push_text(&mut self, raw: &str) {
        let decoded = decode_entities(raw);
        if self.pre_depth > 0 {
            self.current.push_str(&decoded);
            return;
        }
        for ch in decoded.chars() {
            if ch.is_whitespace() {
                if !self.current.is_empty() && !self.current.ends_with(' ') {
                    self.current.push(' ');
                }
            } else {
                self.current.push(ch);
            }
        }
    }

    fn open(&mut self, name: &str, attrs: &str) {
        match name {
            "br" => {
                if self.pre_depth > 0 {
                    self.current.push('\n');
                } else {
                    self.flush();
                }
            }
            "hr" => {
                self.flush();
                self.blocks.push(Block {
                    style: BlockStyle::Rule,
                    text: String::new(),
                });
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                self.flush();
                self.style = BlockStyle::Heading(name.as_bytes()[1] - b'0');
            }
            "li" => {
                self.flush();
                self.style = BlockStyle::ListItem;
            }
            "blockquote" => {
                self.flush();
                self.quote_depth += 1;
                self.style = self.base_style();
            }
            "pre" => {
                self.flush();
                self.pre_depth += 1;
                self.style = self.base_style();
            }
            "a" => {
                self.href = attribute(attrs, "href");
                self.link_text_start = self.current.len();
            }
            "img" => {
                if let Some(alt) = attribute(attrs, "alt").filter(|a| !a.trim().is_empty()) {
                    self.push_text(&format!(" [image: {}] ", alt.trim()));
                }
            }
            "td" | "th" => self.push_text(" "),
            n if BLOCK_TAGS.contains(&n) => {
                self.flush();
                self.style = self.base_style();
            }
            _ => {}
        }
    }

    fn close(&mut self, name: &str) {
        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "li" => {
                self.flush();
                self.style = self.base_style();
            }
            "blockquote" => {
                self.flush();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.style = self.base_style();
            }
            "pre" => {
                self.flush();
                self.pre_depth = self.pre_depth.saturating_sub(1);
                self.style = self.base_style();
            }
            "a" => {
                if let Some(href) = self.href.take() {
                    let text = self.current.get(self.link_text_start..).unwrap_or("").trim();
                    let show = !href.starts_with('#')
                        && !href.starts_with("mailto:")
                        && !href.is_empty()
                        && text != href;
                    if show {
                        self.current.push_str(&format!(" [{href}]"));
                    }
                }
            }
            n if BLOCK_TAGS.contains(&n) => {
                self.flush();
                self.style = self.base_style();
            }
            _ => {}
        }
    }
}

/// Convert an HTML document into renderable blocks.
pub fn html_to_blocks(html: &str) -> Result<Vec<Block>> {
    let mut b = Builder::new();
    let mut rest = html;

    while !rest.is_empty() {
        let Some(lt) = rest.find('<') else {
            b.push_text(rest);
            break;
        };
        b.push_text(&rest[..lt]);
        let after = &rest[lt..];

        if after.starts_with("<!--") {
            let end = after
                .find("-->")
                .ok_or_else(|| unterminated(html, after, "comment"))?;
            rest = &after[end + 3..];
            continue;
        }

        // A '<' not followed by a tag name is literal text ("a < b").
        let next = after[1..].chars().next();
        if !next.is_some_and(|c| c.is_ascii_alphabetic() || c == '/' || c == '!' || c == '?') {
            b.push_text("<");
            rest = &after[1..];
            continue;
        }

        let end = tag_end(after).ok_or_else(|| unterminated(html, after, "tag"))?;
        let inner = &after[1..end];
        rest = &after[end + 1..];

        let (closing, body) = match inner.strip_prefix('/') {
            Some(b) => (true, b),
            None => (false, inner),
        };
        let name_len = body
            .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
            .unwrap_or(body.len());
        let name = body[..name_len].to_ascii_lowercase();
        let attrs = &body[name_len..];

        if name.starts_with('!') || name.starts_with('?') {
            continue;
        }

        if !closing && SKIPPED.contains(&name.as_str()) {
            rest = skip_element(rest, &name);
            continue;
        }

        if closing {
            b.close(&name);
        } else {
            b.open(&name, attrs);
        }
    }

    b.flush();
    Ok(b.blocks)
}

/// Index of the `>` closing the tag that starts at `s[0] == '<'`,
/// ignoring `>` inside quoted attribute values.
fn tag_end(s: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in s.char_indices().skip(1) {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '>') => return Some(i),
            _ => {}
        }
    }
    None
}

/// Skip past `</name>`; an unclosed skipped element swallows the rest.
fn skip_element<'a>(rest: &'a str, name: &str) -> &'a str {
    let close = format!("</{name}");
    match rest.to_ascii_lowercase().find(&close) {
        Some(pos) => {
            let after = &rest[pos..];
            match after.find('>') {
                Some(gt) => &after[gt + 1..],
                None => "",
            }
        }
        None => "",
    }
}

fn unterminated(full: &str, at: &str, what: &str) -> FetchError {
    let offset = full.len() - at.len();
    FetchError::Render(format!("unterminated HTML {what} at byte {offset}"))
}

/// Value of attribute `name` in a raw attribute string.
fn attribute(attrs: &str, name: &str) -> Option<String> {
    let lower = attrs.to_ascii_lowercase();
    let mut search_from = 0;
    while let Some(found) = lower[search_from..].find(name) {
        let start = search_from + found;
        search_from = start + name.len();
        let preceded_ok = start == 0
            || lower[..start]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_whitespace());
        let after = lower[start + name.len()..].trim_start();
        if !preceded_ok || !after.starts_with('=') {
            continue;
        }
        // Same offsets in the original (ASCII lowercasing keeps byte positions).
        let value_start = attrs.len() - after.len() + 1;
        let value = attrs[value_start..].trim_start();
        let parsed = match value.chars().next() {
            Some(q @ ('"' | '\'')) => value[1..].split(q).next().unwrap_or(""),
            Some(_) => value.split_whitespace().next().unwrap_or(""),
            None => "",
        };
        return Some(decode_entities(parsed.trim_end_matches('/')));
    }
    None
}

/// Decode named and numeric HTML entities.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp..];
        let decoded = after
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| decode_entity(&after[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &after[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &after[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    if let Some(num) = entity.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code);
    }
    Some(match entity {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "copy" => '©',
        "reg" => '®',
        "euro" => '€',
        "pound" => '£',
        "mdash" => '—',
        "ndash" => '–',
        "hellip" => '…',
        "laquo" => '«',
        "raquo" => '»',
        "bull" => '•',
        _ => return None,
    })
}
