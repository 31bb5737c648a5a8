//! Place laid-out lines on A4 pages with `printpdf`.

use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line as PdfLine, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Point, Rgb,
};

use crate::error::{FetchError, Result};

use super::layout::{FontKind, Line, PT_TO_MM};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const LINE_SPACING: f32 = 1.3;
const LAYER: &str = "Layer 1";

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    oblique: IndirectFontRef,
    mono: IndirectFontRef,
}

impl Fonts {
    fn load(doc: &PdfDocumentReference) -> Result<Self> {
        let add = |font| {
            doc.add_builtin_font(font)
                .map_err(|e| FetchError::Render(format!("cannot load font: {e}")))
        };
        Ok(Self {
            regular: add(BuiltinFont::Helvetica)?,
            bold: add(BuiltinFont::HelveticaBold)?,
            oblique: add(BuiltinFont::HelveticaOblique)?,
            mono: add(BuiltinFont::Courier)?,
        })
    }

    fn get(&self, kind: FontKind) -> &IndirectFontRef {
        match kind {
            FontKind::Regular => &self.regular,
            FontKind::Bold => &self.bold,
            FontKind::Oblique => &self.oblique,
            FontKind::Mono => &self.mono,
        }
    }
}

/// Write `lines` into a new PDF document and return its bytes.
pub fn write_pdf(title: &str, lines: &[Line]) -> Result<Vec<u8>> {
    let title = to_pdf_text(title);
    let (doc, page, layer) =
        PdfDocument::new(title.as_str(), Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), LAYER);
    let fonts = Fonts::load(&doc)?;
    let mut current = doc.get_page(page).get_layer(layer);
    let mut y = PAGE_HEIGHT - MARGIN;

    for line in lines {
        let height = line.size * PT_TO_MM * LINE_SPACING;
        if y - line.space_before - height < MARGIN {
            let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), LAYER);
            current = doc.get_page(page).get_layer(layer);
            y = PAGE_HEIGHT - MARGIN;
        } else {
            y -= line.space_before;
        }
        y -= height;

        if line.rule {
            draw_rule(&current, y + height / 2.0);
        } else if !line.text.is_empty() {
            let grey = if line.muted { 0.4 } else { 0.0 };
            current.set_fill_color(Color::Rgb(Rgb::new(grey, grey, grey, None)));
            current.use_text(
                to_pdf_text(&line.text),
                line.size,
                Mm(MARGIN + line.indent),
                Mm(y),
                fonts.get(line.font),
            );
        }
    }

    doc.save_to_bytes()
        .map_err(|e| FetchError::Render(format!("cannot serialize PDF: {e}")))
}

fn draw_rule(layer: &PdfLayerReference, y: f32) {
    layer.set_outline_color(Color::Rgb(Rgb::new(0.7, 0.7, 0.7, None)));
    layer.set_outline_thickness(0.5);
    layer.add_line(PdfLine {
        points: vec![
            (Point::new(Mm(MARGIN), Mm(y)), false),
            (Point::new(Mm(PAGE_WIDTH - MARGIN), Mm(y)), false),
        ],
        is_closed: false,
    });
}

/// Fold text into the ASCII range the builtin fonts can show.
///
/// Common typographic characters and accented Latin letters get a close
/// equivalent; anything else becomes `?`.
pub fn to_pdf_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            ' '..='~' => out.push(c),
            '\t' => out.push_str("    "),
            '\u{a0}' | '\u{2000}'..='\u{200a}' | '\u{202f}' => out.push(' '),
            '\u{200b}'..='\u{200d}' | '\u{feff}' | '\u{ad}' => {}
            '\u{2018}' | '\u{2019}' | '\u{201a}' | '\u{2032}' => out.push('\''),
            '\u{201c}' | '\u{201d}' | '\u{201e}' | '\u{2033}' | '«' | '»' => out.push('"'),
            '\u{2010}'..='\u{2015}' | '\u{2212}' => out.push('-'),
            '\u{2022}' | '\u{00b7}' => out.push('*'),
            '\u{2026}' => out.push_str("..."),
            '€' => out.push_str("EUR"),
            '£' => out.push_str("GBP"),
            '©' => out.push_str("(c)"),
            '®' => out.push_str("(R)"),
            '™' => out.push_str("(TM)"),
            'ß' => out.push_str("ss"),
            'æ' => out.push_str("ae"),
            'Æ' => out.push_str("AE"),
            'œ' => out.push_str("oe"),
            'Œ' => out.push_str("OE"),
            _ => out.push(fold_latin(c).unwrap_or('?')),
        }
    }
    out
}

fn fold_latin(c: char) -> Option<char> {
    Some(match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => 'A',
        'ç' => 'c',
        'Ç' => 'C',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'È' | 'É' | 'Ê' | 'Ë' => 'E',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'Ì' | 'Í' | 'Î' | 'Ï' => 'I',
        'ñ' => 'n',
        'Ñ' => 'N',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => 'o',
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' => 'O',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'Ù' | 'Ú' | 'Û' | 'Ü' => 'U',
        'ý' | 'ÿ' => 'y',
        'Ý' => 'Y',
        _ => return None,
    })
}
