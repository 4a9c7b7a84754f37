//! Document renderer: lays a [`ProductRecord`] out as a PDF using `printpdf` builtin fonts.
//!
//! Two layouts exist. [`FlowLayout`] is the primary one: A4, styled headings, introduction and
//! conclusion around the body. [`PlainTextLayout`] is the degraded one used when the primary
//! layout fails: Letter, a fixed-width font, plain word wrapping. The [`Renderer`] tries them in
//! that order and writes the first success to a uniquely named file.
//!
//! Heading detection in the flow layout is a heuristic ([`is_heading`]): a short all-caps
//! sentence in the body is rendered as a heading even when it is not one.

use std::io::Write;
use std::path::PathBuf;

use printpdf::{BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, Point, Pt, TextItem};
use regex::Regex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::RenderConfig;
use crate::contract::{Layout, LayoutKind, ProductRecord, RenderedDocument};
use crate::error::RenderError;

const PT_PER_MM: f32 = 72.0 / 25.4;
/// Rough average glyph width of Helvetica, as a fraction of the font size.
const GLYPH_WIDTH_RATIO: f32 = 0.5;
/// Courier glyphs are exactly 0.6 em wide.
const MONO_WIDTH_RATIO: f32 = 0.6;

const A4: (f32, f32) = (210.0, 297.0);
const LETTER: (f32, f32) = (215.9, 279.4);

/// `<prefix>_<YYYYmmdd_HHMMSS>_<8 hex chars>.<ext>`
pub fn unique_filename(prefix: &str, extension: &str) -> String {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let id = Uuid::new_v4().simple().to_string();
    format!("{prefix}_{stamp}_{}.{extension}", &id[..8])
}

/// Builtin fonts only cover WinAnsi; anything else becomes '?'.
fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\t' => ' ',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            '\u{00A0}'..='\u{00FF}' => c,
            '“' | '”' | '‘' | '’' | '–' | '—' | '•' | '…' | '€' => c,
            _ => '?',
        })
        .collect()
}

/// Greedy word wrap at `max_chars`; words longer than a line are split.
pub fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut line = String::new();
    let mut line_len = 0;

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > max_chars {
            if line_len > 0 {
                lines.push(std::mem::take(&mut line));
                line_len = 0;
            }
            let rest = word.split_off(max_chars);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        if word.is_empty() {
            continue;
        }
        let needed = if line_len == 0 { word.len() } else { line_len + 1 + word.len() };
        if needed > max_chars && line_len > 0 {
            lines.push(std::mem::take(&mut line));
            line_len = 0;
        }
        if line_len > 0 {
            line.push(' ');
            line_len += 1;
        }
        line.extend(word.iter());
        line_len += word.len();
    }
    if line_len > 0 {
        lines.push(line);
    }
    lines
}

fn is_all_caps(text: &str) -> bool {
    let mut cased = false;
    for c in text.chars() {
        if c.is_lowercase() {
            return false;
        }
        if c.is_uppercase() {
            cased = true;
        }
    }
    cased
}

/// Heading heuristic for body blocks.
pub fn is_heading(block: &str) -> bool {
    let block = block.trim();
    block.starts_with("CHAPTER")
        || block.starts_with("TOPIC")
        || (block.chars().count() < 100 && is_all_caps(block))
}

/// Collapse runs of blank lines and split the body into at most `max_blocks` blocks.
pub fn body_blocks(body: &str, max_blocks: usize) -> Result<Vec<String>, RenderError> {
    let blank_lines = Regex::new(r"\n\s*\n").map_err(|e| RenderError::Layout(e.to_string()))?;
    let normalised = blank_lines.replace_all(body, "\n\n");
    Ok(normalised
        .split("\n\n")
        .take(max_blocks)
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(str::to_string)
        .collect())
}

/// Accumulates drawing operations into pages.
struct PageWriter {
    width: Mm,
    height: Mm,
    margin: f32,
    /// Baseline of the last written line, in points from the bottom edge.
    cursor: f32,
    ops: Vec<Op>,
    pages: Vec<PdfPage>,
}

impl PageWriter {
    fn new((width_mm, height_mm): (f32, f32), margin: f32) -> Self {
        let height = height_mm * PT_PER_MM;
        Self {
            width: Mm(width_mm),
            height: Mm(height_mm),
            margin,
            cursor: height - margin,
            ops: Vec::new(),
            pages: Vec::new(),
        }
    }

    fn page_width(&self) -> f32 {
        self.width.0 * PT_PER_MM
    }

    fn page_height(&self) -> f32 {
        self.height.0 * PT_PER_MM
    }

    fn usable_width(&self) -> f32 {
        self.page_width() - 2.0 * self.margin
    }

    fn chars_per_line(&self, size: f32, ratio: f32) -> usize {
        (self.usable_width() / (size * ratio)).floor().max(1.0) as usize
    }

    fn new_page(&mut self) {
        let ops = std::mem::take(&mut self.ops);
        self.pages.push(PdfPage::new(self.width, self.height, ops));
        self.cursor = self.page_height() - self.margin;
    }

    fn skip(&mut self, amount: f32) {
        self.cursor -= amount;
    }

    fn draw(&mut self, text: &str, font: BuiltinFont, size: f32, x: f32, y: f32) {
        self.ops.extend([
            Op::StartTextSection,
            Op::SetFontSizeBuiltinFont { size: Pt(size), font },
            Op::SetTextCursor {
                pos: Point { x: Pt(x), y: Pt(y) },
            },
            Op::WriteTextBuiltinFont {
                items: vec![TextItem::Text(sanitize(text))],
                font,
            },
            Op::EndTextSection,
        ]);
    }

    /// Move down one line of `leading`, breaking the page when the bottom margin is reached.
    fn line(&mut self, text: &str, font: BuiltinFont, size: f32, leading: f32, centred: bool) {
        if self.cursor - leading < self.margin {
            self.new_page();
        }
        self.cursor -= leading;
        let x = if centred {
            let estimated = text.chars().count() as f32 * size * GLYPH_WIDTH_RATIO;
            ((self.page_width() - estimated) / 2.0).max(self.margin)
        } else {
            self.margin
        };
        let y = self.cursor;
        self.draw(text, font, size, x, y);
    }

    fn paragraph(&mut self, text: &str, style: &TextStyle) {
        self.skip(style.space_before);
        let width = self.chars_per_line(style.size, GLYPH_WIDTH_RATIO);
        for source_line in text.lines() {
            for line in wrap(source_line, width) {
                self.line(&line, style.font, style.size, style.leading, style.centred);
            }
        }
        self.skip(style.space_after);
    }

    fn finish(mut self, title: &str) -> Vec<u8> {
        if !self.ops.is_empty() || self.pages.is_empty() {
            self.new_page();
        }
        let mut doc = PdfDocument::new(&sanitize(title));
        let mut warnings = Vec::new();
        doc.with_pages(self.pages)
            .save(&PdfSaveOptions::default(), &mut warnings)
    }
}

struct TextStyle {
    font: BuiltinFont,
    size: f32,
    leading: f32,
    space_before: f32,
    space_after: f32,
    centred: bool,
}

const TITLE: TextStyle = TextStyle {
    font: BuiltinFont::HelveticaBold,
    size: 24.0,
    leading: 30.0,
    space_before: 0.0,
    space_after: 30.0,
    centred: true,
};

const META: TextStyle = TextStyle {
    font: BuiltinFont::Helvetica,
    size: 10.0,
    leading: 13.0,
    space_before: 0.0,
    space_after: 36.0,
    centred: false,
};

const HEADING: TextStyle = TextStyle {
    font: BuiltinFont::HelveticaBold,
    size: 16.0,
    leading: 20.0,
    space_before: 24.0,
    space_after: 12.0,
    centred: false,
};

const BODY: TextStyle = TextStyle {
    font: BuiltinFont::Helvetica,
    size: 11.0,
    leading: 14.0,
    space_before: 0.0,
    space_after: 12.0,
    centred: false,
};

/// Primary layout: styled, flowing A4 ebook.
pub struct FlowLayout {
    max_blocks: usize,
}

impl FlowLayout {
    pub fn new(max_blocks: usize) -> Self {
        Self { max_blocks }
    }
}

impl Layout for FlowLayout {
    fn layout(&self, product: &ProductRecord) -> Result<Vec<u8>, RenderError> {
        let blocks = body_blocks(&product.body, self.max_blocks)?;
        if blocks.is_empty() {
            return Err(RenderError::EmptyBody);
        }

        let mut page = PageWriter::new(A4, 72.0);
        page.paragraph(&product.title, &TITLE);
        page.paragraph(&format!("Generated automatically • {}", product.period), &META);

        page.paragraph("Introduction", &HEADING);
        page.paragraph(
            &format!(
                "Welcome to this complete guide to {}. In the following pages you will find \
strategies, advice and proven techniques that will help you reach your goals. All of the \
content has been carefully selected and organised to make your learning as effective as \
possible.",
                product.category
            ),
            &BODY,
        );

        page.paragraph("Main Content", &HEADING);
        for block in &blocks {
            if is_heading(block) {
                page.paragraph(block, &HEADING);
            } else {
                page.paragraph(block, &BODY);
            }
            page.skip(7.0);
        }

        page.paragraph("Conclusion", &HEADING);
        page.paragraph(
            "You have completed this guide. You now have the tools and knowledge needed to apply \
these strategies to your own situation. Remember that success comes from consistent action. \
It is time to put what you have learned into practice!",
            &BODY,
        );

        Ok(page.finish(&product.title))
    }
}

/// Degraded layout: fixed-width text on Letter pages.
pub struct PlainTextLayout {
    word_cap: usize,
    chars_per_line: usize,
}

impl PlainTextLayout {
    pub fn new(word_cap: usize, chars_per_line: usize) -> Self {
        Self {
            word_cap,
            chars_per_line,
        }
    }
}

impl Layout for PlainTextLayout {
    fn layout(&self, product: &ProductRecord) -> Result<Vec<u8>, RenderError> {
        let margin = 72.0;
        let mut page = PageWriter::new(LETTER, margin);
        let height = page.page_height();

        let title: String = product.title.chars().take(60).collect();
        page.draw(&title, BuiltinFont::HelveticaBold, 20.0, margin, height - 100.0);
        page.draw(
            &format!("Created: {}", product.period),
            BuiltinFont::Helvetica,
            12.0,
            margin,
            height - 130.0,
        );

        // Courier at 10pt fits ~93 chars in the text width; never exceed the configured budget.
        let fits = page.chars_per_line(10.0, MONO_WIDTH_RATIO);
        let words: Vec<&str> = product.body.split_whitespace().take(self.word_cap).collect();
        let text = words.join(" ");

        page.cursor = height - 166.0;
        for line in wrap(&text, self.chars_per_line.min(fits)) {
            page.line(&line, BuiltinFont::Courier, 10.0, 14.0, false);
        }

        Ok(page.finish(&product.title))
    }
}

/// Tries the primary layout, then the degraded one, and stores the result on disk.
pub struct Renderer {
    output_dir: PathBuf,
    primary: Box<dyn Layout>,
    degraded: Box<dyn Layout>,
}

impl Renderer {
    pub fn new(config: &RenderConfig) -> Self {
        Self::with_layouts(
            config.output_dir.clone(),
            Box::new(FlowLayout::new(config.max_blocks)),
            Box::new(PlainTextLayout::new(
                config.fallback_word_cap,
                config.fallback_chars_per_line,
            )),
        )
    }

    pub fn with_layouts(
        output_dir: PathBuf,
        primary: Box<dyn Layout>,
        degraded: Box<dyn Layout>,
    ) -> Self {
        Self {
            output_dir,
            primary,
            degraded,
        }
    }

    /// `None` only when both layouts fail.
    pub fn render(&self, product: &ProductRecord) -> Option<RenderedDocument> {
        info!(title = %product.title, "[RENDER] Rendering document");
        match self.write_with(self.primary.as_ref(), product, "ebook", LayoutKind::Flow) {
            Ok(doc) => {
                info!(path = %doc.path.display(), "[RENDER] Document written");
                return Some(doc);
            }
            Err(e) => warn!(error = %e, "[RENDER] Primary layout failed, trying plain text"),
        }

        match self.write_with(
            self.degraded.as_ref(),
            product,
            "ebook_simple",
            LayoutKind::PlainText,
        ) {
            Ok(doc) => {
                info!(path = %doc.path.display(), "[RENDER] Plain text document written");
                Some(doc)
            }
            Err(e) => {
                error!(error = %e, "[RENDER] Plain text layout failed, no document produced");
                None
            }
        }
    }

    fn write_with(
        &self,
        layout: &dyn Layout,
        product: &ProductRecord,
        prefix: &str,
        kind: LayoutKind,
    ) -> Result<RenderedDocument, RenderError> {
        let bytes = layout.layout(product)?;
        std::fs::create_dir_all(&self.output_dir)?;

        let filename = unique_filename(prefix, "pdf");
        let path = self.output_dir.join(&filename);

        // Write beside the target, then move into place.
        let mut staging = tempfile::NamedTempFile::new_in(&self.output_dir)?;
        staging.write_all(&bytes)?;
        staging.persist(&path).map_err(|e| RenderError::Io(e.error))?;

        Ok(RenderedDocument {
            path,
            filename,
            layout: kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_respects_width_and_splits_long_words() {
        let lines = wrap("aaa bbb ccc dddddddddd", 7);
        assert_eq!(lines, vec!["aaa bbb", "ccc", "ddddddd", "ddd"]);
        assert!(lines.iter().all(|l| l.chars().count() <= 7));
    }

    #[test]
    fn heading_heuristic() {
        assert!(is_heading("CHAPTER 3: Pricing"));
        assert!(is_heading("TOPIC ONE"));
        assert!(is_heading("KEY TAKEAWAYS"));
        assert!(!is_heading("Key takeaways"));
        assert!(!is_heading("123 456"));
    }

    #[test]
    fn blocks_collapse_blank_runs() {
        let blocks = body_blocks("one\n\n\n  \ntwo\n\nthree", 2).unwrap();
        assert_eq!(blocks, vec!["one", "two"]);
    }
}
