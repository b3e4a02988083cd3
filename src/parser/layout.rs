//! Layout analysis for PDF pages.
//!
//! A page's content stream is replayed to recover positioned text spans and
//! XObject placements. Spans are then grouped into lines (split at a column
//! gutter when there is one) and lines into paragraph-like blocks.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document as LopdfDocument, Object};

use super::backend::{decode_text_simple, page_content};
use super::table_detector::TableDetector;
use crate::error::{Error, Result};

/// Narrowest empty band accepted as a column gutter (points).
const MIN_GUTTER: f32 = 12.0;
/// Width of the slices used to look for a gutter (points).
const SLICE: f32 = 3.0;
/// TJ kerning (thousandths of text space) wider than this is a word gap.
const WORD_GAP_KERN: f32 = 200.0;
/// Widest text extent searched for a gutter; the largest page PDF allows.
const MAX_TEXT_EXTENT: f32 = 14_400.0;

pub(crate) fn by_value(a: &f32, b: &f32) -> Ordering {
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

/// A run of text shown by one operator, in PDF user space.
#[derive(Debug, Clone)]
pub struct TextSpan {
    pub text: String,
    /// Left edge
    pub x: f32,
    /// Baseline
    pub y: f32,
    /// Estimated advance width
    pub width: f32,
    /// Effective size after text and graphics scaling
    pub font_size: f32,
    /// Base font name, or the resource name when the font has none
    pub font_name: String,
}

impl TextSpan {
    /// Glyph widths are not read from font programs; each character is
    /// taken to be half the font size wide.
    pub fn new(text: String, x: f32, y: f32, font_size: f32, font_name: String) -> Self {
        let width = text.chars().count() as f32 * font_size * 0.5;
        Self {
            text,
            x,
            y,
            width,
            font_size,
            font_name,
        }
    }

    /// Approximate descender line.
    pub fn bottom(&self) -> f32 {
        self.y - self.font_size * 0.2
    }

    /// Approximate ascender line.
    pub fn top(&self) -> f32 {
        self.y + self.font_size * 0.8
    }
}

/// Where an XObject was painted, in default user space (PDF points,
/// bottom-left origin).
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    /// XObject resource name
    pub name: Vec<u8>,
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

/// Raw result of walking one page's content stream.
#[derive(Debug, Clone, Default)]
pub struct PageScan {
    pub spans: Vec<TextSpan>,
    pub placements: Vec<Placement>,
}

/// Spans sharing a baseline, left to right.
#[derive(Debug, Clone)]
pub struct TextLine {
    pub spans: Vec<TextSpan>,
    /// Baseline of the leftmost span
    pub y: f32,
    /// Left edge of the leftmost span
    pub x: f32,
    /// Font size averaged over characters
    pub font_size: f32,
}

impl TextLine {
    pub fn from_spans(mut spans: Vec<TextSpan>) -> Self {
        spans.sort_by(|a, b| by_value(&a.x, &b.x));

        let (chars, weighted) = spans.iter().fold((0usize, 0.0f32), |(n, sum), s| {
            let count = s.text.chars().count();
            (n + count, sum + s.font_size * count as f32)
        });
        let (x, y, first_size) = spans
            .first()
            .map(|s| (s.x, s.y, s.font_size))
            .unwrap_or_default();
        let font_size = if chars > 0 {
            weighted / chars as f32
        } else {
            first_size
        };

        Self {
            spans,
            y,
            x,
            font_size,
        }
    }

    /// Span texts joined with a space wherever the horizontal gap reads as
    /// a word break. Chinese and Japanese neighbours are never separated.
    pub fn text(&self) -> String {
        let mut out = String::new();
        let mut prev: Option<&TextSpan> = None;
        for span in &self.spans {
            if prev.is_some_and(|p| word_break(p, span)) {
                out.push(' ');
            }
            out.push_str(&span.text);
            prev = Some(span);
        }
        out
    }
}

fn word_break(prev: &TextSpan, next: &TextSpan) -> bool {
    let gap = next.x - (prev.x + prev.width);
    let glyph = match next.text.chars().count() {
        0 => next.font_size * 0.5,
        n => next.width / n as f32,
    };
    if gap <= glyph * 0.2 {
        return false;
    }
    if prev.text.ends_with(char::is_whitespace) || next.text.starts_with(char::is_whitespace) {
        return false;
    }
    let spaceless = |c: Option<char>| c.is_some_and(is_spaceless_script_char);
    !(spaceless(prev.text.chars().last()) && spaceless(next.text.chars().next()))
}

/// Consecutive lines that read as one paragraph.
#[derive(Debug, Clone)]
pub struct TextBlock {
    pub lines: Vec<TextLine>,
}

impl TextBlock {
    /// Line texts joined with newlines.
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(TextLine::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|l| l.text().trim().is_empty())
    }
}

/// Replays page content streams of one document.
pub struct LayoutAnalyzer<'a> {
    doc: &'a LopdfDocument,
}

impl<'a> LayoutAnalyzer<'a> {
    pub fn new(doc: &'a LopdfDocument) -> Self {
        Self { doc }
    }

    /// Walk a page's content stream, collecting text spans and XObject
    /// placements in default user space.
    pub fn scan_page(&self, page_num: u32) -> Result<PageScan> {
        let pages = self.doc.get_pages();
        let page_id = *pages
            .get(&page_num)
            .ok_or(Error::PageOutOfRange(page_num, pages.len() as u32))?;

        let fonts = self
            .doc
            .get_page_fonts(page_id)
            .map_err(|e| Error::PdfParse(e.to_string()))?;
        let content = page_content(self.doc, page_id)?;
        let content = Content::decode(&content).map_err(|e| Error::PdfParse(e.to_string()))?;

        let mut walker = Walker::new(self.doc, &fonts);
        for op in &content.operations {
            walker.operate(op);
        }
        Ok(walker.scan)
    }

    /// Paragraph blocks of a page, leaving out text that forms tables.
    pub fn extract_page_blocks(
        &self,
        page_num: u32,
        tables: &TableDetector,
    ) -> Result<Vec<TextBlock>> {
        let scan = self.scan_page(page_num)?;
        let (_, spans) = tables.detect(scan.spans);
        Ok(group_blocks(group_lines(spans)))
    }
}

/// Content stream interpreter state.
struct Walker<'a> {
    doc: &'a LopdfDocument,
    fonts: &'a BTreeMap<Vec<u8>, &'a Dictionary>,
    scan: PageScan,
    ctm: Matrix,
    saved: Vec<Matrix>,
    text: TextMatrix,
    in_text: bool,
    font: Vec<u8>,
    font_label: String,
    size: f32,
    leading: f32,
}

impl<'a> Walker<'a> {
    fn new(doc: &'a LopdfDocument, fonts: &'a BTreeMap<Vec<u8>, &'a Dictionary>) -> Self {
        Self {
            doc,
            fonts,
            scan: PageScan::default(),
            ctm: Matrix::identity(),
            saved: Vec::new(),
            text: TextMatrix::default(),
            in_text: false,
            font: Vec::new(),
            font_label: String::new(),
            size: 12.0,
            leading: 12.0,
        }
    }

    fn operate(&mut self, op: &Operation) {
        let args = &op.operands;
        let num = |i: usize| args.get(i).and_then(number);

        match op.operator.as_str() {
            "q" => self.saved.push(self.ctm),
            "Q" => {
                if let Some(m) = self.saved.pop() {
                    self.ctm = m;
                }
            }
            "cm" if args.len() >= 6 => {
                self.ctm = Matrix::from_operands(args).concat(&self.ctm);
            }
            "Do" => {
                if let Some(Object::Name(name)) = args.first() {
                    self.place(name);
                }
            }
            "BT" => {
                self.in_text = true;
                self.text = TextMatrix::default();
            }
            "ET" => self.in_text = false,
            "Tf" if args.len() >= 2 => {
                if let Object::Name(name) = &args[0] {
                    self.select_font(name);
                }
                self.size = num(1).unwrap_or(12.0);
            }
            "TL" => {
                if let Some(leading) = num(0) {
                    self.leading = leading;
                }
            }
            "Td" | "TD" if args.len() >= 2 => {
                let (tx, ty) = (num(0).unwrap_or(0.0), num(1).unwrap_or(0.0));
                if op.operator == "TD" {
                    self.leading = -ty;
                }
                self.text.translate(tx, ty);
            }
            "Tm" if args.len() >= 6 => self.text.set(Matrix::from_operands(args)),
            "T*" => self.text.next_line(self.leading),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = args.first() {
                    let text = self.decode(bytes);
                    self.show(text);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = args.first() {
                    let text = self.decode_array(items);
                    self.show(text);
                }
            }
            "'" | "\"" => {
                self.text.next_line(self.leading);
                let at = if op.operator == "\"" { 2 } else { 0 };
                if let Some(Object::String(bytes, _)) = args.get(at) {
                    let text = self.decode(bytes);
                    self.show(text);
                }
            }
            _ => {}
        }
    }

    fn select_font(&mut self, name: &[u8]) {
        self.font = name.to_vec();
        self.font_label = self
            .fonts
            .get(name)
            .and_then(|font| font.get(b"BaseFont").ok())
            .and_then(|base| base.as_name().ok())
            .map(|base| String::from_utf8_lossy(base).into_owned())
            .unwrap_or_else(|| String::from_utf8_lossy(name).into_owned());
    }

    fn place(&mut self, name: &[u8]) {
        let (x0, y0, x1, y1) = self.ctm.unit_square_bounds();
        self.scan.placements.push(Placement {
            name: name.to_vec(),
            x0,
            y0,
            x1,
            y1,
        });
    }

    fn show(&mut self, text: String) {
        if !self.in_text || text.trim().is_empty() {
            return;
        }
        let (x, y) = self.ctm.apply(self.text.m.e, self.text.m.f);
        let size = self.size * self.text.m.scale() * self.ctm.scale();
        self.scan
            .spans
            .push(TextSpan::new(text, x, y, size, self.font_label.clone()));
    }

    fn decode(&self, bytes: &[u8]) -> String {
        let encoding = self
            .fonts
            .get(&self.font)
            .and_then(|font| font.get_font_encoding(self.doc).ok());
        match encoding {
            Some(encoding) => LopdfDocument::decode_text(&encoding, bytes).unwrap_or_default(),
            None => decode_text_simple(bytes),
        }
    }

    fn decode_array(&self, items: &[Object]) -> String {
        let mut out = String::new();
        for item in items {
            if let Object::String(bytes, _) = item {
                out.push_str(&self.decode(bytes));
                continue;
            }
            let wide_gap = number(item).is_some_and(|kern| kern < -WORD_GAP_KERN);
            let open_word = out
                .chars()
                .last()
                .is_some_and(|c| !c.is_whitespace() && !is_spaceless_script_char(c));
            if wide_gap && open_word {
                out.push(' ');
            }
        }
        out
    }
}

/// Spans to lines. When the page has a column gutter, the left column's
/// lines come before the right column's.
fn group_lines(spans: Vec<TextSpan>) -> Vec<TextLine> {
    let Some(gutter) = find_gutter(&spans) else {
        return lines_by_baseline(spans);
    };
    log::debug!("Two text columns split at x={:.1}", gutter);

    let (left, right): (Vec<_>, Vec<_>) = spans
        .into_iter()
        .partition(|s| s.x + s.width / 2.0 < gutter);
    let mut lines = lines_by_baseline(left);
    lines.extend(lines_by_baseline(right));
    lines
}

fn lines_by_baseline(mut spans: Vec<TextSpan>) -> Vec<TextLine> {
    spans.sort_by(|a, b| by_value(&b.y, &a.y).then_with(|| by_value(&a.x, &b.x)));

    let mut groups: Vec<(f32, Vec<TextSpan>)> = Vec::new();
    for span in spans {
        let joins = groups
            .last()
            .is_some_and(|(baseline, _)| (span.y - baseline).abs() <= span.font_size * 0.3);
        match groups.last_mut() {
            Some((_, members)) if joins => members.push(span),
            _ => groups.push((span.y, vec![span])),
        }
    }
    groups
        .into_iter()
        .map(|(_, members)| TextLine::from_spans(members))
        .collect()
}

/// Center of the vertical band separating two text columns, if any.
///
/// The text extent is cut into thin slices; the widest uncovered run in the
/// middle 70% (nearest the center on ties) is the gutter. Both sides must be
/// at least 80pt wide and hold a tenth of the spans.
fn find_gutter(spans: &[TextSpan]) -> Option<f32> {
    let left = spans.iter().map(|s| s.x).min_by(by_value)?;
    let right = spans.iter().map(|s| s.x + s.width).max_by(by_value)?;
    let extent = right - left;
    if extent < 250.0 {
        return None;
    }
    // Off-page or non-finite coordinates: treat as a single column
    if !extent.is_finite() || extent > MAX_TEXT_EXTENT {
        log::debug!("Text extent {:.0}pt too wide for a gutter search", extent);
        return None;
    }

    let slices = ((right - left) / SLICE) as usize + 1;
    let mut covered = vec![false; slices];
    for span in spans {
        let first = ((span.x - left) / SLICE) as usize;
        let last = ((span.x + span.width - left) / SLICE) as usize;
        for slot in covered
            .iter_mut()
            .take(last.min(slices - 1) + 1)
            .skip(first)
        {
            *slot = true;
        }
    }

    let (lo, hi) = (slices * 15 / 100, slices * 85 / 100);
    let center = slices as f32 / 2.0;
    let off_center = |start: usize, len: usize| (start as f32 + len as f32 / 2.0 - center).abs();

    let mut best: Option<(usize, usize)> = None;
    let mut i = lo;
    while i < hi {
        if covered[i] {
            i += 1;
            continue;
        }
        let start = i;
        while i < hi && !covered[i] {
            i += 1;
        }
        let len = i - start;
        let wins = best.map_or(true, |(s, l)| {
            len > l || (len == l && off_center(start, len) < off_center(s, l))
        });
        if wins {
            best = Some((start, len));
        }
    }

    let (start, len) = best?;
    if (len as f32) * SLICE < MIN_GUTTER {
        return None;
    }
    let gutter = left + (start as f32 + len as f32 / 2.0) * SLICE;
    if gutter - left < 80.0 || right - gutter < 80.0 {
        return None;
    }

    let on_left = spans
        .iter()
        .filter(|s| s.x + s.width / 2.0 < gutter)
        .count();
    let needed = (spans.len() / 10).max(2);
    if on_left < needed || spans.len() - on_left < needed {
        log::trace!(
            "Gutter at x={:.1} rejected: {} / {} spans",
            gutter,
            on_left,
            spans.len() - on_left
        );
        return None;
    }
    Some(gutter)
}

/// Lines to blocks. Display-size lines stand alone; a wide vertical gap,
/// a font size change or an indent change starts a new block.
fn group_blocks(lines: Vec<TextLine>) -> Vec<TextBlock> {
    let spacing = mean_spacing(&lines);
    let body = body_size(&lines);
    let display = |line: &TextLine| line.font_size >= body + 1.5;

    let mut blocks = Vec::new();
    let mut current: Vec<TextLine> = Vec::new();
    for line in lines {
        let breaks = current.last().is_some_and(|prev| {
            display(prev)
                || display(&line)
                || (prev.y - line.y).abs() > spacing * 1.5
                || (prev.font_size - line.font_size).abs() > 1.0
                || (prev.x - line.x).abs() > 20.0
        });
        if breaks {
            blocks.push(TextBlock {
                lines: std::mem::take(&mut current),
            });
        }
        current.push(line);
    }
    if !current.is_empty() {
        blocks.push(TextBlock { lines: current });
    }
    blocks
}

fn mean_spacing(lines: &[TextLine]) -> f32 {
    let gaps: Vec<f32> = lines
        .windows(2)
        .map(|pair| (pair[0].y - pair[1].y).abs())
        .filter(|gap| *gap > 0.1)
        .collect();
    if gaps.is_empty() {
        12.0
    } else {
        gaps.iter().sum::<f32>() / gaps.len() as f32
    }
}

/// Most common span size on the page, to a tenth of a point. Ties go to
/// the smaller size.
fn body_size(lines: &[TextLine]) -> f32 {
    let mut counts: HashMap<i32, usize> = HashMap::new();
    for span in lines.iter().flat_map(|l| &l.spans) {
        *counts.entry((span.font_size * 10.0).round() as i32).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by(|(ka, ca), (kb, cb)| ca.cmp(cb).then(kb.cmp(ka)))
        .map_or(12.0, |(key, _)| key as f32 / 10.0)
}

/// Affine transform `[a b c d e f]` as used by `cm` and `Tm`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Matrix {
    fn identity() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
        }
    }

    fn from_operands(operands: &[Object]) -> Self {
        let n = |i: usize, default: f32| operands.get(i).and_then(number).unwrap_or(default);
        Self {
            a: n(0, 1.0),
            b: n(1, 0.0),
            c: n(2, 0.0),
            d: n(3, 1.0),
            e: n(4, 0.0),
            f: n(5, 0.0),
        }
    }

    /// `self x other`: apply `self` first, then `other`.
    fn concat(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Vertical scale factor.
    fn scale(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }

    /// Bounds of the unit square under this transform (image space).
    fn unit_square_bounds(&self) -> (f32, f32, f32, f32) {
        let corners = [
            self.apply(0.0, 0.0),
            self.apply(1.0, 0.0),
            self.apply(0.0, 1.0),
            self.apply(1.0, 1.0),
        ];
        corners.iter().fold(
            (f32::MAX, f32::MAX, f32::MIN, f32::MIN),
            |(x0, y0, x1, y1), &(x, y)| (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        )
    }
}

/// Text matrix and the start of the current line.
#[derive(Debug, Clone)]
struct TextMatrix {
    m: Matrix,
    line: Matrix,
}

impl Default for TextMatrix {
    fn default() -> Self {
        Self {
            m: Matrix::identity(),
            line: Matrix::identity(),
        }
    }
}

impl TextMatrix {
    fn set(&mut self, m: Matrix) {
        self.m = m;
        self.line = m;
    }

    fn translate(&mut self, tx: f32, ty: f32) {
        let shift = Matrix {
            e: tx,
            f: ty,
            ..Matrix::identity()
        };
        self.line = shift.concat(&self.line);
        self.m = self.line;
    }

    fn next_line(&mut self, leading: f32) {
        self.translate(0.0, -leading);
    }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Han ideographs, kana and CJK punctuation: scripts written without word
/// spaces. Hangul is spaced and not included.
pub(crate) fn is_spaceless_script_char(c: char) -> bool {
    matches!(
        c as u32,
        0x3000..=0x30FF | 0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0x20000..=0x2EBEF
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(text: &str, x: f32, y: f32, size: f32) -> TextSpan {
        TextSpan::new(text.to_string(), x, y, size, "Helvetica".to_string())
    }

    fn line(text: &str, x: f32, y: f32, size: f32) -> TextLine {
        TextLine::from_spans(vec![span(text, x, y, size)])
    }

    #[test]
    fn test_text_span_width_and_extent() {
        let s = span("Test", 10.0, 100.0, 12.0);
        assert_eq!(s.width, 24.0);
        assert!((s.top() - 109.6).abs() < 0.001);
        assert!((s.bottom() - 97.6).abs() < 0.001);
    }

    #[test]
    fn test_line_text_spacing() {
        let line = TextLine::from_spans(vec![
            span("World", 60.0, 700.0, 10.0),
            span("Hello", 20.0, 700.0, 10.0),
        ]);
        assert_eq!(line.x, 20.0);
        assert_eq!(line.text(), "Hello World");

        // Adjacent CJK spans join without a space
        let line = TextLine::from_spans(vec![
            span("中文", 20.0, 700.0, 10.0),
            span("字", 45.0, 700.0, 10.0),
        ]);
        assert_eq!(line.text(), "中文字");

        // Touching spans are one word
        let line = TextLine::from_spans(vec![span("ab", 0.0, 0.0, 10.0), span("cd", 10.0, 0.0, 10.0)]);
        assert_eq!(line.text(), "abcd");
    }

    #[test]
    fn test_line_font_size_weighted_by_chars() {
        let line = TextLine::from_spans(vec![
            span("ab", 0.0, 0.0, 20.0),
            span("cdefgh", 30.0, 0.0, 10.0),
        ]);
        assert!((line.font_size - 12.5).abs() < 0.001);
    }

    #[test]
    fn test_lines_by_baseline() {
        let lines = lines_by_baseline(vec![
            span("below", 72.0, 680.0, 10.0),
            span("right", 150.0, 700.0, 10.0),
            span("left", 72.0, 701.0, 10.0),
        ]);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text(), "left right");
        assert_eq!(lines[1].text(), "below");
    }

    #[test]
    fn test_two_column_gutter() {
        let mut spans = Vec::new();
        for i in 0..6 {
            let y = 700.0 - i as f32 * 12.0;
            spans.push(span("left column text here", 72.0, y, 10.0));
            spans.push(span("right column text now", 320.0, y, 10.0));
        }

        // Left text ends at 177, right text starts at 320
        let gutter = find_gutter(&spans).unwrap();
        assert!(gutter > 177.0 && gutter < 320.0);

        let lines = group_lines(spans);
        assert_eq!(lines.len(), 12);
        assert!(lines[..6].iter().all(|l| l.text().starts_with("left")));
        assert!(lines[6..].iter().all(|l| l.text().starts_with("right")));
    }

    #[test]
    fn test_no_gutter_for_narrow_or_full_width_text() {
        let narrow = vec![span("short", 72.0, 700.0, 10.0), span("text", 72.0, 688.0, 10.0)];
        assert_eq!(find_gutter(&narrow), None);

        let full: Vec<TextSpan> = (0..5)
            .map(|i| span(&"x".repeat(80), 72.0, 700.0 - i as f32 * 12.0, 10.0))
            .collect();
        assert_eq!(find_gutter(&full), None);
    }

    #[test]
    fn test_no_gutter_for_off_page_span() {
        let mut spans = vec![span("far away", 1.0e12, 700.0, 10.0)];
        for i in 0..4 {
            spans.push(span("body text", 72.0, 700.0 - i as f32 * 12.0, 10.0));
        }
        assert_eq!(find_gutter(&spans), None);

        let mut nan = spans.clone();
        nan[0].x = f32::NAN;
        assert_eq!(find_gutter(&nan), None);

        let lines = group_lines(spans);
        assert_eq!(lines.len(), 4);
        assert!(lines[0].text().contains("far away"));
    }

    #[test]
    fn test_group_blocks() {
        let lines = vec![
            line("Overview", 72.0, 740.0, 16.0),
            line("first paragraph", 72.0, 700.0, 10.0),
            line("continues here", 72.0, 688.0, 10.0),
            line("and ends", 72.0, 676.0, 10.0),
            line("second paragraph", 72.0, 640.0, 10.0),
            line("ends too", 72.0, 628.0, 10.0),
        ];

        let blocks = group_blocks(lines);
        let texts: Vec<String> = blocks.iter().map(TextBlock::text).collect();
        assert_eq!(
            texts,
            vec![
                "Overview",
                "first paragraph\ncontinues here\nand ends",
                "second paragraph\nends too"
            ]
        );
    }

    #[test]
    fn test_indent_starts_block() {
        let blocks = group_blocks(vec![
            line("body text", 72.0, 700.0, 10.0),
            line("indented quote", 110.0, 688.0, 10.0),
        ]);
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn test_block_is_empty() {
        let block = TextBlock {
            lines: vec![TextLine::from_spans(Vec::new())],
        };
        assert!(block.is_empty());
        assert!(TextBlock { lines: Vec::new() }.is_empty());
    }

    #[test]
    fn test_matrix_concat_and_bounds() {
        // 100x50 image placed at (50, 600)
        let place = Matrix {
            a: 100.0,
            b: 0.0,
            c: 0.0,
            d: 50.0,
            e: 50.0,
            f: 600.0,
        };
        assert_eq!(place.unit_square_bounds(), (50.0, 600.0, 150.0, 650.0));

        // Same placement nested inside a translation
        let outer = Matrix {
            e: 10.0,
            f: -100.0,
            ..Matrix::identity()
        };
        let nested = place.concat(&outer);
        assert_eq!(nested.unit_square_bounds(), (60.0, 500.0, 160.0, 550.0));
    }

    #[test]
    fn test_text_matrix_line_moves() {
        let mut tm = TextMatrix::default();
        tm.translate(72.0, 700.0);
        tm.next_line(14.0);
        assert_eq!((tm.m.e, tm.m.f), (72.0, 686.0));
        tm.translate(10.0, 0.0);
        assert_eq!((tm.m.e, tm.m.f), (82.0, 686.0));
    }

    #[test]
    fn test_spaceless_script() {
        assert!(is_spaceless_script_char('中'));
        assert!(is_spaceless_script_char('カ'));
        assert!(is_spaceless_script_char('。'));
        assert!(!is_spaceless_script_char('한'));
        assert!(!is_spaceless_script_char('a'));
    }
}
