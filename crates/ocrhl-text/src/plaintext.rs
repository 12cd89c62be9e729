//! Format adapter for OCR plain-text exports.
//!
//! Text is laid out on a fixed typewriter grid: every character occupies one
//! `cell_width` x `cell_height` cell, lines advance by one cell height and a
//! form feed starts a new page. Alternative readings are written inline as
//! `primary⇿alt1⇿alt2`.

use std::io::{self, BufRead, Read};

use ocrhl_core::error::Result;
use ocrhl_core::text::TextView;
use ocrhl_core::traits::{OcrFormat, SegmentationProvider, SnippetFormatter};
use ocrhl_core::types::{CharOffset, HighlightSpan, OcrBlock, Passage, Region, Snippet, TextOffset};

use crate::segment::{PlainTextSegmentation, PAGE_BREAK};

pub const ALTERNATIVE_SEPARATOR: char = '⇿';

#[derive(Debug, Clone, Copy)]
pub struct PlainTextFormat {
    cell_width: u32,
    cell_height: u32,
}

impl Default for PlainTextFormat {
    fn default() -> Self {
        Self { cell_width: 10, cell_height: 20 }
    }
}

impl PlainTextFormat {
    pub fn with_cell_size(cell_width: u32, cell_height: u32) -> Self {
        Self { cell_width, cell_height }
    }
}

impl OcrFormat for PlainTextFormat {
    fn name(&self) -> &'static str {
        "plaintext"
    }

    fn segmentation_provider(&self, break_unit: OcrBlock, limit_unit: Option<OcrBlock>, context_size: usize) -> Box<dyn SegmentationProvider> {
        Box::new(PlainTextSegmentation::new(break_unit, limit_unit, context_size))
    }

    fn snippet_formatter(&self, pre_tag: &str, post_tag: &str, absolute_coordinates: bool, align_spans: bool) -> Box<dyn SnippetFormatter> {
        Box::new(PlainTextSnippetFormatter {
            pre_tag: pre_tag.to_string(),
            post_tag: post_tag.to_string(),
            absolute_coordinates,
            align_spans,
            cell_width: self.cell_width,
            cell_height: self.cell_height,
        })
    }

    fn decoder<'a>(&self, input: Box<dyn BufRead + 'a>, expand_alternatives: bool) -> Box<dyn Read + 'a> {
        Box::new(PlainTextDecoder::new(input, expand_alternatives))
    }

    fn sniff(&self, chunk: &str) -> bool {
        let trimmed = chunk.trim_start_matches('\u{feff}').trim_start();
        !trimmed.is_empty() && !trimmed.starts_with('<') && !chunk.contains('\0')
    }

    fn alternative_separator(&self) -> Option<char> {
        Some(ALTERNATIVE_SEPARATOR)
    }
}

/// Grid position of a printed character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cell {
    page: usize,
    line: u32,
    col: u32,
}

/// Running position while walking the document front to back.
#[derive(Debug, Default)]
struct Layout {
    pos: CharOffset,
    page: usize,
    line: u32,
    col: u32,
}

impl Layout {
    /// Cell of `c` at the current position; `None` for characters that leave no ink.
    fn place(&mut self, c: char) -> Option<Cell> {
        let cell = Cell { page: self.page, line: self.line, col: self.col };
        self.pos = self.pos.succ();
        match c {
            PAGE_BREAK => {
                self.page += 1;
                self.line = 0;
                self.col = 0;
                None
            }
            '\n' => {
                self.line += 1;
                self.col = 0;
                None
            }
            '\r' => None,
            c => {
                self.col += 1;
                (!c.is_whitespace()).then_some(cell)
            }
        }
    }
}

pub struct PlainTextSnippetFormatter {
    pre_tag: String,
    post_tag: String,
    absolute_coordinates: bool,
    align_spans: bool,
    cell_width: u32,
    cell_height: u32,
}

impl PlainTextSnippetFormatter {
    fn cell_region(&self, cell: Cell) -> Region {
        Region {
            ulx: cell.col * self.cell_width,
            uly: cell.line * self.cell_height,
            lrx: (cell.col + 1) * self.cell_width,
            lry: (cell.line + 1) * self.cell_height,
        }
    }

    /// One region per line covered by `cells`.
    fn line_regions(&self, cells: &[Option<Cell>], page: usize) -> Vec<Region> {
        let mut regions: Vec<(u32, Region)> = Vec::new();
        for cell in cells.iter().flatten().filter(|c| c.page == page) {
            let region = self.cell_region(*cell);
            match regions.last_mut() {
                Some((line, r)) if *line == cell.line => *r = r.union(region),
                _ => regions.push((cell.line, region)),
            }
        }
        regions.into_iter().map(|(_, r)| r).collect()
    }

    fn format_passage(&self, passage: &Passage<CharOffset>, text: &dyn TextView<Offset = CharOffset>, layout: &mut Layout) -> Snippet {
        if layout.pos < passage.start {
            for c in text.slice(layout.pos, passage.start).chars() {
                layout.place(c);
            }
        }
        let page = layout.page;
        // carriage returns leave no trace in the snippet text; `kept_before[i]`
        // maps a passage-relative position to the snippet text
        let mut plain: Vec<char> = Vec::new();
        let mut cells: Vec<Option<Cell>> = Vec::new();
        let mut kept_before: Vec<usize> = vec![0];
        for c in text.slice(passage.start, passage.end).chars() {
            let cell = layout.place(c);
            if c != '\r' {
                plain.push(if c.is_whitespace() { ' ' } else { c });
                cells.push(cell);
            }
            kept_before.push(plain.len());
        }
        let text_len = plain.iter().rposition(|c| !c.is_whitespace()).map_or(0, |i| i + 1);
        let spans = merged_spans(passage, &kept_before, text_len);

        let region = cells
            .iter()
            .take(text_len)
            .flatten()
            .filter(|c| c.page == page)
            .map(|c| self.cell_region(*c))
            .reduce(Region::union);

        let mut tagged = String::with_capacity(text_len + spans.len() * (self.pre_tag.len() + self.post_tag.len()));
        let mut next_span = spans.iter().peekable();
        let mut open: Option<usize> = None;
        for (i, &c) in plain[..text_len].iter().enumerate() {
            if open.is_none() && next_span.peek().is_some_and(|&&(s, _)| s == i) {
                open = next_span.next().map(|&(_, e)| e);
                tagged.push_str(&self.pre_tag);
            }
            tagged.push(c);
            if open == Some(i + 1) {
                tagged.push_str(&self.post_tag);
                open = None;
            }
        }

        let highlights = spans
            .iter()
            .map(|&(start, end)| {
                let (box_start, box_end) = if self.align_spans { (start, end) } else { snap_to_words(&plain[..text_len], start, end) };
                let mut regions = self.line_regions(&cells[box_start..box_end], page);
                if let (false, Some(frame)) = (self.absolute_coordinates, region) {
                    regions = regions.into_iter().map(|r| r.relative_to(frame)).collect();
                }
                HighlightSpan { start, end, text: plain[start..end].iter().collect(), regions }
            })
            .collect();

        Snippet { text: tagged, score: passage.score, page: Some(page), region, highlights }
    }
}

impl SnippetFormatter for PlainTextSnippetFormatter {
    fn format(&self, passages: &[Passage<CharOffset>], text: &dyn TextView<Offset = CharOffset>) -> Result<Vec<Snippet>> {
        let mut layout = Layout::default();
        Ok(passages.iter().map(|p| self.format_passage(p, text, &mut layout)).collect())
    }
}

/// Match spans in snippet text positions (`kept_before` maps passage-relative
/// positions), clamped to `text_len`, with overlapping spans merged.
fn merged_spans(passage: &Passage<CharOffset>, kept_before: &[usize], text_len: usize) -> Vec<(usize, usize)> {
    let to_text = |at: CharOffset| {
        let rel = at.distance_from(passage.start).min(kept_before.len() - 1);
        kept_before[rel].min(text_len)
    };
    let mut spans: Vec<(usize, usize)> = passage.matches.iter().map(|m| (to_text(m.start), to_text(m.end))).filter(|(s, e)| s < e).collect();
    spans.sort_unstable();
    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(spans.len());
    for (s, e) in spans {
        match merged.last_mut() {
            Some(last) if s < last.1 => last.1 = last.1.max(e),
            _ => merged.push((s, e)),
        }
    }
    merged
}

/// Widen `[start, end)` to the surrounding whitespace-delimited word(s).
fn snap_to_words(text: &[char], start: usize, end: usize) -> (usize, usize) {
    let start = text[..start].iter().rposition(|c| c.is_whitespace()).map_or(0, |i| i + 1);
    let end = text[end..].iter().position(|c| c.is_whitespace()).map_or(text.len(), |i| end + i);
    (start, end)
}

/// Streaming plain-text decoder.
pub struct PlainTextDecoder<'a> {
    input: Box<dyn BufRead + 'a>,
    expand_alternatives: bool,
    line: String,
    pending: Vec<u8>,
    pos: usize,
}

impl<'a> PlainTextDecoder<'a> {
    pub fn new(input: Box<dyn BufRead + 'a>, expand_alternatives: bool) -> Self {
        Self { input, expand_alternatives, line: String::new(), pending: Vec::new(), pos: 0 }
    }
}

impl Read for PlainTextDecoder<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.pending.len() {
            self.line.clear();
            if self.input.read_line(&mut self.line)? == 0 {
                return Ok(0);
            }
            self.pending = decode_line(&self.line, self.expand_alternatives).into_bytes();
            self.pos = 0;
        }
        let n = buf.len().min(self.pending.len() - self.pos);
        buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

fn decode_line(line: &str, expand_alternatives: bool) -> String {
    let line = match line.strip_suffix("\r\n") {
        Some(stripped) => format!("{}\n", stripped),
        None => line.to_string(),
    };
    if !line.contains(ALTERNATIVE_SEPARATOR) {
        return line;
    }
    let mut out = String::with_capacity(line.len());
    for piece in line.split_inclusive(char::is_whitespace) {
        let word = piece.trim_end_matches(char::is_whitespace);
        let ws = &piece[word.len()..];
        let mut readings = word.split(ALTERNATIVE_SEPARATOR).filter(|r| !r.is_empty());
        if expand_alternatives {
            out.push_str(&readings.collect::<Vec<_>>().join(" "));
        } else if let Some(primary) = readings.next() {
            out.push_str(primary);
        }
        out.push_str(ws);
    }
    out
}
