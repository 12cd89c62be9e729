//! Structure-aware segmentation of OCR plain text.
//!
//! Boundaries sit right after a separator: whitespace for words, a newline
//! for lines, a blank line for paragraphs/blocks/sections and a form feed for
//! pages. The start and end of the text are always boundaries.

use ocrhl_core::text::TextView;
use ocrhl_core::traits::{SegmentationCursor, SegmentationProvider};
use ocrhl_core::types::{ByteOffset, CharOffset, OcrBlock, TextOffset};

pub const PAGE_BREAK: char = '\x0c';

#[derive(Debug, Clone, Copy)]
pub struct PlainTextSegmentation {
    break_unit: OcrBlock,
    limit_unit: Option<OcrBlock>,
    context_size: usize,
}

impl PlainTextSegmentation {
    pub fn new(break_unit: OcrBlock, limit_unit: Option<OcrBlock>, context_size: usize) -> Self {
        Self { break_unit, limit_unit, context_size: context_size.max(1) }
    }

    pub fn cursor<'a, O: TextOffset>(&self, text: &'a dyn TextView<Offset = O>) -> ContextCursor<'a, O> {
        ContextCursor { text, unit: self.break_unit, limit: self.limit_unit, context: self.context_size, limit_span: None }
    }
}

impl SegmentationProvider for PlainTextSegmentation {
    fn byte_cursor<'a>(&self, text: &'a dyn TextView<Offset = ByteOffset>) -> Box<dyn SegmentationCursor<ByteOffset> + 'a> {
        Box::new(self.cursor(text))
    }

    fn char_cursor<'a>(&self, text: &'a dyn TextView<Offset = CharOffset>) -> Box<dyn SegmentationCursor<CharOffset> + 'a> {
        Box::new(self.cursor(text))
    }
}

/// Steps `context` break units per query and never leaves the enclosing limit unit.
///
/// The limit unit around the last query is kept as `[lo, hi)`, so a forward
/// pass scans each limit unit once.
pub struct ContextCursor<'a, O> {
    text: &'a dyn TextView<Offset = O>,
    unit: OcrBlock,
    limit: Option<OcrBlock>,
    context: usize,
    limit_span: Option<(O, O)>,
}

impl<O: TextOffset> ContextCursor<'_, O> {
    /// Bounds of the limit unit holding the character that starts at `at`.
    fn limit_bounds(&mut self, unit: OcrBlock, at: O) -> Option<(O, O)> {
        if let Some((lo, hi)) = self.limit_span {
            if lo <= at && at < hi {
                return Some((lo, hi));
            }
        }
        let lo = if is_boundary(self.text, unit, at) { at } else { unit_preceding(self.text, unit, at)? };
        let hi = unit_following(self.text, unit, at)?;
        self.limit_span = Some((lo, hi));
        Some((lo, hi))
    }
}

impl<O: TextOffset> SegmentationCursor<O> for ContextCursor<'_, O> {
    fn preceding(&mut self, pos: O) -> Option<O> {
        let mut found = None;
        let mut cur = pos;
        for _ in 0..self.context {
            match unit_preceding(self.text, self.unit, cur) {
                Some(b) => {
                    found = Some(b);
                    cur = b;
                }
                None => break,
            }
        }
        let limit = match (self.limit, pos.get()) {
            (Some(unit), p) if p > 0 => {
                let floored = self.text.floor(pos);
                let at = if floored == pos { self.text.char_before(pos).map(|(_, start)| start) } else { Some(floored) };
                at.and_then(|at| self.limit_bounds(unit, at)).map(|(lo, _)| lo)
            }
            _ => None,
        };
        match (found, limit) {
            (Some(b), Some(l)) => Some(b.max(l)),
            (found, _) => found,
        }
    }

    fn following(&mut self, pos: O) -> Option<O> {
        let mut found = None;
        let mut cur = pos;
        for _ in 0..self.context {
            match unit_following(self.text, self.unit, cur) {
                Some(b) => {
                    found = Some(b);
                    cur = b;
                }
                None => break,
            }
        }
        let limit = match self.limit {
            Some(unit) if pos < self.text.len() => self.limit_bounds(unit, self.text.floor(pos)).map(|(_, hi)| hi),
            _ => None,
        };
        match (found, limit) {
            (Some(b), Some(l)) => Some(b.min(l)),
            (found, _) => found,
        }
    }
}

fn is_boundary<O: TextOffset>(text: &dyn TextView<Offset = O>, unit: OcrBlock, at: O) -> bool {
    if at.get() == 0 || at >= text.len() {
        return true;
    }
    let Some((prev, prev_start)) = text.char_before(at) else { return true };
    let next = text.char_at(at).map(|(c, _)| c);
    match unit {
        OcrBlock::Page => prev == PAGE_BREAK,
        OcrBlock::Block | OcrBlock::Section | OcrBlock::Paragraph => {
            prev == PAGE_BREAK || (prev == '\n' && !matches!(next, Some('\n' | '\r')) && ends_blank_line(text, prev_start))
        }
        OcrBlock::Line => prev == '\n' || prev == PAGE_BREAK,
        OcrBlock::Word => prev.is_whitespace() && !next.is_some_and(char::is_whitespace),
    }
}

/// Whether the line terminated by the newline at `newline` holds nothing but
/// whitespace (a lone `\r` included) and follows another line.
fn ends_blank_line<O: TextOffset>(text: &dyn TextView<Offset = O>, newline: O) -> bool {
    let mut at = newline;
    while let Some((c, start)) = text.char_before(at) {
        match c {
            '\n' | PAGE_BREAK => return true,
            c if c.is_whitespace() => at = start,
            _ => return false,
        }
    }
    false
}

/// Last boundary strictly before `pos`.
fn unit_preceding<O: TextOffset>(text: &dyn TextView<Offset = O>, unit: OcrBlock, pos: O) -> Option<O> {
    if pos.get() == 0 {
        return None;
    }
    let mut at = text.floor(pos);
    if at == pos {
        at = text.char_before(at)?.1;
    }
    loop {
        if is_boundary(text, unit, at) {
            return Some(at);
        }
        at = text.char_before(at)?.1;
    }
}

/// First boundary strictly after `pos`.
fn unit_following<O: TextOffset>(text: &dyn TextView<Offset = O>, unit: OcrBlock, pos: O) -> Option<O> {
    if pos >= text.len() {
        return None;
    }
    let mut at = text.floor(pos);
    loop {
        at = text.char_at(at)?.1;
        if is_boundary(text, unit, at) {
            return Some(at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocrhl_core::text::{CharView, Utf8View};
    use std::borrow::Cow;
    use std::cell::Cell;

    const TEXT: &str = "first line here\nsecond line\n\nnew block\x0cnext page words\n";

    #[test]
    fn line_boundaries() {
        let view = Utf8View::new(TEXT);
        let seg = PlainTextSegmentation::new(OcrBlock::Line, None, 1);
        let mut cursor = seg.cursor::<ByteOffset>(&view);
        assert_eq!(cursor.preceding(ByteOffset(20)), Some(ByteOffset(16)));
        assert_eq!(cursor.following(ByteOffset(20)), Some(ByteOffset(28)));
        assert_eq!(cursor.preceding(ByteOffset(0)), None);
        assert_eq!(cursor.following(ByteOffset(TEXT.len())), None);
        assert_eq!(cursor.preceding(ByteOffset(3)), Some(ByteOffset(0)));
    }

    #[test]
    fn context_extends_by_several_units() {
        let view = Utf8View::new(TEXT);
        let seg = PlainTextSegmentation::new(OcrBlock::Word, None, 2);
        let mut cursor = seg.cursor::<ByteOffset>(&view);
        // "second line" at 16; "line" at 23
        assert_eq!(cursor.preceding(ByteOffset(24)), Some(ByteOffset(16)));
        // the empty line between blocks holds no word start
        assert_eq!(cursor.following(ByteOffset(16)), Some(ByteOffset(29)));
    }

    #[test]
    fn limit_unit_clamps_windows() {
        let view = Utf8View::new(TEXT);
        let seg = PlainTextSegmentation::new(OcrBlock::Line, Some(OcrBlock::Block), 3);
        let mut cursor = seg.cursor::<ByteOffset>(&view);
        // "new block" starts the second block at 29
        assert_eq!(cursor.preceding(ByteOffset(31)), Some(ByteOffset(29)));
        // the page break at 38 ends the block
        assert_eq!(cursor.following(ByteOffset(30)), Some(ByteOffset(39)));
        assert_eq!(cursor.following(ByteOffset(2)), Some(ByteOffset(29)));
    }

    #[test]
    fn crlf_blank_lines_separate_blocks() {
        let text = "first line here\r\nsecond line\r\n\r\nnew block\x0cnext page words\r\n";
        let view = Utf8View::new(text);
        let seg = PlainTextSegmentation::new(OcrBlock::Line, Some(OcrBlock::Block), 3);
        let mut cursor = seg.cursor::<ByteOffset>(&view);
        // "new block" starts at 32, after the "\r\n\r\n" blank line
        assert_eq!(cursor.preceding(ByteOffset(34)), Some(ByteOffset(32)));
        assert_eq!(cursor.following(ByteOffset(33)), Some(ByteOffset(42)));
        assert_eq!(cursor.following(ByteOffset(2)), Some(ByteOffset(32)));

        // a "\r\n" ending a line of text is no blank line
        let blocks = PlainTextSegmentation::new(OcrBlock::Block, None, 1);
        let mut cursor = blocks.cursor::<ByteOffset>(&view);
        assert_eq!(cursor.following(ByteOffset(2)), Some(ByteOffset(32)));
        assert_eq!(cursor.preceding(ByteOffset(40)), Some(ByteOffset(32)));
    }

    /// Counts character lookups on the wrapped view.
    struct CountingView<'a> {
        inner: Utf8View<'a>,
        lookups: Cell<usize>,
    }

    impl TextView for CountingView<'_> {
        type Offset = ByteOffset;

        fn len(&self) -> ByteOffset {
            self.inner.len()
        }

        fn char_at(&self, at: ByteOffset) -> Option<(char, ByteOffset)> {
            self.lookups.set(self.lookups.get() + 1);
            self.inner.char_at(at)
        }

        fn char_before(&self, at: ByteOffset) -> Option<(char, ByteOffset)> {
            self.lookups.set(self.lookups.get() + 1);
            self.inner.char_before(at)
        }

        fn floor(&self, at: ByteOffset) -> ByteOffset {
            self.inner.floor(at)
        }

        fn slice(&self, start: ByteOffset, end: ByteOffset) -> Cow<'_, str> {
            self.inner.slice(start, end)
        }
    }

    #[test]
    fn forward_pass_scans_a_limit_unit_once() {
        let text: String = (0..4000).map(|i| format!("zeile {} mit treffer\n", i)).collect();
        let view = CountingView { inner: Utf8View::new(&text), lookups: Cell::new(0) };
        let seg = PlainTextSegmentation::new(OcrBlock::Line, Some(OcrBlock::Block), 1);
        let mut cursor = seg.cursor::<ByteOffset>(&view);
        for (start, _) in text.match_indices("treffer") {
            let window_start = cursor.preceding(ByteOffset(start + 1)).expect("start");
            let window_end = cursor.following(ByteOffset(start)).expect("end");
            assert!(window_start.0 <= start && start < window_end.0);
        }
        assert!(view.lookups.get() < 20 * text.len(), "{} lookups for {} bytes", view.lookups.get(), text.len());
    }

    #[test]
    fn page_boundaries() {
        let chars = CharView::from(TEXT);
        let seg = PlainTextSegmentation::new(OcrBlock::Page, None, 1);
        let mut cursor = seg.cursor::<CharOffset>(&chars);
        assert_eq!(cursor.following(CharOffset(0)), Some(CharOffset(39)));
        assert_eq!(cursor.preceding(CharOffset(45)), Some(CharOffset(39)));
    }

    #[test]
    fn mid_character_positions_are_floored() {
        let text = "über alles\nweiter";
        let view = Utf8View::new(text);
        let seg = PlainTextSegmentation::new(OcrBlock::Line, None, 1);
        let mut cursor = seg.cursor::<ByteOffset>(&view);
        assert_eq!(cursor.preceding(ByteOffset(1)), Some(ByteOffset(0)));
        assert_eq!(cursor.following(ByteOffset(1)), Some(ByteOffset(12)));
    }
}
