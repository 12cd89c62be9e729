//! Per-field, per-document highlighting.
//!
//! Byte-offset mode runs the passage builder directly on the UTF-8 bytes of
//! the document and only translates the surviving passages to character
//! offsets. Character-offset mode decodes the document first. With a page
//! restriction, occurrences, windows and summary passages are all confined
//! to that page.

use tracing::debug;

use ocrhl_core::config::HighlightConfig;
use ocrhl_core::error::{Error, Result};
use ocrhl_core::text::{CharView, TextView, Utf8View};
use ocrhl_core::traits::{DocumentContent, OccurrenceCursor, OccurrenceSource, OcrFormat, SegmentationCursor, SegmentationProvider, SnippetFormatter};
use ocrhl_core::types::{ByteOffset, CharOffset, Encoding, OcrBlock, OffsetKind, Passage, Snippet, TextOffset};

use crate::document::decode_chars;
use crate::occurrences::RangeOccurrences;
use crate::passage::{summary_passages, PassageBuilder, PassageScorer};

pub struct FieldHighlighter {
    field: String,
    segmentation: Box<dyn SegmentationProvider>,
    formatter: Box<dyn SnippetFormatter>,
    scorer: PassageScorer,
    max_passages: usize,
    max_summary_passages: usize,
    page: Option<(usize, Box<dyn SegmentationProvider>)>,
}

impl FieldHighlighter {
    pub fn new(
        field: impl Into<String>,
        segmentation: Box<dyn SegmentationProvider>,
        formatter: Box<dyn SnippetFormatter>,
        scorer: PassageScorer,
        max_passages: usize,
        max_summary_passages: usize,
    ) -> Self {
        Self { field: field.into(), segmentation, formatter, scorer, max_passages, max_summary_passages, page: None }
    }

    /// Wire segmentation and formatting of `format` according to `cfg`.
    pub fn from_config(format: &dyn OcrFormat, field: impl Into<String>, cfg: &HighlightConfig) -> Result<Self> {
        cfg.validate()?;
        let highlighter = Self::new(
            field,
            format.segmentation_provider(cfg.context_block, cfg.limit_block, cfg.context_size),
            format.snippet_formatter(&cfg.tag_pre, &cfg.tag_post, cfg.absolute_highlights, cfg.align_spans),
            PassageScorer::new(cfg.score),
            cfg.snippets,
            cfg.summary_passages(),
        );
        Ok(match cfg.page {
            Some(page) => highlighter.restrict_to_page(page, format.segmentation_provider(OcrBlock::Page, None, 1)),
            None => highlighter,
        })
    }

    /// Only highlight the 0-based `page`, whose bounds come from `pages`.
    pub fn restrict_to_page(mut self, page: usize, pages: Box<dyn SegmentationProvider>) -> Self {
        self.page = Some((page, pages));
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Snippets for one document; empty when the document is empty, no
    /// snippets are wanted, or nothing (not even a summary) can be produced.
    pub fn highlight(&self, content: &dyn DocumentContent, occurrences: &dyn OccurrenceSource) -> Result<Vec<Snippet>> {
        let bytes = content.bytes();
        if bytes.is_empty() || self.max_passages == 0 {
            return Ok(Vec::new());
        }
        match (content.offset_kind(), content.encoding()) {
            (OffsetKind::Bytes, Encoding::Utf8) => {
                let view = Utf8View::new(std::str::from_utf8(bytes)?);
                debug!(field = %self.field, bytes = bytes.len(), "highlighting in byte-offset mode");
                let passages = self.byte_passages(&view, occurrences)?;
                let passages: Vec<Passage<CharOffset>> = passages.iter().map(|p| p.map_offsets(|b| view.byte_to_char(b))).collect();
                self.format(&passages, &view.chars())
            }
            (OffsetKind::Bytes, encoding) => Err(Error::UnsupportedOffsetMode { kind: OffsetKind::Bytes, encoding }),
            (OffsetKind::Chars, encoding) => {
                let view = CharView::new(decode_chars(bytes, encoding)?);
                debug!(field = %self.field, chars = view.len().0, "highlighting in char-offset mode");
                let passages = self.char_passages(&view, occurrences)?;
                self.format(&passages, &view)
            }
        }
    }

    /// Passages over byte offsets, falling back to summary passages.
    pub fn byte_passages(&self, view: &Utf8View<'_>, occurrences: &dyn OccurrenceSource) -> Result<Vec<Passage<ByteOffset>>> {
        let pages = self.page.as_ref().map(|(_, provider)| provider.byte_cursor(view));
        self.passages(view, self.segmentation.byte_cursor(view), occurrences.byte_occurrences(view)?, pages)
    }

    /// Passages over character offsets, falling back to summary passages.
    pub fn char_passages(&self, view: &CharView, occurrences: &dyn OccurrenceSource) -> Result<Vec<Passage<CharOffset>>> {
        let pages = self.page.as_ref().map(|(_, provider)| provider.char_cursor(view));
        self.passages(view, self.segmentation.char_cursor(view), occurrences.char_occurrences(view)?, pages)
    }

    fn passages<'a, V: TextView + ?Sized>(
        &self,
        text: &V,
        breaks: Box<dyn SegmentationCursor<V::Offset> + 'a>,
        occurrences: Box<dyn OccurrenceCursor<V::Offset> + 'a>,
        pages: Option<Box<dyn SegmentationCursor<V::Offset> + 'a>>,
    ) -> Result<Vec<Passage<V::Offset>>> {
        if self.max_passages == 0 {
            return Ok(Vec::new());
        }
        let content_len = text.len();
        let (lo, hi) = match (self.page.as_ref(), pages) {
            (Some(&(page, _)), Some(mut pages)) => match page_span(pages.as_mut(), page, content_len) {
                Some(span) => span,
                None => {
                    debug!(field = %self.field, page, "page not in document");
                    return Ok(Vec::new());
                }
            },
            _ => (V::Offset::default(), content_len),
        };
        let mut breaks = ClampedBreaks { inner: breaks, lo, hi };
        let mut occurrences = RangeOccurrences::new(occurrences, lo, hi);
        let mut passages = PassageBuilder::new(&self.scorer, self.max_passages).build(&mut occurrences, &mut breaks, text)?;
        if passages.is_empty() {
            passages = summary_passages(&mut breaks, lo, hi, self.max_summary_passages);
            debug!(field = %self.field, summary = passages.len(), "no matching passages, using summary");
        } else {
            debug!(field = %self.field, passages = passages.len(), "built passages");
        }
        Ok(passages)
    }

    fn format(&self, passages: &[Passage<CharOffset>], text: &dyn TextView<Offset = CharOffset>) -> Result<Vec<Snippet>> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }
        self.formatter.format(passages, text)
    }
}

/// `[start, end)` of the 0-based `page`, `None` when the document has fewer pages.
fn page_span<O: TextOffset>(pages: &mut dyn SegmentationCursor<O>, page: usize, len: O) -> Option<(O, O)> {
    let mut start = O::default();
    for _ in 0..page {
        start = pages.following(start)?;
    }
    if start >= len {
        return None;
    }
    Some((start, pages.following(start).map_or(len, |end| end.min(len))))
}

/// Keeps every window inside `[lo, hi]`.
struct ClampedBreaks<'a, O> {
    inner: Box<dyn SegmentationCursor<O> + 'a>,
    lo: O,
    hi: O,
}

impl<O: TextOffset> SegmentationCursor<O> for ClampedBreaks<'_, O> {
    fn preceding(&mut self, pos: O) -> Option<O> {
        Some(self.inner.preceding(pos).map_or(self.lo, |b| b.max(self.lo)))
    }

    fn following(&mut self, pos: O) -> Option<O> {
        Some(self.inner.following(pos).map_or(self.hi, |b| b.min(self.hi)))
    }
}
