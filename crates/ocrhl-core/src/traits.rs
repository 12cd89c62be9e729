use std::io::{BufRead, Read};

use crate::error::Result;
use crate::text::{CharView, TextView, Utf8View};
use crate::types::{ByteOffset, CharOffset, Encoding, MatchOccurrence, OcrBlock, OffsetKind, Passage, Snippet};

/// Forward-only stream of match occurrences for one field of one document,
/// in ascending offset order. Dropping the cursor releases whatever it holds.
pub trait OccurrenceCursor<O> {
    fn next_occurrence(&mut self) -> Result<Option<MatchOccurrence<O>>>;
}

/// Opens occurrence cursors for a document in either offset space.
pub trait OccurrenceSource {
    fn byte_occurrences<'a>(&'a self, text: &'a Utf8View<'a>) -> Result<Box<dyn OccurrenceCursor<ByteOffset> + 'a>>;

    fn char_occurrences<'a>(&'a self, text: &'a CharView) -> Result<Box<dyn OccurrenceCursor<CharOffset> + 'a>>;
}

/// Stateful boundary finder bound to one document.
///
/// `None` means there is no boundary in the requested direction; callers
/// clamp to `[0, len]`.
pub trait SegmentationCursor<O> {
    /// Start of the passage window that ends just before `pos`.
    fn preceding(&mut self, pos: O) -> Option<O>;

    /// End of the passage window that starts at or before `pos`.
    fn following(&mut self, pos: O) -> Option<O>;
}

/// Builds segmentation cursors for a fixed break unit, limit unit and context size.
pub trait SegmentationProvider: Send + Sync {
    fn byte_cursor<'a>(&self, text: &'a dyn TextView<Offset = ByteOffset>) -> Box<dyn SegmentationCursor<ByteOffset> + 'a>;

    fn char_cursor<'a>(&self, text: &'a dyn TextView<Offset = CharOffset>) -> Box<dyn SegmentationCursor<CharOffset> + 'a>;
}

/// Turns finished passages into snippets.
pub trait SnippetFormatter: Send + Sync {
    fn format(&self, passages: &[Passage<CharOffset>], text: &dyn TextView<Offset = CharOffset>) -> Result<Vec<Snippet>>;
}

/// Strategy for one OCR dialect. The engine never branches on which one it holds.
pub trait OcrFormat: Send + Sync {
    fn name(&self) -> &'static str;

    /// `limit_unit`, when set, is never crossed by a passage; `context_size` is
    /// the number of break units a window extends by in each direction.
    fn segmentation_provider(&self, break_unit: OcrBlock, limit_unit: Option<OcrBlock>, context_size: usize) -> Box<dyn SegmentationProvider>;

    fn snippet_formatter(&self, pre_tag: &str, post_tag: &str, absolute_coordinates: bool, align_spans: bool) -> Box<dyn SnippetFormatter>;

    /// Plain text from raw markup; alternative readings are emitted inline
    /// when `expand_alternatives` is set.
    fn decoder<'a>(&self, input: Box<dyn BufRead + 'a>, expand_alternatives: bool) -> Box<dyn Read + 'a>;

    /// Best-effort check whether `chunk` is in this dialect. Never fails.
    fn sniff(&self, chunk: &str) -> bool;

    /// Marker joining alternative readings inside a word in raw content, if the dialect has one.
    fn alternative_separator(&self) -> Option<char> {
        None
    }
}

/// Document content as provided by a (possibly lazy) loader.
pub trait DocumentContent {
    fn offset_kind(&self) -> OffsetKind;
    fn encoding(&self) -> Encoding;
    /// The canonical encoded byte stream.
    fn bytes(&self) -> &[u8];
}
