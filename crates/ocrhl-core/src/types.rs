//! Domain types shared by the passage engine and its collaborators.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::Error;

/// Opaque reference to a matched query term.
pub type TermRef = Arc<str>;

/// A position in some offset space of a document.
///
/// Byte and character positions are kept apart by type: a passage built on
/// byte offsets has to be translated explicitly before it can be compared
/// with anything measured in characters.
pub trait TextOffset: Copy + Ord + Default + fmt::Debug + Send + Sync + 'static {
    fn new(raw: usize) -> Self;
    fn get(self) -> usize;

    fn succ(self) -> Self {
        Self::new(self.get() + 1)
    }

    /// Distance from `start` to `self`, zero when `start` lies past `self`.
    fn distance_from(self, start: Self) -> usize {
        self.get().saturating_sub(start.get())
    }
}

/// Offset into the canonical UTF-8 byte stream of a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ByteOffset(pub usize);

/// Offset counted in Unicode scalar values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CharOffset(pub usize);

impl TextOffset for ByteOffset {
    fn new(raw: usize) -> Self {
        Self(raw)
    }
    fn get(self) -> usize {
        self.0
    }
}

impl TextOffset for CharOffset {
    fn new(raw: usize) -> Self {
        Self(raw)
    }
    fn get(self) -> usize {
        self.0
    }
}

/// Which offset space a document's content is addressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OffsetKind {
    Bytes,
    Chars,
}

/// Encoding of a document's canonical byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    Latin1,
}

/// Structural unit of an OCR document, coarsest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrBlock {
    Page,
    Block,
    Section,
    Paragraph,
    Line,
    Word,
}

impl FromStr for OcrBlock {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "page" => Ok(Self::Page),
            "block" => Ok(Self::Block),
            "section" => Ok(Self::Section),
            "paragraph" => Ok(Self::Paragraph),
            "line" => Ok(Self::Line),
            "word" => Ok(Self::Word),
            other => Err(Error::InvalidConfig(format!("unknown OCR block '{}'", other))),
        }
    }
}

/// One indexed position where a query term matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOccurrence<O> {
    pub offset: O,
    pub term: TermRef,
    /// Frequency of `term` in the whole document, at least 1.
    pub term_freq: u32,
}

/// A match accepted into a passage, with its measured span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassageMatch<O> {
    pub start: O,
    pub end: O,
    pub term: TermRef,
    pub term_freq: u32,
}

/// A scored region of a document together with the matches it contains.
///
/// `start <= m.start` and `m.end <= end` hold for every match `m`.
/// Summary passages carry no matches and a score of zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Passage<O> {
    pub start: O,
    pub end: O,
    pub score: f32,
    pub matches: Vec<PassageMatch<O>>,
}

impl<O: TextOffset> Passage<O> {
    pub fn new(start: O, end: O) -> Self {
        Self { start, end, score: 0.0, matches: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.end.distance_from(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn add_match(&mut self, start: O, end: O, term: TermRef, term_freq: u32) {
        if end > self.end {
            self.end = end;
        }
        self.matches.push(PassageMatch { start, end, term, term_freq });
    }

    /// Re-express every offset of the passage through `f`, which must be monotonic.
    pub fn map_offsets<T: TextOffset>(&self, mut f: impl FnMut(O) -> T) -> Passage<T> {
        Passage {
            start: f(self.start),
            end: f(self.end),
            score: self.score,
            matches: self
                .matches
                .iter()
                .map(|m| PassageMatch { start: f(m.start), end: f(m.end), term: m.term.clone(), term_freq: m.term_freq })
                .collect(),
        }
    }
}

/// Axis-aligned box in page pixel space (upper-left / lower-right corners).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub ulx: u32,
    pub uly: u32,
    pub lrx: u32,
    pub lry: u32,
}

impl Region {
    pub fn union(self, other: Region) -> Region {
        Region {
            ulx: self.ulx.min(other.ulx),
            uly: self.uly.min(other.uly),
            lrx: self.lrx.max(other.lrx),
            lry: self.lry.max(other.lry),
        }
    }

    /// Express `self` relative to the upper-left corner of `frame`.
    pub fn relative_to(self, frame: Region) -> Region {
        Region {
            ulx: self.ulx.saturating_sub(frame.ulx),
            uly: self.uly.saturating_sub(frame.uly),
            lrx: self.lrx.saturating_sub(frame.ulx),
            lry: self.lry.saturating_sub(frame.uly),
        }
    }
}

/// A highlighted match inside a snippet.
///
/// `start`/`end` are character positions in the snippet text with the
/// highlight tags removed. A match broken over several lines has one
/// region per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightSpan {
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub regions: Vec<Region>,
}

/// Final text + geometry unit handed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
    pub text: String,
    pub score: f32,
    pub page: Option<usize>,
    pub region: Option<Region>,
    pub highlights: Vec<HighlightSpan>,
}
