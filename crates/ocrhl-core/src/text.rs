//! Random-access views over document text in byte or character offset space.
//!
//! `Utf8View` addresses a UTF-8 string by byte offset without copying it,
//! which is what the highlighter uses for large (memory-mapped) documents.
//! Translation to character offsets goes through a sparse checkpoint table
//! built on first use, so no per-character array is ever materialized.
//! `CharView` owns a decoded `Vec<char>` and is addressed by character offset.

use std::borrow::Cow;
use std::cell::OnceCell;

use crate::types::{ByteOffset, CharOffset, TextOffset};

/// Characters between two consecutive checkpoints of a [`Utf8View`].
const CHECKPOINT_STRIDE: usize = 1024;

pub trait TextView {
    type Offset: TextOffset;

    fn len(&self) -> Self::Offset;

    fn is_empty(&self) -> bool {
        self.len().get() == 0
    }

    /// The character starting at `at` and the offset just past it.
    fn char_at(&self, at: Self::Offset) -> Option<(char, Self::Offset)>;

    /// The character ending at `at` and the offset it starts at.
    fn char_before(&self, at: Self::Offset) -> Option<(char, Self::Offset)>;

    /// Largest character boundary not greater than `at`, clamped to `len()`.
    fn floor(&self, at: Self::Offset) -> Self::Offset;

    fn slice(&self, start: Self::Offset, end: Self::Offset) -> Cow<'_, str>;
}

struct CharIndex {
    /// Byte offset of every `CHECKPOINT_STRIDE`-th character.
    checkpoints: Vec<usize>,
    char_len: usize,
}

pub struct Utf8View<'a> {
    text: &'a str,
    index: OnceCell<CharIndex>,
}

impl<'a> Utf8View<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text, index: OnceCell::new() }
    }

    pub fn as_str(&self) -> &'a str {
        self.text
    }

    fn index(&self) -> &CharIndex {
        self.index.get_or_init(|| {
            let mut checkpoints = Vec::with_capacity(self.text.len() / CHECKPOINT_STRIDE + 1);
            let mut char_len = 0;
            for (i, (byte, _)) in self.text.char_indices().enumerate() {
                if i % CHECKPOINT_STRIDE == 0 {
                    checkpoints.push(byte);
                }
                char_len = i + 1;
            }
            if checkpoints.is_empty() {
                checkpoints.push(0);
            }
            CharIndex { checkpoints, char_len }
        })
    }

    pub fn char_len(&self) -> CharOffset {
        CharOffset(self.index().char_len)
    }

    /// Character offset of the character containing byte `at`.
    pub fn byte_to_char(&self, at: ByteOffset) -> CharOffset {
        let at = self.floor(at).0;
        let index = self.index();
        let slot = index.checkpoints.partition_point(|&b| b <= at).saturating_sub(1);
        let base = index.checkpoints[slot];
        CharOffset(slot * CHECKPOINT_STRIDE + self.text[base..at].chars().count())
    }

    /// Byte offset at which character `at` starts; `len()` past the end.
    pub fn char_to_byte(&self, at: CharOffset) -> ByteOffset {
        let index = self.index();
        if at.0 >= index.char_len {
            return ByteOffset(self.text.len());
        }
        let slot = at.0 / CHECKPOINT_STRIDE;
        let base = index.checkpoints[slot];
        let skip = at.0 - slot * CHECKPOINT_STRIDE;
        let byte = self.text[base..].char_indices().nth(skip).map_or(self.text.len(), |(i, _)| base + i);
        ByteOffset(byte)
    }

    /// The same text addressed by character offset.
    pub fn chars(&self) -> Utf8Chars<'_, 'a> {
        Utf8Chars { view: self }
    }
}

impl TextView for Utf8View<'_> {
    type Offset = ByteOffset;

    fn len(&self) -> ByteOffset {
        ByteOffset(self.text.len())
    }

    fn char_at(&self, at: ByteOffset) -> Option<(char, ByteOffset)> {
        let c = self.text.get(at.0..)?.chars().next()?;
        Some((c, ByteOffset(at.0 + c.len_utf8())))
    }

    fn char_before(&self, at: ByteOffset) -> Option<(char, ByteOffset)> {
        let c = self.text.get(..at.0)?.chars().next_back()?;
        Some((c, ByteOffset(at.0 - c.len_utf8())))
    }

    fn floor(&self, at: ByteOffset) -> ByteOffset {
        let mut at = at.0.min(self.text.len());
        while !self.text.is_char_boundary(at) {
            at -= 1;
        }
        ByteOffset(at)
    }

    fn slice(&self, start: ByteOffset, end: ByteOffset) -> Cow<'_, str> {
        let (start, end) = (self.floor(start).0, self.floor(end).0);
        Cow::Borrowed(self.text.get(start..end.max(start)).unwrap_or(""))
    }
}

/// Character-offset view over a [`Utf8View`].
pub struct Utf8Chars<'v, 'a> {
    view: &'v Utf8View<'a>,
}

impl TextView for Utf8Chars<'_, '_> {
    type Offset = CharOffset;

    fn len(&self) -> CharOffset {
        self.view.char_len()
    }

    fn char_at(&self, at: CharOffset) -> Option<(char, CharOffset)> {
        let byte = self.view.char_to_byte(at);
        self.view.char_at(byte).map(|(c, _)| (c, at.succ()))
    }

    fn char_before(&self, at: CharOffset) -> Option<(char, CharOffset)> {
        if at.0 == 0 || at > self.len() {
            return None;
        }
        let byte = self.view.char_to_byte(at);
        self.view.char_before(byte).map(|(c, _)| (c, CharOffset(at.0 - 1)))
    }

    fn floor(&self, at: CharOffset) -> CharOffset {
        at.min(self.len())
    }

    fn slice(&self, start: CharOffset, end: CharOffset) -> Cow<'_, str> {
        let start = self.view.char_to_byte(start);
        let end = self.view.char_to_byte(end);
        self.view.slice(start, end)
    }
}

/// Fully decoded text addressed by character offset.
pub struct CharView {
    chars: Vec<char>,
}

impl CharView {
    pub fn new(chars: Vec<char>) -> Self {
        Self { chars }
    }

    pub fn chars(&self) -> &[char] {
        &self.chars
    }
}

impl From<&str> for CharView {
    fn from(text: &str) -> Self {
        Self::new(text.chars().collect())
    }
}

impl TextView for CharView {
    type Offset = CharOffset;

    fn len(&self) -> CharOffset {
        CharOffset(self.chars.len())
    }

    fn char_at(&self, at: CharOffset) -> Option<(char, CharOffset)> {
        self.chars.get(at.0).map(|&c| (c, at.succ()))
    }

    fn char_before(&self, at: CharOffset) -> Option<(char, CharOffset)> {
        let prev = at.0.checked_sub(1)?;
        self.chars.get(prev).map(|&c| (c, CharOffset(prev)))
    }

    fn floor(&self, at: CharOffset) -> CharOffset {
        at.min(self.len())
    }

    fn slice(&self, start: CharOffset, end: CharOffset) -> Cow<'_, str> {
        let end = end.0.min(self.chars.len());
        let start = start.0.min(end);
        Cow::Owned(self.chars[start..end].iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_and_char_offsets_translate_both_ways() {
        let text = "Grüße aus Köln";
        let view = Utf8View::new(text);
        // 'a' of "aus" is char 6, byte 8 (ü and ß are two bytes each)
        assert_eq!(view.byte_to_char(ByteOffset(8)), CharOffset(6));
        assert_eq!(view.char_to_byte(CharOffset(6)), ByteOffset(8));
        assert_eq!(view.char_len(), CharOffset(14));
        assert_eq!(view.char_to_byte(CharOffset(14)), ByteOffset(text.len()));
        // a byte inside 'ü' maps to that character
        assert_eq!(view.byte_to_char(ByteOffset(3)), CharOffset(2));
    }

    #[test]
    fn translation_crosses_checkpoints() {
        let text: String = "äb".repeat(CHECKPOINT_STRIDE * 2);
        let view = Utf8View::new(&text);
        for c in [0, 1, CHECKPOINT_STRIDE - 1, CHECKPOINT_STRIDE, CHECKPOINT_STRIDE * 3 + 7] {
            let b = view.char_to_byte(CharOffset(c));
            assert_eq!(b.0, (c / 2) * 3 + (c % 2) * 2);
            assert_eq!(view.byte_to_char(b), CharOffset(c));
        }
    }

    #[test]
    fn utf8_chars_view_matches_char_view() {
        let text = "ſchöne Grüße\nzweite Zeile";
        let view = Utf8View::new(text);
        let chars = view.chars();
        let owned = CharView::from(text);
        assert_eq!(chars.len(), owned.len());
        for i in 0..=owned.len().0 {
            let at = CharOffset(i);
            assert_eq!(chars.char_at(at), owned.char_at(at));
            assert_eq!(chars.char_before(at), owned.char_before(at));
        }
        assert_eq!(chars.slice(CharOffset(7), CharOffset(12)), "Grüße");
        assert_eq!(owned.slice(CharOffset(7), CharOffset(12)), "Grüße");
    }

    #[test]
    fn floor_rounds_into_char_boundary() {
        let view = Utf8View::new("aé");
        assert_eq!(view.floor(ByteOffset(2)), ByteOffset(1));
        assert_eq!(view.floor(ByteOffset(10)), ByteOffset(3));
        assert_eq!(view.char_at(ByteOffset(2)), None);
    }
}
