use std::collections::VecDeque;

use ocrhl_core::error::Result;
use ocrhl_core::traits::OccurrenceCursor;
use ocrhl_core::types::MatchOccurrence;

/// Occurrence cursor over matches that were already collected.
#[derive(Debug, Default)]
pub struct VecOccurrences<O> {
    pending: VecDeque<MatchOccurrence<O>>,
}

impl<O: Ord> VecOccurrences<O> {
    /// Sorts `occurrences` by offset; the sort is stable so matches sharing a
    /// position keep their relative order.
    pub fn new(mut occurrences: Vec<MatchOccurrence<O>>) -> Self {
        occurrences.sort_by(|a, b| a.offset.cmp(&b.offset));
        Self { pending: occurrences.into() }
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl<O> OccurrenceCursor<O> for VecOccurrences<O> {
    fn next_occurrence(&mut self) -> Result<Option<MatchOccurrence<O>>> {
        Ok(self.pending.pop_front())
    }
}

/// Passes on only the occurrences inside `[start, end)` of an ascending cursor.
pub struct RangeOccurrences<'a, O> {
    inner: Box<dyn OccurrenceCursor<O> + 'a>,
    start: O,
    end: O,
}

impl<'a, O> RangeOccurrences<'a, O> {
    pub fn new(inner: Box<dyn OccurrenceCursor<O> + 'a>, start: O, end: O) -> Self {
        Self { inner, start, end }
    }
}

impl<O: Ord> OccurrenceCursor<O> for RangeOccurrences<'_, O> {
    fn next_occurrence(&mut self) -> Result<Option<MatchOccurrence<O>>> {
        while let Some(occ) = self.inner.next_occurrence()? {
            if occ.offset < self.start {
                continue;
            }
            if occ.offset >= self.end {
                return Ok(None);
            }
            return Ok(Some(occ));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocrhl_core::types::ByteOffset;
    use std::sync::Arc;

    fn occ(offset: usize) -> MatchOccurrence<ByteOffset> {
        MatchOccurrence { offset: ByteOffset(offset), term: Arc::from("t"), term_freq: 1 }
    }

    #[test]
    fn range_keeps_inner_occurrences_only() {
        let inner = VecOccurrences::new(vec![occ(30), occ(2), occ(10), occ(19), occ(20)]);
        let mut range = RangeOccurrences::new(Box::new(inner), ByteOffset(10), ByteOffset(20));
        let mut offsets = Vec::new();
        while let Some(o) = range.next_occurrence().unwrap() {
            offsets.push(o.offset.0);
        }
        assert_eq!(offsets, vec![10, 19]);
    }
}
