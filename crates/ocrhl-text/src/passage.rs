//! Passage extraction: one forward pass over match occurrences that keeps the
//! best `max_passages` windows in a bounded min-heap.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use tracing::trace;

use ocrhl_core::config::ScoreConfig;
use ocrhl_core::error::Result;
use ocrhl_core::text::TextView;
use ocrhl_core::traits::{OccurrenceCursor, SegmentationCursor};
use ocrhl_core::types::{Passage, TermRef, TextOffset};

/// BM25-flavoured passage scorer: dense, short, early passages score highest.
#[derive(Debug, Clone, Copy)]
pub struct PassageScorer {
    k1: f32,
    b: f32,
    pivot: f32,
}

impl Default for PassageScorer {
    fn default() -> Self {
        Self::new(ScoreConfig::default())
    }
}

impl PassageScorer {
    pub fn new(cfg: ScoreConfig) -> Self {
        Self { k1: cfg.k1, b: cfg.b, pivot: cfg.pivot }
    }

    fn weight(&self, content_len: usize, freq_in_doc: u32) -> f32 {
        let num_docs = 1.0 + content_len as f64 / f64::from(self.pivot);
        let idf = (1.0 + (num_docs + 0.5) / (f64::from(freq_in_doc) + 0.5)).ln();
        (self.k1 + 1.0) * idf as f32
    }

    fn tf(&self, freq: u32, passage_len: usize) -> f32 {
        let norm = self.k1 * ((1.0 - self.b) + self.b * (passage_len as f32 / self.pivot));
        freq as f32 / (freq as f32 + norm)
    }

    fn norm(&self, start: usize) -> f32 {
        1.0 + 1.0 / (self.pivot + start as f32).ln()
    }

    pub fn score<O: TextOffset>(&self, passage: &Passage<O>, content_len: usize) -> f32 {
        // (term, freq in passage, freq in doc); passages hold few distinct terms
        let mut terms: Vec<(&TermRef, u32, u32)> = Vec::new();
        for m in &passage.matches {
            match terms.iter_mut().find(|(t, _, _)| **t == m.term) {
                Some(entry) => entry.1 += 1,
                None => terms.push((&m.term, 1, m.term_freq.max(1))),
            }
        }
        let len = passage.len();
        let sum: f32 = terms.iter().map(|&(_, in_passage, in_doc)| self.tf(in_passage, len) * self.weight(content_len, in_doc)).sum();
        sum * self.norm(passage.start.get())
    }
}

/// Heap entry ordered by score, then start offset.
struct Ranked<O>(Passage<O>);

impl<O: TextOffset> Ord for Ranked<O> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.score.total_cmp(&other.0.score).then_with(|| self.0.start.cmp(&other.0.start))
    }
}

impl<O: TextOffset> PartialOrd for Ranked<O> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<O: TextOffset> PartialEq for Ranked<O> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<O: TextOffset> Eq for Ranked<O> {}

/// Fixed-capacity structure holding the highest-scoring passages offered so far.
pub struct BoundedPassageQueue<O> {
    capacity: usize,
    heap: BinaryHeap<Reverse<Ranked<O>>>,
}

impl<O: TextOffset> BoundedPassageQueue<O> {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, heap: BinaryHeap::with_capacity(capacity.min(64) + 1) }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn min_score(&self) -> Option<f32> {
        self.heap.peek().map(|Reverse(r)| r.0.score)
    }

    /// Admit `passage` unless the queue is full and it scores below the
    /// current minimum; overflow evicts the minimum. Returns whether the
    /// passage is still held afterwards.
    pub fn offer(&mut self, passage: Passage<O>) -> bool {
        if self.capacity == 0 {
            return false;
        }
        if self.heap.len() == self.capacity && self.min_score().is_some_and(|min| passage.score < min) {
            return false;
        }
        let start = passage.start;
        self.heap.push(Reverse(Ranked(passage)));
        if self.heap.len() > self.capacity {
            if let Some(Reverse(evicted)) = self.heap.pop() {
                return evicted.0.start != start;
            }
        }
        true
    }

    /// Held passages in ascending start order.
    pub fn into_sorted(self) -> Vec<Passage<O>> {
        let mut passages: Vec<Passage<O>> = self.heap.into_iter().map(|Reverse(r)| r.0).collect();
        passages.sort_by(|a, b| a.start.cmp(&b.start));
        passages
    }
}

/// End of the term starting at `start`: the first non-letter after its first
/// character. `None` when the text ends before such a character is found.
pub fn term_end<V: TextView + ?Sized>(text: &V, start: V::Offset) -> Option<V::Offset> {
    let (_, mut at) = text.char_at(start)?;
    loop {
        match text.char_at(at) {
            Some((c, next)) if c.is_alphabetic() => at = next,
            Some(_) => return Some(at),
            None => return None,
        }
    }
}

pub struct PassageBuilder<'s> {
    scorer: &'s PassageScorer,
    max_passages: usize,
}

impl<'s> PassageBuilder<'s> {
    pub fn new(scorer: &'s PassageScorer, max_passages: usize) -> Self {
        Self { scorer, max_passages }
    }

    /// Consume `occurrences` and return at most `max_passages` passages in
    /// ascending start order. Windows come from `breaks`; a new window never
    /// starts before the end of the previous one.
    pub fn build<V: TextView + ?Sized>(
        &self,
        occurrences: &mut dyn OccurrenceCursor<V::Offset>,
        breaks: &mut dyn SegmentationCursor<V::Offset>,
        text: &V,
    ) -> Result<Vec<Passage<V::Offset>>> {
        if self.max_passages == 0 {
            return Ok(Vec::new());
        }
        let content_len = text.len();
        let mut queue = BoundedPassageQueue::new(self.max_passages);
        let mut current: Option<Passage<V::Offset>> = None;
        let mut closed_end = V::Offset::default();

        while let Some(occ) = occurrences.next_occurrence()? {
            let start = occ.offset;
            let end = term_end(text, start);
            if start < content_len && end.is_none() {
                trace!(offset = start.get(), "skipping occurrence running past end of content");
                continue;
            }
            if current.as_ref().is_some_and(|p| start < p.start) {
                trace!(offset = start.get(), "skipping out-of-order occurrence");
                continue;
            }

            if current.as_ref().map_or(true, |p| start >= p.end) {
                if let Some(done) = current.take() {
                    closed_end = done.end;
                    self.admit(&mut queue, done, content_len);
                }
                if start >= content_len {
                    break;
                }
                let window_start = breaks.preceding(start.succ()).unwrap_or_default().max(closed_end);
                let window_end = breaks.following(start).map_or(content_len, |e| e.min(content_len));
                current = Some(Passage::new(window_start, window_end));
            }

            if let (Some(passage), Some(end)) = (current.as_mut(), end) {
                passage.add_match(start, end, occ.term, occ.term_freq);
            }
        }
        if let Some(done) = current.take() {
            self.admit(&mut queue, done, content_len);
        }
        Ok(queue.into_sorted())
    }

    fn admit<O: TextOffset>(&self, queue: &mut BoundedPassageQueue<O>, mut passage: Passage<O>, content_len: O) {
        passage.score = self.scorer.score(&passage, content_len.get());
        let (start, score) = (passage.start.get(), passage.score);
        let held = queue.offer(passage);
        trace!(start, score, held, "closed passage");
    }
}

/// Unscored passages made of the first `max` windows of `[from, until)`.
pub fn summary_passages<O: TextOffset>(breaks: &mut dyn SegmentationCursor<O>, from: O, until: O, max: usize) -> Vec<Passage<O>> {
    let mut passages = Vec::with_capacity(max.min(10));
    let mut pos = from;
    while passages.len() < max && pos < until {
        let Some(next) = breaks.following(pos) else { break };
        let next = next.min(until);
        if next <= pos {
            break;
        }
        passages.push(Passage::new(pos, next));
        pos = next;
    }
    passages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::occurrences::VecOccurrences;
    use ocrhl_core::text::{CharView, Utf8View};
    use ocrhl_core::types::{ByteOffset, MatchOccurrence};
    use std::sync::Arc;

    /// Boundaries every `width` units.
    struct FixedBreaks {
        width: usize,
        len: usize,
    }

    impl<O: TextOffset> SegmentationCursor<O> for FixedBreaks {
        fn preceding(&mut self, pos: O) -> Option<O> {
            let pos = pos.get();
            (pos > 0).then(|| O::new(((pos - 1) / self.width) * self.width))
        }

        fn following(&mut self, pos: O) -> Option<O> {
            let pos = pos.get();
            (pos < self.len).then(|| O::new(((pos / self.width + 1) * self.width).min(self.len)))
        }
    }

    /// Ten lines of twenty four-letter words, 100 bytes per line.
    fn ten_lines() -> String {
        (0..10).map(|_| format!("{}abcd\n", "abcd ".repeat(19))).collect()
    }

    fn occurrences(offsets: &[usize]) -> VecOccurrences<ByteOffset> {
        let term: TermRef = Arc::from("abcd");
        VecOccurrences::new(
            offsets.iter().map(|&o| MatchOccurrence { offset: ByteOffset(o), term: term.clone(), term_freq: offsets.len() as u32 }).collect(),
        )
    }

    fn build(text: &str, offsets: &[usize], max_passages: usize) -> Vec<Passage<ByteOffset>> {
        let view = Utf8View::new(text);
        let scorer = PassageScorer::default();
        let mut breaks = FixedBreaks { width: 100, len: text.len() };
        PassageBuilder::new(&scorer, max_passages)
            .build(&mut occurrences(offsets), &mut breaks, &view)
            .expect("build")
    }

    #[test]
    fn two_lines_two_passages() {
        let text = ten_lines();
        assert_eq!(text.len(), 1000);
        let passages = build(&text, &[150, 155, 820], 2);
        assert_eq!(passages.len(), 2);
        assert_eq!((passages[0].start, passages[0].end), (ByteOffset(100), ByteOffset(200)));
        assert_eq!(passages[0].matches.len(), 2);
        assert_eq!((passages[0].matches[0].start, passages[0].matches[0].end), (ByteOffset(150), ByteOffset(154)));
        assert_eq!((passages[1].start, passages[1].end), (ByteOffset(800), ByteOffset(900)));
        assert_eq!(passages[1].matches.len(), 1);
    }

    #[test]
    fn densest_region_wins_single_slot() {
        let text = ten_lines();
        let passages = build(&text, &[5, 305, 310, 315, 320, 325, 705], 1);
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].start, ByteOffset(300));
        assert_eq!(passages[0].matches.len(), 5);
    }

    #[test]
    fn no_occurrences_no_passages() {
        assert!(build(&ten_lines(), &[], 3).is_empty());
    }

    #[test]
    fn zero_max_passages_yields_nothing() {
        assert!(build(&ten_lines(), &[150], 0).is_empty());
    }

    #[test]
    fn term_running_into_end_of_content_is_skipped() {
        // last word has no trailing delimiter
        let text = "abcd abcd";
        let view = Utf8View::new(text);
        assert_eq!(term_end(&view, ByteOffset(0)), Some(ByteOffset(4)));
        assert_eq!(term_end(&view, ByteOffset(5)), None);
        let passages = build(text, &[5], 1);
        assert!(passages.is_empty());
    }

    #[test]
    fn term_end_measures_multibyte_width() {
        let text = "Straße weiter";
        let view = Utf8View::new(text);
        assert_eq!(term_end(&view, ByteOffset(0)), Some(ByteOffset(7)));
        let chars = CharView::from(text);
        assert_eq!(term_end(&chars, ocrhl_core::types::CharOffset(0)), Some(ocrhl_core::types::CharOffset(6)));
    }

    #[test]
    fn occurrences_past_content_stop_the_pass() {
        let text = ten_lines();
        let passages = build(&text, &[150, 1000, 1005], 3);
        assert_eq!(passages.len(), 1);
    }

    #[test]
    fn bounded_queue_evicts_minimum() {
        let mut queue = BoundedPassageQueue::new(2);
        for (start, score) in [(0, 1.0), (10, 3.0), (20, 2.0), (30, 0.5)] {
            let mut p = Passage::new(ByteOffset(start), ByteOffset(start + 5));
            p.score = score;
            queue.offer(p);
        }
        let starts: Vec<_> = queue.into_sorted().iter().map(|p| p.start.0).collect();
        assert_eq!(starts, vec![10, 20]);
    }

    #[test]
    fn scorer_rewards_density_and_penalizes_length() {
        let scorer = PassageScorer::default();
        let term: TermRef = Arc::from("abcd");
        let mut sparse = Passage::new(ByteOffset(100), ByteOffset(200));
        sparse.add_match(ByteOffset(110), ByteOffset(114), term.clone(), 3);
        let mut dense = sparse.clone();
        dense.add_match(ByteOffset(120), ByteOffset(124), term.clone(), 3);
        let mut longer = sparse.clone();
        longer.end = ByteOffset(400);
        let s = scorer.score(&sparse, 1000);
        assert!(scorer.score(&dense, 1000) > s);
        assert!(scorer.score(&longer, 1000) <= s);
    }

    #[test]
    fn summary_walks_windows_from_the_start() {
        let mut breaks = FixedBreaks { width: 100, len: 250 };
        let passages = summary_passages(&mut breaks, ByteOffset(0), ByteOffset(250), 5);
        let spans: Vec<_> = passages.iter().map(|p| (p.start.0, p.end.0)).collect();
        assert_eq!(spans, vec![(0, 100), (100, 200), (200, 250)]);
        assert!(summary_passages(&mut breaks, ByteOffset(0), ByteOffset(250), 0).is_empty());

        // a window starting mid-range is cut at its upper end
        let passages = summary_passages(&mut breaks, ByteOffset(100), ByteOffset(150), 5);
        assert_eq!(passages.iter().map(|p| (p.start.0, p.end.0)).collect::<Vec<_>>(), vec![(100, 150)]);
    }
}
