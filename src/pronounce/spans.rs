//! Protected span bookkeeping for in-place text rewriting.
//!
//! A `SpanSet` is a sorted list of pairwise non-overlapping half-open byte
//! ranges marking regions of a buffer that must not be matched or rewritten
//! again. Every insertion that changes the buffer's length shifts all spans
//! starting after the insertion point by the same delta.

/// Half-open byte range `[start, end)` within a text buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }
}

/// Sorted set of non-overlapping protected spans.
#[derive(Debug, Default)]
pub struct SpanSet {
    spans: Vec<Span>,
}

impl SpanSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a span, keeping the set sorted by start offset.
    pub fn insert(&mut self, span: Span) {
        let idx = self.spans.partition_point(|s| s.start < span.start);
        self.spans.insert(idx, span);
    }

    /// True when `[start, end)` lies entirely within some protected span.
    pub fn covers(&self, start: usize, end: usize) -> bool {
        self.spans
            .iter()
            .any(|s| start >= s.start && end <= s.end)
    }

    /// Shift every span starting strictly after `pos` by `delta` bytes.
    pub fn shift_after(&mut self, pos: usize, delta: isize) {
        for span in &mut self.spans {
            if span.start > pos {
                span.start = offset(span.start, delta);
                span.end = offset(span.end, delta);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Span> {
        self.spans.iter()
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

fn offset(value: usize, delta: isize) -> usize {
    if delta >= 0 {
        value + delta as usize
    } else {
        value - delta.unsigned_abs()
    }
}
