//! Run-length-encoded integer sets, the compact representation the DAG
//! backend uses for id-keyed sets.
//!
//! Spans are stored in descending order, non-overlapping and
//! non-adjacent, so `[1, 2, 3, 4, 10, 11]` is kept as `11..=10, 4..=1`.
//! Virtual revisions are negative or above [`MAX_ID`](crate::MAX_ID)
//! and are not representable here.

use crate::id::RevId;
use std::cmp::max;
use std::cmp::min;
use std::fmt;

/// An inclusive range of revision ids.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Span {
    /// Smallest id covered, `>= 0`.
    pub low: RevId,
    /// Largest id covered, `>= low`.
    pub high: RevId,
}

impl Span {
    /// A span covering `low..=high`. Panics if the range is backwards.
    pub fn new(low: RevId, high: RevId) -> Self {
        assert!(low <= high, "backwards span");
        assert!(low >= 0, "span cannot cover virtual revisions");
        Span { low, high }
    }

    fn count(&self) -> u64 {
        (self.high - self.low + 1) as u64
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.low == self.high {
            write!(f, "{}", self.low)
        } else {
            write!(f, "{}..={}", self.low, self.high)
        }
    }
}

/// A set of revision ids, run-length encoded as sorted [`Span`]s.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Spans {
    /// Spans in descending order.
    spans: Vec<Span>,
}

impl Spans {
    /// The empty set.
    pub fn empty() -> Self {
        Spans { spans: Vec::new() }
    }

    /// Build from arbitrary ids. Order and duplicates do not matter.
    /// Virtual revisions are not representable and are skipped.
    pub fn from_ids(ids: impl IntoIterator<Item = RevId>) -> Self {
        let mut ids: Vec<RevId> = ids
            .into_iter()
            .filter(|&id| id >= 0 && id <= crate::id::MAX_ID)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        let mut spans: Vec<Span> = Vec::new();
        for id in ids {
            match spans.last_mut() {
                Some(last) if id == last.high + 1 => last.high = id,
                _ => spans.push(Span { low: id, high: id }),
            }
        }
        spans.reverse();
        Spans { spans }
    }

    /// A single span covering `low..=high` with no validity filtering.
    /// Returns the empty set if `low > high`.
    pub fn unsafe_range(low: RevId, high: RevId) -> Self {
        if low > high {
            Spans::empty()
        } else {
            Spans {
                spans: vec![Span::new(low, high)],
            }
        }
    }

    /// Number of ids covered.
    pub fn count(&self) -> u64 {
        self.spans.iter().map(|s| s.count()).sum()
    }

    /// True if no id is covered.
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Membership test, `O(log n)` in the number of spans.
    pub fn contains(&self, id: RevId) -> bool {
        let idx = self.spans.partition_point(|s| s.low > id);
        match self.spans.get(idx) {
            Some(span) => span.high >= id,
            None => false,
        }
    }

    /// Smallest id, or `None` if empty.
    pub fn min(&self) -> Option<RevId> {
        self.spans.last().map(|s| s.low)
    }

    /// Largest id, or `None` if empty.
    pub fn max(&self) -> Option<RevId> {
        self.spans.first().map(|s| s.high)
    }

    /// The spans in ascending order.
    fn asc_spans(&self) -> Vec<Span> {
        let mut spans = self.spans.clone();
        spans.reverse();
        spans
    }

    /// Ids covered by both sets.
    pub fn intersection(&self, other: &Spans) -> Spans {
        let a = self.asc_spans();
        let b = other.asc_spans();
        let mut out: Vec<Span> = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            let low = max(a[i].low, b[j].low);
            let high = min(a[i].high, b[j].high);
            if low <= high {
                out.push(Span { low, high });
            }
            if a[i].high < b[j].high {
                i += 1;
            } else {
                j += 1;
            }
        }
        out.reverse();
        Spans { spans: out }
    }

    /// Ids covered by either set.
    pub fn union(&self, other: &Spans) -> Spans {
        let a = self.asc_spans();
        let b = other.asc_spans();
        let mut out: Vec<Span> = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < a.len() || j < b.len() {
            let next = if j >= b.len() || (i < a.len() && a[i].low <= b[j].low) {
                i += 1;
                a[i - 1]
            } else {
                j += 1;
                b[j - 1]
            };
            match out.last_mut() {
                Some(last) if next.low <= last.high + 1 => last.high = max(last.high, next.high),
                _ => out.push(next),
            }
        }
        out.reverse();
        Spans { spans: out }
    }

    /// Ids covered by `self` but not `other`.
    pub fn difference(&self, other: &Spans) -> Spans {
        let a = self.asc_spans();
        let b = other.asc_spans();
        let mut out: Vec<Span> = Vec::new();
        let mut j = 0;
        for span in a {
            let mut low = span.low;
            while j < b.len() && b[j].high < span.low {
                j += 1;
            }
            let mut k = j;
            while k < b.len() && b[k].low <= span.high {
                if b[k].low > low {
                    out.push(Span {
                        low,
                        high: b[k].low - 1,
                    });
                }
                low = max(low, b[k].high + 1);
                if low > span.high {
                    break;
                }
                k += 1;
            }
            if low <= span.high {
                out.push(Span {
                    low,
                    high: span.high,
                });
            }
        }
        out.reverse();
        Spans { spans: out }
    }

    /// Iterate ids in descending order.
    pub fn iter_desc(&self) -> SpanIdIter {
        SpanIdIter::new(self.spans.clone(), false)
    }

    /// Iterate ids in ascending order.
    pub fn iter_asc(&self) -> SpanIdIter {
        SpanIdIter::new(self.asc_spans(), true)
    }
}

impl fmt::Debug for Spans {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("[")?;
        for (i, span) in self.spans.iter().rev().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            span.fmt(f)?;
        }
        f.write_str("]")
    }
}

/// Id iterator over a span list, in the direction the list was laid
/// out for.
pub struct SpanIdIter {
    spans: Vec<Span>,
    idx: usize,
    next: Option<RevId>,
    ascending: bool,
}

impl SpanIdIter {
    fn new(spans: Vec<Span>, ascending: bool) -> Self {
        let next = spans
            .first()
            .map(|s| if ascending { s.low } else { s.high });
        SpanIdIter {
            spans,
            idx: 0,
            next,
            ascending,
        }
    }
}

impl Iterator for SpanIdIter {
    type Item = RevId;

    fn next(&mut self) -> Option<RevId> {
        let id = self.next?;
        let span = self.spans[self.idx];
        let done = if self.ascending {
            id >= span.high
        } else {
            id <= span.low
        };
        self.next = if done {
            self.idx += 1;
            self.spans
                .get(self.idx)
                .map(|s| if self.ascending { s.low } else { s.high })
        } else if self.ascending {
            Some(id + 1)
        } else {
            Some(id - 1)
        };
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(ids: &[RevId]) -> Spans {
        Spans::from_ids(ids.iter().copied())
    }

    #[test]
    fn test_build_and_debug() {
        let s = spans(&[1, 3, 2, 4, 11, 10]);
        assert_eq!(format!("{:?}", s), "[1..=4 10 11]");
        assert_eq!(s.count(), 6);
        assert_eq!(s.min(), Some(1));
        assert_eq!(s.max(), Some(11));
    }

    #[test]
    fn test_contains() {
        let s = spans(&[1, 2, 3, 4, 10, 11]);
        for id in &[1, 2, 3, 4, 10, 11] {
            assert!(s.contains(*id));
        }
        for id in &[-1, 0, 5, 9, 12] {
            assert!(!s.contains(*id));
        }
    }

    #[test]
    fn test_iteration() {
        let s = spans(&[1, 3, 2, 4, 11, 10]);
        assert_eq!(s.iter_desc().collect::<Vec<_>>(), [11, 10, 4, 3, 2, 1]);
        assert_eq!(s.iter_asc().collect::<Vec<_>>(), [1, 2, 3, 4, 10, 11]);
    }

    #[test]
    fn test_set_algebra() {
        let xs = spans(&[1, 2, 3, 4, 10, 11]);
        let ys = spans(&[2, 3, 4, 5, 20]);
        assert_eq!(format!("{:?}", xs.intersection(&ys)), "[2 3 4]");
        assert_eq!(format!("{:?}", xs.difference(&ys)), "[1 10 11]");
        assert_eq!(format!("{:?}", xs.union(&ys)), "[1..=5 10 11 20]");
    }

    #[test]
    fn test_difference_splits_spans() {
        let xs = Spans::unsafe_range(0, 10);
        let ys = spans(&[3, 4, 7]);
        assert_eq!(format!("{:?}", xs.difference(&ys)), "[0..=2 5 6 8..=10]");
    }

    #[test]
    fn test_range() {
        assert!(Spans::unsafe_range(5, 2).is_empty());
        let s = Spans::unsafe_range(2, 5);
        assert_eq!(s.iter_asc().collect::<Vec<_>>(), [2, 3, 4, 5]);
    }

    #[test]
    fn test_virtual_revisions_are_skipped() {
        let s = Spans::from_ids(vec![crate::id::NULL_ID, 0, 5, crate::id::WDIR_ID]);
        assert_eq!(format!("{:?}", s), "[0 5]");
    }

    quickcheck::quickcheck! {
        fn quickcheck_algebra_matches_naive(a: Vec<u16>, b: Vec<u16>) -> bool {
            use std::collections::BTreeSet;
            let xs = Spans::from_ids(a.iter().map(|&v| v as RevId));
            let ys = Spans::from_ids(b.iter().map(|&v| v as RevId));
            let na: BTreeSet<RevId> = a.iter().map(|&v| v as RevId).collect();
            let nb: BTreeSet<RevId> = b.iter().map(|&v| v as RevId).collect();
            let inter: Vec<RevId> = na.intersection(&nb).copied().collect();
            let uni: Vec<RevId> = na.union(&nb).copied().collect();
            let diff: Vec<RevId> = na.difference(&nb).copied().collect();
            xs.intersection(&ys).iter_asc().collect::<Vec<_>>() == inter
                && xs.union(&ys).iter_asc().collect::<Vec<_>>() == uni
                && xs.difference(&ys).iter_asc().collect::<Vec<_>>() == diff
        }
    }
}
