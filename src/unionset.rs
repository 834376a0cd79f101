use crate::baseset::BaseSet;
use crate::id::Direction;
use crate::id::RevId;
use crate::repo::Repo;
use crate::set::arc_vec_iter;
use crate::set::RevIter;
use crate::set::RevSet;
use crate::set::Set;
use crate::Result;
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;

/// Lazy union of two sets.
///
/// With no requested direction, iteration is the concatenation: all of
/// the first operand, then members of the second not already seen.
/// With a requested direction, both operands' fast iterators are
/// merged in order when available; otherwise the concatenation is
/// materialised into an ascending list once and reused.
#[derive(Clone)]
pub struct UnionSet {
    a: Arc<Set>,
    b: Arc<Set>,
    ascending: Option<bool>,
    state: Arc<UnionState>,
}

#[derive(Default)]
struct UnionState {
    genlist: OnceCell<Arc<Vec<RevId>>>,
    asclist: OnceCell<Arc<Vec<RevId>>>,
    min: OnceCell<Option<RevId>>,
    max: OnceCell<Option<RevId>>,
}

/// Reversing a direction-less union materialises it.
pub(crate) enum UnionReverse {
    Union(UnionSet),
    Base(BaseSet),
}

impl UnionSet {
    pub(crate) fn new(a: Set, b: Set) -> Self {
        UnionSet {
            a: Arc::new(a),
            b: Arc::new(b),
            ascending: None,
            state: Default::default(),
        }
    }

    pub(crate) fn operands(&self) -> (&Set, &Set) {
        (&self.a, &self.b)
    }

    /// Concatenation order, deduplicated, materialised once.
    fn genlist(&self) -> Result<Arc<Vec<RevId>>> {
        self.state
            .genlist
            .get_or_try_init(|| {
                let mut list = Vec::new();
                let mut it = self.concat_iter()?;
                while let Some(rev) = it.next() {
                    list.push(rev?);
                }
                Ok(Arc::new(list))
            })
            .map(|list| list.clone())
    }

    /// Sorted rendition of the concatenation, materialised once.
    fn asclist(&self) -> Result<Arc<Vec<RevId>>> {
        self.state
            .asclist
            .get_or_try_init(|| {
                let mut list: Vec<RevId> = self.genlist()?.as_ref().clone();
                list.sort_unstable();
                Ok(Arc::new(list))
            })
            .map(|list| list.clone())
    }

    fn concat_iter(&self) -> Result<RevIter> {
        Ok(Box::new(ConcatIter {
            a_iter: Some(self.a.iter()?),
            b_iter: self.b.iter()?,
            a: self.a.clone(),
        }))
    }

    /// Fast iterator of one operand in the requested direction, or
    /// that operand fully materialised and sorted.
    fn operand_iter(op: &Set, ascending: bool) -> Result<RevIter> {
        let fast = if ascending {
            op.fast_asc()?
        } else {
            op.fast_desc()?
        };
        match fast {
            Some(it) => Ok(it),
            None => {
                let mut list = Vec::new();
                for rev in op.iter()? {
                    list.push(rev?);
                }
                list.sort_unstable();
                if !ascending {
                    list.reverse();
                }
                Ok(Box::new(list.into_iter().map(Ok)))
            }
        }
    }

    pub(crate) fn sort(&self, reverse: bool) -> UnionSet {
        let mut set = self.clone();
        set.ascending = Some(!reverse);
        set
    }

    pub(crate) fn reverse(&self) -> Result<UnionReverse> {
        match self.ascending {
            Some(asc) => {
                let mut set = self.clone();
                set.ascending = Some(!asc);
                Ok(UnionReverse::Union(set))
            }
            None => {
                // Insertion order: materialise the reversal.
                let mut list: Vec<RevId> = self.genlist()?.as_ref().clone();
                list.reverse();
                Ok(UnionReverse::Base(BaseSet::from_list(
                    self.a.repo_ref(),
                    list,
                )))
            }
        }
    }

    fn computed_min(&self) -> Result<Option<RevId>> {
        if let Some(mut it) = self.fast_asc()? {
            return it.next().transpose();
        }
        Ok(self.asclist()?.first().copied())
    }

    fn computed_max(&self) -> Result<Option<RevId>> {
        if let Some(mut it) = self.fast_desc()? {
            return it.next().transpose();
        }
        Ok(self.asclist()?.last().copied())
    }
}

/// Concatenation: all of `a`, then elements of `b` not in `a`.
struct ConcatIter {
    a_iter: Option<RevIter>,
    b_iter: RevIter,
    a: Arc<Set>,
}

impl Iterator for ConcatIter {
    type Item = Result<RevId>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(a_iter) = self.a_iter.as_mut() {
            match a_iter.next() {
                Some(item) => return Some(item),
                None => self.a_iter = None,
            }
        }
        loop {
            let rev = match self.b_iter.next()? {
                Ok(rev) => rev,
                Err(e) => return Some(Err(e)),
            };
            match self.a.contains(rev) {
                Ok(true) => continue,
                Ok(false) => return Some(Ok(rev)),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Ordered merge of two same-direction iterators, deduplicating heads
/// that compare equal.
struct OrderedMergeIter {
    it1: RevIter,
    it2: RevIter,
    head1: Option<RevId>,
    head2: Option<RevId>,
    done1: bool,
    done2: bool,
    ascending: bool,
}

impl OrderedMergeIter {
    fn new(it1: RevIter, it2: RevIter, ascending: bool) -> Self {
        OrderedMergeIter {
            it1,
            it2,
            head1: None,
            head2: None,
            done1: false,
            done2: false,
            ascending,
        }
    }
}

impl Iterator for OrderedMergeIter {
    type Item = Result<RevId>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.head1.is_none() && !self.done1 {
            match self.it1.next() {
                Some(Ok(rev)) => self.head1 = Some(rev),
                Some(Err(e)) => return Some(Err(e)),
                None => self.done1 = true,
            }
        }
        if self.head2.is_none() && !self.done2 {
            match self.it2.next() {
                Some(Ok(rev)) => self.head2 = Some(rev),
                Some(Err(e)) => return Some(Err(e)),
                None => self.done2 = true,
            }
        }
        let next = match (self.head1, self.head2) {
            (Some(v1), Some(v2)) => {
                if self.ascending {
                    v1.min(v2)
                } else {
                    v1.max(v2)
                }
            }
            (Some(v1), None) => v1,
            (None, Some(v2)) => v2,
            (None, None) => return None,
        };
        if self.head1 == Some(next) {
            self.head1 = None;
        }
        if self.head2 == Some(next) {
            self.head2 = None;
        }
        Some(Ok(next))
    }
}

impl RevSet for UnionSet {
    fn contains(&self, rev: RevId) -> Result<bool> {
        Ok(self.a.contains(rev)? || self.b.contains(rev)?)
    }

    fn iter(&self) -> Result<RevIter> {
        match self.ascending {
            None => match self.state.genlist.get() {
                Some(list) => Ok(arc_vec_iter(list.clone(), false)),
                None => self.concat_iter(),
            },
            Some(asc) => {
                if let Some(list) = self.state.asclist.get() {
                    return Ok(arc_vec_iter(list.clone(), !asc));
                }
                let fast1 = if asc {
                    self.a.fast_asc()?
                } else {
                    self.a.fast_desc()?
                };
                let fast2 = if asc {
                    self.b.fast_asc()?
                } else {
                    self.b.fast_desc()?
                };
                match (fast1, fast2) {
                    (Some(it1), Some(it2)) => {
                        Ok(Box::new(OrderedMergeIter::new(it1, it2, asc)))
                    }
                    (None, None) => {
                        // Neither side can produce the order cheaply:
                        // materialise once and reuse.
                        tracing::debug!("union falls back to a materialised ascending list");
                        Ok(arc_vec_iter(self.asclist()?, !asc))
                    }
                    (fast1, fast2) => {
                        let it1 = match fast1 {
                            Some(it) => it,
                            None => Self::operand_iter(&self.a, asc)?,
                        };
                        let it2 = match fast2 {
                            Some(it) => it,
                            None => Self::operand_iter(&self.b, asc)?,
                        };
                        Ok(Box::new(OrderedMergeIter::new(it1, it2, asc)))
                    }
                }
            }
        }
    }

    fn fast_asc(&self) -> Result<Option<RevIter>> {
        if let Some(list) = self.state.asclist.get() {
            return Ok(Some(arc_vec_iter(list.clone(), false)));
        }
        match (self.a.fast_asc()?, self.b.fast_asc()?) {
            (Some(it1), Some(it2)) => Ok(Some(Box::new(OrderedMergeIter::new(it1, it2, true)))),
            _ => Ok(None),
        }
    }

    fn fast_desc(&self) -> Result<Option<RevIter>> {
        if let Some(list) = self.state.asclist.get() {
            return Ok(Some(arc_vec_iter(list.clone(), true)));
        }
        match (self.a.fast_desc()?, self.b.fast_desc()?) {
            (Some(it1), Some(it2)) => Ok(Some(Box::new(OrderedMergeIter::new(it1, it2, false)))),
            _ => Ok(None),
        }
    }

    fn len(&self) -> Result<u64> {
        // The sorted list has the same elements; prefer whichever is
        // already materialised.
        if let Some(list) = self.state.asclist.get() {
            return Ok(list.len() as u64);
        }
        Ok(self.genlist()?.len() as u64)
    }

    fn size_hint(&self) -> Option<u64> {
        self.state
            .asclist
            .get()
            .or_else(|| self.state.genlist.get())
            .map(|list| list.len() as u64)
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.a.is_empty()? && self.b.is_empty()?)
    }

    fn first(&self) -> Result<Option<RevId>> {
        self.iter()?.next().transpose()
    }

    fn last(&self) -> Result<Option<RevId>> {
        match self.ascending {
            None => Ok(self.genlist()?.last().copied()),
            Some(asc) => {
                let mut flipped = self.clone();
                flipped.ascending = Some(!asc);
                flipped.first()
            }
        }
    }

    fn min(&self) -> Result<Option<RevId>> {
        self.state
            .min
            .get_or_try_init(|| self.computed_min())
            .map(|v| *v)
    }

    fn max(&self) -> Result<Option<RevId>> {
        self.state
            .max
            .get_or_try_init(|| self.computed_max())
            .map(|v| *v)
    }

    fn direction(&self) -> Direction {
        match self.ascending {
            None => Direction::Unspecified,
            Some(true) => Direction::Ascending,
            Some(false) => Direction::Descending,
        }
    }

    fn repo(&self) -> Result<Repo> {
        self.a.repo().or_else(|_| self.b.repo())
    }
}

impl fmt::Debug for UnionSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "<unionset{} {:?}, {:?}>",
            self.direction().decoration(),
            self.a,
            self.b
        )
    }
}
