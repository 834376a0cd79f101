use crate::baseset::BaseSet;
use crate::id::Direction;
use crate::id::RevId;
use crate::repo::Repo;
use crate::repo::RepoRef;
use crate::set::RevIter;
use crate::set::RevSet;
use crate::spans::Spans;
use crate::Result;
use std::fmt;
use std::sync::Arc;

/// Set backed by the span-compressed integer representation the DAG
/// uses for id-keyed sets. Defaults to descending iteration, newest
/// first.
#[derive(Clone)]
pub struct IdSet {
    repo: RepoRef,
    spans: Arc<Spans>,
    ascending: bool,
}

impl IdSet {
    pub(crate) fn from_spans(repo: RepoRef, spans: Spans) -> Self {
        IdSet {
            repo,
            spans: Arc::new(spans),
            ascending: false,
        }
    }

    pub(crate) fn from_ids(repo: RepoRef, ids: impl IntoIterator<Item = RevId>) -> Self {
        Self::from_spans(repo, Spans::from_ids(ids))
    }

    /// Ids in `low..=high` that the repository actually has. The span
    /// is intersected with the DAG's "all ids" set, which filters out
    /// invalid ids. `low > high` produces the empty set.
    pub(crate) fn range(repo: &Repo, low: RevId, high: RevId, ascending: bool) -> Result<IdSet> {
        let spans = if low > high {
            Spans::empty()
        } else {
            // Spans cannot cover virtual revisions; the all-ids
            // intersection would drop them anyway.
            Spans::unsafe_range(low.max(0), high).intersection(&repo.dag().all_ids()?)
        };
        let mut set = IdSet::from_spans(repo.downgrade(), spans);
        set.ascending = ascending;
        Ok(set)
    }

    pub(crate) fn spans(&self) -> &Spans {
        &self.spans
    }

    pub(crate) fn repo_ref(&self) -> RepoRef {
        self.repo.clone()
    }

    pub(crate) fn sort(&self, reverse: bool) -> IdSet {
        let mut set = self.clone();
        set.ascending = !reverse;
        set
    }

    pub(crate) fn reverse(&self) -> IdSet {
        let mut set = self.clone();
        set.ascending = !self.ascending;
        set
    }

    fn with_spans(&self, spans: Spans) -> IdSet {
        IdSet {
            repo: self.repo.clone(),
            spans: Arc::new(spans),
            ascending: self.ascending,
        }
    }

    /// Native span algebra, preserving the current direction.
    pub(crate) fn fast_intersect(&self, other: &IdSet) -> IdSet {
        self.with_spans(self.spans.intersection(other.spans()))
    }

    pub(crate) fn fast_difference(&self, other: &IdSet) -> IdSet {
        self.with_spans(self.spans.difference(other.spans()))
    }

    pub(crate) fn fast_union(&self, other: &IdSet) -> IdSet {
        self.with_spans(self.spans.union(other.spans()))
    }

    /// Intersection and difference with an eager set convert it to
    /// spans on the fly. Virtual revisions cannot intersect a span set
    /// and cannot be subtracted from one, so they are simply skipped
    /// by the conversion.
    pub(crate) fn fast_intersect_base(&self, other: &BaseSet) -> IdSet {
        self.with_spans(self.spans.intersection(&Spans::from_ids(other.ids())))
    }

    pub(crate) fn fast_difference_base(&self, other: &BaseSet) -> IdSet {
        self.with_spans(self.spans.difference(&Spans::from_ids(other.ids())))
    }

    /// Union with an eager set is only safe when it has no virtual
    /// revisions; those must not leak into the span representation.
    pub(crate) fn fast_union_base(&self, other: &BaseSet) -> Option<IdSet> {
        if other.has_virtual() {
            return None;
        }
        Some(self.with_spans(self.spans.union(&Spans::from_ids(other.ids()))))
    }
}

impl RevSet for IdSet {
    fn contains(&self, rev: RevId) -> Result<bool> {
        Ok(self.spans.contains(rev))
    }

    fn iter(&self) -> Result<RevIter> {
        let iter = if self.ascending {
            self.spans.iter_asc()
        } else {
            self.spans.iter_desc()
        };
        Ok(Box::new(iter.map(Ok)))
    }

    fn fast_asc(&self) -> Result<Option<RevIter>> {
        Ok(Some(Box::new(self.spans.iter_asc().map(Ok))))
    }

    fn fast_desc(&self) -> Result<Option<RevIter>> {
        Ok(Some(Box::new(self.spans.iter_desc().map(Ok))))
    }

    fn len(&self) -> Result<u64> {
        Ok(self.spans.count())
    }

    fn size_hint(&self) -> Option<u64> {
        Some(self.spans.count())
    }

    fn first(&self) -> Result<Option<RevId>> {
        Ok(if self.ascending {
            self.spans.min()
        } else {
            self.spans.max()
        })
    }

    fn last(&self) -> Result<Option<RevId>> {
        Ok(if self.ascending {
            self.spans.max()
        } else {
            self.spans.min()
        })
    }

    fn min(&self) -> Result<Option<RevId>> {
        Ok(self.spans.min())
    }

    fn max(&self) -> Result<Option<RevId>> {
        Ok(self.spans.max())
    }

    fn direction(&self) -> Direction {
        if self.ascending {
            Direction::Ascending
        } else {
            Direction::Descending
        }
    }

    fn repo(&self) -> Result<Repo> {
        self.repo.repo()
    }
}

impl fmt::Debug for IdSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "<idset{} {:?}>",
            self.direction().decoration(),
            self.spans
        )
    }
}

/// The distinguished set of every revision in the repository, always
/// ascending. Intersection with it is the identity, which makes it a
/// cheap filter for stripping invalid ids from constructed spans.
#[derive(Clone)]
pub struct FullRepoSet(pub(crate) IdSet);

impl FullRepoSet {
    pub(crate) fn new(repo: &Repo) -> Result<FullRepoSet> {
        Ok(FullRepoSet(IdSet::range(
            repo,
            0,
            crate::id::MAX_ID,
            true,
        )?))
    }
}

impl RevSet for FullRepoSet {
    fn contains(&self, rev: RevId) -> Result<bool> {
        self.0.contains(rev)
    }

    fn iter(&self) -> Result<RevIter> {
        self.0.iter()
    }

    fn fast_asc(&self) -> Result<Option<RevIter>> {
        self.0.fast_asc()
    }

    fn fast_desc(&self) -> Result<Option<RevIter>> {
        self.0.fast_desc()
    }

    fn len(&self) -> Result<u64> {
        self.0.len()
    }

    fn size_hint(&self) -> Option<u64> {
        self.0.size_hint()
    }

    fn first(&self) -> Result<Option<RevId>> {
        self.0.first()
    }

    fn last(&self) -> Result<Option<RevId>> {
        self.0.last()
    }

    fn min(&self) -> Result<Option<RevId>> {
        self.0.min()
    }

    fn max(&self) -> Result<Option<RevId>> {
        self.0.max()
    }

    fn direction(&self) -> Direction {
        self.0.direction()
    }

    fn repo(&self) -> Result<Repo> {
        self.0.repo()
    }
}

impl fmt::Debug for FullRepoSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "<fullreposet{} {:?}>",
            self.0.direction().decoration(),
            self.0.spans
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::set::tests::unwrap_ids;
    use crate::testutil::TestRepo;

    #[test]
    fn test_descending_by_default() -> Result<()> {
        let repo = TestRepo::new(20);
        let set = IdSet::from_ids(repo.downgrade(), vec![1, 3, 2, 4, 11, 10]);
        assert_eq!(unwrap_ids(set.iter()?), [11, 10, 4, 3, 2, 1]);
        assert_eq!(unwrap_ids(set.reverse().iter()?), [1, 2, 3, 4, 10, 11]);
        assert_eq!(set.len()?, 6);
        assert_eq!(set.min()?, Some(1));
        assert_eq!(set.max()?, Some(11));
        assert_eq!(format!("{:?}", set), "<idset- [1..=4 10 11]>");
        Ok(())
    }

    #[test]
    fn test_first_last_follow_direction() -> Result<()> {
        let repo = TestRepo::new(30);
        let set = IdSet::from_ids(repo.downgrade(), vec![2, 3, 4, 5, 20]);
        let asc = set.sort(false);
        assert_eq!(asc.first()?, Some(2));
        assert_eq!(asc.last()?, Some(20));
        let desc = set.sort(true);
        assert_eq!(desc.first()?, Some(20));
        assert_eq!(desc.last()?, Some(2));
        Ok(())
    }

    #[test]
    fn test_native_algebra_keeps_direction() -> Result<()> {
        let repo = TestRepo::new(30);
        let xs = IdSet::from_ids(repo.downgrade(), vec![1, 2, 3, 4, 10, 11]).sort(false);
        let ys = IdSet::from_ids(repo.downgrade(), vec![2, 3, 4, 5, 20]);
        assert_eq!(format!("{:?}", xs.fast_intersect(&ys)), "<idset+ [2 3 4]>");
        assert_eq!(format!("{:?}", xs.fast_difference(&ys)), "<idset+ [1 10 11]>");
        assert_eq!(
            format!("{:?}", xs.fast_union(&ys)),
            "<idset+ [1..=5 10 11 20]>"
        );
        Ok(())
    }

    #[test]
    fn test_range_filters_invalid_ids() -> Result<()> {
        let repo = TestRepo::new(6);
        let set = IdSet::range(repo.repo(), 4, 100, true)?;
        assert_eq!(unwrap_ids(set.iter()?), [4, 5]);
        assert!(IdSet::range(repo.repo(), 5, 2, true)?.spans().is_empty());
        Ok(())
    }

    #[test]
    fn test_union_with_virtual_members_declines() {
        let repo = TestRepo::new(6);
        let ids = IdSet::from_ids(repo.downgrade(), vec![1, 2]);
        let base = BaseSet::from_list(repo.downgrade(), vec![crate::id::NULL_ID, 3]);
        assert!(ids.fast_union_base(&base).is_none());
        let clean = BaseSet::from_list(repo.downgrade(), vec![3, 4]);
        assert_eq!(
            format!("{:?}", ids.fast_union_base(&clean).unwrap()),
            "<idset- [1..=4]>"
        );
    }

    #[test]
    fn test_fullreposet() -> Result<()> {
        let repo = TestRepo::new(4);
        let full = FullRepoSet::new(repo.repo())?;
        assert_eq!(unwrap_ids(full.iter()?), [0, 1, 2, 3]);
        assert!(full.is_ascending());
        Ok(())
    }
}
