use crate::backend::DagHandle;
use crate::id::is_virtual;
use crate::id::Direction;
use crate::id::RevId;
use crate::repo::Repo;
use crate::repo::RepoRef;
use crate::set::RevIter;
use crate::set::RevSet;
use crate::spans::Spans;
use crate::Result;
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;

/// Which native operator to route into the DAG backend.
#[derive(Copy, Clone, Debug)]
pub(crate) enum NativeOp {
    Intersect,
    Union,
    Difference,
}

/// Set wrapping a hash-keyed set handle owned by the DAG backend. The
/// only representation that may be lazy: membership, iteration and
/// length all defer to the backend, and the iteration direction comes
/// from backend hints rather than from a materialised list.
///
/// A `reversed` flag flips the hinted order without touching the
/// underlying handle; `sort` resets the flag and re-sorts through the
/// backend when no hint is available.
#[derive(Clone)]
pub struct NameSet {
    repo: RepoRef,
    state: Arc<NameState>,
    reversed: bool,
}

struct NameState {
    handle: DagHandle,
    min: OnceCell<Option<RevId>>,
    max: OnceCell<Option<RevId>>,
}

impl NameState {
    fn new(handle: DagHandle) -> Self {
        NameState {
            handle,
            min: OnceCell::new(),
            max: OnceCell::new(),
        }
    }
}

impl NameSet {
    pub(crate) fn from_dag(repo: RepoRef, handle: DagHandle, reversed: bool) -> Self {
        NameSet {
            repo,
            state: Arc::new(NameState::new(handle)),
            reversed,
        }
    }

    /// Ids in `low..=high` that the repository actually has, as a
    /// hash-keyed set. The backend hands the span set back hinted
    /// descending; `ascending` flips it through the reversed flag.
    pub(crate) fn range(repo: &Repo, low: RevId, high: RevId, ascending: bool) -> Result<NameSet> {
        let spans = if low > high {
            Spans::empty()
        } else {
            Spans::unsafe_range(low.max(0), high).intersection(&repo.dag().all_ids()?)
        };
        let handle = repo.dag().set_from_spans(&spans)?;
        Ok(NameSet::from_dag(repo.downgrade(), handle, ascending))
    }

    pub(crate) fn handle(&self) -> &DagHandle {
        &self.state.handle
    }

    pub(crate) fn repo_ref(&self) -> RepoRef {
        self.repo.clone()
    }

    /// Direction promised by the backend hints, before the reversed
    /// flag is applied.
    fn hint_dir(&self) -> Option<bool> {
        let hints = self.state.handle.hints();
        if hints.is_desc() {
            Some(false)
        } else if hints.is_asc() {
            Some(true)
        } else {
            None
        }
    }

    /// Direction the set iterates in: the hinted order, flipped by
    /// the reversed flag.
    fn effective_dir(&self) -> Option<bool> {
        self.hint_dir().map(|asc| asc != self.reversed)
    }

    /// Iterate ids in the set's current order, translating hashes as
    /// they stream out.
    fn iter_ids(&self) -> Result<RevIter> {
        let repo = self.repo.repo()?;
        let hashes = if self.reversed {
            repo.dag().rev_iter(&self.state.handle)?
        } else {
            repo.dag().iter(&self.state.handle)?
        };
        let iter = hashes.map(move |hash| repo.idmap().hash_to_id(&hash?));
        Ok(Box::new(iter))
    }

    fn end_hash_to_id(&self, last: bool) -> Result<Option<RevId>> {
        let repo = self.repo.repo()?;
        let hash = if last {
            repo.dag().last_hash(&self.state.handle)?
        } else {
            repo.dag().first_hash(&self.state.handle)?
        };
        match hash {
            Some(hash) => Ok(Some(repo.idmap().hash_to_id(&hash)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn reverse(&self) -> NameSet {
        NameSet {
            repo: self.repo.clone(),
            state: self.state.clone(),
            reversed: !self.reversed,
        }
    }

    pub(crate) fn sort(&self, reverse: bool) -> Result<NameSet> {
        let state = if self.hint_dir().is_none() {
            tracing::debug!("sorting unhinted dag set through the backend");
            let sorted = self.repo.repo()?.dag().sort(&self.state.handle)?;
            Arc::new(NameState::new(sorted))
        } else {
            self.state.clone()
        };
        let hints = state.handle.hints();
        let ascending = if hints.is_desc() {
            Some(false)
        } else if hints.is_asc() {
            Some(true)
        } else {
            None
        };
        let reversed = if reverse {
            ascending == Some(true)
        } else {
            ascending == Some(false)
        };
        Ok(NameSet {
            repo: self.repo.clone(),
            state,
            reversed,
        })
    }

    pub(crate) fn sort_by_topology(&self) -> Result<NameSet> {
        let sorted = self.repo.repo()?.dag().sort_by_topology(&self.state.handle)?;
        Ok(NameSet::from_dag(self.repo.clone(), sorted, false))
    }

    /// Run a native backend operator against another handle, then
    /// re-apply this set's direction to the result.
    pub(crate) fn native_op(&self, op: NativeOp, other: &DagHandle) -> Result<NameSet> {
        let repo = self.repo.repo()?;
        let handle = match op {
            NativeOp::Intersect => repo.dag().intersect(&self.state.handle, other)?,
            NativeOp::Union => repo.dag().union(&self.state.handle, other)?,
            NativeOp::Difference => repo.dag().difference(&self.state.handle, other)?,
        };
        self.reapply_direction(NameSet::from_dag(self.repo.clone(), handle, false))
    }

    /// Preserve iteration order across a native operation, the same
    /// way `sort` would establish it.
    pub(crate) fn reapply_direction(&self, result: NameSet) -> Result<NameSet> {
        if self.is_ascending() {
            result.sort(false)
        } else if self.is_descending() {
            result.sort(true)
        } else {
            Ok(result)
        }
    }

    /// Window the set without materialising it. `start`/`stop` are
    /// already validated as non-negative.
    pub(crate) fn slice(&self, start: i64, stop: i64) -> Result<SliceOutcome> {
        let mut take = stop - start;
        let mut skip = start;
        if self.reversed {
            // The backend set only supports skipping from its natural
            // end. Translate the window so skipping from the other end
            // of the set still selects the requested ids.
            let len = self.len()? as i64;
            skip = len - take - start;
            if skip < 0 {
                take += skip;
                skip = 0;
            }
        }
        if take <= 0 {
            return Ok(SliceOutcome::Empty);
        }
        let repo = self.repo.repo()?;
        let handle = repo
            .dag()
            .skip_take(&self.state.handle, skip as u64, take as u64)?;
        let result = NameSet::from_dag(self.repo.clone(), handle, false);
        Ok(SliceOutcome::Name(self.reapply_direction(result)?))
    }
}

/// Result of a lazy slice: either a windowed dag set or nothing.
pub(crate) enum SliceOutcome {
    Name(NameSet),
    Empty,
}

impl RevSet for NameSet {
    fn contains(&self, rev: RevId) -> Result<bool> {
        if is_virtual(rev) {
            // Dag sets never contain virtual ids. Do not bother the
            // IdMap.
            return Ok(false);
        }
        let repo = self.repo.repo()?;
        let hash = match repo.idmap().id_to_hash(rev) {
            Ok(hash) => hash,
            Err(e) if e.is_not_found() => return Ok(false),
            Err(e) => return Err(e),
        };
        repo.dag().contains_hash(&self.state.handle, &hash)
    }

    fn iter(&self) -> Result<RevIter> {
        self.iter_ids()
    }

    fn fast_asc(&self) -> Result<Option<RevIter>> {
        if self.effective_dir() == Some(true) {
            Ok(Some(self.iter_ids()?))
        } else {
            Ok(None)
        }
    }

    fn fast_desc(&self) -> Result<Option<RevIter>> {
        if self.effective_dir() == Some(false) {
            Ok(Some(self.iter_ids()?))
        } else {
            Ok(None)
        }
    }

    fn len(&self) -> Result<u64> {
        self.repo.repo()?.dag().len(&self.state.handle)
    }

    fn size_hint(&self) -> Option<u64> {
        self.state.handle.hints().size_hint()
    }

    fn is_empty(&self) -> Result<bool> {
        if self.state.handle.hints().is_empty() {
            return Ok(true);
        }
        let repo = self.repo.repo()?;
        Ok(repo.dag().first_hash(&self.state.handle)?.is_none())
    }

    fn first(&self) -> Result<Option<RevId>> {
        self.end_hash_to_id(self.reversed)
    }

    fn last(&self) -> Result<Option<RevId>> {
        self.end_hash_to_id(!self.reversed)
    }

    fn min(&self) -> Result<Option<RevId>> {
        self.state
            .min
            .get_or_try_init(|| match self.hint_dir() {
                Some(false) => self.end_hash_to_id(true),
                Some(true) => self.end_hash_to_id(false),
                None => {
                    let mut result = None;
                    for rev in self.iter_ids()? {
                        let rev = rev?;
                        if result.map_or(true, |m| rev < m) {
                            result = Some(rev);
                        }
                    }
                    Ok(result)
                }
            })
            .map(|v| *v)
    }

    fn max(&self) -> Result<Option<RevId>> {
        self.state
            .max
            .get_or_try_init(|| match self.hint_dir() {
                Some(false) => self.end_hash_to_id(false),
                Some(true) => self.end_hash_to_id(true),
                None => {
                    let mut result = None;
                    for rev in self.iter_ids()? {
                        let rev = rev?;
                        if result.map_or(true, |m| rev > m) {
                            result = Some(rev);
                        }
                    }
                    Ok(result)
                }
            })
            .map(|v| *v)
    }

    fn direction(&self) -> Direction {
        match self.effective_dir() {
            Some(true) => Direction::Ascending,
            Some(false) => Direction::Descending,
            None => Direction::Unspecified,
        }
    }

    fn repo(&self) -> Result<Repo> {
        self.repo.repo()
    }
}

impl fmt::Debug for NameSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "<nameset{} {:?}>",
            self.direction().decoration(),
            self.state.handle
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::set::tests::unwrap_ids;
    use crate::testutil::TestRepo;

    fn range(repo: &TestRepo, low: RevId, high: RevId, ascending: bool) -> NameSet {
        NameSet::range(repo.repo(), low, high, ascending).unwrap()
    }

    #[test]
    fn test_range_iteration() -> Result<()> {
        let repo = TestRepo::new(6);
        let set = range(&repo, 1, 4, false);
        assert_eq!(unwrap_ids(set.iter()?), [4, 3, 2, 1]);
        assert_eq!(unwrap_ids(set.reverse().iter()?), [1, 2, 3, 4]);
        assert_eq!(set.len()?, 4);
        Ok(())
    }

    #[test]
    fn test_contains_absorbs_lookup_misses() -> Result<()> {
        let repo = TestRepo::new(6);
        let set = range(&repo, 0, 5, false);
        assert!(set.contains(3)?);
        assert!(!set.contains(100)?);
        assert!(!set.contains(crate::id::NULL_ID)?);
        assert!(!set.contains(crate::id::WDIR_ID)?);
        Ok(())
    }

    #[test]
    fn test_fast_paths_follow_hints() -> Result<()> {
        let repo = TestRepo::new(6);
        let set = range(&repo, 0, 5, false);
        assert!(set.fast_desc()?.is_some());
        assert!(set.fast_asc()?.is_none());
        let reversed = set.reverse();
        assert!(reversed.fast_asc()?.is_some());
        assert!(reversed.fast_desc()?.is_none());
        Ok(())
    }

    #[test]
    fn test_sort_resets_reversed() -> Result<()> {
        let repo = TestRepo::new(6);
        let set = range(&repo, 0, 5, true);
        assert!(set.is_ascending());
        let sorted = set.sort(true)?;
        assert!(sorted.is_descending());
        assert_eq!(unwrap_ids(sorted.iter()?), [5, 4, 3, 2, 1, 0]);
        Ok(())
    }

    #[test]
    fn test_min_max_use_hints() -> Result<()> {
        let repo = TestRepo::new(10);
        let set = range(&repo, 2, 7, false);
        assert_eq!(set.min()?, Some(2));
        assert_eq!(set.max()?, Some(7));
        // Memoised: a second call returns the same values.
        assert_eq!(set.min()?, Some(2));
        assert_eq!(set.max()?, Some(7));
        Ok(())
    }

    #[test]
    fn test_slice_without_materialising() -> Result<()> {
        let repo = TestRepo::new(10);
        let set = range(&repo, 0, 9, false);
        match set.slice(2, 5)? {
            SliceOutcome::Name(s) => assert_eq!(unwrap_ids(s.iter()?), [7, 6, 5]),
            SliceOutcome::Empty => panic!("expected a window"),
        }
        // Reversed coordinates translate to the other end.
        let asc = set.reverse();
        match asc.slice(2, 5)? {
            SliceOutcome::Name(s) => assert_eq!(unwrap_ids(s.iter()?), [2, 3, 4]),
            SliceOutcome::Empty => panic!("expected a window"),
        }
        // Oversized skip on a reversed set shrinks the take.
        match asc.slice(8, 100)? {
            SliceOutcome::Name(s) => assert_eq!(unwrap_ids(s.iter()?), [8, 9]),
            SliceOutcome::Empty => panic!("expected a window"),
        }
        match set.slice(3, 3)? {
            SliceOutcome::Empty => (),
            SliceOutcome::Name(_) => panic!("expected empty"),
        }
        Ok(())
    }
}
