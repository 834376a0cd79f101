use crate::id::Direction;
use crate::id::RevId;
use crate::repo::Repo;
use crate::repo::RepoRef;
use crate::set::arc_vec_iter;
use crate::set::RevIter;
use crate::set::RevSet;
use crate::Result;
use once_cell::sync::OnceCell;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Eager set materialised from an ordered list or an unordered hash
/// set of ids. The only representation that may contain the virtual
/// revisions.
///
/// Built from a list, iteration preserves insertion order until
/// `sort` assigns a direction. Built from a hash set, the direction is
/// forced ascending for determinism.
#[derive(Clone)]
pub struct BaseSet {
    repo: RepoRef,
    data: Arc<BaseData>,
    ascending: Option<bool>,
    repr: Option<&'static str>,
}

struct BaseData {
    list: OnceCell<Arc<Vec<RevId>>>,
    set: OnceCell<Arc<HashSet<RevId>>>,
    asc_list: OnceCell<Arc<Vec<RevId>>>,
}

impl BaseData {
    fn from_list(list: Vec<RevId>) -> Self {
        let data = BaseData::empty();
        let _ = data.list.set(Arc::new(list));
        data
    }

    fn empty() -> Self {
        BaseData {
            list: OnceCell::new(),
            set: OnceCell::new(),
            asc_list: OnceCell::new(),
        }
    }
}

impl BaseSet {
    /// Preserves insertion order; direction starts unspecified.
    pub(crate) fn from_list(repo: RepoRef, list: Vec<RevId>) -> Self {
        BaseSet {
            repo,
            data: Arc::new(BaseData::from_list(list)),
            ascending: None,
            repr: None,
        }
    }

    /// Unordered input; direction forced ascending for determinism.
    pub(crate) fn from_hash_set(repo: RepoRef, set: HashSet<RevId>) -> Self {
        let data = BaseData::empty();
        let _ = data.set.set(Arc::new(set));
        BaseSet {
            repo,
            data: Arc::new(data),
            ascending: Some(true),
            repr: None,
        }
    }

    /// Attach a static label shown in `Debug` output.
    pub(crate) fn with_repr(mut self, repr: &'static str) -> Self {
        self.repr = Some(repr);
        self
    }

    fn list(&self) -> Arc<Vec<RevId>> {
        self.data
            .list
            .get_or_init(|| {
                // Only lazily constructed when built from a hash set.
                let set = self.data.set.get().expect("list or set is populated");
                Arc::new(set.iter().copied().collect())
            })
            .clone()
    }

    fn hash_set(&self) -> Arc<HashSet<RevId>> {
        self.data
            .set
            .get_or_init(|| Arc::new(self.list().iter().copied().collect()))
            .clone()
    }

    fn asc_list(&self) -> Arc<Vec<RevId>> {
        self.data
            .asc_list
            .get_or_init(|| {
                let mut list: Vec<RevId> = self.list().as_ref().clone();
                list.sort_unstable();
                Arc::new(list)
            })
            .clone()
    }

    pub(crate) fn ids(&self) -> Vec<RevId> {
        self.list().as_ref().clone()
    }

    fn stored_len(&self) -> u64 {
        let len = match self.data.list.get() {
            Some(list) => list.len(),
            None => self.data.set.get().map_or(0, |set| set.len()),
        };
        len as u64
    }

    pub(crate) fn repo_ref(&self) -> RepoRef {
        self.repo.clone()
    }

    /// True if any member is a virtual revision. Those members must
    /// never be routed into the DAG layer.
    pub(crate) fn has_virtual(&self) -> bool {
        let set = self.hash_set();
        set.contains(&crate::id::NULL_ID) || set.contains(&crate::id::WDIR_ID)
    }

    pub(crate) fn sort(&self, reverse: bool) -> BaseSet {
        let mut set = self.clone();
        set.ascending = Some(!reverse);
        set
    }

    pub(crate) fn reverse(&self) -> BaseSet {
        match self.ascending {
            None => {
                // Insertion order: materialise the reversal.
                let mut list: Vec<RevId> = self.list().as_ref().clone();
                list.reverse();
                let data = BaseData::from_list(list);
                if let Some(set) = self.data.set.get() {
                    let _ = data.set.set(set.clone());
                }
                if let Some(asc) = self.data.asc_list.get() {
                    let _ = data.asc_list.set(asc.clone());
                }
                BaseSet {
                    repo: self.repo.clone(),
                    data: Arc::new(data),
                    ascending: None,
                    repr: self.repr,
                }
            }
            Some(asc) => {
                let mut set = self.clone();
                set.ascending = Some(!asc);
                set
            }
        }
    }

    pub(crate) fn slice(&self, start: usize, stop: usize) -> BaseSet {
        let clamp = |list: &[RevId], start: usize, stop: usize| -> Vec<RevId> {
            let len = list.len();
            let start = start.min(len);
            let stop = stop.min(len).max(start);
            list[start..stop].to_vec()
        };
        match self.ascending {
            None => BaseSet::from_list(self.repo.clone(), clamp(&self.list(), start, stop)),
            Some(asc) => {
                let data = self.asc_list();
                let len = data.len();
                let (start, stop) = if asc {
                    (start, stop)
                } else {
                    (len.saturating_sub(stop), len.saturating_sub(start))
                };
                let mut set = BaseSet::from_list(self.repo.clone(), clamp(&data, start, stop));
                set.ascending = Some(asc);
                set
            }
        }
    }

    /// Hash-set algebra fast path for intersection and difference.
    /// Only taken once this set has a defined direction, so the result
    /// order is well defined.
    pub(crate) fn fast_intersect(&self, other: &BaseSet) -> Option<BaseSet> {
        self.fast_set_op(other, |a, b| a.intersection(b).copied().collect())
    }

    pub(crate) fn fast_difference(&self, other: &BaseSet) -> Option<BaseSet> {
        self.fast_set_op(other, |a, b| a.difference(b).copied().collect())
    }

    fn fast_set_op(
        &self,
        other: &BaseSet,
        op: impl Fn(&HashSet<RevId>, &HashSet<RevId>) -> HashSet<RevId>,
    ) -> Option<BaseSet> {
        let ascending = self.ascending?;
        let result = op(&self.hash_set(), &other.hash_set());
        let mut set = BaseSet::from_hash_set(self.repo.clone(), result);
        set.ascending = Some(ascending);
        Some(set)
    }
}

impl RevSet for BaseSet {
    fn contains(&self, rev: RevId) -> Result<bool> {
        Ok(self.hash_set().contains(&rev))
    }

    fn iter(&self) -> Result<RevIter> {
        Ok(match self.ascending {
            None => arc_vec_iter(self.list(), false),
            Some(true) => arc_vec_iter(self.asc_list(), false),
            Some(false) => arc_vec_iter(self.asc_list(), true),
        })
    }

    fn fast_asc(&self) -> Result<Option<RevIter>> {
        Ok(Some(arc_vec_iter(self.asc_list(), false)))
    }

    fn fast_desc(&self) -> Result<Option<RevIter>> {
        Ok(Some(arc_vec_iter(self.asc_list(), true)))
    }

    fn len(&self) -> Result<u64> {
        Ok(self.stored_len())
    }

    fn size_hint(&self) -> Option<u64> {
        Some(self.stored_len())
    }

    fn first(&self) -> Result<Option<RevId>> {
        Ok(match self.ascending {
            None => self.list().first().copied(),
            Some(true) => self.asc_list().first().copied(),
            Some(false) => self.asc_list().last().copied(),
        })
    }

    fn last(&self) -> Result<Option<RevId>> {
        Ok(match self.ascending {
            None => self.list().last().copied(),
            Some(true) => self.asc_list().last().copied(),
            Some(false) => self.asc_list().first().copied(),
        })
    }

    fn direction(&self) -> Direction {
        match self.ascending {
            None => Direction::Unspecified,
            Some(true) => Direction::Ascending,
            Some(false) => Direction::Descending,
        }
    }

    fn repo(&self) -> Result<Repo> {
        self.repo.repo()
    }
}

impl fmt::Debug for BaseSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<baseset{}", self.direction().decoration())?;
        if let Some(repr) = self.repr {
            write!(f, " {}>", repr)
        } else if self.ascending.is_some() {
            // A list built from a hash set has no stable order; show
            // the sorted rendition.
            write!(f, " {:?}>", self.asc_list())
        } else {
            write!(f, " {:?}>", self.list())
        }
    }
}
