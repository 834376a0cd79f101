use crate::id::Direction;
use crate::id::RevId;
use crate::repo::Repo;
use crate::repo::RepoRef;
use crate::set::arc_vec_iter;
use crate::set::RevIter;
use crate::set::RevSet;
use crate::Result;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;

/// Memoising wrapper around a one-shot stream of ids.
///
/// The stream is pulled lazily; everything pulled so far is kept so
/// the set can be iterated any number of times. Membership checks pull
/// just far enough to decide, and an optional monotonicity hint lets
/// them stop as soon as the stream has passed the queried id.
#[derive(Clone)]
pub struct GeneratorSet {
    repo: RepoRef,
    state: Arc<GenState>,
    ascending: bool,
}

struct GenState {
    inner: Mutex<GenInner>,
    asclist: OnceCell<Arc<Vec<RevId>>>,
    /// `Some(true)` promises the stream yields ascending ids,
    /// `Some(false)` descending.
    hint: Option<bool>,
}

struct GenInner {
    stream: Option<Box<dyn Iterator<Item = RevId> + Send>>,
    list: Vec<RevId>,
    cache: HashMap<RevId, bool>,
    /// Prefix of `list` whose values have been admitted to `cache`.
    checked: usize,
}

impl GeneratorSet {
    pub(crate) fn repo_ref(&self) -> RepoRef {
        self.repo.clone()
    }

    pub(crate) fn new(
        repo: RepoRef,
        stream: Box<dyn Iterator<Item = RevId> + Send>,
        hint: Option<bool>,
    ) -> Self {
        GeneratorSet {
            repo,
            state: Arc::new(GenState {
                inner: Mutex::new(GenInner {
                    stream: Some(stream),
                    list: Vec::new(),
                    cache: HashMap::new(),
                    checked: 0,
                }),
                asclist: OnceCell::new(),
                hint,
            }),
            ascending: true,
        }
    }

    pub(crate) fn sort(&self, reverse: bool) -> GeneratorSet {
        let mut set = self.clone();
        set.ascending = !reverse;
        set
    }

    pub(crate) fn reverse(&self) -> GeneratorSet {
        let mut set = self.clone();
        set.ascending = !self.ascending;
        set
    }

    fn finished(&self) -> bool {
        self.state.inner.lock().unwrap().stream.is_none()
    }

    /// Value at stream position `pos`, pulling the stream forward as
    /// needed. `None` once the stream is exhausted before `pos`.
    fn pull_at(&self, pos: usize) -> Option<RevId> {
        let mut inner = self.state.inner.lock().unwrap();
        while inner.list.len() <= pos {
            let item = inner.stream.as_mut()?.next();
            match item {
                Some(rev) => inner.list.push(rev),
                None => {
                    inner.stream = None;
                    return None;
                }
            }
        }
        Some(inner.list[pos])
    }

    /// Exhaust the stream and build the sorted list once.
    fn asclist(&self) -> Arc<Vec<RevId>> {
        self.state
            .asclist
            .get_or_init(|| {
                let mut pos = self.state.inner.lock().unwrap().list.len();
                while self.pull_at(pos).is_some() {
                    pos += 1;
                }
                let mut list = self.state.inner.lock().unwrap().list.clone();
                list.sort_unstable();
                list.dedup();
                Arc::new(list)
            })
            .clone()
    }

    fn contains_impl(&self, rev: RevId) -> bool {
        let mut inner = self.state.inner.lock().unwrap();
        if let Some(&known) = inner.cache.get(&rev) {
            return known;
        }
        loop {
            let value = if inner.checked < inner.list.len() {
                inner.list[inner.checked]
            } else {
                let item = inner.stream.as_mut().and_then(|s| s.next());
                match item {
                    Some(value) => {
                        inner.list.push(value);
                        value
                    }
                    None => {
                        inner.stream = None;
                        break;
                    }
                }
            };
            inner.checked += 1;
            inner.cache.insert(value, true);
            if value == rev {
                return true;
            }
            // A monotone stream cannot yield the queried id later.
            match self.state.hint {
                Some(true) if value > rev => break,
                Some(false) if value < rev => break,
                _ => (),
            }
        }
        inner.cache.insert(rev, false);
        false
    }
}

/// Replays pulled values, then continues pulling the shared stream.
struct GenStreamIter {
    set: GeneratorSet,
    pos: usize,
}

impl Iterator for GenStreamIter {
    type Item = Result<RevId>;

    fn next(&mut self) -> Option<Self::Item> {
        let rev = self.set.pull_at(self.pos)?;
        self.pos += 1;
        Some(Ok(rev))
    }
}

impl RevSet for GeneratorSet {
    fn contains(&self, rev: RevId) -> Result<bool> {
        Ok(self.contains_impl(rev))
    }

    fn iter(&self) -> Result<RevIter> {
        if !self.finished() && self.state.hint == Some(self.ascending) {
            // The stream itself runs in the requested direction.
            return Ok(Box::new(GenStreamIter {
                set: self.clone(),
                pos: 0,
            }));
        }
        let list = self.asclist();
        Ok(arc_vec_iter(list, !self.ascending))
    }

    fn fast_asc(&self) -> Result<Option<RevIter>> {
        if self.finished() {
            Ok(Some(arc_vec_iter(self.asclist(), false)))
        } else {
            Ok(None)
        }
    }

    fn fast_desc(&self) -> Result<Option<RevIter>> {
        if self.finished() {
            Ok(Some(arc_vec_iter(self.asclist(), true)))
        } else {
            Ok(None)
        }
    }

    fn len(&self) -> Result<u64> {
        Ok(self.asclist().len() as u64)
    }

    fn size_hint(&self) -> Option<u64> {
        if self.finished() {
            Some(self.asclist().len() as u64)
        } else {
            None
        }
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.pull_at(0).is_none())
    }

    fn first(&self) -> Result<Option<RevId>> {
        if !self.finished() && self.state.hint == Some(self.ascending) {
            return Ok(self.pull_at(0));
        }
        let list = self.asclist();
        Ok(if self.ascending {
            list.first().copied()
        } else {
            list.last().copied()
        })
    }

    fn last(&self) -> Result<Option<RevId>> {
        if !self.finished() && self.state.hint == Some(!self.ascending) {
            return Ok(self.pull_at(0));
        }
        let list = self.asclist();
        Ok(if self.ascending {
            list.last().copied()
        } else {
            list.first().copied()
        })
    }

    fn min(&self) -> Result<Option<RevId>> {
        if !self.finished() && self.state.hint == Some(true) {
            return Ok(self.pull_at(0));
        }
        Ok(self.asclist().first().copied())
    }

    fn max(&self) -> Result<Option<RevId>> {
        if !self.finished() && self.state.hint == Some(false) {
            return Ok(self.pull_at(0));
        }
        Ok(self.asclist().last().copied())
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

impl fmt::Debug for GeneratorSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<generatorset{}>", self.direction().decoration())
    }
}
