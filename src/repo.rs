use crate::backend::DagBackend;
use crate::backend::IdMap;
use crate::backend::TextSource;
use crate::error::Error;
use crate::prefetch::PrefetchRegistry;
use crate::progress::ProgressRegistry;
use crate::set::Set;
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::Weak;

/// Repository handle bundling the services the engine needs: the DAG
/// backend, the id/hash translator, the commit-text source, and the
/// prefetch and progress tables.
///
/// `Repo` is cheap to clone (shared ownership). Every set holds a weak
/// back-reference to the bundle; dropping the last `Repo` is never
/// blocked by live sets, but any set operation that still needs the
/// services afterwards fails with [`Error::RepoGone`].
#[derive(Clone)]
pub struct Repo {
    inner: Arc<RepoInner>,
}

pub(crate) struct RepoInner {
    dag: Arc<dyn DagBackend>,
    idmap: Arc<dyn IdMap>,
    texts: Arc<dyn TextSource>,
    prefetch: PrefetchRegistry,
    progress: ProgressRegistry,
    cached_sets: Mutex<HashMap<&'static str, Set>>,
}

impl Repo {
    /// Bundle the given services into a repository handle.
    pub fn new(
        dag: Arc<dyn DagBackend>,
        idmap: Arc<dyn IdMap>,
        texts: Arc<dyn TextSource>,
    ) -> Self {
        Repo {
            inner: Arc::new(RepoInner {
                dag,
                idmap,
                texts,
                prefetch: PrefetchRegistry::with_builtins(),
                progress: ProgressRegistry::default(),
                cached_sets: Default::default(),
            }),
        }
    }

    /// Obtains the DAG backend.
    pub fn dag(&self) -> &dyn DagBackend {
        &*self.inner.dag
    }

    /// Obtains the id/hash translator.
    pub fn idmap(&self) -> &dyn IdMap {
        &*self.inner.idmap
    }

    /// Obtains the commit-text source.
    pub fn texts(&self) -> &dyn TextSource {
        &*self.inner.texts
    }

    /// Obtains the prefetch tables owned by this repository.
    pub fn prefetch(&self) -> &PrefetchRegistry {
        &self.inner.prefetch
    }

    /// Obtains the progress registry owned by this repository.
    pub fn progress(&self) -> &ProgressRegistry {
        &self.inner.progress
    }

    /// Compute a set once and remember it under `name`. Later calls
    /// return a clone of the remembered set. Build errors are not
    /// remembered.
    ///
    /// The builder runs outside the table lock, so it may itself ask
    /// for other cached sets. If two builds race, the first insert
    /// wins and the loser's set is discarded.
    pub fn cached_set(
        &self,
        name: &'static str,
        build: impl FnOnce(&Repo) -> Result<Set>,
    ) -> Result<Set> {
        let cached = self.inner.cached_sets.lock().unwrap().get(name).cloned();
        if let Some(set) = cached {
            return Ok(set);
        }
        let set = build(self)?;
        let mut table = self.inner.cached_sets.lock().unwrap();
        Ok(table.entry(name).or_insert(set).clone())
    }

    pub(crate) fn downgrade(&self) -> RepoRef {
        RepoRef(Arc::downgrade(&self.inner))
    }
}

/// Weak back-reference from a set to its repository.
#[derive(Clone)]
pub(crate) struct RepoRef(Weak<RepoInner>);

impl RepoRef {
    /// Resolve to the owning repository, or fail if it was dropped.
    pub(crate) fn repo(&self) -> Result<Repo> {
        match self.0.upgrade() {
            Some(inner) => Ok(Repo { inner }),
            None => Err(Error::RepoGone),
        }
    }
}
