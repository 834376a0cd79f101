//! In-memory backend and repo for tests.
//!
//! `MemDag` keeps `count` commits with ids `0..count` and deterministic
//! hashes, and implements every collaborator trait the engine needs.
//! It has no real graph topology; topological order degrades to id
//! order, which is all the set algebra needs to be exercised.

use crate::backend::DagBackend;
use crate::backend::DagHandle;
use crate::backend::HashIter;
use crate::backend::IdMap;
use crate::backend::TextSource;
use crate::error::Error;
use crate::hints::HintFlags;
use crate::hints::Hints;
use crate::id::Hash20;
use crate::id::RevId;
use crate::id::NULL_HASH;
use crate::id::WDIR_HASH;
use crate::repo::Repo;
use crate::spans::Spans;
use crate::Result;
use std::collections::HashMap;
use std::collections::HashSet;
use std::ops::Deref;
use std::sync::Arc;

/// Deterministic hash for a test commit id.
pub fn test_hash(id: RevId) -> Hash20 {
    let mut hash = [0u8; 20];
    hash[..8].copy_from_slice(&id.to_be_bytes());
    for (i, byte) in hash[8..].iter_mut().enumerate() {
        *byte = (id as u8).wrapping_mul(31).wrapping_add(i as u8 + 1);
    }
    hash
}

/// In-memory DAG backend, IdMap and text source.
pub struct MemDag {
    hashes: Vec<Hash20>,
    ids: HashMap<Hash20, RevId>,
}

struct MemSet {
    hashes: Vec<Hash20>,
    lookup: HashSet<Hash20>,
}

impl MemDag {
    /// Backend with commits `0..count`.
    pub fn new(count: usize) -> Self {
        let hashes: Vec<Hash20> = (0..count as RevId).map(test_hash).collect();
        let ids = hashes
            .iter()
            .enumerate()
            .map(|(id, hash)| (*hash, id as RevId))
            .collect();
        MemDag { hashes, ids }
    }

    fn handle(&self, hashes: Vec<Hash20>, flags: HintFlags) -> DagHandle {
        let hints = Hints::new(flags).with_size(hashes.len() as u64);
        let lookup = hashes.iter().copied().collect();
        DagHandle::new(Arc::new(MemSet { hashes, lookup }), hints)
    }

    fn mem<'a>(&self, set: &'a DagHandle) -> Result<&'a MemSet> {
        set.downcast_ref::<MemSet>()
            .ok_or(Error::ProgrammingError("foreign set handle"))
    }

    fn id_of(&self, hash: &Hash20) -> Result<RevId> {
        self.ids
            .get(hash)
            .copied()
            .ok_or_else(|| Error::commit_not_found_hash(hash))
    }
}

impl DagBackend for MemDag {
    fn all_ids(&self) -> Result<Spans> {
        Ok(if self.hashes.is_empty() {
            Spans::empty()
        } else {
            Spans::unsafe_range(0, self.hashes.len() as RevId - 1)
        })
    }

    fn set_from_hashes(&self, hashes: Vec<Hash20>) -> Result<DagHandle> {
        let mut seen = HashSet::new();
        let hashes: Vec<Hash20> = hashes.into_iter().filter(|h| seen.insert(*h)).collect();
        Ok(self.handle(hashes, HintFlags::empty()))
    }

    fn set_from_spans(&self, spans: &Spans) -> Result<DagHandle> {
        let hashes: Vec<Hash20> = spans
            .iter_desc()
            .filter_map(|id| self.hashes.get(id as usize).copied())
            .collect();
        Ok(self.handle(hashes, HintFlags::DESC))
    }

    fn sort(&self, set: &DagHandle) -> Result<DagHandle> {
        let mem = self.mem(set)?;
        let mut pairs: Vec<(RevId, Hash20)> = Vec::with_capacity(mem.hashes.len());
        for hash in &mem.hashes {
            pairs.push((self.id_of(hash)?, *hash));
        }
        pairs.sort_unstable_by(|a, b| b.0.cmp(&a.0));
        let hashes = pairs.into_iter().map(|(_, hash)| hash).collect();
        Ok(self.handle(hashes, HintFlags::DESC))
    }

    fn sort_by_topology(&self, set: &DagHandle) -> Result<DagHandle> {
        // No parent information here; topological order degrades to
        // newest-first id order, without a numeric direction promise.
        let sorted = self.sort(set)?;
        let mem = self.mem(&sorted)?;
        Ok(self.handle(mem.hashes.clone(), HintFlags::empty()))
    }

    fn union(&self, a: &DagHandle, b: &DagHandle) -> Result<DagHandle> {
        let (a, b) = (self.mem(a)?, self.mem(b)?);
        let mut hashes = a.hashes.clone();
        hashes.extend(b.hashes.iter().filter(|h| !a.lookup.contains(*h)));
        Ok(self.handle(hashes, HintFlags::empty()))
    }

    fn intersect(&self, a: &DagHandle, b: &DagHandle) -> Result<DagHandle> {
        let (a, b) = (self.mem(a)?, self.mem(b)?);
        let hashes = a
            .hashes
            .iter()
            .filter(|h| b.lookup.contains(*h))
            .copied()
            .collect();
        Ok(self.handle(hashes, HintFlags::empty()))
    }

    fn difference(&self, a: &DagHandle, b: &DagHandle) -> Result<DagHandle> {
        let (a, b) = (self.mem(a)?, self.mem(b)?);
        let hashes = a
            .hashes
            .iter()
            .filter(|h| !b.lookup.contains(*h))
            .copied()
            .collect();
        Ok(self.handle(hashes, HintFlags::empty()))
    }

    fn contains_hash(&self, set: &DagHandle, hash: &Hash20) -> Result<bool> {
        Ok(self.mem(set)?.lookup.contains(hash))
    }

    fn iter(&self, set: &DagHandle) -> Result<HashIter> {
        let hashes = self.mem(set)?.hashes.clone();
        Ok(Box::new(hashes.into_iter().map(Ok)))
    }

    fn rev_iter(&self, set: &DagHandle) -> Result<HashIter> {
        let hashes = self.mem(set)?.hashes.clone();
        Ok(Box::new(hashes.into_iter().rev().map(Ok)))
    }

    fn len(&self, set: &DagHandle) -> Result<u64> {
        Ok(self.mem(set)?.hashes.len() as u64)
    }

    fn first_hash(&self, set: &DagHandle) -> Result<Option<Hash20>> {
        Ok(self.mem(set)?.hashes.first().copied())
    }

    fn last_hash(&self, set: &DagHandle) -> Result<Option<Hash20>> {
        Ok(self.mem(set)?.hashes.last().copied())
    }

    fn skip_take(&self, set: &DagHandle, skip: u64, take: u64) -> Result<DagHandle> {
        let mem = self.mem(set)?;
        let hashes: Vec<Hash20> = mem
            .hashes
            .iter()
            .skip(skip as usize)
            .take(take as usize)
            .copied()
            .collect();
        let flags = set.hints().flags() & (HintFlags::ASC | HintFlags::DESC);
        Ok(self.handle(hashes, flags))
    }
}

impl IdMap for MemDag {
    fn id_to_hash(&self, id: RevId) -> Result<Hash20> {
        if id >= 0 && (id as usize) < self.hashes.len() {
            Ok(self.hashes[id as usize])
        } else {
            Err(Error::commit_not_found_rev(id))
        }
    }

    fn hash_to_id(&self, hash: &Hash20) -> Result<RevId> {
        self.id_of(hash)
    }
}

impl TextSource for MemDag {
    fn read_texts(&self, hashes: &[Hash20]) -> Result<Vec<Vec<u8>>> {
        hashes
            .iter()
            .map(|hash| {
                if *hash == NULL_HASH || *hash == WDIR_HASH {
                    return Ok(Vec::new());
                }
                let id = self.id_of(hash)?;
                Ok(format!("commit {}\n", id).into_bytes())
            })
            .collect()
    }
}

/// Repo for testing purpose, backed by [`MemDag`].
pub struct TestRepo {
    repo: Repo,
}

impl TestRepo {
    /// A repo with commits `0..count`.
    pub fn new(count: usize) -> Self {
        let backend = Arc::new(MemDag::new(count));
        let repo = Repo::new(backend.clone(), backend.clone(), backend);
        TestRepo { repo }
    }

    /// The repository handle.
    pub fn repo(&self) -> &Repo {
        &self.repo
    }

    pub(crate) fn downgrade(&self) -> crate::repo::RepoRef {
        self.repo.downgrade()
    }
}

impl Deref for TestRepo {
    type Target = Repo;
    fn deref(&self) -> &Repo {
        &self.repo
    }
}

/// Iterator that counts how many items it has yielded; used to observe
/// how far a generator set advanced its stream.
pub struct CountingIter {
    inner: std::vec::IntoIter<RevId>,
    count: Arc<std::sync::atomic::AtomicUsize>,
}

impl CountingIter {
    /// The iterator plus the shared yield counter.
    pub fn new(ids: Vec<RevId>) -> (CountingIter, Arc<std::sync::atomic::AtomicUsize>) {
        let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        (
            CountingIter {
                inner: ids.into_iter(),
                count: count.clone(),
            },
            count,
        )
    }
}

impl Iterator for CountingIter {
    type Item = RevId;

    fn next(&mut self) -> Option<RevId> {
        let item = self.inner.next();
        if item.is_some() {
            self.count
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
        item
    }
}
