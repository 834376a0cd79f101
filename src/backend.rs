//! Traits implemented by the native DAG layer.
//!
//! The engine never looks at how the backend stores its graph. It only
//! asks for span sets covering all known ids, for hash-keyed set
//! handles, and for id/hash translation. All concurrency coordination
//! for reads lives behind these traits.

use crate::hints::Hints;
use crate::id::Hash20;
use crate::id::RevId;
use crate::spans::Spans;
use crate::Result;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Iterator over commit hashes produced by a backend set.
pub type HashIter = Box<dyn Iterator<Item = Result<Hash20>> + Send>;

/// Opaque, cheaply cloneable handle to a hash-keyed set owned by the
/// DAG backend. The payload is only meaningful to the backend that
/// created it; the engine reads the attached [`Hints`] and passes the
/// handle back into [`DagBackend`] methods.
#[derive(Clone)]
pub struct DagHandle {
    payload: Arc<dyn Any + Send + Sync>,
    hints: Hints,
}

impl DagHandle {
    /// Wrap a backend payload with its hints.
    pub fn new(payload: Arc<dyn Any + Send + Sync>, hints: Hints) -> Self {
        DagHandle { payload, hints }
    }

    /// The backend payload. Backends downcast this to their own type.
    pub fn payload(&self) -> &Arc<dyn Any + Send + Sync> {
        &self.payload
    }

    /// Downcast the payload to a concrete backend set type.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    /// Hints attached by the backend.
    pub fn hints(&self) -> &Hints {
        &self.hints
    }
}

impl fmt::Debug for DagHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<dag set {:?}>", self.hints)
    }
}

/// Read-only operations the engine needs from the commit DAG.
pub trait DagBackend: Send + Sync {
    /// Span set covering every id the DAG tracks.
    fn all_ids(&self) -> Result<Spans>;

    /// Build a set handle from explicit hashes, preserving their order.
    /// The handle carries no direction hints.
    fn set_from_hashes(&self, hashes: Vec<Hash20>) -> Result<DagHandle>;

    /// Build a set handle covering the given spans. The natural
    /// iteration order is descending by id and hinted as such.
    fn set_from_spans(&self, spans: &Spans) -> Result<DagHandle>;

    /// Sort a set by id, newest first. The result is hinted descending.
    fn sort(&self, set: &DagHandle) -> Result<DagHandle>;

    /// Re-order a set topologically (parents after children). The
    /// result carries no numeric direction hints.
    fn sort_by_topology(&self, set: &DagHandle) -> Result<DagHandle>;

    /// Hashes in either set. No duplicates in the result.
    fn union(&self, a: &DagHandle, b: &DagHandle) -> Result<DagHandle>;

    /// Hashes in both sets.
    fn intersect(&self, a: &DagHandle, b: &DagHandle) -> Result<DagHandle>;

    /// Hashes in `a` but not `b`.
    fn difference(&self, a: &DagHandle, b: &DagHandle) -> Result<DagHandle>;

    /// Membership test.
    fn contains_hash(&self, set: &DagHandle, hash: &Hash20) -> Result<bool>;

    /// Iterate the set in its natural order.
    fn iter(&self, set: &DagHandle) -> Result<HashIter>;

    /// Iterate the set in the reverse of its natural order.
    fn rev_iter(&self, set: &DagHandle) -> Result<HashIter>;

    /// Total number of hashes. May force a lazy set.
    fn len(&self, set: &DagHandle) -> Result<u64>;

    /// First hash in natural order, or `None` if empty.
    fn first_hash(&self, set: &DagHandle) -> Result<Option<Hash20>>;

    /// Last hash in natural order, or `None` if empty.
    fn last_hash(&self, set: &DagHandle) -> Result<Option<Hash20>>;

    /// Drop `skip` leading hashes, keep at most `take`, preserving the
    /// natural order and its hints.
    fn skip_take(&self, set: &DagHandle, skip: u64, take: u64) -> Result<DagHandle>;
}

/// Translation between revision ids and commit hashes. The IdMap is
/// the only translator; lookup misses are reported as
/// [`CommitNotFound`](crate::Error::CommitNotFound).
pub trait IdMap: Send + Sync {
    /// Id to hash.
    fn id_to_hash(&self, id: RevId) -> Result<Hash20>;

    /// Hash to id.
    fn hash_to_id(&self, hash: &Hash20) -> Result<RevId>;

    /// Batched id to hash used for set conversion. Unknown ids come
    /// back as `None` instead of failing the whole batch.
    fn ids_to_hashes(&self, ids: &[RevId]) -> Result<Vec<Option<Hash20>>> {
        ids.iter()
            .map(|&id| match self.id_to_hash(id) {
                Ok(hash) => Ok(Some(hash)),
                Err(e) if e.is_not_found() => Ok(None),
                Err(e) => Err(e),
            })
            .collect()
    }
}

/// Batched access to raw commit text, used by the `"text"` prefetch
/// pipeline.
pub trait TextSource: Send + Sync {
    /// Raw text for each hash, in order.
    fn read_texts(&self, hashes: &[Hash20]) -> Result<Vec<Vec<u8>>>;
}
