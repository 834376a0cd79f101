//! The set facade and its combinators.
//!
//! Every representation satisfies [`RevSet`]. [`Set`] is the closed
//! tagged value consumers hold; its combinators dispatch on the
//! concrete representations so native fast paths are a `match`, not a
//! dynamic probe, and fall back to generic membership/iteration paths
//! when no fast path applies.

use crate::backend::DagHandle;
use crate::baseset::BaseSet;
use crate::error::Error;
use crate::filteredset::FilteredSet;
use crate::filteredset::Predicate;
use crate::generatorset::GeneratorSet;
use crate::id::is_virtual;
use crate::id::Direction;
use crate::id::RevId;
use crate::id::MAX_ID;
use crate::id::NULL_ID;
use crate::idset::FullRepoSet;
use crate::idset::IdSet;
use crate::nameset::NameSet;
use crate::nameset::NativeOp;
use crate::nameset::SliceOutcome;
use crate::prefetch::ctx_stream;
use crate::prefetch::CtxIter;
use crate::repo::Repo;
use crate::repo::RepoRef;
use crate::unionset::UnionReverse;
use crate::unionset::UnionSet;
use crate::Result;
use std::collections::BTreeSet;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Iterator over revision ids produced by a set.
pub type RevIter = Box<dyn Iterator<Item = Result<RevId>> + Send>;

/// Iterator over a shared id list, forward or backward.
pub(crate) fn arc_vec_iter(list: Arc<Vec<RevId>>, reversed: bool) -> RevIter {
    Box::new(ArcVecIter {
        list,
        pos: 0,
        reversed,
    })
}

struct ArcVecIter {
    list: Arc<Vec<RevId>>,
    pos: usize,
    reversed: bool,
}

impl Iterator for ArcVecIter {
    type Item = Result<RevId>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.list.len() {
            return None;
        }
        let idx = if self.reversed {
            self.list.len() - 1 - self.pos
        } else {
            self.pos
        };
        self.pos += 1;
        Some(Ok(self.list[idx]))
    }
}

/// Operations every set representation supports.
///
/// Membership never depends on iteration state, `iter` respects the
/// current direction, and `fast_asc`/`fast_desc` only exist when the
/// requested order can be produced without materialising the whole
/// set.
pub trait RevSet {
    /// Membership test. `CommitNotFound` lookup misses are absorbed
    /// and answer `false`.
    fn contains(&self, rev: RevId) -> Result<bool>;

    /// Iterate ids in the set's current direction.
    fn iter(&self) -> Result<RevIter>;

    /// Ascending iterator, only if available without materialisation.
    fn fast_asc(&self) -> Result<Option<RevIter>>;

    /// Descending iterator, only if available without materialisation.
    fn fast_desc(&self) -> Result<Option<RevIter>>;

    /// Total number of ids. May force a lazy set.
    fn len(&self) -> Result<u64>;

    /// The length, only if cheaply available.
    fn size_hint(&self) -> Option<u64>;

    /// True if the set has no ids. Cheaper than `len` for lazy sets.
    fn is_empty(&self) -> Result<bool> {
        match self.iter()?.next() {
            Some(Err(e)) => Err(e),
            Some(Ok(_)) => Ok(false),
            None => Ok(true),
        }
    }

    /// First id the current iteration would yield.
    fn first(&self) -> Result<Option<RevId>> {
        self.iter()?.next().transpose()
    }

    /// Last id the current iteration would yield.
    fn last(&self) -> Result<Option<RevId>> {
        let mut result = None;
        for rev in self.iter()? {
            result = Some(rev?);
        }
        Ok(result)
    }

    /// Smallest id in the set.
    fn min(&self) -> Result<Option<RevId>> {
        if let Some(mut it) = self.fast_asc()? {
            return it.next().transpose();
        }
        let mut result = None;
        for rev in self.iter()? {
            let rev = rev?;
            if result.map_or(true, |m| rev < m) {
                result = Some(rev);
            }
        }
        Ok(result)
    }

    /// Largest id in the set.
    fn max(&self) -> Result<Option<RevId>> {
        if let Some(mut it) = self.fast_desc()? {
            return it.next().transpose();
        }
        let mut result = None;
        for rev in self.iter()? {
            let rev = rev?;
            if result.map_or(true, |m| rev > m) {
                result = Some(rev);
            }
        }
        Ok(result)
    }

    /// The raw direction state of this set.
    fn direction(&self) -> Direction;

    /// True if iteration yields increasing ids. A set cheaply known to
    /// hold at most one id is trivially both ascending and descending.
    fn is_ascending(&self) -> bool {
        self.size_hint().map_or(false, |n| n <= 1) || self.direction() == Direction::Ascending
    }

    /// True if iteration yields decreasing ids.
    fn is_descending(&self) -> bool {
        self.size_hint().map_or(false, |n| n <= 1) || self.direction() == Direction::Descending
    }

    /// The owning repository, or `RepoGone` after it was dropped.
    fn repo(&self) -> Result<Repo>;
}

#[derive(Clone)]
pub(crate) enum Inner {
    Base(BaseSet),
    Id(IdSet),
    Name(NameSet),
    Filtered(FilteredSet),
    Union(UnionSet),
    Generator(GeneratorSet),
    Full(FullRepoSet),
}

/// A set of revisions: one of the concrete representations plus the
/// prefetch fields attached to it.
///
/// Sets are immutable values; combinators return new sets and share
/// internal caches where the semantics allow it. Cloning is cheap.
#[derive(Clone)]
pub struct Set {
    inner: Inner,
    fields: BTreeSet<String>,
}

impl Set {
    fn wrap(inner: Inner, fields: BTreeSet<String>) -> Set {
        Set { inner, fields }
    }

    pub(crate) fn from_base(set: BaseSet) -> Set {
        Set::wrap(Inner::Base(set), Default::default())
    }

    pub(crate) fn from_id(set: IdSet) -> Set {
        Set::wrap(Inner::Id(set), Default::default())
    }

    pub(crate) fn from_name(set: NameSet) -> Set {
        Set::wrap(Inner::Name(set), Default::default())
    }

    fn query(&self) -> &dyn RevSet {
        match &self.inner {
            Inner::Base(s) => s,
            Inner::Id(s) => s,
            Inner::Name(s) => s,
            Inner::Filtered(s) => s,
            Inner::Union(s) => s,
            Inner::Generator(s) => s,
            Inner::Full(s) => s,
        }
    }

    pub(crate) fn repo_ref(&self) -> RepoRef {
        match &self.inner {
            Inner::Base(s) => s.repo_ref(),
            Inner::Id(s) => s.repo_ref(),
            Inner::Name(s) => s.repo_ref(),
            Inner::Filtered(s) => s.subset().repo_ref(),
            Inner::Union(s) => s.operands().0.repo_ref(),
            Inner::Generator(s) => s.repo_ref(),
            Inner::Full(s) => s.0.repo_ref(),
        }
    }

    fn merged_fields(&self, other: &Set) -> BTreeSet<String> {
        self.fields.union(&other.fields).cloned().collect()
    }

    /// Ids in both sets. The result follows this set's direction.
    pub fn intersect(&self, other: &Set) -> Result<Set> {
        let fields = self.merged_fields(other);
        // Everything is in the full repo set: identity both ways. The
        // receiver-side identity boldly assumes the other operand only
        // contains valid ids.
        if let Inner::Full(_) = other.inner {
            return Ok(Set::wrap(self.inner.clone(), fields));
        }
        if let Inner::Full(full) = &self.inner {
            let sorted = other.sort(full.is_descending())?;
            return Ok(Set::wrap(sorted.inner, fields));
        }
        let inner = match (&self.inner, &other.inner) {
            (Inner::Base(a), Inner::Base(b)) => match a.fast_intersect(b) {
                Some(s) => Inner::Base(s),
                None => self.generic_intersect(other),
            },
            (Inner::Base(a), Inner::Name(b)) => {
                match base_name_op(a, b, NativeOp::Intersect)? {
                    Some(inner) => inner,
                    None => self.generic_intersect(other),
                }
            }
            (Inner::Id(a), Inner::Id(b)) => Inner::Id(a.fast_intersect(b)),
            (Inner::Id(a), Inner::Base(b)) => Inner::Id(a.fast_intersect_base(b)),
            (Inner::Name(a), _) => match name_op(a, other, NativeOp::Intersect)? {
                Some(inner) => inner,
                None => self.generic_intersect(other),
            },
            _ => self.generic_intersect(other),
        };
        Ok(Set::wrap(inner, fields))
    }

    /// Ids in this set but not the other. The result follows this
    /// set's direction.
    pub fn subtract(&self, other: &Set) -> Result<Set> {
        let fields = self.merged_fields(other);
        let inner = match (&self.inner, &other.inner) {
            (Inner::Base(a), Inner::Base(b)) => match a.fast_difference(b) {
                Some(s) => Inner::Base(s),
                None => self.generic_subtract(other),
            },
            (Inner::Base(a), Inner::Name(b)) if !a.has_virtual() => {
                // A virtual member must survive subtraction; the dag
                // route would lose it.
                match base_name_op(a, b, NativeOp::Difference)? {
                    Some(inner) => inner,
                    None => self.generic_subtract(other),
                }
            }
            (Inner::Id(a), Inner::Id(b)) => Inner::Id(a.fast_difference(b)),
            (Inner::Id(a), Inner::Base(b)) => Inner::Id(a.fast_difference_base(b)),
            (Inner::Full(a), Inner::Id(b)) => Inner::Id(a.0.fast_difference(b)),
            (Inner::Full(a), Inner::Base(b)) => Inner::Id(a.0.fast_difference_base(b)),
            (Inner::Name(a), _) => match name_op(a, other, NativeOp::Difference)? {
                Some(inner) => inner,
                None => self.generic_subtract(other),
            },
            _ => self.generic_subtract(other),
        };
        Ok(Set::wrap(inner, fields))
    }

    /// Ids in either set, deduplicated.
    ///
    /// The dag-native fast paths preserve the receiver's direction
    /// attribute but not the generic concatenation interleaving; see
    /// DESIGN notes.
    pub fn union(&self, other: &Set) -> Result<Set> {
        let fields = self.merged_fields(other);
        let inner = match (&self.inner, &other.inner) {
            (Inner::Id(a), Inner::Id(b)) => Inner::Id(a.fast_union(b)),
            (Inner::Id(a), Inner::Base(b)) => match a.fast_union_base(b) {
                Some(s) => Inner::Id(s),
                None => self.generic_union(other),
            },
            (Inner::Full(a), Inner::Id(b)) => Inner::Id(a.0.fast_union(b)),
            (Inner::Full(a), Inner::Base(b)) => match a.0.fast_union_base(b) {
                Some(s) => Inner::Id(s),
                None => self.generic_union(other),
            },
            (Inner::Name(a), _) => match name_op(a, other, NativeOp::Union)? {
                Some(inner) => inner,
                None => self.generic_union(other),
            },
            _ => self.generic_union(other),
        };
        Ok(Set::wrap(inner, fields))
    }

    fn generic_intersect(&self, other: &Set) -> Inner {
        tracing::trace!("intersection takes the generic membership path");
        let other = other.clone();
        let predicate = Predicate::builtin(move |rev| other.contains(rev));
        Inner::Filtered(FilteredSet::new(self.clone(), predicate))
    }

    fn generic_subtract(&self, other: &Set) -> Inner {
        tracing::trace!("difference takes the generic membership path");
        let other = other.clone();
        let predicate =
            Predicate::builtin(move |rev| Ok(!other.contains(rev)?)).with_repr("<not>");
        Inner::Filtered(FilteredSet::new(self.clone(), predicate))
    }

    fn generic_union(&self, other: &Set) -> Inner {
        Inner::Union(UnionSet::new(self.clone(), other.clone()))
    }

    /// Keep only ids the predicate accepts. Lazy; the result inherits
    /// this set's direction.
    pub fn filter(&self, predicate: Predicate) -> Set {
        Set::wrap(
            Inner::Filtered(FilteredSet::new(self.clone(), predicate)),
            self.fields.clone(),
        )
    }

    /// Iterate ascending (`reverse` false) or descending.
    pub fn sort(&self, reverse: bool) -> Result<Set> {
        let inner = match &self.inner {
            Inner::Base(s) => Inner::Base(s.sort(reverse)),
            Inner::Id(s) => Inner::Id(s.sort(reverse)),
            Inner::Name(s) => Inner::Name(s.sort(reverse)?),
            Inner::Filtered(s) => Inner::Filtered(s.sort(reverse)?),
            Inner::Union(s) => Inner::Union(s.sort(reverse)),
            Inner::Generator(s) => Inner::Generator(s.sort(reverse)),
            Inner::Full(s) => Inner::Full(FullRepoSet(s.0.sort(reverse))),
        };
        Ok(Set::wrap(inner, self.fields.clone()))
    }

    /// Flip the iteration order.
    pub fn reverse(&self) -> Result<Set> {
        let inner = match &self.inner {
            Inner::Base(s) => Inner::Base(s.reverse()),
            Inner::Id(s) => Inner::Id(s.reverse()),
            Inner::Name(s) => Inner::Name(s.reverse()),
            Inner::Filtered(s) => Inner::Filtered(s.reverse()?),
            Inner::Union(s) => match s.reverse()? {
                UnionReverse::Union(u) => Inner::Union(u),
                UnionReverse::Base(b) => Inner::Base(b),
            },
            Inner::Generator(s) => Inner::Generator(s.reverse()),
            Inner::Full(s) => Inner::Full(FullRepoSet(s.0.reverse())),
        };
        Ok(Set::wrap(inner, self.fields.clone()))
    }

    /// Window of the current iteration: skip `start` ids, stop before
    /// id number `stop`. Negative boundaries are a programming error;
    /// `start >= stop` produces the empty set.
    pub fn slice(&self, start: i64, stop: i64) -> Result<Set> {
        if start < 0 || stop < 0 {
            return Err(Error::InvalidSlice(start, stop));
        }
        let inner = match &self.inner {
            Inner::Base(s) => Inner::Base(s.slice(start as usize, stop as usize)),
            Inner::Name(s) => match s.slice(start, stop)? {
                SliceOutcome::Name(s) => Inner::Name(s),
                SliceOutcome::Empty => {
                    Inner::Base(BaseSet::from_list(self.repo_ref(), Vec::new()))
                }
            },
            _ => {
                let mut ids = Vec::new();
                let mut it = self.iter()?;
                for _ in 0..start {
                    if it.next().transpose()?.is_none() {
                        break;
                    }
                }
                for _ in start..stop {
                    match it.next().transpose()? {
                        Some(rev) => ids.push(rev),
                        None => break,
                    }
                }
                Inner::Base(BaseSet::from_list(self.repo_ref(), ids).with_repr("slice"))
            }
        };
        Ok(Set::wrap(inner, self.fields.clone()))
    }

    /// Re-order through the backend's topological sort.
    pub fn sort_by_topology(&self) -> Result<Set> {
        let inner = match &self.inner {
            Inner::Name(s) => Inner::Name(s.sort_by_topology()?),
            _ => {
                let repo = self.repo()?;
                let mut hashes = Vec::new();
                for rev in self.iter()? {
                    let rev = rev?;
                    if !is_virtual(rev) {
                        hashes.push(repo.idmap().id_to_hash(rev)?);
                    }
                }
                let handle = repo.dag().set_from_hashes(hashes)?;
                let set = NameSet::from_dag(repo.downgrade(), handle, false);
                Inner::Name(set.sort_by_topology()?)
            }
        };
        Ok(Set::wrap(inner, self.fields.clone()))
    }

    /// Attach prefetch fields. Membership and order are unchanged;
    /// only context iteration notices.
    pub fn prefetch(&self, fields: impl IntoIterator<Item = impl Into<String>>) -> Set {
        let mut all = self.fields.clone();
        all.extend(fields.into_iter().map(Into::into));
        Set::wrap(self.inner.clone(), all)
    }

    /// Fields currently attached.
    pub fn prefetch_fields(&self) -> &BTreeSet<String> {
        &self.fields
    }

    /// Attach the prefetch fields the given template symbols need. An
    /// empty symbol list selects the default template's fields.
    pub fn prefetch_by_template_symbols<S: AsRef<str>>(
        &self,
        symbols: impl IntoIterator<Item = S>,
    ) -> Result<Set> {
        let repo = self.repo()?;
        let mut fields: Vec<String> = Vec::new();
        let mut saw_symbol = false;
        for symbol in symbols {
            saw_symbol = true;
            fields.extend(repo.prefetch().fields_for_template_symbol(symbol.as_ref()));
        }
        if !saw_symbol {
            fields.extend(repo.prefetch().fields_for_template_symbol(""));
        }
        Ok(self.prefetch(fields))
    }

    /// Iterate commit contexts, routing the stream through the
    /// registered pipeline of every attached prefetch field.
    pub fn iter_ctx(&self) -> Result<CtxIter> {
        let repo = self.repo()?;
        match &self.inner {
            Inner::Filtered(filtered) => {
                // The underlying set's context stream has already been
                // through its own prefetch fields; only apply tags
                // attached after filtering.
                let base = filtered.ctx_iter()?;
                let extra: BTreeSet<String> = self
                    .fields
                    .difference(filtered.subset().prefetch_fields())
                    .cloned()
                    .collect();
                repo.prefetch().apply(&repo, &extra, base)
            }
            _ => {
                let base = ctx_stream(repo.clone(), self.iter()?);
                repo.prefetch().apply(&repo, &self.fields, base)
            }
        }
    }
}

impl RevSet for Set {
    fn contains(&self, rev: RevId) -> Result<bool> {
        self.query().contains(rev)
    }

    fn iter(&self) -> Result<RevIter> {
        self.query().iter()
    }

    fn fast_asc(&self) -> Result<Option<RevIter>> {
        self.query().fast_asc()
    }

    fn fast_desc(&self) -> Result<Option<RevIter>> {
        self.query().fast_desc()
    }

    fn len(&self) -> Result<u64> {
        self.query().len()
    }

    fn size_hint(&self) -> Option<u64> {
        self.query().size_hint()
    }

    fn is_empty(&self) -> Result<bool> {
        self.query().is_empty()
    }

    fn first(&self) -> Result<Option<RevId>> {
        self.query().first()
    }

    fn last(&self) -> Result<Option<RevId>> {
        self.query().last()
    }

    fn min(&self) -> Result<Option<RevId>> {
        self.query().min()
    }

    fn max(&self) -> Result<Option<RevId>> {
        self.query().max()
    }

    fn direction(&self) -> Direction {
        self.query().direction()
    }

    fn is_ascending(&self) -> bool {
        self.query().is_ascending()
    }

    fn is_descending(&self) -> bool {
        self.query().is_descending()
    }

    fn repo(&self) -> Result<Repo> {
        self.query().repo()
    }
}

impl fmt::Debug for Set {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.inner {
            Inner::Base(s) => s.fmt(f),
            Inner::Id(s) => s.fmt(f),
            Inner::Name(s) => s.fmt(f),
            Inner::Filtered(s) => s.fmt(f),
            Inner::Union(s) => s.fmt(f),
            Inner::Generator(s) => s.fmt(f),
            Inner::Full(s) => s.fmt(f),
        }
    }
}

/// Convert an operand's ids to a backend set handle. In strict mode
/// (union), a virtual member or an IdMap miss declines the conversion;
/// otherwise such ids are dropped, since they cannot be members of any
/// dag-backed set.
fn routable_handle(repo: &Repo, ids: Vec<RevId>, strict: bool) -> Result<Option<DagHandle>> {
    let mut clean = Vec::with_capacity(ids.len());
    for id in ids {
        if is_virtual(id) {
            if strict {
                return Ok(None);
            }
        } else {
            clean.push(id);
        }
    }
    let mut hashes = Vec::with_capacity(clean.len());
    for hash in repo.idmap().ids_to_hashes(&clean)? {
        match hash {
            Some(hash) => hashes.push(hash),
            None if strict => return Ok(None),
            None => (),
        }
    }
    Ok(Some(repo.dag().set_from_hashes(hashes)?))
}

/// Dag-native operation with a `NameSet` receiver. Returns `None` when
/// the other operand cannot be routed to the backend.
fn name_op(a: &NameSet, other: &Set, op: NativeOp) -> Result<Option<Inner>> {
    let repo = a.repo()?;
    let strict = matches!(op, NativeOp::Union);
    let handle = match &other.inner {
        Inner::Name(b) => Some(b.handle().clone()),
        Inner::Id(b) => routable_handle(&repo, b.spans().iter_desc().collect(), strict)?,
        Inner::Base(b) => routable_handle(&repo, b.ids(), strict)?,
        _ => None,
    };
    match handle {
        Some(handle) => Ok(Some(Inner::Name(a.native_op(op, &handle)?))),
        None => Ok(None),
    }
}

/// Dag-native operation with a `BaseSet` receiver: convert the
/// receiver to a hash-keyed set first, then re-apply its direction.
fn base_name_op(a: &BaseSet, b: &NameSet, op: NativeOp) -> Result<Option<Inner>> {
    let repo = b.repo()?;
    let handle = match routable_handle(&repo, a.ids(), false)? {
        Some(handle) => handle,
        None => return Ok(None),
    };
    let converted = NameSet::from_dag(b.repo_ref(), handle, false);
    let result = converted.native_op(op, b.handle())?;
    let result = match a.direction() {
        Direction::Ascending => result.sort(false)?,
        Direction::Descending => result.sort(true)?,
        Direction::Unspecified => result,
    };
    Ok(Some(Inner::Name(result)))
}

/// Eager set from an ordered id sequence; iteration preserves
/// insertion order. Virtual revisions are permitted members.
pub fn baseset(ids: impl IntoIterator<Item = RevId>, repo: &Repo) -> Set {
    Set::from_base(BaseSet::from_list(
        repo.downgrade(),
        ids.into_iter().collect(),
    ))
}

/// Eager set from an unordered hash set; direction is forced
/// ascending for determinism.
pub fn baseset_from_hashset(ids: HashSet<RevId>, repo: &Repo) -> Set {
    Set::from_base(BaseSet::from_hash_set(repo.downgrade(), ids))
}

/// Span-compressed set from explicit ids. Descending by default.
pub fn idset(ids: impl IntoIterator<Item = RevId>, repo: &Repo) -> Set {
    Set::from_id(IdSet::from_ids(repo.downgrade(), ids))
}

/// Span-compressed set covering `low..=high`, restricted to ids the
/// repository has. `low > high` is the empty set.
pub fn idset_range(repo: &Repo, low: RevId, high: RevId, ascending: bool) -> Result<Set> {
    Ok(Set::from_id(IdSet::range(repo, low, high, ascending)?))
}

/// Wrap a backend set handle. `reversed` flips the hinted order.
pub fn nameset_from_dag(repo: &Repo, handle: DagHandle, reversed: bool) -> Set {
    Set::from_name(NameSet::from_dag(repo.downgrade(), handle, reversed))
}

/// The set of every revision in the repository.
pub fn fullreposet(repo: &Repo) -> Result<Set> {
    Ok(Set::wrap(
        Inner::Full(FullRepoSet::new(repo)?),
        Default::default(),
    ))
}

/// Memoising wrapper around a one-shot id stream. `hint` promises the
/// stream's own order, enabling early-exit membership tests.
pub fn generatorset(
    stream: impl Iterator<Item = RevId> + Send + 'static,
    hint: Option<Direction>,
    repo: &Repo,
) -> Set {
    let hint = match hint {
        Some(Direction::Ascending) => Some(true),
        Some(Direction::Descending) => Some(false),
        Some(Direction::Unspecified) | None => None,
    };
    Set::wrap(
        Inner::Generator(GeneratorSet::new(repo.downgrade(), Box::new(stream), hint)),
        Default::default(),
    )
}

/// A range of repository revisions: `start` included, `end` excluded.
/// Descending when `end < start`. The virtual empty root is injected
/// at the matching end when the range starts there.
pub fn spanset(repo: &Repo, start: RevId, end: RevId) -> Result<Set> {
    let ascending = start <= end;
    let (low, end_exclusive) = if ascending {
        (start, end)
    } else {
        (end.min(MAX_ID - 1) + 1, start.min(MAX_ID - 1) + 1)
    };
    let with_null = low == NULL_ID;
    let range_low = if with_null { 0 } else { low };
    let set = Set::from_name(NameSet::range(
        repo,
        range_low,
        end_exclusive - 1,
        ascending,
    )?);
    if with_null {
        let null = baseset(vec![NULL_ID], repo);
        if ascending {
            null.union(&set)
        } else {
            set.union(&null)
        }
    } else {
        Ok(set)
    }
}

/// Render a nested set `Debug` as an indented tree, one representation
/// per line.
pub fn prettyformat(set: &Set) -> String {
    let rs = format!("{:?}", set);
    let mut lines: Vec<(usize, String)> = Vec::new();
    let mut p = 0;
    let mut depth = 0usize;
    while p < rs.len() {
        let q = rs[p + 1..]
            .find('<')
            .map(|i| i + p + 1)
            .unwrap_or_else(|| rs.len());
        let chunk = rs[p..q].trim_end();
        lines.push((depth, chunk.to_string()));
        depth += chunk.matches('<').count();
        depth = depth.saturating_sub(chunk.matches('>').count());
        p = q;
    }
    lines
        .into_iter()
        .map(|(depth, line)| format!("{}{}", "  ".repeat(depth), line))
        .collect::<Vec<_>>()
        .join("\n")
}
