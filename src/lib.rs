//! Lazy revision sets and their algebra over a commit DAG.
//!
//! This crate is the set layer of a version-control query engine: it
//! represents sets of commits (by integer revision id and by 20-byte
//! hash), combines them with intersection, union, difference, filter,
//! sort, reverse and slice, and evaluates as little as possible while
//! doing so. The commit graph itself lives behind the [`DagBackend`]
//! trait; id/hash translation behind [`IdMap`]; commit text behind
//! [`TextSource`].
//!
//! ## Representations
//!
//! A [`Set`] is one of several concrete representations, chosen by the
//! factory that built it and by the combinators applied since:
//!
//! - [`baseset`]: eager, may contain the virtual revisions
//!   [`NULL_ID`] and [`WDIR_ID`].
//! - [`idset`] / [`idset_range`]: span-compressed integer set with
//!   native `&`-`|`-`-` algebra.
//! - [`nameset_from_dag`] / [`spanset`]: hash-keyed backend set, the
//!   only representation that can stay lazy; its iteration order comes
//!   from backend hints.
//! - [`Set::filter`]: lazy predicate filter.
//! - [`Set::union`]: lazy union with ordered-merge iteration.
//! - [`generatorset`]: memoising wrapper around a one-shot id stream.
//! - [`fullreposet`]: all revisions; intersection with it is the
//!   identity.
//!
//! Every representation satisfies [`RevSet`]: total membership
//! testing, direction-aware iteration, optional `fast_asc`/`fast_desc`
//! iterators that avoid materialisation, and memoised `min`/`max`.
//!
//! ## Quick start
//!
//! ```
//! # fn main() -> revset::Result<()> {
//! # #[cfg(feature = "testutil")]
//! # {
//! use revset::RevSet;
//!
//! let repo = revset::TestRepo::new(12);
//! let recent = revset::idset_range(&repo, 4, 11, false)?;
//! let even = recent.filter(revset::Predicate::new(|rev| Ok(rev % 2 == 0)));
//! let revs: Vec<_> = even.iter()?.collect::<revset::Result<_>>()?;
//! assert_eq!(revs, [10, 8, 6, 4]);
//! # }
//! # Ok(())
//! # }
//! ```
//!
//! ## Laziness and ordering
//!
//! Combinators avoid materialising their operands when a fast path
//! exists: span algebra for id sets, native backend operators for
//! hash-keyed sets, hash-set algebra for eager sets, ordered merges
//! for unions. The slow path is always membership-filtered iteration.
//! Each set carries a direction ([`Direction`]); intersection and
//! difference follow the receiver's direction, `sort` and `reverse`
//! are the only operations that change it.
//!
//! ## Repo lifetime
//!
//! Sets hold a weak reference to the [`Repo`] services bundle. Live
//! sets never keep a dropped repo alive; operations that still need it
//! fail with [`Error::RepoGone`].

#![deny(missing_docs)]

mod backend;
mod baseset;
mod error;
mod filteredset;
mod generatorset;
mod hints;
mod id;
mod idset;
mod nameset;
mod prefetch;
mod progress;
mod repo;
mod set;
mod spans;
mod unionset;

#[cfg(any(test, feature = "testutil"))]
mod testutil;

#[cfg(feature = "testutil")]
pub use testutil::MemDag;
#[cfg(feature = "testutil")]
pub use testutil::TestRepo;

#[cfg(test)]
mod tests;

pub use error::Error;

/// `Result` type used by `revset`.
pub type Result<T> = std::result::Result<T, Error>;

pub use backend::DagBackend;
pub use backend::DagHandle;
pub use backend::HashIter;
pub use backend::IdMap;
pub use backend::TextSource;
pub use baseset::BaseSet;
pub use filteredset::FilteredSet;
pub use filteredset::Predicate;
pub use generatorset::GeneratorSet;
pub use hints::HintFlags;
pub use hints::Hints;
pub use id::hex;
pub use id::is_virtual;
pub use id::Direction;
pub use id::Hash20;
pub use id::RevId;
pub use id::MAX_ID;
pub use id::NULL_HASH;
pub use id::NULL_ID;
pub use id::WDIR_HASH;
pub use id::WDIR_ID;
pub use idset::FullRepoSet;
pub use idset::IdSet;
pub use nameset::NameSet;
pub use prefetch::CommitCtx;
pub use prefetch::CtxIter;
pub use prefetch::Pipeline;
pub use prefetch::PrefetchRegistry;
pub use progress::ProgressBar;
pub use progress::ProgressRegistry;
pub use repo::Repo;
pub use set::baseset;
pub use set::baseset_from_hashset;
pub use set::fullreposet;
pub use set::generatorset;
pub use set::idset;
pub use set::idset_range;
pub use set::nameset_from_dag;
pub use set::prettyformat;
pub use set::spanset;
pub use set::RevIter;
pub use set::RevSet;
pub use set::Set;
pub use spans::Span;
pub use spans::Spans;
