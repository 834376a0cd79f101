use crate::id::RevId;
use std::convert::Infallible;
use thiserror::Error;

/// Error type used by `revset`.
#[derive(Error, Debug)]
pub enum Error {
    /// The repository backing a set has been dropped. The set can no
    /// longer answer queries that need its services.
    #[error("repo backing this set was released")]
    RepoGone,

    /// An id or hash has no counterpart in the IdMap.
    #[error("commit {0} not found")]
    CommitNotFound(String),

    /// `slice` was called with a negative boundary.
    #[error("negative slice index not allowed: {0}..{1}")]
    InvalidSlice(i64, i64),

    /// A context iteration carries a prefetch field with no registered
    /// pipeline.
    #[error("do not know how to prefetch field {0:?} for ctx stream")]
    UnknownPrefetchField(String),

    /// An invariant was violated by the calling code.
    #[error("programming error: {0}")]
    ProgrammingError(&'static str),
}

impl Error {
    /// `CommitNotFound` for an unresolvable revision number.
    pub fn commit_not_found_rev(rev: RevId) -> Error {
        Error::CommitNotFound(format!("rev {}", rev))
    }

    /// `CommitNotFound` for an unresolvable hash.
    pub fn commit_not_found_hash(hash: &crate::id::Hash20) -> Error {
        Error::CommitNotFound(crate::id::hex(hash))
    }

    /// True if this error is a `CommitNotFound` lookup miss (absorbed
    /// by membership tests, surfaced everywhere else).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::CommitNotFound(_))
    }
}

impl From<Infallible> for Error {
    fn from(_e: Infallible) -> Self {
        unreachable!()
    }
}
