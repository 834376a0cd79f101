use std::fmt;

/// Integer revision number assigned by the DAG to a commit.
pub type RevId = i64;

/// The virtual empty root. Never stored in the DAG; only a `BaseSet`
/// may contain it.
pub const NULL_ID: RevId = -1;

/// The working directory pseudo-revision. Same rules as [`NULL_ID`].
pub const WDIR_ID: RevId = i64::MAX - 1;

/// Upper bound used to form "all revisions" spans. Strictly below the
/// virtual revisions so spans can never cover them.
pub const MAX_ID: RevId = i64::MAX >> 2;

/// 20-byte commit content identifier.
pub type Hash20 = [u8; 20];

/// Hash of the virtual empty root.
pub const NULL_HASH: Hash20 = [0; 20];

/// Hash of the working directory pseudo-revision.
pub const WDIR_HASH: Hash20 = [0xff; 20];

/// Iteration order carried by every set.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Iteration yields ids in increasing numeric order.
    Ascending,
    /// Iteration yields ids in decreasing numeric order.
    Descending,
    /// Iteration order is insertion order.
    Unspecified,
}

impl Direction {
    /// The opposite direction. `Unspecified` stays `Unspecified`.
    pub fn reversed(self) -> Direction {
        match self {
            Direction::Ascending => Direction::Descending,
            Direction::Descending => Direction::Ascending,
            Direction::Unspecified => Direction::Unspecified,
        }
    }

    /// The `+` / `-` decoration used by `Debug` output.
    pub(crate) fn decoration(self) -> &'static str {
        match self {
            Direction::Ascending => "+",
            Direction::Descending => "-",
            Direction::Unspecified => "",
        }
    }
}

/// Whether the id is one of the virtual revisions ([`NULL_ID`],
/// [`WDIR_ID`]) that only a `BaseSet` may contain.
pub fn is_virtual(rev: RevId) -> bool {
    rev == NULL_ID || rev == WDIR_ID
}

/// Render a hash as lowercase hex.
pub fn hex(hash: &Hash20) -> String {
    let mut s = String::with_capacity(40);
    for b in hash {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

pub(crate) struct HexDebug<'a>(pub &'a Hash20);

impl<'a> fmt::Debug for HexDebug<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&hex(self.0))
    }
}
