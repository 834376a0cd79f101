use bitflags::bitflags;

bitflags! {
    /// Hint flags attached by the DAG backend to a set handle.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct HintFlags: u8 {
        /// Natural iteration yields ids in ascending order.
        const ASC = 0b001;
        /// Natural iteration yields ids in descending order.
        const DESC = 0b010;
        /// The set is known to be empty.
        const EMPTY = 0b100;
    }
}

/// Metadata the DAG backend attaches to a set handle. Hints are
/// advisory for performance, mandatory for correctness: a direction
/// flag promises the backend iteration order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Hints {
    flags: HintFlags,
    size: Option<u64>,
}

impl Hints {
    /// Hints with the given flags and no known size.
    pub fn new(flags: HintFlags) -> Self {
        Hints { flags, size: None }
    }

    /// Attach a cheaply-known size.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        if size == 0 {
            self.flags |= HintFlags::EMPTY;
        }
        self
    }

    /// Raw flags.
    pub fn flags(&self) -> HintFlags {
        self.flags
    }

    /// The backend promises ascending iteration.
    pub fn is_asc(&self) -> bool {
        self.flags.contains(HintFlags::ASC)
    }

    /// The backend promises descending iteration.
    pub fn is_desc(&self) -> bool {
        self.flags.contains(HintFlags::DESC)
    }

    /// The backend knows the set is empty.
    pub fn is_empty(&self) -> bool {
        self.flags.contains(HintFlags::EMPTY)
    }

    /// The size, if cheaply known.
    pub fn size_hint(&self) -> Option<u64> {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hints_flags() {
        let hints = Hints::new(HintFlags::DESC).with_size(3);
        assert!(hints.is_desc());
        assert!(!hints.is_asc());
        assert_eq!(hints.size_hint(), Some(3));
    }

    #[test]
    fn test_zero_size_implies_empty() {
        let hints = Hints::new(HintFlags::empty()).with_size(0);
        assert!(hints.is_empty());
    }
}
