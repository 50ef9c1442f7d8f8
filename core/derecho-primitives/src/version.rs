/// Sentinel meaning "no version" (an empty log, or the genesis predecessor
/// of the very first signed version).
pub const INVALID_VERSION: Version = Version(-1);

/// A monotonically increasing identifier of a state mutation within a
/// subgroup, stamped by the messaging substrate at ordered delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Version(pub i64);

impl Version {
    pub fn is_valid(self) -> bool {
        self != INVALID_VERSION
    }

    pub fn next(self) -> Version {
        Version(self.0 + 1)
    }
}

impl Default for Version {
    fn default() -> Self {
        INVALID_VERSION
    }
}

/// Hybrid logical clock timestamp, in microseconds, stamped alongside a
/// [`Version`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Hlc(pub u64);
