//! Arena creation flags.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Growth strategy and backing selection for an [`Arena`](crate::arena::Arena).
///
/// Flags combine with `|`:
///
/// ```
/// use inac_mem::PoolFlags;
///
/// let flags = PoolFlags::DYNAMIC | PoolFlags::AUTOSIZE;
/// assert!(flags.contains(PoolFlags::DYNAMIC));
/// assert!(!flags.contains(PoolFlags::SHARED));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PoolFlags(u32);

impl PoolFlags {
    /// Single chunk; exhaustion fails with `PoolFull`.
    pub const FIXED: Self = Self(0);
    /// Spill into a new chunk when the active one is exhausted.
    pub const DYNAMIC: Self = Self(1);
    /// New chunks are sized to the request instead of the head capacity.
    pub const AUTOSIZE: Self = Self(2);
    /// Byte-exact (unaligned) request sizes.
    pub const BEST_FIT: Self = Self(4);
    /// Marks a chunk created by spilling; see [`ChunkInfo::flags`](crate::ChunkInfo::flags).
    /// Ignored when passed to an arena constructor.
    pub const CHILD: Self = Self(8);
    /// Back the head chunk with a named shared-memory object.
    pub const SHARED: Self = Self(32);
    /// Create the shared object if it does not exist.
    pub const SHARED_CREATE: Self = Self(64);
    /// This handle owns the shared object's contents and zero-fills them.
    pub const SHARED_OWNER: Self = Self(128);
    /// Create exclusively; unlink on close regardless of other users.
    pub const SHARED_EXCL: Self = Self(256);
    /// Skip zero-filling new buffers.
    pub const NO_ZERO_FILL: Self = Self(512);

    const NAMES: [(Self, &'static str); 9] = [
        (Self::DYNAMIC, "DYNAMIC"),
        (Self::AUTOSIZE, "AUTOSIZE"),
        (Self::BEST_FIT, "BEST_FIT"),
        (Self::CHILD, "CHILD"),
        (Self::SHARED, "SHARED"),
        (Self::SHARED_CREATE, "SHARED_CREATE"),
        (Self::SHARED_OWNER, "SHARED_OWNER"),
        (Self::SHARED_EXCL, "SHARED_EXCL"),
        (Self::NO_ZERO_FILL, "NO_ZERO_FILL"),
    ];

    /// Builds flags from raw bits, keeping unknown bits.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns `true` if every bit of `other` is set in `self`.
    ///
    /// `contains(FIXED)` is always true since `FIXED` has no bits.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `self` without the bits of `other`.
    #[must_use]
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    #[must_use]
    pub const fn is_dynamic(self) -> bool {
        self.contains(Self::DYNAMIC)
    }

    #[must_use]
    pub const fn is_shared(self) -> bool {
        self.contains(Self::SHARED)
    }

    #[must_use]
    pub const fn is_best_fit(self) -> bool {
        self.contains(Self::BEST_FIT)
    }
}

impl BitOr for PoolFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for PoolFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for PoolFlags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Debug for PoolFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return write!(f, "PoolFlags(FIXED)");
        }
        write!(f, "PoolFlags(")?;
        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    write!(f, " | ")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        let unknown = self.0 & !Self::NAMES.iter().fold(0, |acc, (flag, _)| acc | flag.0);
        if unknown != 0 {
            if !first {
                write!(f, " | ")?;
            }
            write!(f, "{unknown:#x}")?;
        }
        write!(f, ")")
    }
}
