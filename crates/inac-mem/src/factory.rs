//! Arena configuration and a factory for heap arenas.
//!
//! [`ArenaConfig`] collects the creation parameters of an [`Arena`] (capacity,
//! label and flags) with builder-style setters. [`ArenaFactory`] is a `Copy`
//! template that stamps out fresh heap arenas with the same parameters; it
//! never pools or reuses them.
//!
//! # Examples
//!
//! ```
//! use inac_mem::{ArenaConfig, PoolFlags};
//!
//! let arena = ArenaConfig::new()
//!     .with_capacity(4096)
//!     .with_flags(PoolFlags::BEST_FIT)
//!     .dynamic()
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(arena.info().chunk_size, 4096);
//! assert!(arena.flags().is_dynamic());
//! ```
//!
//! ```
//! use inac_mem::ArenaFactory;
//!
//! let factory = ArenaFactory::new(8192);
//! let scratch = factory.create_arena().unwrap();
//! scratch.alloc_forward(128).unwrap();
//! // `scratch` is dropped here and its chunks are released
//! ```

use crate::arena::{Arena, DEFAULT_POOL_SIZE};
use crate::error::{Error, Result};
use crate::flags::PoolFlags;

/// Creation parameters for an [`Arena`].
///
/// The default is a [`DEFAULT_POOL_SIZE`] `DYNAMIC` heap arena with no label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArenaConfig {
    pub capacity: usize,
    pub label: Option<String>,
    pub flags: PoolFlags,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_POOL_SIZE,
            label: None,
            flags: PoolFlags::DYNAMIC,
        }
    }
}

impl ArenaConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Replaces the flags entirely.
    #[must_use]
    pub fn with_flags(mut self, flags: PoolFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Adds `DYNAMIC`.
    #[must_use]
    pub fn dynamic(mut self) -> Self {
        self.flags |= PoolFlags::DYNAMIC;
        self
    }

    /// Adds `SHARED | SHARED_CREATE`. A label is still required.
    #[must_use]
    pub fn shared(mut self) -> Self {
        self.flags |= PoolFlags::SHARED | PoolFlags::SHARED_CREATE;
        self
    }

    /// Creates the arena.
    ///
    /// # Errors
    ///
    /// Everything [`Arena::with_label`] reports; a `SHARED` configuration
    /// without a label is [`Error::InvalidArgument`].
    pub fn build(&self) -> Result<Arena> {
        if self.flags.is_shared() && self.label.is_none() {
            return Err(Error::InvalidArgument {
                reason: "shared arenas need a label",
            });
        }
        Arena::create(self.capacity, self.label.as_deref(), self.flags)
    }
}

/// Factory for fresh heap arenas.
///
/// A factory is just a capacity and a set of flags; creating an arena from
/// it allocates only the arena's head chunk. Shared-memory arenas are named
/// objects and are built through [`ArenaConfig`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaFactory {
    capacity: usize,
    flags: PoolFlags,
}

impl Default for ArenaFactory {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}

impl ArenaFactory {
    /// Creates a factory for `DYNAMIC` arenas with the given head capacity.
    #[must_use]
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity,
            flags: PoolFlags::DYNAMIC,
        }
    }

    /// Replaces the flags; `SHARED` bits are dropped.
    #[must_use]
    pub const fn with_flags(self, flags: PoolFlags) -> Self {
        Self {
            capacity: self.capacity,
            flags: flags.without(PoolFlags::from_bits(
                PoolFlags::SHARED.bits()
                    | PoolFlags::SHARED_CREATE.bits()
                    | PoolFlags::SHARED_OWNER.bits()
                    | PoolFlags::SHARED_EXCL.bits(),
            )),
        }
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub const fn flags(&self) -> PoolFlags {
        self.flags
    }

    /// Returns the equivalent [`ArenaConfig`].
    #[must_use]
    pub fn config(&self) -> ArenaConfig {
        ArenaConfig {
            capacity: self.capacity,
            label: None,
            flags: self.flags,
        }
    }

    /// Creates a new arena. Each call returns an independent arena.
    ///
    /// # Errors
    ///
    /// As [`Arena::new`].
    pub fn create_arena(&self) -> Result<Arena> {
        Arena::new(self.capacity, self.flags)
    }
}
