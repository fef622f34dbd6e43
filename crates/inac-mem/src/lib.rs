//! Memory primitives for the `inac` runtime-support library.
//!
//! This crate provides:
//!
//! - **[`Arena`]**: a chunked bump allocator that serves blocks from both
//!   ends of each chunk, spills into new chunks when `DYNAMIC`, and can back
//!   its head chunk with a named shared-memory object
//! - **[`StrBuf`]**: a NUL-terminated growable string stored on the heap or in
//!   an arena, with in-place growth for the arena's latest allocation
//! - **[`NodeList`]**: a doubly linked list whose nodes are carved from an
//!   owned arena and recycled through a bounded free-list
//! - **[`wildcard_match`]**: `*`/`?` glob matching over bytes
//!
//! Every fallible operation returns [`Result`]; [`Error::code`] maps failures
//! to packed subject/adjective codes. Diagnostics go through `inac-log`
//! (set `INAC_LOG=debug` and call [`inac_log::init_from_env`] to see chunk
//! and shared-memory events).
//!
//! # Example
//!
//! ```
//! use inac_mem::{Arena, PoolFlags, StrBuf};
//!
//! let mut arena = Arena::new(1024, PoolFlags::DYNAMIC).unwrap();
//! {
//!     let mut path = StrBuf::from_bytes_in(b"/usr", &arena).unwrap();
//!     path.push_str("/local").unwrap();
//!     assert!(path.matches("/usr/*"));
//! }
//! // All pooled strings are gone, so the arena can be rewound.
//! arena.reset();
//! assert_eq!(arena.info().total_used, 0);
//! ```

pub mod arena;
pub mod error;
pub mod factory;
pub mod flags;
pub mod list;
pub mod shm;
pub mod string;
pub mod wildcard;

pub use arena::{ALIGN, Arena, ArenaInfo, ChunkInfo, DEFAULT_POOL_SIZE, MIN_POOL_SIZE};
pub use error::{Error, ErrorCode, Result, must_succeed};
pub use factory::{ArenaConfig, ArenaFactory};
pub use flags::PoolFlags;
pub use list::NodeList;
pub use shm::shared_memory_path;
pub use string::{StrBuf, tokens};
pub use wildcard::wildcard_match;
