//! Dual-cursor chunked arena.
//!
//! An [`Arena`] is a chain of fixed-size chunks. Each chunk is carved from
//! both ends: [`Arena::alloc_forward`] bumps a `front` cursor upward,
//! [`Arena::alloc_backward`] bumps a `back` cursor downward, and the free
//! region is always `[front, back)`. Nothing is freed individually; space is
//! reclaimed by [`Arena::reset`], [`Arena::clear`], [`Arena::shrink`] or by
//! dropping the arena.
//!
//! # Growth
//!
//! A `FIXED` arena has exactly one chunk and reports
//! [`Error::PoolFull`] when it runs out. A `DYNAMIC` arena spills into the
//! next chunk of the chain, creating one when the chain is exhausted. New
//! chunks take the head chunk's capacity, or exactly the request size with
//! `AUTOSIZE` (or when the request alone exceeds the head capacity).
//!
//! # Borrowing
//!
//! Allocation takes `&self`; the cursors live in [`Cell`]s, so an arena is
//! `Send` but not `Sync`. Operations that invalidate earlier allocations
//! take `&mut self`, which the borrow checker refuses while a
//! [`StrBuf`](crate::string::StrBuf) still borrows the arena.
//!
//! # Examples
//!
//! ```
//! use inac_mem::{Arena, PoolFlags};
//!
//! let arena = Arena::new(1024, PoolFlags::DYNAMIC).unwrap();
//!
//! let head = arena.alloc_forward(100).unwrap();
//! let tail = arena.alloc_backward(64).unwrap();
//! assert!(head.as_ptr() < tail.as_ptr());
//!
//! // Spills into a second chunk instead of failing.
//! arena.alloc_forward(1000).unwrap();
//! assert_eq!(arena.info().chunk_count, 2);
//! ```

use std::alloc::{self, Layout};
use std::cell::{Cell, RefCell};
use std::ptr::{self, NonNull};

use inac_log::debug;

use crate::error::{Error, Result};
use crate::flags::PoolFlags;
use crate::shm::SharedMapping;

/// Alignment unit of every chunk and, unless `BEST_FIT`, of every request.
pub const ALIGN: usize = 2 * std::mem::size_of::<usize>();

/// Smallest chunk capacity.
pub const MIN_POOL_SIZE: usize = 1024;

/// Capacity used when none is configured (8 MiB).
pub const DEFAULT_POOL_SIZE: usize = 8 * 1024 * 1024;

#[inline]
const fn align_up(size: usize) -> Option<usize> {
    match size.checked_add(ALIGN - 1) {
        Some(padded) => Some(padded & !(ALIGN - 1)),
        None => None,
    }
}

/// Rounds a requested capacity up to the minimum pool size and the alignment.
fn chunk_capacity(requested: usize) -> Result<usize> {
    align_up(requested.max(MIN_POOL_SIZE)).ok_or(Error::OutOfMemory)
}

enum Backing {
    Heap,
    Shared(SharedMapping),
}

/// One buffer of the chain with its two cursors.
struct Chunk {
    base: NonNull<u8>,
    capacity: usize,
    front: Cell<usize>,
    back: Cell<usize>,
    backing: Backing,
    /// Created by spilling.
    child: bool,
}

impl Chunk {
    fn heap(capacity: usize, zeroed: bool) -> Result<Self> {
        let layout = Layout::from_size_align(capacity, ALIGN).map_err(|_| Error::OutOfMemory)?;

        // SAFETY: capacity is at least MIN_POOL_SIZE, so the layout is non-zero.
        let raw = unsafe {
            if zeroed {
                alloc::alloc_zeroed(layout)
            } else {
                alloc::alloc(layout)
            }
        };
        let base = NonNull::new(raw).ok_or(Error::OutOfMemory)?;

        Ok(Chunk {
            base,
            capacity,
            front: Cell::new(0),
            back: Cell::new(capacity),
            backing: Backing::Heap,
            child: false,
        })
    }

    fn shared(label: &str, capacity: usize, flags: PoolFlags) -> Result<Self> {
        let mapping = SharedMapping::open(label, capacity, flags)?;
        Ok(Chunk {
            base: mapping.data(),
            capacity,
            front: Cell::new(0),
            back: Cell::new(capacity),
            backing: Backing::Shared(mapping),
            child: false,
        })
    }

    #[inline]
    fn free(&self) -> usize {
        self.back.get() - self.front.get()
    }

    #[inline]
    fn used(&self) -> usize {
        self.front.get() + (self.capacity - self.back.get())
    }

    #[inline]
    fn is_shared(&self) -> bool {
        matches!(self.backing, Backing::Shared(_))
    }

    /// Caller guarantees `size <= self.free()`.
    #[inline]
    fn bump_front(&self, size: usize) -> NonNull<u8> {
        let offset = self.front.get();
        self.front.set(offset + size);
        // SAFETY: offset + size <= back <= capacity.
        unsafe { self.base.add(offset) }
    }

    /// Caller guarantees `size <= self.free()`.
    #[inline]
    fn bump_back(&self, size: usize) -> NonNull<u8> {
        let offset = self.back.get() - size;
        self.back.set(offset);
        // SAFETY: front <= offset < capacity.
        unsafe { self.base.add(offset) }
    }

    /// Offset of `ptr` inside this chunk's buffer, if it points into it.
    fn offset_of(&self, ptr: NonNull<u8>) -> Option<usize> {
        let offset = ptr.as_ptr().addr().wrapping_sub(self.base.as_ptr().addr());
        (offset < self.capacity).then_some(offset)
    }

    fn reset(&self) {
        self.front.set(0);
        self.back.set(self.capacity);
    }

    fn wipe(&self) {
        // SAFETY: the buffer is `capacity` bytes long.
        unsafe { self.base.as_ptr().write_bytes(0, self.capacity) };
    }

    fn info(&self) -> ChunkInfo {
        ChunkInfo {
            capacity: self.capacity,
            front: self.front.get(),
            back: self.back.get(),
            shared: self.is_shared(),
            child: self.child,
        }
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        if let Backing::Heap = self.backing {
            // SAFETY: the layout matches the one used in `Chunk::heap`.
            unsafe {
                let layout = Layout::from_size_align_unchecked(self.capacity, ALIGN);
                alloc::dealloc(self.base.as_ptr(), layout);
            }
        }
        // Shared chunks release through `SharedMapping::drop`.
    }
}

/// Aggregated statistics over an arena's chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaInfo {
    /// Creation flags of the arena.
    pub flags: PoolFlags,
    /// Sum of all chunk capacities.
    pub total_size: usize,
    /// Sum over chunks of `front + (capacity - back)`.
    pub total_used: usize,
    /// Number of chunks, head included.
    pub chunk_count: usize,
    /// Capacity of the head chunk.
    pub chunk_size: usize,
}

impl ArenaInfo {
    /// Bytes not yet handed out, summed over all chunks.
    #[must_use]
    pub fn total_free(&self) -> usize {
        self.total_size - self.total_used
    }
}

/// Cursor snapshot of a single chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkInfo {
    pub capacity: usize,
    pub front: usize,
    pub back: usize,
    /// Whether the chunk lives in a shared-memory object.
    pub shared: bool,
    /// Whether the chunk was added by spilling (`PoolFlags::CHILD`).
    pub child: bool,
}

impl ChunkInfo {
    /// The chunk's flags: `CHILD` for spilled chunks, `SHARED` for the
    /// mapped head.
    #[must_use]
    pub fn flags(&self) -> PoolFlags {
        let mut flags = PoolFlags::FIXED;
        if self.child {
            flags |= PoolFlags::CHILD;
        }
        if self.shared {
            flags |= PoolFlags::SHARED;
        }
        flags
    }
}

/// A chunked bump allocator serving blocks from both ends of each chunk.
///
/// See the [module documentation](self) for the growth and borrowing rules.
pub struct Arena {
    chunks: RefCell<Vec<Chunk>>,
    active: Cell<usize>,
    flags: PoolFlags,
    label: Option<String>,
}

// SAFETY: chunks own their buffers exclusively (heap) or through a mapping
// whose only shared state is an atomic counter. Interior mutability keeps the
// arena !Sync.
unsafe impl Send for Arena {}

impl Arena {
    /// Creates a heap-backed arena.
    ///
    /// `capacity` is rounded up to [`MIN_POOL_SIZE`] and to [`ALIGN`].
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `capacity` is zero, or if `flags`
    ///   request `SHARED` (use [`Arena::with_label`]).
    /// - [`Error::OutOfMemory`] if the buffer cannot be allocated.
    pub fn new(capacity: usize, flags: PoolFlags) -> Result<Self> {
        if flags.is_shared() {
            return Err(Error::InvalidArgument {
                reason: "shared arenas need a label",
            });
        }
        Self::create(capacity, None, flags)
    }

    /// Creates an arena with a label.
    ///
    /// With `SHARED` the head chunk is backed by the shared-memory object
    /// named `label` (see [`shared_memory_path`](crate::shm::shared_memory_path)),
    /// and the arena joins that object's reference count. Chunks added by
    /// spilling are always heap-backed.
    ///
    /// # Errors
    ///
    /// As [`Arena::new`], plus label validation errors and [`Error::Os`] if
    /// the object cannot be opened or mapped.
    pub fn with_label(capacity: usize, label: &str, flags: PoolFlags) -> Result<Self> {
        Self::create(capacity, Some(label), flags)
    }

    pub(crate) fn create(capacity: usize, label: Option<&str>, flags: PoolFlags) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidArgument {
                reason: "arena capacity is zero",
            });
        }
        let capacity = chunk_capacity(capacity)?;
        let zeroed = !flags.contains(PoolFlags::NO_ZERO_FILL);

        let head = if flags.is_shared() {
            let label = label.ok_or(Error::InvalidArgument {
                reason: "shared arenas need a label",
            })?;
            Chunk::shared(label, capacity, flags)?
        } else {
            Chunk::heap(capacity, zeroed)?
        };

        debug!(
            "created arena {:?} ({} bytes, {:?})",
            label.unwrap_or("<anonymous>"),
            capacity,
            flags
        );

        Ok(Arena {
            chunks: RefCell::new(vec![head]),
            active: Cell::new(0),
            flags,
            label: label.map(str::to_owned),
        })
    }

    /// Creation flags.
    #[must_use]
    pub fn flags(&self) -> PoolFlags {
        self.flags
    }

    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Whether any chunk of the chain lives in shared memory.
    #[must_use]
    pub fn is_shared(&self) -> bool {
        self.chunks.borrow().iter().any(Chunk::is_shared)
    }

    /// Number of handles attached to the shared object, for `SHARED` arenas.
    #[must_use]
    pub fn shared_refcount(&self) -> Option<i64> {
        match &self.chunks.borrow()[0].backing {
            Backing::Shared(mapping) => Some(mapping.attached()),
            Backing::Heap => None,
        }
    }

    /// Capacity of the head chunk.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunks.borrow()[0].capacity
    }

    /// Index of the chunk currently receiving allocations.
    #[must_use]
    pub fn active_chunk(&self) -> usize {
        self.active.get()
    }

    fn request_size(&self, size: usize) -> Result<usize> {
        if size == 0 {
            return Err(Error::InvalidArgument {
                reason: "allocation size is zero",
            });
        }
        if self.flags.is_best_fit() {
            Ok(size)
        } else {
            align_up(size).ok_or(Error::OutOfMemory)
        }
    }

    /// Makes a chunk with at least `size` free bytes active and returns its
    /// index, spilling along the chain if the arena is `DYNAMIC`.
    fn chunk_with_room(&self, size: usize) -> Result<usize> {
        let len = {
            let chunks = self.chunks.borrow();
            let mut index = self.active.get();
            loop {
                let chunk = &chunks[index];
                if size <= chunk.free() {
                    self.active.set(index);
                    return Ok(index);
                }
                if !self.flags.is_dynamic() {
                    return Err(Error::PoolFull {
                        requested: size,
                        available: chunk.free(),
                    });
                }
                if index + 1 == chunks.len() {
                    break chunks.len();
                }
                index += 1;
            }
        };

        let head_capacity = self.chunk_size();
        let wanted = if self.flags.contains(PoolFlags::AUTOSIZE) || size > head_capacity {
            size
        } else {
            head_capacity
        };
        let capacity = chunk_capacity(wanted)?;
        let mut chunk = Chunk::heap(capacity, !self.flags.contains(PoolFlags::NO_ZERO_FILL))?;
        chunk.child = true;

        debug!(
            "arena {:?} spilled {} bytes into chunk {} ({} bytes)",
            self.label().unwrap_or("<anonymous>"),
            size,
            len,
            capacity
        );

        self.chunks.borrow_mut().push(chunk);
        self.active.set(len);
        Ok(len)
    }

    /// Allocates `size` bytes from the front of the active chunk.
    ///
    /// The block is aligned to [`ALIGN`] and its size rounded up to it,
    /// unless the arena is `BEST_FIT`. The returned memory stays valid until
    /// the arena is reset, cleared, shrunk or dropped.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `size` is zero.
    /// - [`Error::PoolFull`] if the arena is not `DYNAMIC` and the active chunk
    ///   is exhausted.
    /// - [`Error::OutOfMemory`] if a spill chunk cannot be allocated.
    pub fn alloc_forward(&self, size: usize) -> Result<NonNull<u8>> {
        let size = self.request_size(size)?;
        let index = self.chunk_with_room(size)?;
        Ok(self.chunks.borrow()[index].bump_front(size))
    }

    /// Allocates `size` bytes from the back of the active chunk.
    ///
    /// Backward blocks never overlap forward ones in the same chunk.
    ///
    /// # Errors
    ///
    /// As [`Arena::alloc_forward`], plus [`Error::InvalidArgument`] when
    /// `size` exceeds the head chunk's capacity.
    pub fn alloc_backward(&self, size: usize) -> Result<NonNull<u8>> {
        let size = self.request_size(size)?;
        if size > self.chunk_size() {
            return Err(Error::InvalidArgument {
                reason: "backward allocation larger than the chunk size",
            });
        }
        let index = self.chunk_with_room(size)?;
        Ok(self.chunks.borrow()[index].bump_back(size))
    }

    /// Resizes a forward allocation.
    ///
    /// If `old` is the most recent forward allocation of the active chunk and
    /// `new_size` fits, the block is resized in place and `old` is returned;
    /// bytes vacated by shrinking are zeroed. Otherwise shrinking returns
    /// `old` unchanged, and growing copies the block into a fresh forward
    /// allocation, abandoning the old one until the next reset.
    ///
    /// # Errors
    ///
    /// As [`Arena::alloc_forward`]; zero sizes are [`Error::InvalidArgument`].
    ///
    /// # Safety
    ///
    /// `old` must have been returned by [`Arena::alloc_forward`] or
    /// `realloc` on this arena with a size of `old_size`, and the arena must
    /// not have been reset, cleared or shrunk since.
    pub unsafe fn realloc(
        &self,
        old: NonNull<u8>,
        old_size: usize,
        new_size: usize,
    ) -> Result<NonNull<u8>> {
        let old_span = self.request_size(old_size)?;
        let new_span = self.request_size(new_size)?;

        {
            let chunks = self.chunks.borrow();
            let chunk = &chunks[self.active.get()];
            if let Some(offset) = chunk.offset_of(old) {
                let is_last = offset.checked_add(old_span) == Some(chunk.front.get());
                let fits = offset
                    .checked_add(new_span)
                    .is_some_and(|end| end <= chunk.back.get());
                if is_last && fits {
                    if new_span < old_span {
                        // SAFETY: the vacated tail lies inside the chunk.
                        unsafe {
                            chunk
                                .base
                                .as_ptr()
                                .add(offset + new_span)
                                .write_bytes(0, old_span - new_span);
                        }
                    }
                    chunk.front.set(offset + new_span);
                    return Ok(old);
                }
            }
        }

        if new_span <= old_span {
            return Ok(old);
        }

        let fresh = self.alloc_forward(new_size)?;
        // SAFETY: `old` holds `old_size` readable bytes and `fresh` is a new
        // block of at least `new_size > old_size` bytes.
        unsafe { ptr::copy_nonoverlapping(old.as_ptr(), fresh.as_ptr(), old_size) };
        Ok(fresh)
    }

    /// Splices `src`'s chunks into this arena right after the head chunk.
    ///
    /// Data in the moved chunks stays where it is; pointers into `src` remain
    /// valid for the lifetime of `self`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if either arena is shared-memory-backed.
    /// `src` is dropped in that case.
    pub fn merge(&mut self, mut src: Arena) -> Result<()> {
        if self.is_shared() || src.is_shared() {
            return Err(Error::InvalidArgument {
                reason: "shared arenas cannot be merged",
            });
        }

        let moved = std::mem::take(src.chunks.get_mut());
        let count = moved.len();
        let chunks = self.chunks.get_mut();
        chunks.splice(1..1, moved);
        let total = chunks.len();

        let active = self.active.get();
        if active >= 1 {
            self.active.set(active + count);
        }

        debug!(
            "merged {} chunks into arena {:?} ({} chunks)",
            count,
            self.label().unwrap_or("<anonymous>"),
            total
        );
        Ok(())
    }

    /// Releases unused trailing chunks and rewinds the rest.
    ///
    /// Chunks at chain position `>= keep` (the head always counts as kept)
    /// whose backward cursor is untouched are released. Every retained chunk
    /// has both cursors reset; its bytes are left as they are.
    pub fn shrink(&mut self, keep: usize) -> ArenaInfo {
        let keep = keep.max(1);
        let before = self.chunks.get_mut().len();

        let mut position = 0;
        self.chunks.get_mut().retain(|chunk| {
            let retain = position < keep || chunk.back.get() != chunk.capacity;
            position += 1;
            if retain {
                chunk.reset();
            }
            retain
        });
        self.active.set(0);

        let info = self.info();
        debug!(
            "shrunk arena {:?} from {} to {} chunks",
            self.label().unwrap_or("<anonymous>"),
            before,
            info.chunk_count
        );
        info
    }

    /// Rewinds every chunk's cursors. Chunk count and contents are unchanged.
    pub fn reset(&mut self) {
        for chunk in self.chunks.get_mut().iter() {
            chunk.reset();
        }
        self.active.set(0);
    }

    /// Like [`Arena::reset`], and zero-fills every chunk.
    pub fn clear(&mut self) {
        for chunk in self.chunks.get_mut().iter() {
            chunk.reset();
            chunk.wipe();
        }
        self.active.set(0);
    }

    /// Aggregates capacity and usage over the chain.
    #[must_use]
    pub fn info(&self) -> ArenaInfo {
        let chunks = self.chunks.borrow();
        ArenaInfo {
            flags: self.flags,
            total_size: chunks.iter().map(|c| c.capacity).sum(),
            total_used: chunks.iter().map(Chunk::used).sum(),
            chunk_count: chunks.len(),
            chunk_size: chunks[0].capacity,
        }
    }

    /// Per-chunk cursor snapshot, head first.
    #[must_use]
    pub fn chunk_infos(&self) -> Vec<ChunkInfo> {
        self.chunks.borrow().iter().map(Chunk::info).collect()
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("label", &self.label)
            .field("active", &self.active.get())
            .field("info", &self.info())
            .finish()
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        // Head first, matching chain order.
        for chunk in self.chunks.get_mut().drain(..) {
            drop(chunk);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distance(a: NonNull<u8>, b: NonNull<u8>) -> usize {
        b.as_ptr().addr() - a.as_ptr().addr()
    }

    #[test]
    fn test_capacity_rounding() {
        let arena = Arena::new(1, PoolFlags::FIXED).unwrap();
        assert_eq!(arena.chunk_size(), MIN_POOL_SIZE);

        let arena = Arena::new(MIN_POOL_SIZE + 1, PoolFlags::FIXED).unwrap();
        assert_eq!(arena.chunk_size(), MIN_POOL_SIZE + ALIGN);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            Arena::new(0, PoolFlags::FIXED),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_shared_without_label_rejected() {
        assert!(matches!(
            Arena::new(1024, PoolFlags::SHARED),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_forward_allocations_are_aligned_and_contiguous() {
        let arena = Arena::new(1024, PoolFlags::FIXED).unwrap();
        let a = arena.alloc_forward(3).unwrap();
        let b = arena.alloc_forward(20).unwrap();

        assert_eq!(a.as_ptr().addr() % ALIGN, 0);
        assert_eq!(distance(a, b), ALIGN);
        assert_eq!(arena.info().total_used, ALIGN + 2 * ALIGN);
    }

    #[test]
    fn test_best_fit_keeps_exact_sizes() {
        let arena = Arena::new(1024, PoolFlags::BEST_FIT).unwrap();
        let a = arena.alloc_forward(3).unwrap();
        let b = arena.alloc_forward(5).unwrap();
        assert_eq!(distance(a, b), 3);
        assert_eq!(arena.info().total_used, 8);
    }

    #[test]
    fn test_zero_size_rejected() {
        let arena = Arena::new(1024, PoolFlags::DYNAMIC).unwrap();
        assert!(matches!(
            arena.alloc_forward(0),
            Err(Error::InvalidArgument { .. })
        ));
        assert!(matches!(
            arena.alloc_backward(0),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_backward_from_top() {
        let arena = Arena::new(1024, PoolFlags::FIXED).unwrap();
        let b = arena.alloc_backward(16).unwrap();
        let info = arena.chunk_infos()[0];
        assert_eq!(info.back, 1024 - 16);
        assert_eq!(info.front, 0);

        let f = arena.alloc_forward(16).unwrap();
        assert_eq!(distance(f, b), 1024 - 16);
    }

    #[test]
    fn test_backward_larger_than_head_rejected() {
        let arena = Arena::new(1024, PoolFlags::DYNAMIC).unwrap();
        assert!(matches!(
            arena.alloc_backward(2048),
            Err(Error::InvalidArgument { .. })
        ));
        assert_eq!(arena.info().chunk_count, 1);
    }

    #[test]
    fn test_fixed_arena_reports_pool_full() {
        let arena = Arena::new(1024, PoolFlags::FIXED).unwrap();
        arena.alloc_forward(1000).unwrap();
        assert_eq!(
            arena.alloc_forward(64),
            Err(Error::PoolFull {
                requested: 64,
                available: 16
            })
        );
    }

    #[test]
    fn test_dynamic_spill_uses_head_capacity() {
        let arena = Arena::new(1024, PoolFlags::DYNAMIC).unwrap();
        arena.alloc_forward(1024).unwrap();
        arena.alloc_forward(32).unwrap();

        let chunks = arena.chunk_infos();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].capacity, 1024);
        assert_eq!(chunks[1].front, 32);
        assert_eq!(arena.active_chunk(), 1);
    }

    #[test]
    fn test_spilled_chunks_are_marked_child() {
        let arena = Arena::new(1024, PoolFlags::DYNAMIC).unwrap();
        arena.alloc_forward(1024).unwrap();
        arena.alloc_forward(32).unwrap();

        let chunks = arena.chunk_infos();
        assert!(!chunks[0].child);
        assert_eq!(chunks[0].flags(), PoolFlags::FIXED);
        assert!(chunks[1].child);
        assert!(chunks[1].flags().contains(PoolFlags::CHILD));
        assert!(!chunks[1].flags().contains(PoolFlags::SHARED));
    }

    #[test]
    fn test_autosize_spill_uses_request_size() {
        let arena = Arena::new(4096, PoolFlags::DYNAMIC | PoolFlags::AUTOSIZE).unwrap();
        arena.alloc_forward(4096).unwrap();
        arena.alloc_forward(2000).unwrap();
        assert_eq!(arena.chunk_infos()[1].capacity, 2000_usize.next_multiple_of(ALIGN));
    }

    #[test]
    fn test_oversized_request_gets_own_chunk() {
        let arena = Arena::new(1024, PoolFlags::DYNAMIC).unwrap();
        arena.alloc_forward(5000).unwrap();
        let chunks = arena.chunk_infos();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].capacity, 5008);
    }

    #[test]
    fn test_realloc_in_place_grow_and_shrink() {
        let arena = Arena::new(1024, PoolFlags::FIXED).unwrap();
        let p = arena.alloc_forward(32).unwrap();
        unsafe { p.as_ptr().write_bytes(0xAB, 32) };

        let grown = unsafe { arena.realloc(p, 32, 64) }.unwrap();
        assert_eq!(grown, p);
        assert_eq!(arena.chunk_infos()[0].front, 64);

        let shrunk = unsafe { arena.realloc(p, 64, 16) }.unwrap();
        assert_eq!(shrunk, p);
        assert_eq!(arena.chunk_infos()[0].front, 16);
        unsafe {
            assert_eq!(*p.as_ptr(), 0xAB);
            assert_eq!(*p.as_ptr().add(16), 0);
            assert_eq!(*p.as_ptr().add(31), 0);
        }
    }

    #[test]
    fn test_realloc_huge_grow_of_last_block_fails() {
        let arena = Arena::new(1024, PoolFlags::FIXED).unwrap();
        arena.alloc_forward(32).unwrap();
        let p = arena.alloc_forward(16).unwrap();

        let err = unsafe { arena.realloc(p, 16, usize::MAX - 20) }.unwrap_err();
        assert!(matches!(err, Error::PoolFull { .. } | Error::OutOfMemory));
        assert_eq!(arena.chunk_infos()[0].front, 48);
    }

    #[test]
    fn test_realloc_moves_when_not_last() {
        let arena = Arena::new(1024, PoolFlags::FIXED).unwrap();
        let p = arena.alloc_forward(16).unwrap();
        unsafe { p.as_ptr().copy_from_nonoverlapping(b"arena-bytes!".as_ptr(), 12) };
        let _q = arena.alloc_forward(16).unwrap();

        let moved = unsafe { arena.realloc(p, 12, 100) }.unwrap();
        assert_ne!(moved, p);
        let copied = unsafe { std::slice::from_raw_parts(moved.as_ptr(), 12) };
        assert_eq!(copied, b"arena-bytes!");

        let same = unsafe { arena.realloc(p, 16, 8) }.unwrap();
        assert_eq!(same, p);
    }

    #[test]
    fn test_merge_inserts_after_head() {
        let mut dest = Arena::new(1024, PoolFlags::DYNAMIC).unwrap();
        dest.alloc_forward(1024).unwrap();
        dest.alloc_forward(16).unwrap();
        assert_eq!(dest.active_chunk(), 1);

        let src = Arena::new(2048, PoolFlags::FIXED).unwrap();
        let kept = src.alloc_forward(8).unwrap();
        unsafe { kept.as_ptr().write(42) };

        dest.merge(src).unwrap();
        let chunks = dest.chunk_infos();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].capacity, 2048);
        assert_eq!(dest.active_chunk(), 2);
        assert_eq!(unsafe { *kept.as_ptr() }, 42);
        assert!(!chunks[1].child);
        assert!(chunks[2].child);
    }

    #[test]
    fn test_shrink_releases_untouched_tail() {
        let mut arena = Arena::new(1024, PoolFlags::DYNAMIC).unwrap();
        arena.alloc_forward(1024).unwrap();
        arena.alloc_forward(1024).unwrap();
        arena.alloc_backward(16).unwrap();
        assert_eq!(arena.info().chunk_count, 3);

        // Chunk 2 has a backward allocation, so it survives `shrink(1)`.
        let info = arena.shrink(1);
        assert_eq!(info.chunk_count, 2);
        assert_eq!(info.total_used, 0);
        assert_eq!(arena.active_chunk(), 0);
    }

    #[test]
    fn test_reset_and_clear() {
        let mut arena = Arena::new(1024, PoolFlags::DYNAMIC).unwrap();
        let p = arena.alloc_forward(16).unwrap();
        unsafe { p.as_ptr().write(7) };

        arena.reset();
        assert_eq!(arena.info().total_used, 0);
        assert_eq!(unsafe { *p.as_ptr() }, 7);

        let p = arena.alloc_forward(16).unwrap();
        arena.clear();
        assert_eq!(unsafe { *p.as_ptr() }, 0);
    }

    #[test]
    fn test_no_zero_fill_flag_is_reported() {
        let arena = Arena::new(1024, PoolFlags::NO_ZERO_FILL).unwrap();
        assert!(arena.info().flags.contains(PoolFlags::NO_ZERO_FILL));
        assert!(!arena.is_shared());
        assert_eq!(arena.shared_refcount(), None);
    }
}
