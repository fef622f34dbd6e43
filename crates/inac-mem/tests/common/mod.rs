// Common test utilities for integration tests
//
// Shared fixtures for the arena, string, list and shared-memory tests.

#![allow(dead_code)]

use inac_mem::{Arena, PoolFlags};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

static LABEL_ID: AtomicUsize = AtomicUsize::new(0);

/// Returns a shared-memory label unique to this process and call.
pub fn unique_label(prefix: &str) -> String {
    let id = LABEL_ID.fetch_add(1, Ordering::SeqCst);
    format!("inac-{prefix}-{}-{id}", std::process::id())
}

/// Creates a 1 KiB heap arena with the given flags.
pub fn small_arena(flags: PoolFlags) -> Arena {
    Arena::new(1024, flags).expect("Failed to create test arena")
}

/// Returns `front + (capacity - back)` for every chunk, checking the cursor
/// invariant on the way.
pub fn checked_usage(arena: &Arena) -> Vec<usize> {
    arena
        .chunk_infos()
        .iter()
        .map(|chunk| {
            assert!(chunk.front <= chunk.back, "cursors crossed: {chunk:?}");
            assert!(chunk.back <= chunk.capacity, "back past end: {chunk:?}");
            let used = chunk.front + (chunk.capacity - chunk.back);
            assert!(used <= chunk.capacity);
            used
        })
        .collect()
}

/// Fills `len` bytes at `ptr` with `byte`.
pub fn fill(ptr: NonNull<u8>, len: usize, byte: u8) {
    unsafe { ptr.as_ptr().write_bytes(byte, len) };
}

/// Reads `len` bytes at `ptr`.
pub fn read(ptr: NonNull<u8>, len: usize) -> Vec<u8> {
    unsafe { std::slice::from_raw_parts(ptr.as_ptr(), len).to_vec() }
}
