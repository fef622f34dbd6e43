// Arena allocator integration tests
//
// Cursor invariants, spill policy, in-place reallocation, merging and
// shrinking, exercised through the public API only.

mod common;

use common::{checked_usage, fill, read, small_arena};
use inac_mem::{
    ALIGN, Arena, ArenaConfig, Error, MIN_POOL_SIZE, PoolFlags, error::Subject,
};

/// Deterministic pseudo-random sizes in `1..=max`.
fn sizes(count: usize, max: usize) -> Vec<usize> {
    let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
    (0..count)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state as usize % max) + 1
        })
        .collect()
}

// ============================================================================
// Cursor invariants
// ============================================================================

#[test]
fn test_cursor_invariant_holds_after_every_allocation() {
    let arena = small_arena(PoolFlags::DYNAMIC);

    for (i, size) in sizes(500, 300).into_iter().enumerate() {
        if i % 3 == 0 {
            arena.alloc_backward(size).unwrap();
        } else {
            arena.alloc_forward(size).unwrap();
        }
        checked_usage(&arena);
    }

    let info = arena.info();
    assert_eq!(info.total_used, checked_usage(&arena).iter().sum::<usize>());
    assert!(info.total_used <= info.total_size);
    assert_eq!(info.chunk_count, arena.chunk_infos().len());
}

#[test]
fn test_best_fit_invariant_with_odd_sizes() {
    let arena = small_arena(PoolFlags::DYNAMIC | PoolFlags::BEST_FIT);
    for size in sizes(200, 97) {
        arena.alloc_forward(size).unwrap();
        arena.alloc_backward(size).unwrap();
        checked_usage(&arena);
    }
}

#[test]
fn test_forward_and_backward_blocks_never_overlap() {
    let arena = small_arena(PoolFlags::FIXED);
    let a = 512;
    let b = 512;

    let front = arena.alloc_forward(a).unwrap();
    let back = arena.alloc_backward(b).unwrap();
    fill(front, a, 0x11);
    fill(back, b, 0x22);

    assert!(read(front, a).iter().all(|&x| x == 0x11));
    assert!(read(back, b).iter().all(|&x| x == 0x22));
    assert!(front.as_ptr().addr() + a <= back.as_ptr().addr());
    assert_eq!(arena.info().total_used, 1024);
}

// ============================================================================
// Spill policy
// ============================================================================

#[test]
fn test_fixed_arena_rejects_oversized_request() {
    let arena = small_arena(PoolFlags::FIXED);
    let err = arena.alloc_forward(1025).unwrap_err();

    assert_eq!(
        err,
        Error::PoolFull {
            requested: 1025_usize.next_multiple_of(ALIGN),
            available: 1024
        }
    );
    assert!(err.is_exhaustion());
    assert_eq!(err.code().subject, Subject::Pool);
}

#[test]
fn test_dynamic_arena_spills_oversized_request() {
    let arena = small_arena(PoolFlags::DYNAMIC);
    arena.alloc_forward(1025).unwrap();

    let info = arena.info();
    assert_eq!(info.chunk_count, 2);
    assert_eq!(info.chunk_size, 1024);
    assert_eq!(arena.chunk_infos()[1].capacity, 1025_usize.next_multiple_of(ALIGN));
}

#[test]
fn test_dynamic_arena_reuses_existing_chunks_after_reset() {
    let mut arena = small_arena(PoolFlags::DYNAMIC);
    for _ in 0..4 {
        arena.alloc_forward(1024).unwrap();
    }
    assert_eq!(arena.info().chunk_count, 4);

    arena.reset();
    for _ in 0..4 {
        arena.alloc_forward(1024).unwrap();
    }
    assert_eq!(arena.info().chunk_count, 4);
    assert_eq!(arena.active_chunk(), 3);
}

#[test]
fn test_no_zero_fill_arena_still_allocates() {
    let arena = small_arena(PoolFlags::DYNAMIC | PoolFlags::NO_ZERO_FILL);
    let p = arena.alloc_forward(64).unwrap();
    fill(p, 64, 0xEE);
    assert_eq!(read(p, 64), vec![0xEE; 64]);
}

// ============================================================================
// Reallocation
// ============================================================================

#[test]
fn test_realloc_last_allocation_returns_same_pointer() {
    let arena = small_arena(PoolFlags::DYNAMIC);
    let _earlier = arena.alloc_forward(100).unwrap();
    let last = arena.alloc_forward(40).unwrap();
    fill(last, 40, 0x33);

    let grown = unsafe { arena.realloc(last, 40, 400) }.unwrap();
    assert_eq!(grown, last);
    assert_eq!(read(grown, 40), vec![0x33; 40]);
}

#[test]
fn test_realloc_spills_when_chunk_is_exhausted() {
    let arena = small_arena(PoolFlags::DYNAMIC);
    let p = arena.alloc_forward(512).unwrap();
    fill(p, 512, 0x44);

    let moved = unsafe { arena.realloc(p, 512, 2048) }.unwrap();
    assert_ne!(moved, p);
    assert_eq!(read(moved, 512), vec![0x44; 512]);
    assert_eq!(arena.info().chunk_count, 2);
}

#[test]
fn test_realloc_fixed_arena_reports_pool_full() {
    let arena = small_arena(PoolFlags::FIXED);
    let p = arena.alloc_forward(512).unwrap();
    let _q = arena.alloc_forward(256).unwrap();
    let result = unsafe { arena.realloc(p, 512, 600) };
    assert!(matches!(result, Err(Error::PoolFull { .. })));
}

#[test]
fn test_realloc_zero_size_rejected() {
    let arena = small_arena(PoolFlags::FIXED);
    let p = arena.alloc_forward(16).unwrap();
    assert!(matches!(
        unsafe { arena.realloc(p, 16, 0) },
        Err(Error::InvalidArgument { .. })
    ));
}

// ============================================================================
// Merge, shrink, clear
// ============================================================================

#[test]
fn test_shrink_releases_unused_trailing_chunks() {
    let mut arena = small_arena(PoolFlags::DYNAMIC);
    let head_block = arena.alloc_forward(512).unwrap();
    fill(head_block, 512, 0x5A);
    arena.alloc_forward(1024).unwrap();
    arena.alloc_forward(1024).unwrap();
    assert_eq!(arena.info().chunk_count, 3);

    let info = arena.shrink(1);
    assert_eq!(info.chunk_count, 1);
    assert_eq!(info.total_used, 0);
    assert_eq!(read(head_block, 512), vec![0x5A; 512]);
}

#[test]
fn test_shrink_keeps_requested_chunks() {
    let mut arena = small_arena(PoolFlags::DYNAMIC);
    for _ in 0..5 {
        arena.alloc_forward(1024).unwrap();
    }
    let info = arena.shrink(3);
    assert_eq!(info.chunk_count, 3);
    assert_eq!(info.total_size, 3 * 1024);

    let info = arena.shrink(0);
    assert_eq!(info.chunk_count, 1);
}

#[test]
fn test_merge_keeps_source_data_alive() {
    let mut dest = small_arena(PoolFlags::DYNAMIC);
    let src = Arena::new(4096, PoolFlags::FIXED).unwrap();
    let block = src.alloc_forward(64).unwrap();
    fill(block, 64, 0x7C);

    dest.merge(src).unwrap();
    let info = dest.info();
    assert_eq!(info.chunk_count, 2);
    assert_eq!(info.total_size, 1024 + 4096);
    assert_eq!(info.total_used, 64);
    assert_eq!(read(block, 64), vec![0x7C; 64]);
}

#[test]
fn test_clear_zero_fills_every_chunk() {
    let mut arena = small_arena(PoolFlags::DYNAMIC);
    let a = arena.alloc_forward(1024).unwrap();
    let b = arena.alloc_forward(1024).unwrap();
    fill(a, 1024, 0xFF);
    fill(b, 1024, 0xFF);

    arena.clear();
    assert_eq!(arena.info().chunk_count, 2);
    assert_eq!(arena.info().total_used, 0);
    assert!(read(a, 1024).iter().all(|&x| x == 0));
    assert!(read(b, 1024).iter().all(|&x| x == 0));
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_config_rounds_capacity() {
    let arena = ArenaConfig::new().with_capacity(10).build().unwrap();
    assert_eq!(arena.chunk_size(), MIN_POOL_SIZE);
    assert!(arena.flags().is_dynamic());

    assert!(matches!(
        ArenaConfig::new().with_capacity(0).build(),
        Err(Error::InvalidArgument { .. })
    ));
}

#[test]
fn test_arena_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<Arena>();

    let arena = small_arena(PoolFlags::DYNAMIC);
    let used = std::thread::spawn(move || {
        arena.alloc_forward(32).unwrap();
        arena.info().total_used
    })
    .join()
    .unwrap();
    assert_eq!(used, 32);
}
