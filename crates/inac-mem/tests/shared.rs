// Shared-memory arena integration tests
//
// Every test uses its own object label so the tests can run in parallel.

mod common;

use common::{fill, read, unique_label};
use inac_mem::{Arena, ArenaConfig, Error, PoolFlags, shared_memory_path};

fn create_flags() -> PoolFlags {
    PoolFlags::SHARED | PoolFlags::SHARED_CREATE
}

#[test]
fn test_second_handle_sees_first_handles_writes() {
    let label = unique_label("visible");
    let owner = Arena::with_label(4096, &label, create_flags() | PoolFlags::SHARED_OWNER).unwrap();
    let block = owner.alloc_forward(64).unwrap();
    fill(block, 64, 0xC3);

    let peer = Arena::with_label(4096, &label, PoolFlags::SHARED).unwrap();
    let view = peer.alloc_forward(64).unwrap();
    assert_eq!(read(view, 64), vec![0xC3; 64]);
    assert_eq!(peer.shared_refcount(), Some(2));
}

#[test]
fn test_last_close_unlinks_object() {
    let label = unique_label("refcount");
    let path = shared_memory_path(&label).unwrap();

    let first = Arena::with_label(1024, &label, create_flags()).unwrap();
    let second = Arena::with_label(1024, &label, create_flags()).unwrap();
    assert_eq!(first.shared_refcount(), Some(2));
    assert!(path.exists());

    drop(first);
    assert!(path.exists());
    assert_eq!(second.shared_refcount(), Some(1));

    drop(second);
    assert!(!path.exists());
}

#[test]
fn test_exclusive_create_fails_when_object_exists() {
    let label = unique_label("excl");
    let exclusive = create_flags() | PoolFlags::SHARED_EXCL;

    let first = Arena::with_label(1024, &label, exclusive).unwrap();
    let second = Arena::with_label(1024, &label, exclusive);
    assert!(matches!(second, Err(Error::Os { .. })));

    drop(first);
    assert!(!shared_memory_path(&label).unwrap().exists());
}

#[test]
fn test_exclusive_handle_unlinks_even_with_peers() {
    let label = unique_label("excl-peer");
    let path = shared_memory_path(&label).unwrap();

    let exclusive = Arena::with_label(1024, &label, create_flags() | PoolFlags::SHARED_EXCL).unwrap();
    let peer = Arena::with_label(1024, &label, PoolFlags::SHARED).unwrap();

    drop(exclusive);
    assert!(!path.exists());
    assert_eq!(peer.shared_refcount(), Some(1));
}

#[test]
fn test_open_missing_object_without_create() {
    let label = unique_label("missing");
    assert!(matches!(
        Arena::with_label(1024, &label, PoolFlags::SHARED),
        Err(Error::Os { .. })
    ));
}

#[test]
fn test_shared_arena_spills_to_heap_and_refuses_merge() {
    let label = unique_label("spill");
    let mut arena = ArenaConfig::new()
        .with_capacity(1024)
        .with_label(label.as_str())
        .shared()
        .build()
        .unwrap();

    arena.alloc_forward(1024).unwrap();
    arena.alloc_forward(512).unwrap();
    let chunks = arena.chunk_infos();
    assert_eq!(chunks.len(), 2);
    assert!(chunks[0].shared);
    assert!(!chunks[1].shared);

    let heap = Arena::new(1024, PoolFlags::FIXED).unwrap();
    assert!(matches!(
        arena.merge(heap),
        Err(Error::InvalidArgument { .. })
    ));

    let mut heap = Arena::new(1024, PoolFlags::FIXED).unwrap();
    let shared_src = Arena::with_label(1024, &label, PoolFlags::SHARED).unwrap();
    assert!(matches!(
        heap.merge(shared_src),
        Err(Error::InvalidArgument { .. })
    ));
}

#[test]
fn test_invalid_labels_rejected() {
    assert!(matches!(
        Arena::with_label(1024, "a/b", create_flags()),
        Err(Error::InvalidArgument { .. })
    ));
    assert!(matches!(
        Arena::with_label(1024, &"n".repeat(300), create_flags()),
        Err(Error::BufferTooSmall { .. })
    ));
    assert!(matches!(
        ArenaConfig::new().shared().build(),
        Err(Error::InvalidArgument { .. })
    ));
}
