/*!
 * Reference Protocol Tests
 * Adoption, promotion, demotion and orphan rescue
 */

use crate::common::{expire_count, link, make_ring, step_until_orphaned, GraphHost, Log};
use clockwork_gc::{BlockId, BlockState, Pool, PoolConfig};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::rc::Rc;

fn pool() -> (Pool<GraphHost>, Rc<RefCell<Log>>) {
    let (host, log) = GraphHost::new();
    let pool = Pool::new(PoolConfig::new(1 << 20), host).expect("valid config");
    (pool, log)
}

/// Two fat roots preserved in different slots, earliest first
fn two_owners(pool: &mut Pool<GraphHost>) -> (BlockId, BlockId) {
    let first = pool.alloc_fat(16, None).unwrap();
    loop {
        let other = pool.alloc_fat(16, None).unwrap();
        let (a, b) = (
            pool.preservation_slot(first).unwrap(),
            pool.preservation_slot(other).unwrap(),
        );
        // clock is at slot 0, so plain order is wheel order
        if a < b {
            return (first, other);
        }
        if b < a {
            return (other, first);
        }
    }
}

#[test]
fn test_reference_adopts_later_owner() {
    let (mut pool, _log) = pool();
    let (early, late) = two_owners(&mut pool);
    let child = pool.alloc_fat(16, Some(early)).unwrap();

    pool.reference(child, Some(late));

    assert_eq!(pool.owner(child), Some(late));
    assert_eq!(pool.expiration_slot(child), pool.preservation_slot(late));
    assert!(pool.audit().is_ok());
}

#[test]
fn test_reference_declines_earlier_owner() {
    let (mut pool, _log) = pool();
    let (early, late) = two_owners(&mut pool);
    let child = pool.alloc_fat(16, Some(late)).unwrap();

    pool.reference(child, Some(early));

    assert_eq!(pool.owner(child), Some(late));
    assert_eq!(pool.expiration_slot(child), pool.preservation_slot(late));
    assert!(pool.audit().is_ok());
}

#[test]
fn test_reference_none_promotes_to_root() {
    let (mut pool, log) = pool();
    let root = pool.alloc_fat(16, None).unwrap();
    let child = pool.alloc_fat(16, Some(root)).unwrap();

    pool.reference(child, None);

    assert_eq!(pool.block_state(child), Some(BlockState::Root));
    assert_eq!(pool.owner(child), None);
    assert_eq!(pool.expiration_slot(child), None);
    assert_eq!(pool.stats().roots, 2);

    pool.cycle();
    pool.cycle();
    assert!(pool.is_live(child));
    assert_eq!(expire_count(&log, child), 0);
}

#[test]
fn test_roots_ignore_references() {
    let (mut pool, _log) = pool();
    let root = pool.alloc_fat(16, None).unwrap();
    let other = pool.alloc_slim(16, None).unwrap();

    pool.reference(other, Some(root));
    assert_eq!(pool.block_state(other), Some(BlockState::Root));
    assert!(pool.audit().is_ok());
}

#[test]
fn test_self_reference_is_ignored() {
    let (mut pool, _log) = pool();
    let root = pool.alloc_fat(16, None).unwrap();
    let child = pool.alloc_fat(16, Some(root)).unwrap();
    let slot = pool.expiration_slot(child);

    pool.reference(child, Some(child));

    assert_eq!(pool.owner(child), Some(root));
    assert_eq!(pool.expiration_slot(child), slot);
}

#[test]
fn test_reference_from_slim_holder_is_ignored() {
    let (mut pool, _log) = pool();
    let root = pool.alloc_fat(16, None).unwrap();
    let slim = pool.alloc_slim(16, None).unwrap();
    let child = pool.alloc_fat(16, Some(root)).unwrap();

    pool.reference(child, Some(slim));
    assert_eq!(pool.owner(child), Some(root));
}

#[test]
fn test_unroot_hands_block_to_owner() {
    let (mut pool, log) = pool();
    let owner = pool.alloc_fat(16, None).unwrap();
    let block = pool.alloc_slim(16, None).unwrap();

    pool.unroot(block, owner);

    assert_eq!(pool.block_state(block), Some(BlockState::Owned));
    assert_eq!(pool.expiration_slot(block), pool.preservation_slot(owner));
    assert_eq!(pool.stats().roots, 1);
    assert!(pool.audit().is_ok());

    // Nobody re-asserts it, so it lapses
    pool.cycle();
    assert!(!pool.is_live(block));
    assert_eq!(expire_count(&log, block), 1);
}

#[test]
fn test_unrooted_block_kept_alive_by_owner() {
    let (mut pool, _log) = pool();
    let owner = pool.alloc_fat(16, None).unwrap();
    let block = pool.alloc_fat(16, None).unwrap();
    pool.unroot(block, owner);
    link(&mut pool, owner, block);

    for _ in 0..4 {
        pool.cycle();
    }
    assert!(pool.is_live(block));
    assert_eq!(pool.owner(block), Some(owner));
}

#[test]
fn test_unroot_ignores_misuse() {
    let (mut pool, _log) = pool();
    let owner = pool.alloc_fat(16, None).unwrap();
    let root = pool.alloc_fat(16, None).unwrap();
    let slim = pool.alloc_slim(16, None).unwrap();
    let owned = pool.alloc_slim(16, Some(owner)).unwrap();

    pool.unroot(root, root);
    pool.unroot(root, slim);
    pool.unroot(owned, root);

    assert_eq!(pool.block_state(root), Some(BlockState::Root));
    assert_eq!(pool.block_state(owned), Some(BlockState::Owned));
    assert_eq!(pool.expiration_slot(owned), pool.preservation_slot(owner));
    assert!(pool.audit().is_ok());
}

#[test]
fn test_orphan_rescued_by_outside_reference() {
    let (mut pool, _log) = pool();
    let holder = pool.alloc_fat(16, None).unwrap();
    let (a, b) = make_ring(&mut pool);

    assert!(step_until_orphaned(&mut pool, a));
    assert!(pool.is_live(b));
    assert_eq!(pool.block_state(b), Some(BlockState::Orphan));

    pool.reference(a, Some(holder));

    assert_eq!(pool.block_state(a), Some(BlockState::Owned));
    assert!(pool.preservation_slot(a).is_some());
    // Re-preserving `a` re-asserts its edge to `b`, rescuing it too
    assert_eq!(pool.block_state(b), Some(BlockState::Owned));
    assert_eq!(pool.stats().orphans, 0);
    assert!(pool.audit().is_ok());
}

#[test]
fn test_orphan_promoted_to_root() {
    let (mut pool, _log) = pool();
    let (a, b) = make_ring(&mut pool);
    assert!(step_until_orphaned(&mut pool, a));

    pool.reference(a, None);

    assert_eq!(pool.block_state(a), Some(BlockState::Root));
    assert!(pool.preservation_slot(a).is_some());
    assert_eq!(pool.block_state(b), Some(BlockState::Owned));
    assert_eq!(pool.owner(b), Some(a));
    assert!(pool.audit().is_ok());

    for _ in 0..3 {
        pool.cycle();
    }
    assert!(pool.is_live(a) && pool.is_live(b));
}
