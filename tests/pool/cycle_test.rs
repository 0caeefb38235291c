/*!
 * Ring Detection Tests
 * Unreferenced ownership rings are cut loose and collected
 */

use crate::common::{expire_count, link, make_ring, GraphHost};
use clockwork_gc::core::limits::NUM_SLOTS;
use clockwork_gc::{OwnerChain, Pool, PoolConfig};
use pretty_assertions::assert_eq;

#[test]
fn test_ring_is_orphaned_then_freed() {
    let (host, log) = GraphHost::new();
    let mut pool = Pool::new(PoolConfig::new(1 << 20), host).unwrap();
    let (a, b) = make_ring(&mut pool);

    assert_eq!(pool.owner_chain(a), OwnerChain::Ring(vec![a, b]));

    for _ in 0..20 {
        pool.cycle();
        assert!(pool.audit().is_ok());
    }

    assert!(!pool.is_live(a));
    assert!(!pool.is_live(b));
    assert_eq!(expire_count(&log, a), 1);
    assert_eq!(expire_count(&log, b), 1);
    assert_eq!(pool.stats().orphaned, 2);
    assert!(pool.is_empty());
    assert_eq!(pool.used(), 0);
}

#[test]
fn test_three_block_ring_is_freed() {
    let (host, log) = GraphHost::new();
    let mut pool = Pool::new(PoolConfig::new(1 << 20), host).unwrap();
    let a = pool.alloc_fat(32, None).unwrap();
    let b = pool.alloc_fat(32, Some(a)).unwrap();
    let c = pool.alloc_fat(32, Some(b)).unwrap();
    link(&mut pool, a, b);
    link(&mut pool, b, c);
    pool.host_mut().edges.entry(c).or_default().push(a);
    pool.unroot(a, c);

    for _ in 0..30 {
        pool.cycle();
    }

    for id in [a, b, c] {
        assert!(!pool.is_live(id));
        assert_eq!(expire_count(&log, id), 1);
    }
}

#[test]
fn test_rooted_chain_is_never_orphaned() {
    let (host, log) = GraphHost::new();
    let mut pool = Pool::new(
        PoolConfig::new(1 << 20).with_cycle_detect_interval(1),
        host,
    )
    .unwrap();

    let root = pool.alloc_fat(16, None).unwrap();
    let mut chain = vec![root];
    for _ in 0..50 {
        let parent = *chain.last().unwrap();
        let next = pool.alloc_fat(16, Some(parent)).unwrap();
        link(&mut pool, parent, next);
        chain.push(next);
    }
    assert_eq!(pool.owner_chain(*chain.last().unwrap()), OwnerChain::Open);

    for _ in 0..8 {
        pool.cycle();
    }

    assert_eq!(pool.stats().orphaned, 0);
    assert!(chain.iter().all(|&id| pool.is_live(id)));
    assert!(log.borrow().expired.is_empty());
}

#[test]
fn test_ring_cut_frees_nothing_in_same_tick() {
    // R holds A; A and B hold each other. Cutting the ring must leave its
    // members a preserve pass before either can lapse.
    for seed in 0..64 {
        let (host, _log) = GraphHost::new();
        let mut pool = Pool::new(
            PoolConfig::new(1 << 20)
                .with_cycle_detect_interval(1)
                .with_seed(seed),
            host,
        )
        .unwrap();
        let r = pool.alloc_fat(16, None).unwrap();
        let a = pool.alloc_fat(16, Some(r)).unwrap();
        let b = pool.alloc_fat(16, Some(a)).unwrap();
        link(&mut pool, r, a);
        link(&mut pool, a, b);
        link(&mut pool, b, a);

        for tick in 0..8 * NUM_SLOTS {
            let orphaned = pool.stats().orphaned;
            pool.tick();
            if !pool.is_live(a) || !pool.is_live(b) {
                assert_eq!(
                    pool.stats().orphaned,
                    orphaned,
                    "seed {} tick {}: ring member freed in the tick it was cut",
                    seed,
                    tick
                );
                break;
            }
        }
        assert!(pool.is_live(r));
        assert!(pool.audit().is_ok());
    }
}
