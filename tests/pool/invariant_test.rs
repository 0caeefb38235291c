/*!
 * Invariant Tests
 * Random operation sequences keep wheel membership and accounting sound
 */

use crate::common::{link, GraphHost};
use clockwork_gc::{BlockId, BlockKind, BlockState, Pool, PoolConfig};
use proptest::prelude::*;
use std::collections::HashSet;

#[derive(Debug, Clone)]
enum Op {
    AllocSlim { size: u16, owner: u8 },
    AllocFat { size: u16, owner: u8 },
    AllocRoot { fat: bool },
    Link { from: u8, to: u8 },
    Promote { target: u8 },
    Unroot { target: u8, owner: u8 },
    Forget { from: u8 },
    Step,
    Tick,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1u16..2048, any::<u8>()).prop_map(|(size, owner)| Op::AllocSlim { size, owner }),
        3 => (1u16..512, any::<u8>()).prop_map(|(size, owner)| Op::AllocFat { size, owner }),
        1 => any::<bool>().prop_map(|fat| Op::AllocRoot { fat }),
        3 => (any::<u8>(), any::<u8>()).prop_map(|(from, to)| Op::Link { from, to }),
        1 => any::<u8>().prop_map(|target| Op::Promote { target }),
        1 => (any::<u8>(), any::<u8>()).prop_map(|(target, owner)| Op::Unroot { target, owner }),
        1 => any::<u8>().prop_map(|from| Op::Forget { from }),
        4 => Just(Op::Step),
        2 => Just(Op::Tick),
    ]
}

fn pick(pool: &Pool<GraphHost>, n: u8) -> Option<BlockId> {
    let live = pool.blocks();
    if live.is_empty() {
        None
    } else {
        Some(live[n as usize % live.len()])
    }
}

fn apply(pool: &mut Pool<GraphHost>, op: &Op) {
    match *op {
        Op::AllocSlim { size, owner } => {
            if let Some(owner) = pick(pool, owner) {
                let _ = pool.alloc_slim(size as usize, Some(owner));
            }
        }
        Op::AllocFat { size, owner } => {
            if let Some(owner) = pick(pool, owner) {
                let _ = pool.alloc_fat(size as usize, Some(owner));
            }
        }
        Op::AllocRoot { fat } => {
            let _ = if fat {
                pool.alloc_fat(64, None)
            } else {
                pool.alloc_slim(64, None)
            };
        }
        Op::Link { from, to } => {
            if let (Some(from), Some(to)) = (pick(pool, from), pick(pool, to)) {
                if pool.kind(from) == Some(BlockKind::Fat) {
                    link(pool, from, to);
                }
            }
        }
        Op::Promote { target } => {
            if let Some(target) = pick(pool, target) {
                pool.reference(target, None);
            }
        }
        Op::Unroot { target, owner } => {
            if let (Some(target), Some(owner)) = (pick(pool, target), pick(pool, owner)) {
                pool.unroot(target, owner);
            }
        }
        Op::Forget { from } => {
            if let Some(from) = pick(pool, from) {
                pool.host_mut().edges.remove(&from);
            }
        }
        Op::Step => pool.step(),
        Op::Tick => pool.tick(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_operations_preserve_invariants(ops in prop::collection::vec(op(), 1..300)) {
        let (host, log) = GraphHost::new();
        let mut pool = Pool::new(PoolConfig::new(64 * 1024), host).unwrap();

        for op in &ops {
            apply(&mut pool, op);
            if let Err(problem) = pool.audit() {
                prop_assert!(false, "after {:?}: {}", op, problem);
            }
            let stats = pool.stats();
            prop_assert!(stats.used <= stats.quota);
            prop_assert_eq!(stats.live_blocks, pool.len());
        }

        let roots: HashSet<BlockId> = pool
            .blocks()
            .into_iter()
            .filter(|&id| pool.block_state(id) == Some(BlockState::Root))
            .collect();
        let live = pool.len() as u64;
        let expired_before = log.borrow().expired.len() as u64;

        // roots are untouched by a full revolution
        pool.cycle();
        for root in &roots {
            prop_assert!(pool.is_live(*root));
        }

        drop(pool);
        let log = log.borrow();
        let unique: HashSet<BlockId> = log.expired.iter().copied().collect();
        prop_assert_eq!(unique.len(), log.expired.len());
        prop_assert_eq!(log.freed, log.expired.len());
        // everything live before the final revolution expired exactly once
        prop_assert_eq!(log.expired.len() as u64, expired_before + live);
    }
}
