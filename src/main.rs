/*!
 * Clockwork - Soak Driver
 *
 * Churns short linked lists under a single root, one collection step per
 * iteration, and prints pool statistics as JSON when done.
 *
 * Environment variables:
 * - CLOCKWORK_QUOTA: pool quota in bytes
 * - CLOCKWORK_ITERATIONS: churn iterations (default: 100000)
 * - CLOCKWORK_CONFIG: path to a JSON pool config
 * - CLOCKWORK_TRACE_JSON: JSON log output
 */

use anyhow::{Context, Result};
use clockwork_gc::monitoring::{init_tracing, span_collection};
use clockwork_gc::{BlockId, Host, Pool, PoolConfig, Size};
use tracing::info;

const DEFAULT_ITERATIONS: u64 = 100_000;

/// Payload of a demo block
#[derive(Debug, Clone, Copy, Default)]
enum Node {
    #[default]
    Empty,
    Int(u64),
    List {
        value: Option<BlockId>,
        next: Option<BlockId>,
    },
    Root {
        int1: Option<BlockId>,
        list1: Option<BlockId>,
        list2: Option<BlockId>,
    },
}

impl Node {
    fn edges(self) -> [Option<BlockId>; 3] {
        match self {
            Node::Empty | Node::Int(_) => [None; 3],
            Node::List { value, next } => [value, next, None],
            Node::Root { int1, list1, list2 } => [int1, list1, list2],
        }
    }
}

#[derive(Debug, Default)]
struct ChurnHost {
    allocated: u64,
    expired_ints: u64,
    expired_int_total: u64,
    expired_lists: u64,
}

impl Host for ChurnHost {
    type Memory = Node;

    fn alloc(&mut self, _size: Size) -> Option<Node> {
        self.allocated += 1;
        Some(Node::Empty)
    }

    fn free(&mut self, _memory: Node) {}

    fn expire(pool: &mut Pool<Self>, block: BlockId) {
        let node = pool.memory(block).copied().unwrap_or_default();
        let host = pool.host_mut();
        match node {
            Node::Int(value) => {
                host.expired_ints += 1;
                host.expired_int_total += value;
            }
            Node::List { .. } => host.expired_lists += 1,
            _ => {}
        }
    }

    fn preserve(pool: &mut Pool<Self>, block: BlockId) {
        let node = pool.memory(block).copied().unwrap_or_default();
        for edge in node.edges().into_iter().flatten() {
            pool.reference(edge, Some(block));
        }
    }
}

fn set(pool: &mut Pool<ChurnHost>, block: BlockId, node: Node) {
    if let Some(memory) = pool.memory_mut(block) {
        *memory = node;
    }
}

fn list_make(
    pool: &mut Pool<ChurnHost>,
    owner: BlockId,
    value: Option<BlockId>,
    next: Option<BlockId>,
) -> Result<BlockId> {
    let list = pool.alloc_fat(std::mem::size_of::<Node>(), Some(owner))?;
    set(pool, list, Node::List { value, next });
    for edge in [value, next].into_iter().flatten() {
        pool.reference(edge, Some(list));
    }
    Ok(list)
}

fn load_config() -> Result<PoolConfig> {
    let mut config = match std::env::var("CLOCKWORK_CONFIG") {
        Ok(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading pool config {}", path))?;
            PoolConfig::from_json(&text)?
        }
        Err(_) => PoolConfig::default(),
    };

    if let Ok(quota) = std::env::var("CLOCKWORK_QUOTA") {
        config.quota = quota
            .parse()
            .with_context(|| format!("CLOCKWORK_QUOTA is not a byte count: {}", quota))?;
    }
    Ok(config)
}

fn main() -> Result<()> {
    init_tracing();

    let config = load_config()?;
    let iterations = match std::env::var("CLOCKWORK_ITERATIONS") {
        Ok(value) => value
            .parse()
            .with_context(|| format!("CLOCKWORK_ITERATIONS is not a count: {}", value))?,
        Err(_) => DEFAULT_ITERATIONS,
    };

    info!(quota = config.quota, iterations, version = clockwork_gc::VERSION, "soak starting");
    let mut pool = Pool::new(config, ChurnHost::default())?;
    let node_size = std::mem::size_of::<Node>();

    let root = pool.alloc_fat(node_size, None)?;
    set(&mut pool, root, Node::Root { int1: None, list1: None, list2: None });

    {
        let span = span_collection("churn");
        let _guard = span.enter();
        for count in 1..=iterations {
            let int1 = pool.alloc_fat(node_size, Some(root))?;
            set(&mut pool, int1, Node::Int(count));

            let list1 = list_make(&mut pool, root, Some(int1), None)?;
            let list2 = list_make(&mut pool, root, Some(int1), Some(list1))?;

            // Close the two lists into a ring
            set(&mut pool, list1, Node::List { value: Some(int1), next: Some(list2) });
            pool.reference(list2, Some(list1));

            set(
                &mut pool,
                root,
                Node::Root { int1: Some(int1), list1: Some(list1), list2: Some(list2) },
            );
            pool.step();
        }
        span.record_blocks(pool.len());
    }

    let stats = pool.stats();
    info!(
        live = stats.live_blocks,
        expired = stats.expired,
        orphaned = stats.orphaned,
        "soak finished"
    );
    if let Err(problem) = pool.audit() {
        anyhow::bail!("pool audit failed: {}", problem);
    }

    println!("{}", serde_json::to_string_pretty(&stats)?);
    let host = pool.host();
    info!(
        allocated = host.allocated,
        expired_ints = host.expired_ints,
        expired_int_total = host.expired_int_total,
        expired_lists = host.expired_lists,
        "host totals"
    );

    pool.free_pool();
    Ok(())
}
