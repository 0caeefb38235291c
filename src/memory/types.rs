/*!
 * Memory Types
 * Configuration, statistics and block classification for pools
 */

use super::block::{FatState, Header};
use crate::core::errors::{GcError, GcResult};
use crate::core::limits::{CYCLE_DETECT_INTERVAL, DEFAULT_QUOTA, DEFAULT_SEED};
use crate::core::types::{Size, Tick};
use serde::{Deserialize, Serialize};
use std::mem::size_of;

/// Block flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// Atomic payload, never holds references
    Slim,
    /// May hold references; gets periodic preserve callbacks
    Fat,
}

impl BlockKind {
    /// Bookkeeping bytes charged to the quota on top of the payload
    pub fn header_size(self) -> Size {
        match self {
            BlockKind::Slim => size_of::<Header>(),
            BlockKind::Fat => size_of::<Header>() + size_of::<FatState>(),
        }
    }
}

/// Where a block currently sits in the ownership protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockState {
    /// Never expires through the wheel
    Root,
    /// Scheduled to expire unless re-referenced
    Owned,
    /// Fat block cut loose by ring detection; still scheduled to expire
    Orphan,
}

/// How pool teardown drains live blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainMode {
    /// Expire wheel slots then roots, repeating until nothing is live
    #[default]
    Exhaustive,
    /// One pass over wheel slots then roots; leftovers are released silently
    SinglePass,
}

/// Pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum sum of live header + payload bytes
    pub quota: Size,
    /// Preservation passes between ownership-ring checks
    pub cycle_detect_interval: u8,
    /// Seed for the preservation jitter table
    pub seed: u64,
    /// Teardown strategy
    pub drain_on_drop: DrainMode,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            quota: DEFAULT_QUOTA,
            cycle_detect_interval: CYCLE_DETECT_INTERVAL,
            seed: DEFAULT_SEED,
            drain_on_drop: DrainMode::default(),
        }
    }
}

impl PoolConfig {
    pub fn new(quota: Size) -> Self {
        Self {
            quota,
            ..Self::default()
        }
    }

    pub fn with_quota(mut self, quota: Size) -> Self {
        self.quota = quota;
        self
    }

    pub fn with_cycle_detect_interval(mut self, interval: u8) -> Self {
        self.cycle_detect_interval = interval;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_drain_mode(mut self, mode: DrainMode) -> Self {
        self.drain_on_drop = mode;
        self
    }

    /// Parse a JSON config document; missing fields take defaults
    pub fn from_json(text: &str) -> GcResult<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| GcError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> GcResult<()> {
        if self.cycle_detect_interval == 0 {
            return Err(GcError::InvalidConfig(
                "cycle_detect_interval must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Pool statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PoolStats {
    pub quota: Size,
    pub used: Size,
    pub available: Size,
    pub live_blocks: usize,
    pub fat_blocks: usize,
    pub roots: usize,
    pub orphans: usize,
    pub clock: Tick,
    /// Preserve callbacks issued since creation
    pub preserved: u64,
    /// Expire callbacks issued since creation
    pub expired: u64,
    /// Blocks orphaned by ring detection since creation
    pub orphaned: u64,
    /// Ticks forced by quota pressure since creation
    pub forced_ticks: u64,
}

impl PoolStats {
    /// Fraction of the quota in use
    pub fn usage_ratio(&self) -> f64 {
        if self.quota == 0 {
            0.0
        } else {
            self.used as f64 / self.quota as f64
        }
    }
}
