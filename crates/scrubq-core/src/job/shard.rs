use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// Identifier of a data shard (placement group): pool id plus hash seed.
///
/// Printed and parsed as `pool.seedhex`, e.g. `3.1f`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardId {
    pub pool: u64,
    pub seed: u32,
}

impl ShardId {
    pub const fn new(pool: u64, seed: u32) -> Self {
        Self { pool, seed }
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:x}", self.pool, self.seed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid shard id {0:?} (expected pool.seedhex)")]
pub struct ParseShardIdError(String);

impl FromStr for ShardId {
    type Err = ParseShardIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseShardIdError(s.to_string());
        let (pool, seed) = s.split_once('.').ok_or_else(err)?;
        let pool = pool.parse().map_err(|_| err())?;
        let seed = u32::from_str_radix(seed, 16).map_err(|_| err())?;
        Ok(Self { pool, seed })
    }
}

impl Serialize for ShardId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
