use derecho_primitives::{DerechoError, DeliveryMode};

/// How a single subgroup's members are split into shards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShardPolicy {
    /// `num_shards` shards of exactly `nodes_per_shard` members each, all
    /// delivered in `mode`.
    Even { num_shards: usize, nodes_per_shard: usize, mode: DeliveryMode },
    /// One entry per shard: an explicit member count and delivery mode.
    /// `node_counts` and `modes` must have the same length.
    PerShard { node_counts: Vec<usize>, modes: Vec<DeliveryMode> },
}

impl ShardPolicy {
    pub fn num_shards(&self) -> usize {
        match self {
            ShardPolicy::Even { num_shards, .. } => *num_shards,
            ShardPolicy::PerShard { node_counts, .. } => node_counts.len(),
        }
    }

    /// Number of members needed for `shard_index`, and the delivery mode to
    /// use for it.
    pub fn shard_spec(&self, shard_index: usize) -> (usize, DeliveryMode) {
        match self {
            ShardPolicy::Even { nodes_per_shard, mode, .. } => (*nodes_per_shard, *mode),
            ShardPolicy::PerShard { node_counts, modes } => (node_counts[shard_index], modes[shard_index]),
        }
    }

    /// Total number of members this shard policy needs across all its
    /// shards.
    pub fn total_nodes_needed(&self) -> usize {
        match self {
            ShardPolicy::Even { num_shards, nodes_per_shard, .. } => num_shards * nodes_per_shard,
            ShardPolicy::PerShard { node_counts, .. } => node_counts.iter().sum(),
        }
    }

    pub fn validate(&self) -> Result<(), DerechoError> {
        match self {
            ShardPolicy::Even { num_shards, nodes_per_shard, .. } => {
                if *num_shards == 0 {
                    return Err(DerechoError::SubgroupProvisioning {
                        reason: "even shard policy must have at least one shard".into(),
                    });
                }
                if *nodes_per_shard == 0 {
                    return Err(DerechoError::SubgroupProvisioning {
                        reason: "even shard policy must have at least one node per shard".into(),
                    });
                }
                Ok(())
            }
            ShardPolicy::PerShard { node_counts, modes } => {
                if node_counts.is_empty() {
                    return Err(DerechoError::SubgroupProvisioning {
                        reason: "per-shard policy must have at least one shard".into(),
                    });
                }
                if node_counts.len() != modes.len() {
                    return Err(DerechoError::SubgroupProvisioning {
                        reason: "per-shard policy's node-count and mode lists must be the same length".into(),
                    });
                }
                if node_counts.iter().any(|&c| c == 0) {
                    return Err(DerechoError::SubgroupProvisioning {
                        reason: "every shard needs at least one node".into(),
                    });
                }
                Ok(())
            }
        }
    }
}
