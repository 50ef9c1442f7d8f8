use derecho_primitives::DeliveryMode;

use crate::policy::{SubgroupPolicy, SubgroupPolicyKind};
use crate::shard::ShardPolicy;

/// `num_shards` shards of `nodes_per_shard` members each, ordered delivery.
pub fn even_sharding(num_shards: usize, nodes_per_shard: usize) -> ShardPolicy {
    ShardPolicy::Even { num_shards, nodes_per_shard, mode: DeliveryMode::Ordered }
}

/// Same as [`even_sharding`] but with unordered delivery, for subgroups that
/// don't implement a Replicated Object (raw point-to-point shards).
pub fn raw_even_sharding(num_shards: usize, nodes_per_shard: usize) -> ShardPolicy {
    ShardPolicy::Even { num_shards, nodes_per_shard, mode: DeliveryMode::Unordered }
}

/// One shard per entry in `node_counts`/`modes`, sized and delivered
/// independently.
pub fn custom_shards_policy(node_counts: Vec<usize>, modes: Vec<DeliveryMode>) -> ShardPolicy {
    ShardPolicy::PerShard { node_counts, modes }
}

/// Wraps a single [`ShardPolicy`] as the policy for a type with exactly one
/// subgroup.
pub fn one_subgroup_policy(policy: ShardPolicy) -> SubgroupPolicy {
    SubgroupPolicy { num_subgroups: 1, kind: SubgroupPolicyKind::Identical(policy) }
}

/// `num_subgroups` subgroups, all using the same `shard_policy`.
pub fn identical_subgroups_policy(num_subgroups: usize, shard_policy: ShardPolicy) -> SubgroupPolicy {
    SubgroupPolicy { num_subgroups, kind: SubgroupPolicyKind::Identical(shard_policy) }
}
