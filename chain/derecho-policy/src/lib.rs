//! Declarative description of how many subgroups of each replicated type
//! exist, how many shards each has, and each shard's delivery mode. This
//! crate is pure data plus a handful of constructor helpers; the allocator
//! in `derecho-group-admin` is the only thing that interprets it.

mod constructors;
mod policy;
mod shard;

pub use constructors::{
    custom_shards_policy, even_sharding, identical_subgroups_policy, one_subgroup_policy,
    raw_even_sharding,
};
pub use policy::{Policy, SubgroupPolicy, SubgroupPolicyKind};
pub use shard::ShardPolicy;
