use derecho_primitives::{DeliveryMode, DerechoError};
use derecho_view::{Layout, SubView};

/// Derives one single-shard subgroup per (source member, target shard) pair:
/// a stateless second allocation strategy layered on top of two subgroups
/// that are already assigned, used to give every member of a source shard
/// its own private channel into each shard of a target subgroup.
///
/// Unlike [`GroupAdmin`](crate::GroupAdmin), this allocator keeps no state
/// between calls — its output is a pure function of its two inputs.
pub struct CrossProductAllocator;

impl CrossProductAllocator {
    /// Flattens `source_shards`' members in shard-then-intra-shard order and,
    /// for every (source member, target shard) pair, builds a shard of
    /// `[source_member, ...target_shard.members]` with `source_member` as the
    /// sole sender. A source member repeated across shards is not
    /// deduplicated: it gets one derived subgroup per occurrence, matching
    /// how the original allocator this is grounded on behaves.
    pub fn compute(source_shards: &[SubView], target_shards: &[SubView]) -> Result<Layout, DerechoError> {
        if source_shards.is_empty() {
            return Err(DerechoError::SubgroupProvisioning {
                reason: "cross-product allocation needs at least one source shard".into(),
            });
        }
        if target_shards.is_empty() {
            return Err(DerechoError::SubgroupProvisioning {
                reason: "cross-product allocation needs at least one target shard".into(),
            });
        }

        let source_members: Vec<_> = source_shards
            .iter()
            .flat_map(|shard| shard.members.iter().zip(shard.endpoints.iter()))
            .collect();
        let num_target_shards = target_shards.len();

        let mut layout = Layout::with_capacity(source_members.len() * num_target_shards);
        layout.resize(source_members.len() * num_target_shards, Vec::new());

        for (source_index, (&source_node, &source_endpoint)) in source_members.iter().enumerate() {
            for (target_index, target_shard) in target_shards.iter().enumerate() {
                let mut members = Vec::with_capacity(1 + target_shard.members.len());
                let mut endpoints = Vec::with_capacity(1 + target_shard.endpoints.len());
                let mut sender_flags = Vec::with_capacity(1 + target_shard.members.len());

                members.push(source_node);
                endpoints.push(source_endpoint);
                sender_flags.push(true);

                for (&member, &endpoint) in target_shard.members.iter().zip(target_shard.endpoints.iter()) {
                    members.push(member);
                    endpoints.push(endpoint);
                    sender_flags.push(false);
                }

                let subview = SubView {
                    members,
                    endpoints,
                    mode: DeliveryMode::Ordered,
                    sender_flags,
                    joined: Vec::new(),
                    departed: Vec::new(),
                };

                let subgroup_index = Self::subgroup_index(source_index, target_index, num_target_shards);
                layout[subgroup_index] = vec![subview];
            }
        }

        Ok(layout)
    }

    /// Addressing formula for the derived subgroup of
    /// (`source_member_index`, `target_shard_index`): `i * num_target_shards + j`.
    pub fn subgroup_index(source_member_index: usize, target_shard_index: usize, num_target_shards: usize) -> usize {
        source_member_index * num_target_shards + target_shard_index
    }
}
