use derecho_primitives::{DerechoError, TypeTag};

use crate::shard::ShardPolicy;

/// Either one [`ShardPolicy`] shared by every subgroup of this type, or one
/// per subgroup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubgroupPolicyKind {
    Identical(ShardPolicy),
    PerSubgroup(Vec<ShardPolicy>),
}

/// Allocation policy for all subgroups of one replicated type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubgroupPolicy {
    pub num_subgroups: usize,
    pub kind: SubgroupPolicyKind,
}

impl SubgroupPolicy {
    pub fn shard_policy(&self, subgroup_index: usize) -> &ShardPolicy {
        match &self.kind {
            SubgroupPolicyKind::Identical(policy) => policy,
            SubgroupPolicyKind::PerSubgroup(policies) => &policies[subgroup_index],
        }
    }

    pub fn validate(&self) -> Result<(), DerechoError> {
        if self.num_subgroups == 0 {
            // An empty layout is a valid (if unusual) policy; see §4.1 edge case (b).
            return Ok(());
        }
        match &self.kind {
            SubgroupPolicyKind::Identical(policy) => policy.validate(),
            SubgroupPolicyKind::PerSubgroup(policies) => {
                if policies.len() != self.num_subgroups {
                    return Err(DerechoError::SubgroupProvisioning {
                        reason: format!(
                            "policy declares {} subgroups but supplies {} per-subgroup shard policies",
                            self.num_subgroups,
                            policies.len()
                        ),
                    });
                }
                policies.iter().try_for_each(ShardPolicy::validate)
            }
        }
    }
}

/// The full set of subgroup policies for a deployment, keyed by replicated
/// type and kept in the order they were declared. That order is also the
/// default subgroup-initialization order the allocator uses, unless
/// overridden.
#[derive(Debug, Clone, Default)]
pub struct Policy {
    entries: Vec<(TypeTag, SubgroupPolicy)>,
}

impl Policy {
    pub fn new() -> Self {
        Policy { entries: Vec::new() }
    }

    /// Adds a type's policy. Returns an error if `type_tag` was already
    /// registered.
    pub fn add(&mut self, type_tag: TypeTag, policy: SubgroupPolicy) -> Result<(), DerechoError> {
        if self.entries.iter().any(|(t, _)| *t == type_tag) {
            return Err(DerechoError::SubgroupProvisioning {
                reason: format!("type tag {type_tag} is already registered in this policy"),
            });
        }
        self.entries.push((type_tag, policy));
        Ok(())
    }

    pub fn get(&self, type_tag: &TypeTag) -> Option<&SubgroupPolicy> {
        self.entries.iter().find(|(t, _)| t == type_tag).map(|(_, p)| p)
    }

    /// Declaration order, i.e. the default subgroup-initialization order.
    pub fn type_tags(&self) -> impl Iterator<Item = &TypeTag> {
        self.entries.iter().map(|(t, _)| t)
    }
}
