use std::collections::HashMap;
use std::sync::Arc;

use derecho_group_admin::GroupAdmin;
use derecho_persistence_manager::{MessagingSubstrate, PersistenceManager};
use derecho_persistent_registry::PersistentRegistry;
use derecho_policy::Policy;
use derecho_primitives::{NodeId, SubgroupId, TypeTag};
use derecho_view::{Layout, View};
use parking_lot::Mutex;

use crate::config::GroupConfig;
use crate::substrate::SingleProcessSubstrate;

/// Where a replicated type's `(subgroup_index, shard_num)` pair landed in
/// the flat [`SubgroupId`] space this process hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardHandle {
    pub subgroup_id: SubgroupId,
    pub subgroup_index: u32,
    pub shard_num: u32,
}

/// Ties a [`GroupAdmin`]'s layout decisions to a [`SingleProcessSubstrate`]'s
/// per-subgroup registries and a [`PersistenceManager`]'s worker threads for
/// one node in a single-process deployment.
///
/// A real multi-node `Group` would additionally own the view-change
/// protocol and the network transport; this facade only wires together the
/// pieces this crate implements.
pub struct Group {
    self_node_id: NodeId,
    admin: Mutex<GroupAdmin>,
    substrate: Arc<SingleProcessSubstrate>,
    persistence: Arc<PersistenceManager>,
    config: GroupConfig,
    next_subgroup_id: Mutex<u32>,
    shards_by_type: Mutex<HashMap<TypeTag, Vec<ShardHandle>>>,
}

impl Group {
    pub fn new(self_node_id: NodeId, policy: Policy, config: GroupConfig) -> Arc<Self> {
        let substrate = Arc::new(SingleProcessSubstrate::new(self_node_id));
        let persistence = Arc::new(PersistenceManager::new(substrate.clone(), config.signature_size));
        let group = Arc::new(Group {
            self_node_id,
            admin: Mutex::new(GroupAdmin::new(policy)),
            substrate,
            persistence,
            config,
            next_subgroup_id: Mutex::new(0),
            shards_by_type: Mutex::new(HashMap::new()),
        });
        group.persistence.start();
        group
    }

    pub fn self_node_id(&self) -> NodeId {
        self.self_node_id
    }

    pub fn config(&self) -> &GroupConfig {
        &self.config
    }

    pub fn persistence(&self) -> &Arc<PersistenceManager> {
        &self.persistence
    }

    pub fn substrate(&self) -> &Arc<SingleProcessSubstrate> {
        &self.substrate
    }

    /// Computes every replicated type's layout against `view`, then
    /// provisions a [`PersistentRegistry`] in the substrate for every shard
    /// this node belongs to. Shards this node already had a registry for
    /// (by `(subgroup_index, shard_num)` within the type) are left alone —
    /// only newly assigned shards are provisioned.
    pub fn install_view(&self, view: &View) -> Result<HashMap<TypeTag, Layout>, derecho_primitives::DerechoError> {
        let layouts = self.admin.lock().compute_layout(view)?;
        for (type_tag, layout) in &layouts {
            self.provision_local_shards(type_tag, layout);
        }
        self.substrate.install_view(view.clone());
        Ok(layouts)
    }

    fn provision_local_shards(&self, type_tag: &TypeTag, layout: &Layout) {
        let mut shards_by_type = self.shards_by_type.lock();
        let known = shards_by_type.entry(type_tag.clone()).or_default();

        for (subgroup_index, shards) in layout.iter().enumerate() {
            for (shard_num, shard) in shards.iter().enumerate() {
                if !shard.members.contains(&self.self_node_id) {
                    continue;
                }
                let already_provisioned = known
                    .iter()
                    .any(|handle| handle.subgroup_index == subgroup_index as u32 && handle.shard_num == shard_num as u32);
                if already_provisioned {
                    continue;
                }

                let subgroup_id = {
                    let mut next = self.next_subgroup_id.lock();
                    let id = SubgroupId(*next);
                    *next += 1;
                    id
                };
                self.substrate.register_subgroup(subgroup_id, type_tag, subgroup_index as u32, shard_num as u32);
                known.push(ShardHandle { subgroup_id, subgroup_index: subgroup_index as u32, shard_num: shard_num as u32 });
            }
        }
    }

    /// The [`ShardHandle`]s this node currently holds a registry for, across
    /// every replicated type.
    pub fn local_shards(&self, type_tag: &TypeTag) -> Vec<ShardHandle> {
        self.shards_by_type.lock().get(type_tag).cloned().unwrap_or_default()
    }

    pub fn registry(&self, subgroup_id: SubgroupId) -> Option<Arc<Mutex<PersistentRegistry>>> {
        self.substrate.registry(subgroup_id)
    }

    /// Stops the persistence manager's worker threads. Call before dropping
    /// a `Group` a test or a graceful shutdown path created.
    pub fn shutdown(&self, wait: bool) {
        self.persistence.shutdown(wait);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use derecho_policy::{even_sharding, one_subgroup_policy};
    use derecho_primitives::Endpoint;
    use std::net::{IpAddr, Ipv4Addr};

    fn endpoint(port: u16) -> Endpoint {
        Endpoint::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    fn sample_view(id: u64, nodes: &[u32]) -> View {
        View::new(id, nodes.iter().map(|&n| (NodeId(n), endpoint(5000 + n as u16))).collect()).unwrap()
    }

    fn one_shard_policy() -> Policy {
        let mut policy = Policy::new();
        policy.add(TypeTag::new("kv"), one_subgroup_policy(even_sharding(1, 3))).unwrap();
        policy
    }

    #[test]
    fn installing_a_view_provisions_registries_for_local_shards() {
        let group = Group::new(NodeId(1), one_shard_policy(), GroupConfig::default());

        let view = sample_view(1, &[1, 2, 3]);
        group.install_view(&view).unwrap();

        let shards = group.local_shards(&TypeTag::new("kv"));
        assert_eq!(shards.len(), 1);
        assert!(group.registry(shards[0].subgroup_id).is_some());
        group.shutdown(true);
    }

    #[test]
    fn a_node_left_out_of_every_shard_provisions_nothing() {
        let group = Group::new(NodeId(99), one_shard_policy(), GroupConfig::default());

        let view = sample_view(1, &[1, 2, 3]);
        group.install_view(&view).unwrap();

        assert!(group.local_shards(&TypeTag::new("kv")).is_empty());
        group.shutdown(true);
    }

    #[test]
    fn reinstalling_the_same_view_does_not_duplicate_subgroup_ids() {
        let group = Group::new(NodeId(1), one_shard_policy(), GroupConfig::default());

        let view = sample_view(1, &[1, 2, 3]);
        group.install_view(&view).unwrap();
        let first = group.local_shards(&TypeTag::new("kv"));
        group.install_view(&view).unwrap();
        let second = group.local_shards(&TypeTag::new("kv"));

        assert_eq!(first, second);
        group.shutdown(true);
    }
}
