use std::collections::HashMap;

use derecho_primitives::{DerechoError, Endpoint, NodeId};

/// An installed membership snapshot: an ordered sequence of live nodes and
/// their endpoints, plus the rank index used everywhere else in this crate
/// family to test membership in O(1).
///
/// `id` is the messaging substrate's installed-view sequence number. The
/// allocator uses it to tell whether two `compute` calls belong to the same
/// view-computation round (see `GroupAdmin`), so every view a real
/// deployment installs must carry a strictly increasing id; views
/// constructed purely for one-off tests can reuse an id if they are never
/// passed to the same `GroupAdmin` instance twice.
#[derive(Debug, Clone)]
pub struct View {
    id: u64,
    members: Vec<NodeId>,
    endpoints: HashMap<NodeId, Endpoint>,
    rank_index: HashMap<NodeId, usize>,
}

impl View {
    pub fn new(id: u64, members: Vec<(NodeId, Endpoint)>) -> Result<Self, DerechoError> {
        let mut rank_index = HashMap::with_capacity(members.len());
        let mut endpoints = HashMap::with_capacity(members.len());
        let mut ordered_members = Vec::with_capacity(members.len());
        for (rank, (node, endpoint)) in members.into_iter().enumerate() {
            if rank_index.insert(node, rank).is_some() {
                return Err(DerechoError::SubgroupProvisioning {
                    reason: format!("node {node} appears more than once in view {id}"),
                });
            }
            endpoints.insert(node, endpoint);
            ordered_members.push(node);
        }
        Ok(View { id, members: ordered_members, endpoints, rank_index })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Rank of `node` within this view, or `None` if it is not a member
    /// (the `-1` sentinel from the original design, expressed as an
    /// `Option` instead).
    pub fn rank_of(&self, node: NodeId) -> Option<usize> {
        self.rank_index.get(&node).copied()
    }

    pub fn endpoint_of(&self, node: NodeId) -> Option<Endpoint> {
        self.endpoints.get(&node).copied()
    }

    pub fn node_at_rank(&self, rank: usize) -> Option<NodeId> {
        self.members.get(rank).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn endpoint(port: u16) -> Endpoint {
        Endpoint::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    #[test]
    fn rank_of_returns_none_for_absent_node() {
        let view =
            View::new(1, vec![(NodeId(10), endpoint(1000)), (NodeId(11), endpoint(1001))]).unwrap();
        assert_eq!(view.rank_of(NodeId(10)), Some(0));
        assert_eq!(view.rank_of(NodeId(11)), Some(1));
        assert_eq!(view.rank_of(NodeId(99)), None);
    }

    #[test]
    fn duplicate_node_ids_are_rejected() {
        let result = View::new(1, vec![(NodeId(10), endpoint(1000)), (NodeId(10), endpoint(1001))]);
        assert!(result.is_err());
    }
}
