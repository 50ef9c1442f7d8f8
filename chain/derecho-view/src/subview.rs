use derecho_primitives::{DeliveryMode, DerechoError, Endpoint, NodeId};

use crate::view::View;

/// The members, endpoints, and delivery mode of a single shard, plus the
/// membership-change bookkeeping (`joined`/`departed`) the messaging
/// substrate fills in when it installs the view this shard belongs to.
#[derive(Debug, Clone)]
pub struct SubView {
    pub members: Vec<NodeId>,
    pub endpoints: Vec<Endpoint>,
    pub mode: DeliveryMode,
    /// Per-member flag: may this member originate sends in this shard.
    pub sender_flags: Vec<bool>,
    pub joined: Vec<NodeId>,
    pub departed: Vec<NodeId>,
}

/// Per replicated type: outer index is subgroup, inner index is shard.
pub type Layout = Vec<Vec<SubView>>;

/// Builds a [`SubView`] for `desired_nodes`, preserving their order.
/// Every node must already be a member of `view`.
pub fn make_subview(
    view: &View,
    desired_nodes: &[NodeId],
    mode: DeliveryMode,
    sender_flags: Option<Vec<bool>>,
) -> Result<SubView, DerechoError> {
    let mut endpoints = Vec::with_capacity(desired_nodes.len());
    for &node in desired_nodes {
        let endpoint = view.endpoint_of(node).ok_or(DerechoError::InvalidNode(node))?;
        endpoints.push(endpoint);
    }
    let sender_flags = match sender_flags {
        Some(flags) => {
            if flags.len() != desired_nodes.len() {
                return Err(DerechoError::SubgroupProvisioning {
                    reason: format!(
                        "sender_flags has {} entries but the shard has {} members",
                        flags.len(),
                        desired_nodes.len()
                    ),
                });
            }
            flags
        }
        None => vec![true; desired_nodes.len()],
    };
    Ok(SubView {
        members: desired_nodes.to_vec(),
        endpoints,
        mode,
        sender_flags,
        joined: Vec::new(),
        departed: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn endpoint(port: u16) -> Endpoint {
        Endpoint::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    fn sample_view() -> View {
        View::new(
            1,
            vec![
                (NodeId(10), endpoint(1000)),
                (NodeId(11), endpoint(1001)),
                (NodeId(12), endpoint(1002)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn members_outside_the_view_are_rejected() {
        let view = sample_view();
        let err = make_subview(&view, &[NodeId(10), NodeId(99)], DeliveryMode::Ordered, None);
        assert!(matches!(err, Err(DerechoError::InvalidNode(NodeId(99)))));
    }

    #[test]
    fn default_sender_flags_are_all_true() {
        let view = sample_view();
        let sub = make_subview(&view, &[NodeId(10), NodeId(11)], DeliveryMode::Ordered, None).unwrap();
        assert_eq!(sub.sender_flags, vec![true, true]);
        assert!(sub.joined.is_empty());
        assert!(sub.departed.is_empty());
    }

    #[test]
    fn mismatched_sender_flags_length_is_rejected() {
        let view = sample_view();
        let err = make_subview(
            &view,
            &[NodeId(10), NodeId(11)],
            DeliveryMode::Ordered,
            Some(vec![true]),
        );
        assert!(err.is_err());
    }
}
