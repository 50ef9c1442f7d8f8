use std::collections::{HashMap, HashSet};

use derecho_policy::{Policy, ShardPolicy};
use derecho_primitives::{DerechoError, NodeId, TypeTag};
use derecho_view::{make_subview, Layout, SubView, View};

/// Computes, for each replicated type, a subgroup-shard [`Layout`] from the
/// current [`View`] and that type's policy, preferring to keep a node in
/// the same shard position it held in the previous view.
///
/// A single `GroupAdmin` must only ever be driven by one caller at a time
/// (typically the view installer) — see the crate-level concurrency notes
/// in `derecho-persistence-manager` for how the rest of this system handles
/// threads; this type itself assumes serial access.
pub struct GroupAdmin {
    policy: Policy,
    initialization_order: Vec<TypeTag>,
    previous_assignment: HashMap<TypeTag, Layout>,
    next_unassigned_rank: usize,
    current_view_id: Option<u64>,
}

impl GroupAdmin {
    pub fn new(policy: Policy) -> Self {
        let initialization_order = policy.type_tags().cloned().collect();
        GroupAdmin {
            policy,
            initialization_order,
            previous_assignment: HashMap::new(),
            next_unassigned_rank: 0,
            current_view_id: None,
        }
    }

    /// Overrides the order `compute_layout` processes types in. The cursor
    /// is shared across types within one view-computation, so this order
    /// determines which types get first claim on newly available nodes.
    pub fn set_initialization_order(&mut self, order: Vec<TypeTag>) {
        self.initialization_order = order;
    }

    /// Discards all previous-assignment state, as if this `GroupAdmin` had
    /// just been constructed. Used when the messaging substrate reports
    /// that a candidate view was never installed, so any layout computed
    /// against it must be forgotten.
    pub fn reset(&mut self) {
        self.previous_assignment.clear();
        self.next_unassigned_rank = 0;
        self.current_view_id = None;
    }

    /// Computes every type's layout against `view`, in initialization
    /// order, sharing one allocation cursor across all of them.
    pub fn compute_layout(&mut self, view: &View) -> Result<HashMap<TypeTag, Layout>, DerechoError> {
        let order = self.initialization_order.clone();
        let mut layouts = HashMap::with_capacity(order.len());
        for type_tag in order {
            let layout = self.compute(&type_tag, view)?;
            layouts.insert(type_tag, layout);
        }
        Ok(layouts)
    }

    /// Computes the layout for a single type against `view`. If `view` has
    /// a different id than the last view this `GroupAdmin` saw, the
    /// allocation cursor resets to 0 first: a new view starts a new
    /// view-computation round.
    pub fn compute(&mut self, type_tag: &TypeTag, view: &View) -> Result<Layout, DerechoError> {
        if self.current_view_id != Some(view.id()) {
            self.next_unassigned_rank = 0;
            self.current_view_id = Some(view.id());
        }

        let subgroup_policy = self.policy.get(type_tag).ok_or_else(|| DerechoError::SubgroupProvisioning {
            reason: format!("no policy registered for type {type_tag}"),
        })?;

        if let Some(previous_layout) = self.previous_assignment.get(type_tag) {
            let new_layout = self.stabilize(previous_layout, view)?;
            self.previous_assignment.insert(type_tag.clone(), new_layout.clone());
            Ok(new_layout)
        } else {
            let mut layout = Layout::with_capacity(subgroup_policy.num_subgroups);
            for subgroup_num in 0..subgroup_policy.num_subgroups {
                let shard_policy = subgroup_policy.shard_policy(subgroup_num);
                let shards = self.assign_fresh_subgroup(view, shard_policy)?;
                layout.push(shards);
            }
            self.previous_assignment.insert(type_tag.clone(), layout.clone());
            Ok(layout)
        }
    }

    /// Fresh allocation: no previous layout exists for this type, so every
    /// shard is filled by walking the view forward from the cursor.
    fn assign_fresh_subgroup(
        &mut self,
        view: &View,
        shard_policy: &ShardPolicy,
    ) -> Result<Vec<SubView>, DerechoError> {
        if let ShardPolicy::Even { num_shards, nodes_per_shard, .. } = shard_policy {
            let needed = num_shards * nodes_per_shard;
            if view.len() - self.next_unassigned_rank < needed {
                return Err(DerechoError::SubgroupProvisioning {
                    reason: format!(
                        "view has {} unassigned members but {needed} are needed for {num_shards} even shards of {nodes_per_shard}",
                        view.len() - self.next_unassigned_rank
                    ),
                });
            }
        }

        let mut shards = Vec::with_capacity(shard_policy.num_shards());
        for shard_num in 0..shard_policy.num_shards() {
            let (nodes_needed, mode) = shard_policy.shard_spec(shard_num);
            // The even-shards branch already checked the total above; the
            // per-shard branch checks here. Using `>` rather than `>=`
            // allows a shard to exactly exhaust the remaining view — see
            // DESIGN.md for why the original `>=` was a bug.
            if self.next_unassigned_rank + nodes_needed > view.len() {
                return Err(DerechoError::SubgroupProvisioning {
                    reason: format!(
                        "shard {shard_num} needs {nodes_needed} nodes but only {} remain unassigned",
                        view.len() - self.next_unassigned_rank
                    ),
                });
            }
            let desired_nodes: Vec<_> = (self.next_unassigned_rank..self.next_unassigned_rank + nodes_needed)
                .map(|rank| view.node_at_rank(rank).expect("rank within view bounds"))
                .collect();
            self.next_unassigned_rank += nodes_needed;
            shards.push(make_subview(view, &desired_nodes, mode, None)?);
        }
        Ok(shards)
    }

    /// Stable re-allocation: start from the previous layout and substitute
    /// only the members who left the view, drawing replacements from the
    /// cursor.
    ///
    /// The cursor walks view ranks in order, but a rank already held by a
    /// retained survivor (a member of this layout who is still in the view)
    /// must never be handed out again as someone else's replacement — the
    /// cursor only resets to 0 per view-computation round, while survivors
    /// can occupy any of the low ranks, so the cursor has to skip over them
    /// rather than assume they're behind it.
    fn stabilize(&mut self, previous_layout: &Layout, view: &View) -> Result<Layout, DerechoError> {
        let mut next_layout = previous_layout.clone();

        let mut retained: HashSet<NodeId> = HashSet::new();
        for shard in next_layout.iter().flatten() {
            for &member in &shard.members {
                if view.rank_of(member).is_some() {
                    retained.insert(member);
                }
            }
        }

        for shard in next_layout.iter_mut().flatten() {
            for rank_pos in 0..shard.members.len() {
                let member = shard.members[rank_pos];
                if view.rank_of(member).is_none() {
                    while self.next_unassigned_rank < view.len()
                        && retained.contains(
                            &view.node_at_rank(self.next_unassigned_rank).expect("rank within view bounds"),
                        )
                    {
                        self.next_unassigned_rank += 1;
                    }
                    if self.next_unassigned_rank >= view.len() {
                        return Err(DerechoError::SubgroupProvisioning {
                            reason: format!(
                                "node {member} left the view and no unassigned replacement is available"
                            ),
                        });
                    }
                    let replacement = view
                        .node_at_rank(self.next_unassigned_rank)
                        .expect("rank within view bounds");
                    shard.members[rank_pos] = replacement;
                    shard.endpoints[rank_pos] =
                        view.endpoint_of(replacement).expect("replacement node is a view member");
                    retained.insert(replacement);
                    self.next_unassigned_rank += 1;
                }
            }
            // These are recomputed by the messaging substrate when it
            // installs the new view.
            shard.joined.clear();
            shard.departed.clear();
        }
        Ok(next_layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use derecho_policy::{custom_shards_policy, even_sharding, one_subgroup_policy};
    use derecho_primitives::{DeliveryMode, Endpoint, NodeId};
    use std::net::{IpAddr, Ipv4Addr};

    fn endpoint(port: u16) -> Endpoint {
        Endpoint::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    fn view_of(id: u64, node_ids: &[u32]) -> View {
        let members = node_ids.iter().map(|&n| (NodeId(n), endpoint(9000 + n as u16))).collect();
        View::new(id, members).unwrap()
    }

    fn cascade_tag() -> TypeTag {
        TypeTag::new("cascade_store")
    }

    fn admin_with(policy: derecho_policy::SubgroupPolicy) -> GroupAdmin {
        let mut policy_set = Policy::new();
        policy_set.add(cascade_tag(), policy).unwrap();
        GroupAdmin::new(policy_set)
    }

    fn shard_members(layout: &Layout, subgroup: usize, shard: usize) -> Vec<u32> {
        layout[subgroup][shard].members.iter().map(|n| n.0).collect()
    }

    /// S1: fresh even sharding succeeds and the cursor ends at the view size.
    #[test]
    fn s1_fresh_even_sharding() {
        let mut admin = admin_with(one_subgroup_policy(even_sharding(2, 2)));
        let view = view_of(1, &[10, 11, 12, 13]);
        let layout = admin.compute(&cascade_tag(), &view).unwrap();

        assert_eq!(layout.len(), 1);
        assert_eq!(shard_members(&layout, 0, 0), vec![10, 11]);
        assert_eq!(shard_members(&layout, 0, 1), vec![12, 13]);
        assert!(layout[0].iter().all(|s| s.mode == DeliveryMode::Ordered));
        assert_eq!(admin.next_unassigned_rank, 4);
    }

    /// S2: under-provisioned view fails and leaves no stored assignment.
    #[test]
    fn s2_under_provisioned_view_fails() {
        let mut admin = admin_with(one_subgroup_policy(even_sharding(2, 2)));
        let view = view_of(1, &[10, 11, 12]);
        let err = admin.compute(&cascade_tag(), &view);
        assert!(matches!(err, Err(DerechoError::SubgroupProvisioning { .. })));
        assert!(admin.previous_assignment.get(&cascade_tag()).is_none());
    }

    /// S3: custom per-shard policy assigns the declared counts and modes.
    #[test]
    fn s3_custom_per_shard_policy() {
        let mut admin = admin_with(one_subgroup_policy(custom_shards_policy(
            vec![1, 2, 3],
            vec![DeliveryMode::Ordered, DeliveryMode::Unordered, DeliveryMode::Ordered],
        )));
        let view = view_of(1, &[1, 2, 3, 4, 5, 6]);
        let layout = admin.compute(&cascade_tag(), &view).unwrap();

        assert_eq!(shard_members(&layout, 0, 0), vec![1]);
        assert_eq!(shard_members(&layout, 0, 1), vec![2, 3]);
        assert_eq!(shard_members(&layout, 0, 2), vec![4, 5, 6]);
        assert_eq!(layout[0][0].mode, DeliveryMode::Ordered);
        assert_eq!(layout[0][1].mode, DeliveryMode::Unordered);
        assert_eq!(layout[0][2].mode, DeliveryMode::Ordered);
    }

    /// S4: a departed node is replaced by the next unassigned rank; other
    /// shards keep their exact membership.
    #[test]
    fn s4_stability_across_view_change() {
        let mut admin = admin_with(one_subgroup_policy(even_sharding(2, 2)));
        let view1 = view_of(1, &[10, 11, 12, 13]);
        admin.compute(&cascade_tag(), &view1).unwrap();

        let view2 = view_of(2, &[10, 12, 13, 14]); // 11 left, 14 joined
        let layout2 = admin.compute(&cascade_tag(), &view2).unwrap();

        assert_eq!(shard_members(&layout2, 0, 0), vec![10, 14]);
        assert_eq!(shard_members(&layout2, 0, 1), vec![12, 13]);
        assert_eq!(admin.next_unassigned_rank, 4);
    }

    /// S5: reset() after a failed allocation lets a later, sufficient view
    /// produce the same layout as a fresh run.
    #[test]
    fn s5_reset_after_failure_matches_fresh_run() {
        let mut admin = admin_with(one_subgroup_policy(even_sharding(2, 2)));
        let bad_view = view_of(1, &[10, 11, 12]);
        assert!(admin.compute(&cascade_tag(), &bad_view).is_err());

        admin.reset();

        let good_view = view_of(2, &[10, 11, 12, 13]);
        let layout = admin.compute(&cascade_tag(), &good_view).unwrap();

        let mut fresh_admin = admin_with(one_subgroup_policy(even_sharding(2, 2)));
        let fresh_layout = fresh_admin.compute(&cascade_tag(), &view_of(9, &[10, 11, 12, 13])).unwrap();

        assert_eq!(shard_members(&layout, 0, 0), shard_members(&fresh_layout, 0, 0));
        assert_eq!(shard_members(&layout, 0, 1), shard_members(&fresh_layout, 0, 1));
    }

    #[test]
    fn empty_policy_subgroup_count_yields_empty_layout() {
        let policy = derecho_policy::SubgroupPolicy {
            num_subgroups: 0,
            kind: derecho_policy::SubgroupPolicyKind::Identical(even_sharding(1, 1)),
        };
        let mut admin = admin_with(policy);
        let view = view_of(1, &[10]);
        let layout = admin.compute(&cascade_tag(), &view).unwrap();
        assert!(layout.is_empty());
    }

    #[test]
    fn empty_view_fails_immediately() {
        let mut admin = admin_with(one_subgroup_policy(even_sharding(1, 1)));
        let view = view_of(1, &[]);
        assert!(admin.compute(&cascade_tag(), &view).is_err());
    }

    #[test]
    fn exact_fit_per_shard_allocation_succeeds() {
        // Resolves the off-by-one open question: a per-shard policy that
        // exactly exhausts the view must succeed, not fail.
        let mut admin = admin_with(one_subgroup_policy(custom_shards_policy(
            vec![2, 2],
            vec![DeliveryMode::Ordered, DeliveryMode::Ordered],
        )));
        let view = view_of(1, &[1, 2, 3, 4]);
        let layout = admin.compute(&cascade_tag(), &view).unwrap();
        assert_eq!(shard_members(&layout, 0, 0), vec![1, 2]);
        assert_eq!(shard_members(&layout, 0, 1), vec![3, 4]);
    }

    #[test]
    fn determinism_across_independent_instances() {
        let mut admin_a = admin_with(one_subgroup_policy(even_sharding(2, 2)));
        let mut admin_b = admin_with(one_subgroup_policy(even_sharding(2, 2)));
        let view = view_of(1, &[10, 11, 12, 13]);
        let layout_a = admin_a.compute(&cascade_tag(), &view).unwrap();
        let layout_b = admin_b.compute(&cascade_tag(), &view).unwrap();
        assert_eq!(shard_members(&layout_a, 0, 0), shard_members(&layout_b, 0, 0));
        assert_eq!(shard_members(&layout_a, 0, 1), shard_members(&layout_b, 0, 1));
    }
}
