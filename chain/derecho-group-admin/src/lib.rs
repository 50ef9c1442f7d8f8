//! The allocator: turns a [`Policy`](derecho_policy::Policy) and the current
//! [`View`] into a per-type [`Layout`], keeping shard membership stable
//! across view changes whenever the departing node's replacement can be
//! drawn from the pool of newly-joined, not-yet-assigned nodes.
//!
//! The companion [`CrossProductAllocator`] is a second, stateless
//! allocation strategy layered on top of two already-assigned subgroups.

mod cross_product;
mod group_admin;

pub use cross_product::CrossProductAllocator;
pub use group_admin::GroupAdmin;
