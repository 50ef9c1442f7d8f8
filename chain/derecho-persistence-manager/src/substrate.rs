use std::collections::HashMap;
use std::sync::Arc;

use derecho_crypto::{Signer, Verifier};
use derecho_persistent_registry::PersistentRegistry;
use derecho_primitives::{DerechoError, Hlc, NodeId, SubgroupId, Version};
use derecho_view::View;
use parking_lot::Mutex;

/// What the persistence manager needs from the surrounding group: a way to
/// look up a subgroup's registry and signing key, and a way to publish and
/// retrieve signatures among the subgroup's members.
///
/// This stands in for the original's direct `ViewManager&` pointer and
/// `objects_by_subgroup_id` map, both owned by the messaging substrate this
/// crate doesn't implement. Constructing a real group wires an
/// implementation of this trait up to its subgroup table once, at startup.
pub trait MessagingSubstrate: Send + Sync {
    fn registry(&self, subgroup_id: SubgroupId) -> Option<Arc<Mutex<PersistentRegistry>>>;
    fn signer(&self, subgroup_id: SubgroupId) -> Option<Arc<Mutex<dyn Signer + Send>>>;
    fn verifier(&self, subgroup_id: SubgroupId) -> Option<Arc<Mutex<dyn Verifier + Send>>>;

    /// The currently installed membership snapshot. Not read by this
    /// crate's own worker loops — kept on the trait because it is part of
    /// the same consumed interface the view installer and the allocator
    /// share, and other consumers of a `MessagingSubstrate` handle need it.
    fn current_view(&self) -> View;

    /// Stamps the next version and HLC timestamp for an update delivered to
    /// `subgroup_id`. Called by the ordered-delivery path, not by this
    /// crate directly; kept on this trait because it's part of the same
    /// consumed interface.
    fn get_next_version(&self, subgroup_id: SubgroupId) -> Result<(Version, Hlc), DerechoError>;

    /// Publishes this node's signature over `version` to the rest of the
    /// subgroup.
    fn post_signature(&self, subgroup_id: SubgroupId, version: Version, signature: &[u8]) -> Result<(), DerechoError>;

    /// Every other member's published signature over `version`, keyed by
    /// node id.
    fn peer_signatures(&self, subgroup_id: SubgroupId, version: Version) -> HashMap<NodeId, Vec<u8>>;
}
