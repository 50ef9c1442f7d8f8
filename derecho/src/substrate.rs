use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use derecho_crypto::{Ed25519Signer, Ed25519Verifier, Signer, Verifier};
use derecho_persistence_manager::MessagingSubstrate;
use derecho_persistent_registry::PersistentRegistry;
use derecho_primitives::{DerechoError, Endpoint, Hlc, NodeId, SubgroupId, TypeTag, Version};
use derecho_view::View;
use parking_lot::{Mutex, RwLock};

struct SubgroupState {
    registry: Arc<Mutex<PersistentRegistry>>,
    signer: Arc<Mutex<dyn Signer + Send>>,
    verifier: Arc<Mutex<dyn Verifier + Send>>,
    next_version: AtomicI64,
    /// Published signatures for this single node, keyed by version. A real
    /// multi-node deployment would fan this out over the network; here
    /// "peers" collapses to this node's own publications, which is enough
    /// to exercise the persist → sign → verify pipeline end to end.
    published_signatures: Mutex<HashMap<i64, HashMap<NodeId, Vec<u8>>>>,
}

/// A [`MessagingSubstrate`] for a single-process deployment: every subgroup
/// gets its own [`PersistentRegistry`] and Ed25519 keypair, version numbers
/// come from a per-subgroup counter, and "publishing" a signature just files
/// it under this node's own id for later retrieval.
///
/// Multi-node wiring (real peer discovery, SST-backed watermark rows, a
/// network transport for `post_signature`/`peer_signatures`) belongs to the
/// messaging substrate this crate doesn't implement.
pub struct SingleProcessSubstrate {
    self_node_id: NodeId,
    subgroups: RwLock<HashMap<SubgroupId, SubgroupState>>,
    hlc_counter: AtomicU64,
    current_view: RwLock<View>,
}

impl SingleProcessSubstrate {
    /// Starts with a single-member view containing only `self_node_id`,
    /// reachable at `self_endpoint`. Call [`Self::install_view`] once real
    /// membership is known.
    pub fn new(self_node_id: NodeId) -> Self {
        let bootstrap_endpoint = Endpoint::new(std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST), 0);
        let bootstrap_view = View::new(0, vec![(self_node_id, bootstrap_endpoint)])
            .expect("a single-member view is always constructible");
        SingleProcessSubstrate {
            self_node_id,
            subgroups: RwLock::new(HashMap::new()),
            hlc_counter: AtomicU64::new(0),
            current_view: RwLock::new(bootstrap_view),
        }
    }

    /// Installs a newly computed membership snapshot as the current view.
    pub fn install_view(&self, view: View) {
        *self.current_view.write() = view;
    }

    /// Registers a fresh subgroup with its own registry and signing keypair.
    /// Returns the registry handle so callers (e.g. a Cascade-style store)
    /// can register their persistent fields into it.
    pub fn register_subgroup(
        &self,
        subgroup_id: SubgroupId,
        subgroup_type: &TypeTag,
        subgroup_index: u32,
        shard_num: u32,
    ) -> Arc<Mutex<PersistentRegistry>> {
        let registry = Arc::new(Mutex::new(PersistentRegistry::new(subgroup_type, subgroup_index, shard_num)));
        let signer = Ed25519Signer::generate();
        let verifier = Ed25519Verifier::new(signer.verifying_key());
        self.subgroups.write().insert(
            subgroup_id,
            SubgroupState {
                registry: Arc::clone(&registry),
                signer: Arc::new(Mutex::new(signer)),
                verifier: Arc::new(Mutex::new(verifier)),
                next_version: AtomicI64::new(0),
                published_signatures: Mutex::new(HashMap::new()),
            },
        );
        registry
    }

    fn next_hlc(&self) -> Hlc {
        Hlc(self.hlc_counter.fetch_add(1, Ordering::Relaxed))
    }
}

impl MessagingSubstrate for SingleProcessSubstrate {
    fn registry(&self, subgroup_id: SubgroupId) -> Option<Arc<Mutex<PersistentRegistry>>> {
        self.subgroups.read().get(&subgroup_id).map(|state| Arc::clone(&state.registry))
    }

    fn signer(&self, subgroup_id: SubgroupId) -> Option<Arc<Mutex<dyn Signer + Send>>> {
        self.subgroups.read().get(&subgroup_id).map(|state| Arc::clone(&state.signer))
    }

    fn verifier(&self, subgroup_id: SubgroupId) -> Option<Arc<Mutex<dyn Verifier + Send>>> {
        self.subgroups.read().get(&subgroup_id).map(|state| Arc::clone(&state.verifier))
    }

    fn current_view(&self) -> View {
        self.current_view.read().clone()
    }

    fn get_next_version(&self, subgroup_id: SubgroupId) -> Result<(Version, Hlc), DerechoError> {
        let subgroups = self.subgroups.read();
        let state = subgroups.get(&subgroup_id).ok_or(DerechoError::EmptyReference)?;
        let version = Version(state.next_version.fetch_add(1, Ordering::SeqCst));
        Ok((version, self.next_hlc()))
    }

    fn post_signature(&self, subgroup_id: SubgroupId, version: Version, signature: &[u8]) -> Result<(), DerechoError> {
        let subgroups = self.subgroups.read();
        let state = subgroups.get(&subgroup_id).ok_or(DerechoError::EmptyReference)?;
        state.published_signatures.lock().entry(version.0).or_default().insert(self.self_node_id, signature.to_vec());
        Ok(())
    }

    fn peer_signatures(&self, subgroup_id: SubgroupId, version: Version) -> HashMap<NodeId, Vec<u8>> {
        self.subgroups
            .read()
            .get(&subgroup_id)
            .and_then(|state| state.published_signatures.lock().get(&version.0).cloned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_view_contains_only_self() {
        let substrate = SingleProcessSubstrate::new(NodeId(7));
        let view = substrate.current_view();
        assert_eq!(view.members(), &[NodeId(7)]);
    }

    #[test]
    fn install_view_replaces_the_current_view() {
        let substrate = SingleProcessSubstrate::new(NodeId(1));
        let endpoint = Endpoint::new(std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST), 9000);
        let view = View::new(1, vec![(NodeId(1), endpoint), (NodeId(2), endpoint)]).unwrap();
        substrate.install_view(view);
        assert_eq!(substrate.current_view().members(), &[NodeId(1), NodeId(2)]);
    }

    #[test]
    fn get_next_version_advances_per_subgroup() {
        let substrate = SingleProcessSubstrate::new(NodeId(1));
        substrate.register_subgroup(SubgroupId(0), &TypeTag::new("kv"), 0, 0);
        let (v0, _) = substrate.get_next_version(SubgroupId(0)).unwrap();
        let (v1, _) = substrate.get_next_version(SubgroupId(0)).unwrap();
        assert_eq!(v0, Version(0));
        assert_eq!(v1, Version(1));
    }

    #[test]
    fn unknown_subgroup_is_empty_reference() {
        let substrate = SingleProcessSubstrate::new(NodeId(1));
        assert!(matches!(substrate.get_next_version(SubgroupId(0)), Err(DerechoError::EmptyReference)));
    }
}
