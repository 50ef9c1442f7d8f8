use std::collections::BTreeMap;
use std::sync::Arc;

use derecho_persistence_manager::PersistenceManager;
use derecho_persistent_registry::{ByteSerialize, PersistentField, PersistentRegistry, VersionedField};
use derecho_primitives::{DerechoError, Hlc, SubgroupId, Version};
use parking_lot::Mutex;

use crate::substrate::SingleProcessSubstrate;

/// A sorted map is used instead of a `HashMap` so that two replicas holding
/// the same key/value pairs always serialize to the same bytes — anything
/// whose serialization feeds the signature chain must be order-independent.
#[derive(Debug, Clone, Default)]
struct KvSnapshot(BTreeMap<String, Vec<u8>>);

impl ByteSerialize for KvSnapshot {
    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (key, value) in &self.0 {
            out.extend_from_slice(&(key.len() as u32).to_be_bytes());
            out.extend_from_slice(key.as_bytes());
            out.extend_from_slice(&(value.len() as u32).to_be_bytes());
            out.extend_from_slice(value);
        }
        out
    }
}

/// Adapts a shared, lockable [`VersionedField`] to the object-safe
/// [`PersistentField`] trait a [`PersistentRegistry`] holds, so a field can
/// be driven by the registry's commit/sign/persist passes while a caller
/// elsewhere keeps its own handle for direct reads and writes.
struct SharedField<T>(Arc<Mutex<VersionedField<T>>>);

impl<T: Clone + ByteSerialize + Send + Sync + 'static> PersistentField for SharedField<T> {
    fn commit_version(&mut self, version: Version, hlc: Hlc) {
        self.0.lock().commit_version(version, hlc);
    }
    fn latest_version(&self) -> Version {
        self.0.lock().latest_version()
    }
    fn feed_bytes(&self, version: Version, sink: &mut dyn FnMut(&[u8])) -> usize {
        self.0.lock().feed_bytes(version, sink)
    }
    fn attach_signature(&mut self, version: Version, signature: &[u8], prev_signed_version: Version) {
        self.0.lock().attach_signature(version, signature, prev_signed_version);
    }
    fn signature_at(&self, version: Version) -> Option<(Vec<u8>, Version)> {
        self.0.lock().signature_at(version)
    }
    fn persist(&mut self, up_to: Version) -> Result<(), DerechoError> {
        self.0.lock().persist(up_to)
    }
    fn trim(&mut self, up_to: Version) -> Result<(), DerechoError> {
        self.0.lock().trim(up_to)
    }
    fn truncate(&mut self, above: Version) -> Result<(), DerechoError> {
        self.0.lock().truncate(above)
    }
    fn last_persisted_version(&self) -> Version {
        self.0.lock().last_persisted_version()
    }
}

/// A minimal replicated key-value store: just enough `put`/`get` to drive
/// version creation through a single subgroup's persistence pipeline. Not a
/// general-purpose object store — no ranged scans, no temporal queries, no
/// partitioning across shards.
pub struct CascadeStore {
    subgroup_id: SubgroupId,
    substrate: Arc<SingleProcessSubstrate>,
    persistence: Arc<PersistenceManager>,
    field: Arc<Mutex<VersionedField<KvSnapshot>>>,
    sign: bool,
}

impl CascadeStore {
    /// Builds a fresh, empty store over `subgroup_id`, registering its
    /// backing field into `registry` so the persistence manager's
    /// commit/sign/persist passes see the same state `put`/`get` operate on.
    pub fn create(
        subgroup_id: SubgroupId,
        registry: &Arc<Mutex<PersistentRegistry>>,
        substrate: Arc<SingleProcessSubstrate>,
        persistence: Arc<PersistenceManager>,
        durable_store: Arc<dyn derecho_store::DurableStore>,
        sign: bool,
    ) -> Self {
        let field = Arc::new(Mutex::new(VersionedField::<KvSnapshot>::new(
            "kv".into(),
            KvSnapshot::default(),
            durable_store,
        )));
        registry.lock().register("kv", Box::new(SharedField(Arc::clone(&field))));
        CascadeStore { subgroup_id, substrate, persistence, field, sign }
    }

    /// Writes `key` = `value`, commits a new version capturing the whole
    /// snapshot, and hands the version to the persistence manager. Returns
    /// the version the write landed at.
    pub fn put(&self, key: String, value: Vec<u8>) -> Result<Version, DerechoError> {
        self.mutate(|snapshot| {
            snapshot.0.insert(key, value);
        })
    }

    /// Removes `key`, committing a new version even if the key was absent
    /// (matching `put`'s always-advances-the-version behavior).
    pub fn remove(&self, key: &str) -> Result<Version, DerechoError> {
        self.mutate(|snapshot| {
            snapshot.0.remove(key);
        })
    }

    fn mutate(&self, edit: impl FnOnce(&mut KvSnapshot)) -> Result<Version, DerechoError> {
        let (version, hlc) = {
            let mut field = self.field.lock();
            let mut snapshot = field.current().clone();
            edit(&mut snapshot);
            field.set_current(snapshot);
            drop(field);
            self.substrate.get_next_version(self.subgroup_id)?
        };
        self.persistence.make_version(self.subgroup_id, version, hlc);
        self.persistence.post_persist_request(self.subgroup_id, version);
        if self.sign {
            self.persistence.post_verify_request(self.subgroup_id, version);
        }
        Ok(version)
    }

    /// The most recently written value for `key`, if any. Reads the
    /// in-memory staged value, not a durably persisted or temporally-scoped
    /// one.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.field.lock().current().0.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use derecho_primitives::{NodeId, TypeTag};
    use derecho_store::InMemoryStore;

    fn store(sign: bool) -> CascadeStore {
        let substrate = Arc::new(SingleProcessSubstrate::new(NodeId(1)));
        let registry = substrate.register_subgroup(SubgroupId(0), &TypeTag::new("cascade_store"), 0, 0);
        let persistence = Arc::new(PersistenceManager::new(substrate.clone(), if sign { 64 } else { 0 }));
        persistence.start();

        CascadeStore::create(
            SubgroupId(0),
            &registry,
            substrate,
            persistence,
            Arc::new(InMemoryStore::new()),
            sign,
        )
    }

    fn wait_until(mut predicate: impl FnMut() -> bool) {
        for _ in 0..200 {
            if predicate() {
                return;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        panic!("condition did not become true in time");
    }

    #[test]
    fn put_then_get_round_trips() {
        let store = store(false);
        store.put("a".into(), b"1".to_vec()).unwrap();
        assert_eq!(store.get("a"), Some(b"1".to_vec()));
        assert_eq!(store.get("missing"), None);
        store.persistence.shutdown(true);
    }

    #[test]
    fn remove_drops_the_key_and_advances_the_version() {
        let store = store(false);
        let v1 = store.put("a".into(), b"1".to_vec()).unwrap();
        let v2 = store.remove("a").unwrap();
        assert!(v2 > v1);
        assert_eq!(store.get("a"), None);
        store.persistence.shutdown(true);
    }

    #[test]
    fn put_drives_a_persisted_version() {
        let store = store(false);
        let version = store.put("a".into(), b"1".to_vec()).unwrap();
        wait_until(|| store.persistence.last_persisted_version(SubgroupId(0)) == version);
        store.persistence.shutdown(true);
    }

    #[test]
    fn signed_put_eventually_verifies() {
        let store = store(true);
        let version = store.put("a".into(), b"1".to_vec()).unwrap();
        wait_until(|| store.persistence.last_verified_version(SubgroupId(0)) == version);
        store.persistence.shutdown(true);
    }

    #[test]
    fn successive_puts_advance_the_version() {
        let store = store(false);
        let v1 = store.put("a".into(), b"1".to_vec()).unwrap();
        let v2 = store.put("b".into(), b"2".to_vec()).unwrap();
        assert!(v2 > v1);
        assert_eq!(store.get("a"), Some(b"1".to_vec()));
        assert_eq!(store.get("b"), Some(b"2".to_vec()));
        store.persistence.shutdown(true);
    }
}
