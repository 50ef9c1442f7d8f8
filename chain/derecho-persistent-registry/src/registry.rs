use std::cell::Cell;
use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher as _};

use derecho_primitives::{DerechoError, Hlc, TypeTag, Version, INVALID_VERSION};

use crate::field::PersistentField;
use crate::prefix::generate_prefix;

thread_local! {
    /// Per-thread floor on which version a serializer is allowed to look at,
    /// set by a sender thread while it is packaging up a message so that a
    /// concurrent `sign`/`persist` pass on another thread doesn't race ahead
    /// of bytes the sender hasn't finished writing yet. A `std::thread_local!`
    /// cell is the direct match for the original's C++ `thread_local` static:
    /// one scalar per thread, not a collection keyed by access point (which
    /// is what the `thread_local` crate is for).
    static EARLIEST_VERSION_TO_SERIALIZE: Cell<i64> = Cell::new(INVALID_VERSION.0);
}

/// Sets this thread's earliest-version-to-serialize floor.
pub fn set_earliest_version_to_serialize(version: Version) {
    EARLIEST_VERSION_TO_SERIALIZE.with(|cell| cell.set(version.0));
}

/// Resets this thread's floor back to [`INVALID_VERSION`].
pub fn reset_earliest_version_to_serialize() {
    EARLIEST_VERSION_TO_SERIALIZE.with(|cell| cell.set(INVALID_VERSION.0));
}

/// This thread's current earliest-version-to-serialize floor.
pub fn earliest_version_to_serialize() -> Version {
    EARLIEST_VERSION_TO_SERIALIZE.with(|cell| Version(cell.get()))
}

fn hash_name(name: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    hasher.finish()
}

/// All of one subgroup+shard's persistent fields, chained under a single
/// rolling signature: every signed version's signature covers that version's
/// field bytes *and* the signature of the version before it, so a verifier
/// that trusts one signature transitively trusts the entire history beneath
/// it.
pub struct PersistentRegistry {
    prefix: String,
    fields: BTreeMap<u64, (String, Box<dyn PersistentField>)>,
    last_signature: Vec<u8>,
    last_signed_version: Version,
}

impl PersistentRegistry {
    pub fn new(subgroup_type: &TypeTag, subgroup_index: u32, shard_num: u32) -> Self {
        PersistentRegistry {
            prefix: generate_prefix(subgroup_type, subgroup_index, shard_num),
            fields: BTreeMap::new(),
            last_signature: Vec::new(),
            last_signed_version: INVALID_VERSION,
        }
    }

    pub fn subgroup_prefix(&self) -> &str {
        &self.prefix
    }

    /// Registers `field` under `name`. A second registration under the same
    /// name replaces the first, matching the registry's hash-keyed storage.
    pub fn register(&mut self, name: &str, field: Box<dyn PersistentField>) {
        self.fields.insert(hash_name(name), (name.to_string(), field));
    }

    /// Removes the field registered under `name`, if any.
    pub fn unregister(&mut self, name: &str) {
        self.fields.remove(&hash_name(name));
    }

    pub fn commit_version(&mut self, version: Version, hlc: Hlc) {
        for (_, field) in self.fields.values_mut() {
            field.commit_version(version, hlc);
        }
    }

    /// Smallest `latest_version` across every registered field, or
    /// [`INVALID_VERSION`] if none are registered.
    pub fn minimum_latest_version(&self) -> Version {
        self.fields.values().map(|(_, field)| field.latest_version()).min().unwrap_or(INVALID_VERSION)
    }

    /// Seeds the signature chain, e.g. after loading a recovered field set
    /// from durable storage. A no-op if `version` is not newer than what
    /// this registry already has recorded.
    pub fn initialize_last_signature(&mut self, version: Version, signature: &[u8]) {
        if version.is_valid() && (!self.last_signed_version.is_valid() || self.last_signed_version < version) {
            self.last_signature = signature.to_vec();
            self.last_signed_version = version;
        }
    }

    /// Signs every not-yet-signed version up to `latest_version`, chaining
    /// each signature onto the one before it. Versions with no bytes in any
    /// field (a gap left by trimming, or one no field happened to commit)
    /// are skipped without advancing the chain past them.
    pub fn sign(&mut self, latest_version: Version, signer: &mut dyn derecho_crypto::Signer) -> Result<(), DerechoError> {
        let mut version = self.last_signed_version.next();
        while version <= latest_version {
            signer.init();
            let mut bytes_signed = 0usize;
            for (_, field) in self.fields.values() {
                bytes_signed += field.feed_bytes(version, &mut |buf| signer.add_bytes(buf));
            }
            if bytes_signed == 0 {
                version = version.next();
                continue;
            }
            signer.add_bytes(&self.last_signature);
            let mut signature = vec![0u8; signer.max_signature_size()];
            signer.finalize(&mut signature)?;

            for (_, field) in self.fields.values_mut() {
                field.attach_signature(version, &signature, self.last_signed_version);
            }
            self.last_signature = signature;
            self.last_signed_version = version;
            version = version.next();
        }
        Ok(())
    }

    /// The signature recorded for `version` and the prior version it chains
    /// from, from whichever field happens to carry it (every field sees the
    /// same signature once `sign` reaches that version).
    pub fn get_signature(&self, version: Version) -> Option<(Vec<u8>, Version)> {
        self.fields.values().find_map(|(_, field)| field.signature_at(version))
    }

    /// Recomputes the signature a peer claims for `version` from this
    /// registry's own field bytes and checks it against `signature`.
    pub fn verify(
        &self,
        version: Version,
        verifier: &mut dyn derecho_crypto::Verifier,
        signature: &[u8],
    ) -> Result<bool, DerechoError> {
        if self.fields.is_empty() {
            // Nothing to verify for an object with no persistent state.
            return Ok(true);
        }
        verifier.init();
        for (_, field) in self.fields.values() {
            field.feed_bytes(version, &mut |buf| verifier.add_bytes(buf));
        }

        let signature_size = verifier.max_signature_size();
        let mut previous_signature = vec![0u8; signature_size];
        for (_, field) in self.fields.values() {
            if let Some((_, prev_signed_version)) = field.signature_at(version) {
                if prev_signed_version.is_valid() {
                    if let Some((found, _)) = self.get_signature(prev_signed_version) {
                        previous_signature = found;
                    }
                }
                break;
            }
        }
        verifier.add_bytes(&previous_signature);
        verifier.finalize(signature)
    }

    pub fn persist(&mut self, latest_version: Version) -> Result<(), DerechoError> {
        for (_, field) in self.fields.values_mut() {
            field.persist(latest_version)?;
        }
        Ok(())
    }

    pub fn trim(&mut self, earliest_version: Version) -> Result<(), DerechoError> {
        for (_, field) in self.fields.values_mut() {
            field.trim(earliest_version)?;
        }
        Ok(())
    }

    pub fn truncate(&mut self, last_version: Version) -> Result<(), DerechoError> {
        for (_, field) in self.fields.values_mut() {
            field.truncate(last_version)?;
        }
        Ok(())
    }

    /// Smallest `last_persisted_version` across every registered field, or
    /// [`INVALID_VERSION`] if none are registered.
    pub fn minimum_latest_persisted_version(&self) -> Version {
        self.fields.values().map(|(_, field)| field.last_persisted_version()).min().unwrap_or(INVALID_VERSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::VersionedField;
    use derecho_crypto::{Ed25519Signer, Ed25519Verifier};
    use derecho_store::InMemoryStore;
    use std::sync::Arc;

    fn registry() -> PersistentRegistry {
        PersistentRegistry::new(&TypeTag::new("cascade_store"), 0, 0)
    }

    fn store() -> Arc<InMemoryStore> {
        Arc::new(InMemoryStore::new())
    }

    /// S6: a chain of committed versions signs cleanly and a peer with the
    /// matching verifying key accepts every signature in the chain.
    #[test]
    fn s6_sign_then_verify_chain() {
        let mut registry = registry();
        let mut field = VersionedField::<Vec<u8>>::new("field-a".into(), Vec::new(), store());

        for v in 0..3 {
            field.set_current(vec![v as u8; 4]);
            field.commit_version(Version(v), Hlc(v as u64));
        }
        registry.register("field-a", Box::new(field));

        let mut signer = Ed25519Signer::generate();
        let verifying_key = signer.verifying_key();
        registry.sign(Version(2), &mut signer).unwrap();

        let mut verifier = Ed25519Verifier::new(verifying_key);
        for v in 0..3 {
            let (signature, prev_signed_version) = registry.get_signature(Version(v)).expect("version was signed");
            assert!(registry.verify(Version(v), &mut verifier, &signature).unwrap());
            if v == 0 {
                assert!(!prev_signed_version.is_valid());
            } else {
                assert_eq!(prev_signed_version, Version(v - 1));
            }
        }
    }

    #[test]
    fn tampered_signature_fails_verification() {
        let mut registry = registry();
        let mut field = VersionedField::<Vec<u8>>::new("field-a".into(), Vec::new(), store());
        field.set_current(vec![7, 7, 7]);
        field.commit_version(Version(0), Hlc(0));
        registry.register("field-a", Box::new(field));

        let mut signer = Ed25519Signer::generate();
        let verifying_key = signer.verifying_key();
        registry.sign(Version(0), &mut signer).unwrap();

        let (mut tampered, _) = registry.get_signature(Version(0)).unwrap();
        tampered[0] ^= 0xFF;

        let mut verifier = Ed25519Verifier::new(verifying_key);
        assert!(!registry.verify(Version(0), &mut verifier, &tampered).unwrap());
    }

    #[test]
    fn registry_with_no_fields_verifies_trivially() {
        let registry = registry();
        let mut verifier = Ed25519Verifier::new(Ed25519Signer::generate().verifying_key());
        assert!(registry.verify(Version(0), &mut verifier, &[]).unwrap());
    }

    #[test]
    fn minimum_latest_version_is_invalid_when_empty() {
        let registry = registry();
        assert_eq!(registry.minimum_latest_version(), INVALID_VERSION);
    }

    #[test]
    fn reregistering_the_same_name_replaces_the_field() {
        let mut registry = registry();
        let mut first = VersionedField::<Vec<u8>>::new("a".into(), Vec::new(), store());
        first.set_current(vec![1]);
        first.commit_version(Version(0), Hlc(0));
        registry.register("same-name", Box::new(first));

        let second = VersionedField::<Vec<u8>>::new("a".into(), Vec::new(), store());
        registry.register("same-name", Box::new(second));

        assert_eq!(registry.minimum_latest_version(), INVALID_VERSION);
    }

    #[test]
    fn unregister_actually_removes_the_field() {
        // Resolves an open question: the original leaves unregistered
        // entries in place until the next registration under the same name
        // overwrites them. Here unregister is a true removal.
        let mut registry = registry();
        registry.register("a", Box::new(VersionedField::<Vec<u8>>::new("a".into(), Vec::new(), store())));
        assert!(registry.fields.contains_key(&hash_name("a")));
        registry.unregister("a");
        assert!(!registry.fields.contains_key(&hash_name("a")));
    }

    #[test]
    fn earliest_version_to_serialize_defaults_to_invalid_and_is_settable() {
        reset_earliest_version_to_serialize();
        assert_eq!(earliest_version_to_serialize(), INVALID_VERSION);
        set_earliest_version_to_serialize(Version(5));
        assert_eq!(earliest_version_to_serialize(), Version(5));
        reset_earliest_version_to_serialize();
    }
}
