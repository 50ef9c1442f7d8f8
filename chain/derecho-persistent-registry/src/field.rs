use std::collections::BTreeMap;
use std::sync::Arc;

use derecho_primitives::{DerechoError, Hlc, Version, INVALID_VERSION};
use derecho_store::DurableStore;

/// How a field's staged value is turned into the bytes a [`Signer`] or
/// [`Verifier`] feeds on.
///
/// [`Signer`]: derecho_crypto::Signer
/// [`Verifier`]: derecho_crypto::Verifier
pub trait ByteSerialize {
    fn to_bytes(&self) -> Vec<u8>;
}

impl ByteSerialize for Vec<u8> {
    fn to_bytes(&self) -> Vec<u8> {
        self.clone()
    }
}

impl ByteSerialize for String {
    fn to_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

/// One entry of a [`PersistentField`]'s version log: the value as of that
/// version, plus the signature chained onto it once `sign` has reached it.
struct Entry<T> {
    #[allow(dead_code)]
    hlc: Hlc,
    value: T,
    signature: Option<(Vec<u8>, Version)>,
}

/// A single field a [`PersistentRegistry`](crate::PersistentRegistry) tracks:
/// something that can be versioned, fed to a signature as raw bytes,
/// durably persisted, and rolled forward or backward by version.
///
/// Kept as a trait so the registry can hold a heterogeneous set of fields
/// (counters, logs, whole replicated objects) behind one vtable, mirroring
/// how the original design erases each field's concrete type behind a
/// `PersistentObject*`.
pub trait PersistentField: Send + Sync {
    /// Snapshots the field's current staged value into the log at `version`.
    fn commit_version(&mut self, version: Version, hlc: Hlc);

    /// The most recent version this field has committed, or
    /// [`INVALID_VERSION`] if it has none yet.
    fn latest_version(&self) -> Version;

    /// Feeds `version`'s bytes to `sink`, in order, and returns how many
    /// bytes were fed (0 if this field has no entry for that version).
    fn feed_bytes(&self, version: Version, sink: &mut dyn FnMut(&[u8])) -> usize;

    /// Records that `version`'s signature is `signature`, chained onto
    /// `prev_signed_version`.
    fn attach_signature(&mut self, version: Version, signature: &[u8], prev_signed_version: Version);

    /// The signature recorded for `version` and the version it was chained
    /// onto, if one has been attached.
    fn signature_at(&self, version: Version) -> Option<(Vec<u8>, Version)>;

    fn persist(&mut self, up_to: Version) -> Result<(), DerechoError>;
    fn trim(&mut self, up_to: Version) -> Result<(), DerechoError>;
    fn truncate(&mut self, above: Version) -> Result<(), DerechoError>;
    fn last_persisted_version(&self) -> Version;
}

/// A [`PersistentField`] that keeps an in-memory log of every committed
/// version of a `T`, durably persisting committed versions through a
/// [`DurableStore`].
pub struct VersionedField<T> {
    prefix: String,
    current: T,
    log: BTreeMap<Version, Entry<T>>,
    last_persisted_version: Version,
    store: Arc<dyn DurableStore>,
}

impl<T: Clone + ByteSerialize + Send + Sync> VersionedField<T> {
    pub fn new(field_prefix: String, initial: T, store: Arc<dyn DurableStore>) -> Self {
        VersionedField {
            prefix: field_prefix,
            current: initial,
            log: BTreeMap::new(),
            last_persisted_version: INVALID_VERSION,
            store,
        }
    }

    /// Stages a new value to be captured by the next `commit_version` call.
    pub fn set_current(&mut self, value: T) {
        self.current = value;
    }

    pub fn current(&self) -> &T {
        &self.current
    }
}

impl<T: Clone + ByteSerialize + Send + Sync> PersistentField for VersionedField<T> {
    fn commit_version(&mut self, version: Version, hlc: Hlc) {
        self.log.insert(version, Entry { hlc, value: self.current.clone(), signature: None });
    }

    fn latest_version(&self) -> Version {
        self.log.keys().next_back().copied().unwrap_or(INVALID_VERSION)
    }

    fn feed_bytes(&self, version: Version, sink: &mut dyn FnMut(&[u8])) -> usize {
        match self.log.get(&version) {
            Some(entry) => {
                let bytes = entry.value.to_bytes();
                let len = bytes.len();
                sink(&bytes);
                len
            }
            None => 0,
        }
    }

    fn attach_signature(&mut self, version: Version, signature: &[u8], prev_signed_version: Version) {
        if let Some(entry) = self.log.get_mut(&version) {
            entry.signature = Some((signature.to_vec(), prev_signed_version));
        }
    }

    fn signature_at(&self, version: Version) -> Option<(Vec<u8>, Version)> {
        self.log.get(&version).and_then(|entry| entry.signature.clone())
    }

    fn persist(&mut self, up_to: Version) -> Result<(), DerechoError> {
        let pending: Vec<Version> = self
            .log
            .range(..=up_to)
            .filter(|(&v, _)| v > self.last_persisted_version)
            .map(|(&v, _)| v)
            .collect();
        for version in pending {
            let bytes = self.log[&version].value.to_bytes();
            self.store.persist(&self.prefix, version, &bytes)?;
            self.last_persisted_version = version;
        }
        Ok(())
    }

    fn trim(&mut self, up_to: Version) -> Result<(), DerechoError> {
        self.log.retain(|&v, _| v > up_to);
        self.store.trim(&self.prefix, up_to)
    }

    fn truncate(&mut self, above: Version) -> Result<(), DerechoError> {
        self.log.retain(|&v, _| v <= above);
        if self.last_persisted_version > above {
            self.last_persisted_version = above;
        }
        self.store.truncate(&self.prefix, above)
    }

    fn last_persisted_version(&self) -> Version {
        self.last_persisted_version
    }
}
