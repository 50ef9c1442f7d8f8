use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use derecho_primitives::{DerechoError, Hlc, SubgroupId, Version, INVALID_VERSION};
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::substrate::MessagingSubstrate;

/// A unit of work for one of the background worker threads: persist or
/// verify one subgroup up to one version.
#[derive(Debug, Clone, Copy)]
pub struct ThreadRequest {
    pub subgroup_id: SubgroupId,
    pub version: Version,
}

enum WorkItem {
    Request(ThreadRequest),
    Shutdown,
}

/// Called after a version finishes persisting locally, so application code
/// (or the SST layer, out of scope here) can react.
pub type PersistenceCallback = Box<dyn Fn(SubgroupId, Version) + Send + Sync>;

/// Owns the two background worker threads that drive every subgroup's
/// [`PersistentRegistry`](derecho_persistent_registry::PersistentRegistry)
/// forward: one persists committed versions to durable storage, the other
/// verifies signatures on versions other shard members report as persisted.
///
/// The original pairs a semaphore, a spin-locked queue, and a worker thread
/// per direction; an unbounded [`crossbeam_channel`] channel is exactly that
/// combination (a blocking, thread-safe queue) in one type, so each
/// direction here needs only a channel and a thread.
pub struct PersistenceManager {
    substrate: Arc<dyn MessagingSubstrate>,
    persist_tx: Sender<WorkItem>,
    persist_rx: Receiver<WorkItem>,
    verify_tx: Sender<WorkItem>,
    verify_rx: Receiver<WorkItem>,
    last_persisted_version: Mutex<HashMap<SubgroupId, Version>>,
    last_verified_version: Mutex<HashMap<SubgroupId, Version>>,
    signature_size: usize,
    callbacks: Mutex<Vec<PersistenceCallback>>,
    handles: Mutex<Option<(JoinHandle<()>, JoinHandle<()>)>>,
}

impl PersistenceManager {
    /// `signature_size` should be 0 when no replicated type in this group
    /// signs its persistent fields.
    pub fn new(substrate: Arc<dyn MessagingSubstrate>, signature_size: usize) -> Self {
        let (persist_tx, persist_rx) = unbounded();
        let (verify_tx, verify_rx) = unbounded();
        PersistenceManager {
            substrate,
            persist_tx,
            persist_rx,
            verify_tx,
            verify_rx,
            last_persisted_version: Mutex::new(HashMap::new()),
            last_verified_version: Mutex::new(HashMap::new()),
            signature_size,
            callbacks: Mutex::new(Vec::new()),
            handles: Mutex::new(None),
        }
    }

    pub fn add_persistence_callback(&self, callback: PersistenceCallback) {
        self.callbacks.lock().push(callback);
    }

    pub fn signature_size(&self) -> usize {
        self.signature_size
    }

    pub fn last_persisted_version(&self, subgroup_id: SubgroupId) -> Version {
        self.last_persisted_version.lock().get(&subgroup_id).copied().unwrap_or(INVALID_VERSION)
    }

    pub fn last_verified_version(&self, subgroup_id: SubgroupId) -> Version {
        self.last_verified_version.lock().get(&subgroup_id).copied().unwrap_or(INVALID_VERSION)
    }

    /// Snapshots `subgroup_id`'s registry at `version`. Called by the
    /// ordered-delivery path, on the same thread that delivers the update,
    /// before any persist/verify request for that version is posted.
    pub fn make_version(&self, subgroup_id: SubgroupId, version: Version, hlc: Hlc) {
        if let Some(registry) = self.substrate.registry(subgroup_id) {
            registry.lock().commit_version(version, hlc);
        }
    }

    /// Spawns the persist and verify worker threads. Must only be called
    /// once; calling it again while the threads are running replaces the
    /// handles without stopping the old threads, so callers should pair one
    /// `start()` with one `shutdown()`.
    pub fn start(self: &Arc<Self>) {
        let persist_manager = Arc::clone(self);
        let persist_handle = std::thread::Builder::new()
            .name("derecho-persist".into())
            .spawn(move || persist_manager.persist_loop())
            .expect("failed to spawn persistence worker thread");

        let verify_manager = Arc::clone(self);
        let verify_handle = std::thread::Builder::new()
            .name("derecho-verify".into())
            .spawn(move || verify_manager.verify_loop())
            .expect("failed to spawn verification worker thread");

        *self.handles.lock() = Some((persist_handle, verify_handle));
    }

    pub fn post_persist_request(&self, subgroup_id: SubgroupId, version: Version) {
        let _ = self.persist_tx.send(WorkItem::Request(ThreadRequest { subgroup_id, version }));
    }

    pub fn post_verify_request(&self, subgroup_id: SubgroupId, version: Version) {
        let _ = self.verify_tx.send(WorkItem::Request(ThreadRequest { subgroup_id, version }));
    }

    /// Signals both worker threads to stop after draining their current
    /// queue, and if `wait` is true blocks until they have exited.
    pub fn shutdown(&self, wait: bool) {
        let _ = self.persist_tx.send(WorkItem::Shutdown);
        let _ = self.verify_tx.send(WorkItem::Shutdown);
        if wait {
            if let Some((persist_handle, verify_handle)) = self.handles.lock().take() {
                let _ = persist_handle.join();
                let _ = verify_handle.join();
            }
        }
    }

    fn persist_loop(self: Arc<Self>) {
        for item in self.persist_rx.clone() {
            match item {
                WorkItem::Request(req) => {
                    if let Err(err) = self.handle_persist_request(req.subgroup_id, req.version) {
                        error!(subgroup = %req.subgroup_id, version = req.version.0, %err, "persist request failed");
                    }
                }
                WorkItem::Shutdown => break,
            }
        }
    }

    fn verify_loop(self: Arc<Self>) {
        for item in self.verify_rx.clone() {
            match item {
                WorkItem::Request(req) => {
                    if let Err(err) = self.handle_verify_request(req.subgroup_id, req.version) {
                        error!(subgroup = %req.subgroup_id, version = req.version.0, %err, "verify request failed");
                    }
                }
                WorkItem::Shutdown => break,
            }
        }
    }

    fn handle_persist_request(&self, subgroup_id: SubgroupId, version: Version) -> Result<(), DerechoError> {
        let current = self.last_persisted_version(subgroup_id);
        if version <= current {
            debug!(subgroup = %subgroup_id, version = version.0, "ignoring obsolete persist request");
            return Ok(());
        }
        let Some(registry) = self.substrate.registry(subgroup_id) else {
            warn!(subgroup = %subgroup_id, "persist request for unknown subgroup");
            return Ok(());
        };
        let published_signature = {
            let mut registry = registry.lock();
            registry.persist(version)?;

            if self.signature_size == 0 {
                None
            } else if let Some(signer) = self.substrate.signer(subgroup_id) {
                registry.sign(version, &mut *signer.lock())?;
                registry.get_signature(version).map(|(signature, _)| signature)
            } else {
                None
            }
        };
        if let Some(signature) = published_signature {
            self.substrate.post_signature(subgroup_id, version, &signature)?;
        }

        self.last_persisted_version.lock().insert(subgroup_id, version);
        for callback in self.callbacks.lock().iter() {
            callback(subgroup_id, version);
        }
        Ok(())
    }

    /// Verifies every peer's published signature over `version` against
    /// this node's own recomputation of the signed bytes, advancing the
    /// watermark only if all of them check out.
    fn handle_verify_request(&self, subgroup_id: SubgroupId, version: Version) -> Result<(), DerechoError> {
        let current = self.last_verified_version(subgroup_id);
        if version <= current {
            debug!(subgroup = %subgroup_id, version = version.0, "ignoring obsolete verify request");
            return Ok(());
        }
        if self.signature_size == 0 {
            // Signatures are disabled for this group; verification trivially
            // keeps pace with persistence.
            self.last_verified_version.lock().insert(subgroup_id, version);
            return Ok(());
        }
        let Some(registry) = self.substrate.registry(subgroup_id) else {
            warn!(subgroup = %subgroup_id, "verify request for unknown subgroup");
            return Ok(());
        };
        let Some(verifier) = self.substrate.verifier(subgroup_id) else {
            warn!(subgroup = %subgroup_id, "verify request for subgroup with no verifier configured");
            return Ok(());
        };

        let peer_signatures = self.substrate.peer_signatures(subgroup_id, version);
        if peer_signatures.is_empty() {
            // The matching persist request signs and publishes on the other
            // worker thread and may simply not have gotten there yet. Requeue
            // instead of dropping the request, so the watermark still
            // advances once the signature is published.
            debug!(subgroup = %subgroup_id, version = version.0, "no peer signatures published yet, retrying");
            std::thread::sleep(Duration::from_millis(1));
            let _ = self.verify_tx.send(WorkItem::Request(ThreadRequest { subgroup_id, version }));
            return Ok(());
        }

        let registry = registry.lock();
        for (node_id, signature) in &peer_signatures {
            let verified = registry.verify(version, &mut *verifier.lock(), signature)?;
            if !verified {
                return Err(DerechoError::CryptoFailure(format!(
                    "signature from node {node_id} failed verification for subgroup {subgroup_id} version {}",
                    version.0
                )));
            }
        }
        self.last_verified_version.lock().insert(subgroup_id, version);
        Ok(())
    }
}
