//! Durable storage collaborator consumed by the persistent registry.
//!
//! The registry addresses storage purely by `(prefix, version)`; it has no
//! opinion on whether that ends up on local disk, in an object store, or in
//! memory for tests. This crate defines the trait and ships two
//! implementations: an in-memory one for tests, and a plain-file one that is
//! adequate for a single-process deployment.

mod file;
mod memory;

pub use file::FileDurableStore;
pub use memory::InMemoryStore;

use derecho_primitives::{DerechoError, Version};

/// Durable storage for persistent-field byte blobs, keyed by the owning
/// field's subgroup prefix (see `PersistentRegistry::generate_prefix`) and
/// version number.
pub trait DurableStore: Send + Sync {
    fn persist(&self, prefix: &str, version: Version, bytes: &[u8]) -> Result<(), DerechoError>;
    fn load(&self, prefix: &str, version: Version) -> Result<Option<Vec<u8>>, DerechoError>;
    /// Drop all versions of `prefix` at or below `up_to`.
    fn trim(&self, prefix: &str, up_to: Version) -> Result<(), DerechoError>;
    /// Discard all versions of `prefix` above `above`, used during recovery
    /// to roll back to a known-good point.
    fn truncate(&self, prefix: &str, above: Version) -> Result<(), DerechoError>;
}
