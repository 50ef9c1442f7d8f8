use crate::ids::NodeId;

/// Error kinds raised anywhere in the membership/persistence core.
///
/// `SubgroupProvisioning` is the only one the allocator's caller is expected
/// to routinely handle (by retrying on the next view); the others surface
/// from application-facing send paths or from the persistence pipeline.
#[derive(Debug, thiserror::Error)]
pub enum DerechoError {
    /// The current view cannot satisfy the requested policy: not enough
    /// members, or not enough of the right ones, to fill every shard.
    #[error("view cannot satisfy subgroup policy: {reason}")]
    SubgroupProvisioning { reason: String },

    /// An operation referenced a node that is not a member of the current
    /// view.
    #[error("node {0} is not a member of the current view")]
    InvalidNode(NodeId),

    /// A call was made on a replicated handle that is not bound to any
    /// subgroup.
    #[error("replicated handle is not bound to a subgroup")]
    EmptyReference,

    /// The serialized form of an RPC argument exceeded the configured
    /// maximum payload size.
    #[error("payload of {actual} bytes exceeds the maximum of {max}")]
    OversizePayload { actual: usize, max: usize },

    /// Hashing or signing failed inside the crypto backend.
    #[error("crypto backend failure: {0}")]
    CryptoFailure(String),

    /// A durable-storage I/O error occurred while persisting, loading,
    /// trimming, or truncating a version.
    #[error("durable store failure: {0}")]
    StorageFailure(String),
}

pub type Result<T> = std::result::Result<T, DerechoError>;
