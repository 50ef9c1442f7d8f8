//! Per-subgroup registry of persistent, version-chained, signed fields.
//!
//! A [`PersistentRegistry`] owns every [`PersistentField`] belonging to one
//! subgroup+shard. Versions are committed in lockstep across all of a
//! registry's fields, and signing chains each version's signature onto the
//! previous one so that trusting a single recent signature transitively
//! trusts the whole history beneath it.

mod field;
mod prefix;
mod registry;

pub use field::{ByteSerialize, PersistentField, VersionedField};
pub use prefix::{generate_prefix, match_prefix};
pub use registry::{
    earliest_version_to_serialize, reset_earliest_version_to_serialize, set_earliest_version_to_serialize,
    PersistentRegistry,
};
