//! Glue crate wiring subgroup allocation, persistence, and a minimal
//! replicated key-value store together for a single-process deployment.
//!
//! Real multi-node operation needs a network transport, a view-change
//! protocol, and the SST layer the original design builds on; this crate
//! provides everything upstream of those — [`derecho_group_admin`] for
//! layout, [`derecho_persistent_registry`] and
//! [`derecho_persistence_manager`] for versioned, signed persistence — and a
//! [`substrate::SingleProcessSubstrate`] that plays the messaging
//! substrate's role within one process so the pipeline can run end to end.

pub mod cascade;
pub mod config;
pub mod group;
pub mod substrate;

pub use cascade::CascadeStore;
pub use config::GroupConfig;
pub use group::{Group, ShardHandle};
pub use substrate::SingleProcessSubstrate;
