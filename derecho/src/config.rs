use std::path::PathBuf;

/// Process-wide settings for a single Derecho node. Kept intentionally
/// small: this core has no wire protocol, CLI, or file-based configuration
/// format of its own, so there is nothing here beyond the knobs this crate's
/// own components need.
#[derive(Debug, Clone)]
pub struct GroupConfig {
    /// Signature size in bytes for every subgroup's persistence pipeline, or
    /// 0 to disable signing group-wide.
    pub signature_size: usize,
    /// Root directory persisted fields are written under.
    pub durable_store_root: PathBuf,
}

impl Default for GroupConfig {
    fn default() -> Self {
        GroupConfig {
            // ed25519-dalek signatures are a fixed 64 bytes.
            signature_size: 64,
            durable_store_root: PathBuf::from("./derecho-data"),
        }
    }
}

/// Installs a `tracing` subscriber honoring `RUST_LOG`, defaulting to
/// `info`. Safe to call more than once; only the first call takes effect.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
