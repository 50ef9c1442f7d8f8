use sha2::{Digest, Sha256};

/// A one-shot cryptographic digest. The only consumer in this crate family
/// is `PersistentRegistry::generate_prefix`, which hashes a subgroup type
/// name down to a fixed-width, filesystem-safe directory component.
pub trait Hasher {
    /// Number of bytes `hash_bytes` writes into `out`.
    const OUTPUT_LEN: usize;

    fn hash_bytes(&self, input: &[u8], out: &mut [u8]);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Hasher;

impl Hasher for Sha256Hasher {
    const OUTPUT_LEN: usize = 32;

    fn hash_bytes(&self, input: &[u8], out: &mut [u8]) {
        assert!(out.len() >= Self::OUTPUT_LEN, "output buffer too small for SHA-256 digest");
        let digest = Sha256::digest(input);
        out[..Self::OUTPUT_LEN].copy_from_slice(&digest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_deterministic_and_distinct() {
        let hasher = Sha256Hasher;
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        hasher.hash_bytes(b"shard-store", &mut a);
        hasher.hash_bytes(b"shard-store", &mut b);
        assert_eq!(a, b);

        let mut c = [0u8; 32];
        hasher.hash_bytes(b"other-store", &mut c);
        assert_ne!(a, c);
    }
}
