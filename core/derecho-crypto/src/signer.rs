use derecho_primitives::DerechoError;
use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use rand::rngs::OsRng;

/// Incrementally accumulates the bytes of one version's object state (plus
/// the previous signature) and produces a single signature over all of it.
/// `init` must be called before the first `add_bytes` of each version.
pub trait Signer {
    fn init(&mut self);
    fn add_bytes(&mut self, buf: &[u8]);
    /// Writes the signature into `out`, which must be at least
    /// `max_signature_size()` bytes.
    fn finalize(&mut self, out: &mut [u8]) -> Result<(), DerechoError>;
    fn max_signature_size(&self) -> usize;
}

/// Mirror of [`Signer`] used to check a peer's signature against the same
/// byte stream.
pub trait Verifier {
    fn init(&mut self);
    fn add_bytes(&mut self, buf: &[u8]);
    fn finalize(&mut self, signature: &[u8]) -> Result<bool, DerechoError>;
    fn max_signature_size(&self) -> usize;
}

/// Ed25519 cannot be fed incrementally the way a hash function can without
/// switching to prehashed (Ed25519ph) mode, which changes the signature
/// format. Since every caller in this codebase finishes accumulating bytes
/// before asking for the signature, we just buffer them and sign once in
/// `finalize`.
pub struct Ed25519Signer {
    key: SigningKey,
    buffer: Vec<u8>,
}

impl Ed25519Signer {
    pub fn new(key: SigningKey) -> Self {
        Ed25519Signer { key, buffer: Vec::new() }
    }

    pub fn generate() -> Self {
        Self::new(SigningKey::generate(&mut OsRng))
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }
}

impl Signer for Ed25519Signer {
    fn init(&mut self) {
        self.buffer.clear();
    }

    fn add_bytes(&mut self, buf: &[u8]) {
        self.buffer.extend_from_slice(buf);
    }

    fn finalize(&mut self, out: &mut [u8]) -> Result<(), DerechoError> {
        if out.len() < self.max_signature_size() {
            return Err(DerechoError::CryptoFailure("signature buffer too small".into()));
        }
        let signature = self.key.sign(&self.buffer);
        out[..Signature::BYTE_SIZE].copy_from_slice(&signature.to_bytes());
        Ok(())
    }

    fn max_signature_size(&self) -> usize {
        Signature::BYTE_SIZE
    }
}

pub struct Ed25519Verifier {
    key: VerifyingKey,
    buffer: Vec<u8>,
}

impl Ed25519Verifier {
    pub fn new(key: VerifyingKey) -> Self {
        Ed25519Verifier { key, buffer: Vec::new() }
    }
}

impl Verifier for Ed25519Verifier {
    fn init(&mut self) {
        self.buffer.clear();
    }

    fn add_bytes(&mut self, buf: &[u8]) {
        self.buffer.extend_from_slice(buf);
    }

    fn finalize(&mut self, signature: &[u8]) -> Result<bool, DerechoError> {
        let sig_bytes: [u8; Signature::BYTE_SIZE] = signature
            .try_into()
            .map_err(|_| DerechoError::CryptoFailure("malformed signature length".into()))?;
        let signature = Signature::from_bytes(&sig_bytes);
        Ok(self.key.verify(&self.buffer, &signature).is_ok())
    }

    fn max_signature_size(&self) -> usize {
        Signature::BYTE_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let mut signer = Ed25519Signer::generate();
        let verifying_key = signer.verifying_key();

        signer.init();
        signer.add_bytes(b"version-3-state");
        signer.add_bytes(b"previous-signature");
        let mut sig = vec![0u8; signer.max_signature_size()];
        signer.finalize(&mut sig).unwrap();

        let mut verifier = Ed25519Verifier::new(verifying_key);
        verifier.init();
        verifier.add_bytes(b"version-3-state");
        verifier.add_bytes(b"previous-signature");
        assert!(verifier.finalize(&sig).unwrap());
    }

    #[test]
    fn verify_fails_on_tampered_bytes() {
        let mut signer = Ed25519Signer::generate();
        let verifying_key = signer.verifying_key();

        signer.init();
        signer.add_bytes(b"version-3-state");
        let mut sig = vec![0u8; signer.max_signature_size()];
        signer.finalize(&mut sig).unwrap();

        let mut verifier = Ed25519Verifier::new(verifying_key);
        verifier.init();
        verifier.add_bytes(b"version-3-state-but-modified");
        assert!(!verifier.finalize(&sig).unwrap());
    }
}
