//! Hashing and signing backends consumed by the persistent registry's
//! signature chain (see `derecho-persistent-registry`). These traits mirror
//! the `Hasher`/`Signer`/`Verifier` collaborators the registry expects; the
//! registry itself is generic over them and never constructs a concrete
//! backend.

mod hasher;
mod signer;

pub use hasher::{Hasher, Sha256Hasher};
pub use signer::{Ed25519Signer, Ed25519Verifier, Signer, Verifier};
