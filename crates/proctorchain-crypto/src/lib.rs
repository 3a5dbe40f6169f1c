//! # proctorchain-crypto
//!
//! Authorship signatures for the proctorchain event ledger.
//!
//! - [`KeyPair`] loads the ledger's RSA keypair from PEM, or generates and
//!   persists one on first start.
//! - [`RsaPssSigner`] implements `BlockSigner` with RSA-PSS over the block
//!   header.
//! - [`PssVerifier`] checks signatures with the public key alone.

pub mod keys;
pub mod signer;

pub use keys::{KeyPair, KEY_BITS};
pub use signer::{max_salt_len, PssVerifier, RsaPssSigner};

// ── Tests ─────────────────────────────────────────────────────────────────────
