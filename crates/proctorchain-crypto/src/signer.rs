//! RSA-PSS block signatures.
//!
//! Padding is PSS with MGF1-SHA256 and the largest salt the key allows
//! (222 bytes for a 2048-bit key), over SHA-256 of the block's signing
//! payload.  Signatures travel as standard base64.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsa::pss::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use sha2::Sha256;
use tracing::debug;

use proctorchain_contracts::{
    block::Block,
    error::{LedgerError, LedgerResult},
};
use proctorchain_core::{hash::signing_payload, BlockSigner};

use crate::keys::KeyPair;

const DIGEST_LEN: usize = 32;

/// Largest PSS salt for `key` with a SHA-256 digest.
pub fn max_salt_len(key: &RsaPublicKey) -> usize {
    let em_len = (key.n().bits() + 6) / 8;
    em_len.saturating_sub(DIGEST_LEN + 2)
}

/// Checks block signatures against a public key alone.
///
/// This is what an auditor holding only `public_key.pem` uses.
#[derive(Debug, Clone)]
pub struct PssVerifier {
    verifying_key: VerifyingKey<Sha256>,
}

impl PssVerifier {
    pub fn new(public_key: RsaPublicKey) -> Self {
        let salt_len = max_salt_len(&public_key);
        Self {
            verifying_key: VerifyingKey::new_with_salt_len(public_key, salt_len),
        }
    }

    /// `Ok(false)` for a mismatch; `Err` when `signature` is not base64.
    pub fn verify(&self, block: &Block, signature: &str) -> LedgerResult<bool> {
        let raw = STANDARD
            .decode(signature.trim())
            .map_err(|e| LedgerError::Crypto {
                reason: format!("signature of block {} is not base64: {}", block.index, e),
            })?;

        let signature = match Signature::try_from(raw.as_slice()) {
            Ok(signature) => signature,
            Err(_) => return Ok(false),
        };

        let payload = signing_payload(block)?;
        Ok(self
            .verifying_key
            .verify(payload.as_bytes(), &signature)
            .is_ok())
    }
}

/// The ledger's [`BlockSigner`]: RSA-PSS with the ledger's private key.
#[derive(Debug, Clone)]
pub struct RsaPssSigner {
    signing_key: SigningKey<Sha256>,
    verifier: PssVerifier,
}

impl RsaPssSigner {
    pub fn new(keypair: &KeyPair) -> Self {
        let salt_len = max_salt_len(keypair.public_key());
        Self {
            signing_key: SigningKey::new_with_salt_len(keypair.private_key().clone(), salt_len),
            verifier: PssVerifier::new(keypair.public_key().clone()),
        }
    }

    pub fn verifier(&self) -> &PssVerifier {
        &self.verifier
    }
}

impl BlockSigner for RsaPssSigner {
    fn sign(&self, block: &Block) -> LedgerResult<String> {
        let payload = signing_payload(block)?;
        let signature = self
            .signing_key
            .try_sign_with_rng(&mut rand::thread_rng(), payload.as_bytes())
            .map_err(|e| LedgerError::Crypto {
                reason: format!("signing block {} failed: {}", block.index, e),
            })?;

        debug!(block_index = block.index, "block signed");
        Ok(STANDARD.encode(signature.to_bytes()))
    }

    fn verify(&self, block: &Block, signature: &str) -> LedgerResult<bool> {
        self.verifier.verify(block, signature)
    }
}
