//! Signing key material.
//!
//! The ledger holds one RSA keypair for its whole life.  On first start the
//! pair is generated and written as PEM (PKCS#8 private key, SubjectPublicKeyInfo
//! public key); every later start loads the same files.  The public half is
//! what auditors receive.

use std::fs;
use std::path::Path;

use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use tracing::info;

use proctorchain_contracts::error::{LedgerError, LedgerResult};

/// Modulus size for generated keys.
pub const KEY_BITS: usize = 2048;

/// An RSA signing keypair.
#[derive(Clone)]
pub struct KeyPair {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    /// Generate a fresh [`KEY_BITS`]-bit keypair with exponent 65537.
    pub fn generate() -> LedgerResult<Self> {
        let private_key =
            RsaPrivateKey::new(&mut rand::thread_rng(), KEY_BITS).map_err(|e| {
                LedgerError::KeyMaterial {
                    reason: format!("key generation failed: {}", e),
                }
            })?;
        Ok(Self::from_private_key(private_key))
    }

    pub fn from_private_key(private_key: RsaPrivateKey) -> Self {
        let public_key = RsaPublicKey::from(&private_key);
        Self {
            private_key,
            public_key,
        }
    }

    /// Parse a PKCS#8 PEM private key.
    pub fn from_pkcs8_pem(pem: &str) -> LedgerResult<Self> {
        let private_key =
            RsaPrivateKey::from_pkcs8_pem(pem).map_err(|e| LedgerError::KeyMaterial {
                reason: format!("invalid PKCS#8 private key: {}", e),
            })?;
        Ok(Self::from_private_key(private_key))
    }

    /// Load both PEM files and check that they belong together.
    pub fn load(private_path: &Path, public_path: &Path) -> LedgerResult<Self> {
        let keypair = Self::from_pkcs8_pem(&read_pem(private_path)?)?;

        let public_key = RsaPublicKey::from_public_key_pem(&read_pem(public_path)?).map_err(
            |e| LedgerError::KeyMaterial {
                reason: format!("invalid public key '{}': {}", public_path.display(), e),
            },
        )?;
        if public_key != keypair.public_key {
            return Err(LedgerError::KeyMaterial {
                reason: format!(
                    "public key '{}' does not match private key '{}'",
                    public_path.display(),
                    private_path.display()
                ),
            });
        }

        Ok(keypair)
    }

    /// Write the private key (owner-only on Unix) and the public key as PEM.
    pub fn save(&self, private_path: &Path, public_path: &Path) -> LedgerResult<()> {
        let private_pem =
            self.private_key
                .to_pkcs8_pem(LineEnding::LF)
                .map_err(|e| LedgerError::KeyMaterial {
                    reason: format!("cannot encode private key: {}", e),
                })?;
        write_pem(private_path, private_pem.as_bytes())?;
        restrict_permissions(private_path)?;

        write_pem(public_path, self.public_key_pem()?.as_bytes())
    }

    /// Load the pair if both files exist, otherwise generate and save one.
    pub fn load_or_generate(private_path: &Path, public_path: &Path) -> LedgerResult<Self> {
        if private_path.exists() && public_path.exists() {
            let keypair = Self::load(private_path, public_path)?;
            info!(
                private_key = %private_path.display(),
                public_key = %public_path.display(),
                "signing keys loaded"
            );
            return Ok(keypair);
        }

        let keypair = Self::generate()?;
        keypair.save(private_path, public_path)?;
        info!(
            private_key = %private_path.display(),
            public_key = %public_path.display(),
            bits = KEY_BITS,
            "new signing keys generated and saved"
        );
        Ok(keypair)
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// The public key as SubjectPublicKeyInfo PEM, for distribution.
    pub fn public_key_pem(&self) -> LedgerResult<String> {
        self.public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| LedgerError::KeyMaterial {
                reason: format!("cannot encode public key: {}", e),
            })
    }
}

fn read_pem(path: &Path) -> LedgerResult<String> {
    fs::read_to_string(path).map_err(|e| LedgerError::KeyMaterial {
        reason: format!("cannot read key file '{}': {}", path.display(), e),
    })
}

fn write_pem(path: &Path, contents: &[u8]) -> LedgerResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| LedgerError::KeyMaterial {
            reason: format!("cannot create key directory '{}': {}", parent.display(), e),
        })?;
    }
    fs::write(path, contents).map_err(|e| LedgerError::KeyMaterial {
        reason: format!("cannot write key file '{}': {}", path.display(), e),
    })
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> LedgerResult<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| {
        LedgerError::KeyMaterial {
            reason: format!("cannot restrict permissions on '{}': {}", path.display(), e),
        }
    })
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> LedgerResult<()> {
    Ok(())
}
