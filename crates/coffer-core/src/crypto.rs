//! Payload encryption hook
//!
//! A [`CryptoService`] is attached to a data store and invoked on the write
//! path (encrypt) and the read path (decrypt). The store never depends on a
//! concrete cipher; [`ChaChaCryptoService`] is the bundled implementation.
//!
//! Ciphertext layout produced by [`ChaChaCryptoService`]:
//!
//! ```text
//! +-----------------+------------------------------------+
//! | nonce (12 B)    | ChaCha20-Poly1305 ciphertext + tag |
//! +-----------------+------------------------------------+
//! ```

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::RngCore;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use zeroize::Zeroizing;

/// Size of the symmetric key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// Size of the nonce in bytes (96 bits for ChaCha20-Poly1305)
const NONCE_SIZE: usize = 12;

/// Size of the Poly1305 authentication tag
const TAG_SIZE: usize = 16;

/// Errors raised by a crypto service
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    Encrypt(String),

    #[error("Decryption failed: {0}")]
    Decrypt(String),

    #[error("Key must be {expected} bytes, got {actual} bytes")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Key file error for {path}: {source}")]
    KeyFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Encrypt/decrypt capability attached to a data store
pub trait CryptoService: Send + Sync + fmt::Debug {
    /// Encrypt a plaintext payload
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Decrypt a payload previously produced by [`CryptoService::encrypt`]
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// ChaCha20-Poly1305 crypto service with a random nonce per payload
pub struct ChaChaCryptoService {
    key: Zeroizing<[u8; KEY_SIZE]>,
}

impl ChaChaCryptoService {
    /// Create from raw key bytes (32 bytes)
    pub fn new(key_bytes: &[u8]) -> Result<Self, CryptoError> {
        if key_bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: key_bytes.len(),
            });
        }

        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        key.copy_from_slice(key_bytes);
        Ok(Self { key })
    }

    /// Create with a freshly generated random key
    pub fn generate() -> Self {
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        rand::rng().fill_bytes(key.as_mut());
        Self { key }
    }

    /// Create from a base64 encoded key
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let key_bytes = Zeroizing::new(
            BASE64
                .decode(encoded.trim())
                .map_err(|e| CryptoError::InvalidKey(format!("not valid base64: {}", e)))?,
        );
        Self::new(&key_bytes)
    }

    /// Create from an environment variable holding a base64 encoded key
    pub fn from_env(env_var: &str) -> Result<Self, CryptoError> {
        let encoded = Zeroizing::new(std::env::var(env_var).map_err(|_| {
            CryptoError::InvalidKey(format!("environment variable {} not set", env_var))
        })?);
        Self::from_base64(&encoded)
    }

    /// Create from a key file holding a base64 encoded key
    pub fn from_key_file(path: &Path) -> Result<Self, CryptoError> {
        let expanded_path = shellexpand::tilde(&path.to_string_lossy()).to_string();
        let content = Zeroizing::new(std::fs::read_to_string(&expanded_path).map_err(|e| {
            CryptoError::KeyFile {
                path: expanded_path.clone(),
                source: e,
            }
        })?);
        Self::from_base64(&content)
    }

    /// The key encoded as base64 (for storage)
    pub fn key_base64(&self) -> Zeroizing<String> {
        Zeroizing::new(BASE64.encode(self.key.as_ref()))
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(self.key.as_ref()))
    }
}

impl CryptoService for ChaChaCryptoService {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher()
            .encrypt(nonce, plaintext)
            .map_err(|e| CryptoError::Encrypt(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if ciphertext.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::Decrypt(format!(
                "payload too short: expected at least {} bytes, got {}",
                NONCE_SIZE + TAG_SIZE,
                ciphertext.len()
            )));
        }

        let (nonce_bytes, sealed) = ciphertext.split_at(NONCE_SIZE);
        self.cipher()
            .decrypt(Nonce::from_slice(nonce_bytes), sealed)
            .map_err(|e| CryptoError::Decrypt(e.to_string()))
    }
}

impl fmt::Debug for ChaChaCryptoService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChaChaCryptoService")
            .field("algorithm", &"chacha20poly1305")
            .finish_non_exhaustive()
    }
}

/// Generate a new key file holding a base64 encoded key
///
/// Returns the path written. Refuses to replace an existing file unless
/// `overwrite` is set.
pub fn generate_key_file(path: &Path, overwrite: bool) -> Result<String, CryptoError> {
    let expanded_path = shellexpand::tilde(&path.to_string_lossy()).to_string();
    let path = Path::new(&expanded_path);
    let key_file_error = |source: std::io::Error| CryptoError::KeyFile {
        path: expanded_path.clone(),
        source,
    };

    if path.exists() && !overwrite {
        return Err(CryptoError::InvalidKey(format!(
            "Key file already exists: {}. Use --force to overwrite",
            path.display()
        )));
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(key_file_error)?;
    }

    let service = ChaChaCryptoService::generate();
    std::fs::write(path, service.key_base64().as_bytes()).map_err(key_file_error)?;

    // Set restrictive permissions on Unix
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .map_err(key_file_error)?;
    }

    Ok(expanded_path.clone())
}
