//! At-rest encryption for Orbit credentials using AES-256-GCM with PBKDF2
//! key derivation.
//!
//! GitHub installation tokens (and any other short-lived credential the
//! activity layer persists) are encrypted before they are written back to the
//! CMS, and decrypted on read. The passphrase comes from worker
//! configuration; each sealed value carries its own random salt and nonce.
//!
//! # Example
//!
//! ```
//! use orbit_encrypt::TokenCipher;
//!
//! let cipher = TokenCipher::new("worker-passphrase");
//! let sealed = cipher.seal("ghs_abc123").expect("seal");
//! assert_eq!(cipher.open(&sealed).expect("open"), "ghs_abc123");
//! ```
//!
//! # Format
//!
//! `base64(salt || nonce || ciphertext || auth_tag)`: 16-byte salt, 12-byte
//! nonce, PBKDF2-SHA256 with 100,000 iterations deriving the 256-bit key.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, OsRng, rand_core::RngCore},
};
use anyhow::{Context, Result, bail};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use pbkdf2::pbkdf2_hmac_array;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

/// Size of the salt for key derivation (16 bytes)
const SALT_SIZE: usize = 16;
/// Size of the nonce for AES-GCM (12 bytes)
const NONCE_SIZE: usize = 12;
/// Number of PBKDF2 iterations
const PBKDF2_ITERATIONS: u32 = 100_000;
/// Size of the derived key (256 bits for AES-256)
const KEY_SIZE: usize = 32;

/// Where the cipher passphrase comes from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CipherConfig {
    /// Passphrase supplied inline by configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,
    /// Environment variable to read the passphrase from instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_var: Option<String>,
}

impl CipherConfig {
    pub fn inline(passphrase: impl Into<String>) -> Self {
        Self {
            passphrase: Some(passphrase.into()),
            env_var: None,
        }
    }

    pub fn from_env(env_var: impl Into<String>) -> Self {
        Self {
            passphrase: None,
            env_var: Some(env_var.into()),
        }
    }

    /// Resolve the passphrase: inline value first, then the environment.
    pub fn resolve(&self) -> Option<String> {
        if let Some(p) = &self.passphrase {
            return Some(p.clone());
        }
        self.env_var
            .as_ref()
            .and_then(|var| std::env::var(var).ok())
    }
}

/// Encrypt a byte slice under the given passphrase.
///
/// Returns `base64(salt || nonce || ciphertext)`; every call produces a
/// distinct output because salt and nonce are random.
pub fn encrypt(data: &[u8], passphrase: &str) -> Result<String> {
    let mut salt = [0u8; SALT_SIZE];
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut nonce_bytes);

    let key = derive_key(passphrase, &salt);

    let cipher = Aes256Gcm::new_from_slice(&key).context("failed to create AES-256-GCM cipher")?;
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(nonce, data)
        .map_err(|e| anyhow::anyhow!("encryption failed: {:?}", e))?;

    let mut sealed = Vec::with_capacity(SALT_SIZE + NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&salt);
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);

    Ok(BASE64.encode(&sealed))
}

/// Decrypt a value produced by [`encrypt`].
pub fn decrypt(sealed: &str, passphrase: &str) -> Result<Vec<u8>> {
    let data = BASE64.decode(sealed).context("invalid base64 encoding")?;

    // salt + nonce + at least the GCM auth tag
    if data.len() < SALT_SIZE + NONCE_SIZE + 16 {
        bail!("sealed value too short");
    }

    let salt = &data[..SALT_SIZE];
    let nonce_bytes = &data[SALT_SIZE..SALT_SIZE + NONCE_SIZE];
    let ciphertext = &data[SALT_SIZE + NONCE_SIZE..];

    let key = derive_key(passphrase, salt);

    let cipher = Aes256Gcm::new_from_slice(&key).context("failed to create AES-256-GCM cipher")?;
    let nonce = Nonce::from_slice(nonce_bytes);
    let plaintext = cipher.decrypt(nonce, ciphertext).map_err(|e| {
        anyhow::anyhow!("decryption failed - wrong passphrase or corrupted data: {:?}", e)
    })?;

    Ok(plaintext)
}

/// Derive a 256-bit key from the passphrase using PBKDF2-SHA256.
fn derive_key(passphrase: &str, salt: &[u8]) -> [u8; KEY_SIZE] {
    pbkdf2_hmac_array::<Sha256, KEY_SIZE>(passphrase.as_bytes(), salt, PBKDF2_ITERATIONS)
}

/// Heuristic check for whether a stored value is sealed.
///
/// Installations written before encryption was introduced carry plaintext
/// tokens; readers use this to decide whether [`TokenCipher::open`] applies.
pub fn looks_sealed(value: &str) -> bool {
    let Ok(data) = BASE64.decode(value) else {
        return false;
    };
    data.len() >= SALT_SIZE + NONCE_SIZE + 16
}

/// String-in, string-out cipher for credential fields.
#[derive(Debug, Clone)]
pub struct TokenCipher {
    passphrase: String,
}

impl TokenCipher {
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self {
            passphrase: passphrase.into(),
        }
    }

    /// Build a cipher from configuration; `None` when no passphrase is
    /// resolvable (the caller decides whether that is an error).
    pub fn from_config(config: &CipherConfig) -> Option<Self> {
        config.resolve().map(Self::new)
    }

    /// Seal a token for storage.
    pub fn seal(&self, token: &str) -> Result<String> {
        encrypt(token.as_bytes(), &self.passphrase)
    }

    /// Open a sealed token. Plaintext values (pre-encryption records) are
    /// returned unchanged.
    pub fn open(&self, stored: &str) -> Result<String> {
        if !looks_sealed(stored) {
            return Ok(stored.to_string());
        }
        match decrypt(stored, &self.passphrase) {
            Ok(plain) => String::from_utf8(plain).context("decrypted token is not valid UTF-8"),
            // Base64-looking plaintext token; fall through rather than
            // failing the read path.
            Err(_) => Ok(stored.to_string()),
        }
    }
}
