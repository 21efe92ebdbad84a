//! Key derivation: application secret → SHA-256 → AES-256-GCM key

use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::KEY_SIZE;

/// Compiled-in fallback used when the secret variable is unset.
///
/// Anyone with the source can read blobs written under this value.
pub const DEFAULT_APP_SECRET: &str = "lms-portal-session-cache-default-secret";

/// A 256-bit AEAD key for session blobs.
///
/// Zeroized on drop to prevent secrets lingering in memory.
#[derive(Clone)]
pub struct SessionKey {
    bytes: [u8; KEY_SIZE],
}

impl SessionKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for SessionKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Read the application secret from `env_var`.
///
/// An unset or empty variable falls back to [`DEFAULT_APP_SECRET`] so startup
/// never fails; the fallback is logged since it makes blobs readable to anyone.
pub fn resolve_secret(env_var: &str) -> SecretString {
    match std::env::var(env_var) {
        Ok(value) if !value.is_empty() => SecretString::from(value),
        _ => {
            tracing::warn!(
                env_var,
                "session secret not set, using the compiled-in default; \
                 cached profiles are readable by anyone with this build"
            );
            SecretString::from(DEFAULT_APP_SECRET)
        }
    }
}

/// Derive the blob key from the application secret.
///
/// Hashing normalizes a secret of any length to the 32 bytes AES-256 needs.
/// Deterministic: the same secret always yields the same key.
pub fn derive_key(secret: &SecretString) -> SessionKey {
    let mut digest: [u8; KEY_SIZE] = Sha256::digest(secret.expose_secret().as_bytes()).into();
    let key = SessionKey::from_bytes(digest);
    digest.zeroize();
    key
}

/// [`resolve_secret`] followed by [`derive_key`].
pub fn derive_key_from_env(env_var: &str) -> SessionKey {
    derive_key(&resolve_secret(env_var))
}
