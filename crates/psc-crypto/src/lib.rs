//! psc-crypto: encrypted profile blobs for the portal session cache
//!
//! Blob layout (one ASCII string, safe for cookies and web storage):
//! ```text
//! base64(nonce) "." base64(ciphertext || tag)
//! ```
//!
//! Key: SHA-256 of the application secret, used directly as an AES-256-GCM key.
//! There is no salt and no per-user secret, so every deployment sharing the
//! secret can read every other deployment's blobs. The blob keeps a profile
//! away from casual inspection of browser storage, nothing more.

pub mod blob;
pub mod kdf;

pub use blob::{decode, decode_as, encode, DecodeError, EncodeError, SessionBlob};
pub use kdf::{derive_key, derive_key_from_env, resolve_secret, SessionKey, DEFAULT_APP_SECRET};

/// AES-256 key size in bytes
pub const KEY_SIZE: usize = 32;

/// AES-GCM nonce size (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Separator between the nonce and ciphertext segments; not part of the base64 alphabet
pub const SEGMENT_DELIMITER: char = '.';
