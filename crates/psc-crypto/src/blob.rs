//! Session blob codec: JSON → AES-256-GCM → `base64(nonce).base64(ciphertext)`
//!
//! Every call to [`encode`] draws a fresh random nonce. Reusing a nonce under
//! the (static) session key would void both confidentiality and integrity.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use zeroize::Zeroize;

use crate::kdf::SessionKey;
use crate::{NONCE_SIZE, SEGMENT_DELIMITER, TAG_SIZE};

/// Why a blob could not be turned back into a profile.
///
/// Callers are expected to treat every variant the same way ("no usable
/// cached session"); the variants exist for logs and metrics only.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed session blob: {0}")]
    Malformed(&'static str),

    #[error("session blob {segment} segment is not valid base64")]
    Base64 { segment: &'static str },

    #[error("session blob failed authentication")]
    Authentication,

    #[error("decrypted session blob is not valid JSON")]
    Json(#[source] serde_json::Error),
}

impl DecodeError {
    /// Short stable label, suitable for a metric or log field
    pub fn kind(&self) -> &'static str {
        match self {
            DecodeError::Malformed(_) | DecodeError::Base64 { .. } => "malformed",
            DecodeError::Authentication => "authentication",
            DecodeError::Json(_) => "json",
        }
    }
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("profile is not JSON-serializable: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("session blob encryption failed")]
    Encryption,
}

/// An encoded, encrypted profile as written to a storage medium.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionBlob(String);

impl SessionBlob {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Split into `(nonce, ciphertext)` bytes, checking the framing only.
    fn segments(raw: &str) -> Result<([u8; NONCE_SIZE], Vec<u8>), DecodeError> {
        let mut parts = raw.split(SEGMENT_DELIMITER);
        let (nonce_b64, ct_b64) = match (parts.next(), parts.next(), parts.next()) {
            (Some(n), Some(c), None) => (n, c),
            _ => return Err(DecodeError::Malformed("expected exactly two segments")),
        };
        if nonce_b64.is_empty() || ct_b64.is_empty() {
            return Err(DecodeError::Malformed("empty segment"));
        }

        let nonce_vec = STANDARD
            .decode(nonce_b64)
            .map_err(|_| DecodeError::Base64 { segment: "nonce" })?;
        let ciphertext = STANDARD
            .decode(ct_b64)
            .map_err(|_| DecodeError::Base64 {
                segment: "ciphertext",
            })?;

        let nonce: [u8; NONCE_SIZE] = nonce_vec
            .as_slice()
            .try_into()
            .map_err(|_| DecodeError::Malformed("wrong nonce length"))?;

        // Shorter than a tag can only be a truncated blob
        if ciphertext.len() < TAG_SIZE {
            return Err(DecodeError::Authentication);
        }

        Ok((nonce, ciphertext))
    }
}

impl std::fmt::Display for SessionBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionBlob {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Serialize `profile` to JSON and seal it under `key`.
pub fn encode<T: Serialize + ?Sized>(
    key: &SessionKey,
    profile: &T,
) -> Result<SessionBlob, EncodeError> {
    let mut plaintext = serde_json::to_vec(profile)?;
    let sealed = seal(key, &plaintext);
    plaintext.zeroize();
    sealed
}

/// Open a blob produced by [`encode`] and parse the JSON inside.
pub fn decode(key: &SessionKey, blob: &str) -> Result<serde_json::Value, DecodeError> {
    decode_as(key, blob)
}

/// Like [`decode`], deserializing straight into `T`.
pub fn decode_as<T: DeserializeOwned>(key: &SessionKey, blob: &str) -> Result<T, DecodeError> {
    let (nonce, ciphertext) = SessionBlob::segments(blob)?;
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let mut plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
        .map_err(|_| DecodeError::Authentication)?;

    let parsed = serde_json::from_slice(&plaintext).map_err(DecodeError::Json);
    plaintext.zeroize();
    parsed
}

/// Encrypt raw bytes into blob framing with a fresh nonce.
fn seal(key: &SessionKey, plaintext: &[u8]) -> Result<SessionBlob, EncodeError> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|_| EncodeError::Encryption)?;

    let mut out = String::with_capacity(
        4 * NONCE_SIZE.div_ceil(3) + 1 + 4 * ciphertext.len().div_ceil(3),
    );
    STANDARD.encode_string(nonce_bytes, &mut out);
    out.push(SEGMENT_DELIMITER);
    STANDARD.encode_string(&ciphertext, &mut out);
    Ok(SessionBlob(out))
}
