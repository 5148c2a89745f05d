//! Signing capability consumed by the frame layer
//!
//! The frame codec never looks at key material. It asks an [`AlertSigner`] for a
//! signature over the semantic code and an [`AlertVerifier`] for a yes/no answer
//! on receipt. Keys are held by caller-owned handles.

use crate::error::{AlertError, Result};
use crate::{PUBLIC_KEY_LEN, SIGNATURE_LEN};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::Serialize;
use std::fmt;

pub const SEED_LEN: usize = 32;

pub trait AlertSigner {
    fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LEN];
    fn public_key(&self) -> [u8; PUBLIC_KEY_LEN];
}

pub trait AlertVerifier {
    fn verify(
        &self,
        message: &[u8],
        signature: &[u8; SIGNATURE_LEN],
        public_key: &[u8; PUBLIC_KEY_LEN],
    ) -> bool;
}

/// Ed25519 private key handle supplied by the caller.
pub struct Ed25519KeyHandle {
    signing_key: SigningKey,
}

impl Ed25519KeyHandle {
    pub fn from_seed(seed: &[u8; SEED_LEN]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    pub fn from_seed_hex(text: &str) -> Result<Self> {
        let bytes = hex::decode(text.trim())?;
        let seed: [u8; SEED_LEN] =
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| AlertError::LengthMismatch {
                    field: "key seed",
                    expected: SEED_LEN,
                    actual: bytes.len(),
                })?;
        Ok(Self::from_seed(&seed))
    }
}

impl AlertSigner for Ed25519KeyHandle {
    fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LEN] {
        self.signing_key.sign(message).to_bytes()
    }

    fn public_key(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.signing_key.verifying_key().to_bytes()
    }
}

impl fmt::Debug for Ed25519KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519KeyHandle")
            .field("public_key", &hex::encode(self.public_key()))
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl AlertVerifier for Ed25519Verifier {
    fn verify(
        &self,
        message: &[u8],
        signature: &[u8; SIGNATURE_LEN],
        public_key: &[u8; PUBLIC_KEY_LEN],
    ) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(public_key) else {
            log::debug!("Public key is not a valid Ed25519 point");
            return false;
        };
        key.verify(message, &Signature::from_bytes(signature)).is_ok()
    }
}

/// Authenticity of a received message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verification {
    Verified,
    Failed,
    /// No signature was supplied, so none was checked
    Unchecked,
}

impl Verification {
    /// Run `verifier` unless the signature is absent (all zero).
    pub fn check(
        verifier: &dyn AlertVerifier,
        message: &[u8],
        signature: &[u8; SIGNATURE_LEN],
        public_key: &[u8; PUBLIC_KEY_LEN],
    ) -> Self {
        if signature.iter().all(|&b| b == 0) {
            return Verification::Unchecked;
        }
        if verifier.verify(message, signature, public_key) {
            Verification::Verified
        } else {
            Verification::Failed
        }
    }

    pub fn is_verified(self) -> bool {
        self == Verification::Verified
    }

    /// For callers that refuse anything not positively verified.
    pub fn require(self) -> Result<()> {
        match self {
            Verification::Verified => Ok(()),
            Verification::Failed => Err(AlertError::SignatureInvalid("failed")),
            Verification::Unchecked => Err(AlertError::SignatureInvalid("was not attempted")),
        }
    }
}
