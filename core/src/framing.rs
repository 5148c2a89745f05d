use crate::error::{AlertError, Result};
use crate::fields::SemanticCode;
use crate::{CODE_LEN, FRAME_LEN, PUBLIC_KEY_LEN, SIGNATURE_LEN};
use std::fmt;

const SIGNATURE_OFFSET: usize = CODE_LEN;
const PUBLIC_KEY_OFFSET: usize = CODE_LEN + SIGNATURE_LEN;

/// Authenticated wire frame: semantic code (24) ∥ signature (64) ∥ public key (32)
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct WireFrame([u8; FRAME_LEN]);

/// The three buffers recovered from a [`WireFrame`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameParts {
    pub code: SemanticCode,
    pub signature: [u8; SIGNATURE_LEN],
    pub public_key: [u8; PUBLIC_KEY_LEN],
}

impl WireFrame {
    /// Build a frame from parts that are already the right size.
    pub fn assemble(
        code: &SemanticCode,
        signature: &[u8; SIGNATURE_LEN],
        public_key: &[u8; PUBLIC_KEY_LEN],
    ) -> Self {
        let mut bytes = [0u8; FRAME_LEN];
        bytes[..SIGNATURE_OFFSET].copy_from_slice(code.as_bytes());
        bytes[SIGNATURE_OFFSET..PUBLIC_KEY_OFFSET].copy_from_slice(signature);
        bytes[PUBLIC_KEY_OFFSET..].copy_from_slice(public_key);
        Self(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let array: [u8; FRAME_LEN] = bytes.try_into().map_err(|_| AlertError::TruncatedFrame {
            expected: FRAME_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }

    pub fn code_bytes(&self) -> &[u8] {
        &self.0[..SIGNATURE_OFFSET]
    }

    pub fn signature_bytes(&self) -> &[u8] {
        &self.0[SIGNATURE_OFFSET..PUBLIC_KEY_OFFSET]
    }

    pub fn public_key_bytes(&self) -> &[u8] {
        &self.0[PUBLIC_KEY_OFFSET..]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(text: &str) -> Result<Self> {
        let bytes = hex::decode(text.trim())?;
        Self::from_bytes(&bytes)
    }

    pub fn split(&self) -> FrameParts {
        let mut signature = [0u8; SIGNATURE_LEN];
        signature.copy_from_slice(self.signature_bytes());
        let mut public_key = [0u8; PUBLIC_KEY_LEN];
        public_key.copy_from_slice(self.public_key_bytes());
        let mut code = [0u8; CODE_LEN];
        code.copy_from_slice(self.code_bytes());

        FrameParts {
            code: SemanticCode::from_array(code),
            signature,
            public_key,
        }
    }
}

impl fmt::Debug for WireFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WireFrame({})", self.to_hex())
    }
}

/// Concatenate code, signature and public key into a wire frame.
///
/// Each buffer must have its exact size; nothing is padded or truncated.
pub fn pack_frame(code: &[u8], signature: &[u8], public_key: &[u8]) -> Result<WireFrame> {
    let code = SemanticCode::from_bytes(code)?;
    let signature: &[u8; SIGNATURE_LEN] =
        signature.try_into().map_err(|_| AlertError::LengthMismatch {
            field: "signature",
            expected: SIGNATURE_LEN,
            actual: signature.len(),
        })?;
    let public_key: &[u8; PUBLIC_KEY_LEN] =
        public_key.try_into().map_err(|_| AlertError::LengthMismatch {
            field: "public key",
            expected: PUBLIC_KEY_LEN,
            actual: public_key.len(),
        })?;

    Ok(WireFrame::assemble(&code, signature, public_key))
}

/// Split a received frame. Anything other than exactly 120 bytes is a lost
/// transmission.
pub fn unpack_frame(frame: &[u8]) -> Result<FrameParts> {
    Ok(WireFrame::from_bytes(frame)?.split())
}
