use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("{field} must be {expected} bytes, got {actual}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Wire frame must be exactly {expected} bytes, got {actual}")]
    TruncatedFrame { expected: usize, actual: usize },

    #[error("Invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("CRC mismatch in semantic code (stored {stored:#06x}, computed {computed:#06x})")]
    ChecksumMismatch { stored: u16, computed: u16 },

    #[error("Signature verification {0}")]
    SignatureInvalid(&'static str),

    #[error("Unknown alert type: {0}")]
    UnknownAlertType(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, AlertError>;
