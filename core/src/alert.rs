//! End-to-end alert pipeline
//!
//! Sender: fields → semantic code → signed wire frame → PCM.
//! Receiver: PCM → frame bytes → split → signature check → CRC check → fields.

use crate::auth::{AlertSigner, AlertVerifier, Verification};
use crate::config::ModemConfig;
use crate::decoder_fsk::{DecodeResult, FskDemodulator};
use crate::encoder_fsk::FskModulator;
use crate::error::Result;
use crate::fields::{
    decode_code, pack, AlertType, ChecksumPolicy, Integrity, SemanticCode, SemanticFields,
};
use crate::framing::{unpack_frame, WireFrame};
use crate::{FRAME_LEN, PUBLIC_KEY_LEN, SIGNATURE_LEN};
use serde::Serialize;

/// A message ready to go out: its semantic code and the signed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutgoingAlert {
    pub code: SemanticCode,
    pub frame: WireFrame,
}

/// Pack and sign `fields` with a caller-supplied key.
pub fn compose(fields: &SemanticFields, signer: &dyn AlertSigner) -> OutgoingAlert {
    let code = pack(fields);
    let signature = signer.sign(code.as_bytes());
    let frame = WireFrame::assemble(&code, &signature, &signer.public_key());
    OutgoingAlert { code, frame }
}

/// Render a frame to PCM at the configured sample rate.
pub fn transmit(frame: &WireFrame, config: &ModemConfig) -> Vec<f32> {
    FskModulator::new(*config).modulate(frame.as_bytes())
}

/// A decoded alert together with what was and was not checked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceivedAlert {
    pub fields: SemanticFields,
    pub integrity: Integrity,
    pub verification: Verification,
    #[serde(serialize_with = "serialize_hex")]
    pub code: SemanticCode,
    #[serde(skip)]
    pub signature: Option<[u8; SIGNATURE_LEN]>,
    #[serde(skip)]
    pub public_key: Option<[u8; PUBLIC_KEY_LEN]>,
}

fn serialize_hex<S>(code: &SemanticCode, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&code.to_hex())
}

/// Split, verify and decode a received wire frame.
///
/// Structural errors and (in strict mode) CRC errors are returned; a bad
/// signature is reported in [`ReceivedAlert::verification`].
pub fn receive_frame(
    bytes: &[u8],
    policy: ChecksumPolicy,
    verifier: &dyn AlertVerifier,
) -> Result<ReceivedAlert> {
    let parts = unpack_frame(bytes)?;
    let verification = Verification::check(
        verifier,
        parts.code.as_bytes(),
        &parts.signature,
        &parts.public_key,
    );
    let decoded = decode_code(&parts.code, policy)?;

    Ok(ReceivedAlert {
        fields: decoded.fields,
        integrity: decoded.integrity,
        verification,
        code: parts.code,
        signature: Some(parts.signature),
        public_key: Some(parts.public_key),
    })
}

/// Decode a bare semantic code (no signature travels with it).
pub fn receive_code(code: &SemanticCode, policy: ChecksumPolicy) -> Result<ReceivedAlert> {
    let decoded = decode_code(code, policy)?;
    Ok(ReceivedAlert {
        fields: decoded.fields,
        integrity: decoded.integrity,
        verification: Verification::Unchecked,
        code: *code,
        signature: None,
        public_key: None,
    })
}

/// Outcome of listening for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct AcousticReception {
    pub decode: DecodeResult,
    /// Present whenever a signal was detected; CRC failures are tolerated
    pub alert: Option<ReceivedAlert>,
}

/// Demodulate a capture and decode the frame in lenient mode. Never fails.
pub fn receive_acoustic(
    samples: &[f32],
    config: &ModemConfig,
    verifier: &dyn AlertVerifier,
) -> AcousticReception {
    let decode = FskDemodulator::new(*config).demodulate(samples, FRAME_LEN);
    if !decode.signal_detected() {
        return AcousticReception { decode, alert: None };
    }

    let alert = match receive_frame(&decode.data, ChecksumPolicy::Lenient, verifier) {
        Ok(alert) => Some(alert),
        Err(e) => {
            log::warn!("Acoustic frame could not be decoded: {}", e);
            None
        }
    };

    AcousticReception { decode, alert }
}

/// Record handed to the external audit ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub code_hex: String,
    pub signature_hex: String,
    pub pubkey_hex: String,
    /// Seconds since the Unix epoch
    pub timestamp: u64,
    pub alert_type: AlertType,
    pub confidence: f32,
}

impl AuditRecord {
    pub fn from_outgoing(alert: &OutgoingAlert, alert_type: AlertType, timestamp: u64) -> Self {
        Self {
            code_hex: alert.code.to_hex(),
            signature_hex: hex::encode(alert.frame.signature_bytes()),
            pubkey_hex: hex::encode(alert.frame.public_key_bytes()),
            timestamp,
            alert_type,
            confidence: 1.0,
        }
    }

    /// `confidence` is the acoustic decode confidence, or 1.0 for exact input.
    pub fn from_received(alert: &ReceivedAlert, confidence: f32, timestamp: u64) -> Self {
        Self {
            code_hex: alert.code.to_hex(),
            signature_hex: alert.signature.map(hex::encode).unwrap_or_default(),
            pubkey_hex: alert.public_key.map(hex::encode).unwrap_or_default(),
            timestamp,
            alert_type: alert.fields.alert_type,
            confidence,
        }
    }
}
