//! Acoustic alert modem for offline devices
//!
//! Packs a structured alert into a 24-byte CRC-protected semantic code, wraps it
//! with an Ed25519 signature and public key into a 120-byte wire frame, and moves
//! that frame across a speaker-to-microphone link with 16-tone FSK.

pub mod error;
pub mod config;
pub mod fields;
pub mod framing;
pub mod auth;
pub mod fsk;
pub mod encoder_fsk;
pub mod sync;
pub mod decoder_fsk;
pub mod alert;
pub mod resample;
pub mod service;

pub use alert::{
    compose, receive_acoustic, receive_code, receive_frame, transmit, AcousticReception,
    AuditRecord, OutgoingAlert, ReceivedAlert,
};
pub use auth::{AlertSigner, AlertVerifier, Ed25519KeyHandle, Ed25519Verifier, Verification};
pub use config::ModemConfig;
pub use decoder_fsk::{DecodeResult, FskDemodulator};
pub use encoder_fsk::FskModulator;
pub use error::{AlertError, Result};
pub use fields::{
    crc16, decode_code, pack, unpack, verify_checksum, AlertType, ChecksumPolicy, DecodedCode,
    Integrity, SemanticCode, SemanticFields,
};
pub use framing::{pack_frame, unpack_frame, FrameParts, WireFrame};
pub use fsk::{Tone, ToneSequence, TONE_TABLE};
pub use service::{describe, Summary, TextService};
pub use sync::SyncOutcome;

// Reference capture/playback rate
pub const SAMPLE_RATE: u32 = 44_100;

// Wire layout
pub const CODE_LEN: usize = 24;
pub const SIGNATURE_LEN: usize = 64;
pub const PUBLIC_KEY_LEN: usize = 32;
pub const FRAME_LEN: usize = CODE_LEN + SIGNATURE_LEN + PUBLIC_KEY_LEN; // 120

// Data tone table: 16 tones, 1000-4000 Hz
pub const NUM_TONES: usize = 16;
pub const TONE_BASE_HZ: f32 = 1000.0;
pub const TONE_SPACING_HZ: f32 = 200.0;

// Sentinels sit outside the data band
pub const PREAMBLE_LOW_HZ: f32 = 500.0;
pub const PREAMBLE_HIGH_HZ: f32 = 4500.0;
pub const POSTAMBLE_HZ: f32 = 4500.0;

// Timeline (seconds)
pub const PREAMBLE_CYCLES: usize = 4;
pub const PREAMBLE_TONE_SECS: f64 = 0.100;
pub const PREAMBLE_SECS: f64 = PREAMBLE_TONE_SECS * (2 * PREAMBLE_CYCLES) as f64; // 0.8
pub const TONE_SECS: f64 = 0.040;
pub const GAP_SECS: f64 = 0.010;
pub const TONE_STEP_SECS: f64 = TONE_SECS + GAP_SECS;
pub const POSTAMBLE_SECS: f64 = 0.200;
pub const FADE_SECS: f64 = 0.003;

/// Convert a time offset to a sample index at the given rate.
pub fn secs_to_samples(secs: f64, sample_rate: u32) -> usize {
    (secs * sample_rate as f64).round().max(0.0) as usize
}

/// Total duration of a transmission carrying `byte_count` data bytes.
pub fn transmission_secs(byte_count: usize) -> f64 {
    PREAMBLE_SECS + (2 * byte_count) as f64 * TONE_STEP_SECS + POSTAMBLE_SECS
}
