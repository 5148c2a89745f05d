//! Semantic field codec
//!
//! Byte layout of the 24-byte semantic code (multi-byte fields big-endian):
//!
//! ```text
//!  0      alert type wire code
//!  1      severity (1-9)
//!  2..5   latitude  as round(lat * 10000) + 900000   (u24)
//!  5..8   longitude as round(lon * 10000) + 1800000  (u24)
//!  8      population bucket ceil(log2(pop)) in the upper nibble
//!  9..17  ASCII message, NUL padded
//! 17..19  CRC-16/CCITT-FALSE over bytes 0..17
//! 19..24  reserved (zero)
//! ```
//!
//! `unpack` then `pack` reproduces a CRC-valid code up to quantization, except
//! for bits the layout gives no meaning to, which `pack` normalizes:
//! an unknown type byte becomes SOS, severity is clamped to 1-9, the low nibble
//! of byte 8, message bytes after the first NUL and the reserved tail are
//! zeroed, and message bytes >= 0x80 become `?`.

use crate::error::{AlertError, Result};
use crate::CODE_LEN;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MIN_SEVERITY: u8 = 1;
pub const MAX_SEVERITY: u8 = 9;
pub const MSG_LEN: usize = 8;
pub const MAX_POP_BUCKET: u8 = 15;

const COORD_SCALE: f64 = 10_000.0;
const LAT_LIMIT: f64 = 90.0;
const LON_LIMIT: f64 = 180.0;

const TYPE_OFFSET: usize = 0;
const SEVERITY_OFFSET: usize = 1;
const LAT_OFFSET: usize = 2;
const LON_OFFSET: usize = 5;
const POP_OFFSET: usize = 8;
const MSG_OFFSET: usize = 9;
const CRC_OFFSET: usize = 17;

/// CRC-16/CCITT-FALSE (poly 0x1021, init 0xFFFF, no reflection, no final XOR)
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u32 = 0xFFFF;
    for &byte in data {
        crc ^= (byte as u32) << 8;
        for _ in 0..8 {
            crc <<= 1;
            if crc & 0x10000 != 0 {
                crc ^= 0x1021;
            }
        }
    }
    (crc & 0xFFFF) as u16
}

/// Alert categories carried in byte 0 of the semantic code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertType {
    #[serde(rename = "SOS")]
    Sos,
    #[serde(rename = "EQ")]
    Earthquake,
    #[serde(rename = "FL")]
    Flood,
    #[serde(rename = "FI")]
    Fire,
    #[serde(rename = "MD")]
    Medical,
    #[serde(rename = "TS")]
    Tsunami,
    #[serde(rename = "HZ")]
    Hazmat,
    #[serde(rename = "ST")]
    Storm,
}

/// (type, short code, wire byte); every variant appears exactly once
static ALERT_TYPES: [(AlertType, &str, u8); 8] = [
    (AlertType::Sos, "SOS", 0x00),
    (AlertType::Earthquake, "EQ", 0x01),
    (AlertType::Flood, "FL", 0x02),
    (AlertType::Fire, "FI", 0x03),
    (AlertType::Medical, "MD", 0x04),
    (AlertType::Tsunami, "TS", 0x05),
    (AlertType::Hazmat, "HZ", 0x06),
    (AlertType::Storm, "ST", 0x07),
];

impl AlertType {
    /// Type substituted for anything unrecognised.
    pub const DEFAULT: AlertType = AlertType::Sos;

    pub fn all() -> impl Iterator<Item = AlertType> {
        ALERT_TYPES.iter().map(|&(t, _, _)| t)
    }

    fn entry(self) -> &'static (AlertType, &'static str, u8) {
        // Variants are declared in table order
        &ALERT_TYPES[self as usize]
    }

    pub fn code(self) -> &'static str {
        self.entry().1
    }

    pub fn wire_code(self) -> u8 {
        self.entry().2
    }

    pub fn from_wire(byte: u8) -> Option<AlertType> {
        ALERT_TYPES
            .iter()
            .find(|&&(_, _, wire)| wire == byte)
            .map(|&(t, _, _)| t)
    }

    /// Unknown wire bytes resolve to [`AlertType::DEFAULT`].
    pub fn from_wire_or_default(byte: u8) -> AlertType {
        Self::from_wire(byte).unwrap_or_else(|| {
            log::warn!(
                "Unknown alert type byte {:#04x}, using {}",
                byte,
                Self::DEFAULT.code()
            );
            Self::DEFAULT
        })
    }

    /// Unknown short codes resolve to [`AlertType::DEFAULT`].
    pub fn parse_or_default(code: &str) -> AlertType {
        code.parse().unwrap_or_else(|_| {
            log::warn!("Unknown alert type {:?}, using {}", code, Self::DEFAULT.code());
            Self::DEFAULT
        })
    }
}

impl FromStr for AlertType {
    type Err = AlertError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        ALERT_TYPES
            .iter()
            .find(|&&(_, code, _)| code.eq_ignore_ascii_case(wanted))
            .map(|&(t, _, _)| t)
            .ok_or_else(|| AlertError::UnknownAlertType(s.to_string()))
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Application-level alert record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticFields {
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: u8,
    pub lat: f64,
    pub lon: f64,
    pub pop: u64,
    pub msg: String,
}

/// The 24-byte serialized form of [`SemanticFields`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SemanticCode([u8; CODE_LEN]);

impl SemanticCode {
    pub fn from_array(bytes: [u8; CODE_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let array: [u8; CODE_LEN] =
            bytes
                .try_into()
                .map_err(|_| AlertError::LengthMismatch {
                    field: "semantic code",
                    expected: CODE_LEN,
                    actual: bytes.len(),
                })?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; CODE_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(text: &str) -> Result<Self> {
        let bytes = hex::decode(text.trim())?;
        Self::from_bytes(&bytes)
    }

    /// CRC stored in bytes 17..19
    pub fn stored_crc(&self) -> u16 {
        u16::from_be_bytes([self.0[CRC_OFFSET], self.0[CRC_OFFSET + 1]])
    }

    pub fn computed_crc(&self) -> u16 {
        crc16(&self.0[..CRC_OFFSET])
    }
}

impl fmt::Debug for SemanticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SemanticCode({})", self.to_hex())
    }
}

/// Whether a CRC failure rejects the code or is reported alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumPolicy {
    /// Reject on mismatch. Use for typed or pasted codes.
    Strict,
    /// Accept and mark [`Integrity::Unverified`]. Use for acoustic decodes.
    Lenient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Integrity {
    Valid,
    Unverified,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedCode {
    pub fields: SemanticFields,
    pub integrity: Integrity,
}

pub fn pack(fields: &SemanticFields) -> SemanticCode {
    let mut bytes = [0u8; CODE_LEN];

    bytes[TYPE_OFFSET] = fields.alert_type.wire_code();
    bytes[SEVERITY_OFFSET] = fields.severity.clamp(MIN_SEVERITY, MAX_SEVERITY);
    write_u24(
        &mut bytes[LAT_OFFSET..LAT_OFFSET + 3],
        encode_coordinate(fields.lat, LAT_LIMIT),
    );
    write_u24(
        &mut bytes[LON_OFFSET..LON_OFFSET + 3],
        encode_coordinate(fields.lon, LON_LIMIT),
    );
    bytes[POP_OFFSET] = pop_bucket(fields.pop) << 4;

    let msg = fields
        .msg
        .chars()
        .take_while(|&c| c != '\0')
        .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
        .take(MSG_LEN);
    for (slot, byte) in bytes[MSG_OFFSET..MSG_OFFSET + MSG_LEN].iter_mut().zip(msg) {
        *slot = byte;
    }

    let crc = crc16(&bytes[..CRC_OFFSET]);
    bytes[CRC_OFFSET..CRC_OFFSET + 2].copy_from_slice(&crc.to_be_bytes());

    SemanticCode(bytes)
}

/// Extract fields without looking at the CRC.
pub fn unpack(code: &SemanticCode) -> SemanticFields {
    let bytes = code.as_bytes();

    let msg = bytes[MSG_OFFSET..MSG_OFFSET + MSG_LEN]
        .iter()
        .take_while(|&&b| b != 0)
        .map(|&b| if b.is_ascii() { b as char } else { '?' })
        .collect();

    SemanticFields {
        alert_type: AlertType::from_wire_or_default(bytes[TYPE_OFFSET]),
        severity: bytes[SEVERITY_OFFSET].clamp(MIN_SEVERITY, MAX_SEVERITY),
        lat: decode_coordinate(read_u24(&bytes[LAT_OFFSET..LAT_OFFSET + 3]), LAT_LIMIT),
        lon: decode_coordinate(read_u24(&bytes[LON_OFFSET..LON_OFFSET + 3]), LON_LIMIT),
        pop: 1u64 << (bytes[POP_OFFSET] >> 4),
        msg,
    }
}

pub fn verify_checksum(code: &SemanticCode) -> bool {
    code.stored_crc() == code.computed_crc()
}

/// Check the CRC under `policy`, then unpack.
///
/// In strict mode a mismatch returns before any field is extracted.
pub fn decode_code(code: &SemanticCode, policy: ChecksumPolicy) -> Result<DecodedCode> {
    let integrity = if verify_checksum(code) {
        Integrity::Valid
    } else {
        match policy {
            ChecksumPolicy::Strict => {
                return Err(AlertError::ChecksumMismatch {
                    stored: code.stored_crc(),
                    computed: code.computed_crc(),
                });
            }
            ChecksumPolicy::Lenient => {
                log::warn!(
                    "Semantic code CRC mismatch (stored {:#06x}, computed {:#06x}); \
                     accepting unverified",
                    code.stored_crc(),
                    code.computed_crc()
                );
                Integrity::Unverified
            }
        }
    };

    Ok(DecodedCode {
        fields: unpack(code),
        integrity,
    })
}

/// ceil(log2(pop)), clamped to a nibble. 0 and 1 both land in bucket 0.
fn pop_bucket(pop: u64) -> u8 {
    if pop <= 1 {
        return 0;
    }
    let bits = u64::BITS - (pop - 1).leading_zeros();
    bits.min(MAX_POP_BUCKET as u32) as u8
}

fn encode_coordinate(degrees: f64, limit: f64) -> u32 {
    let degrees = if degrees.is_finite() {
        degrees.clamp(-limit, limit)
    } else {
        0.0
    };
    let offset = (limit * COORD_SCALE) as i64;
    ((degrees * COORD_SCALE).round() as i64 + offset) as u32
}

fn decode_coordinate(raw: u32, limit: f64) -> f64 {
    let offset = (limit * COORD_SCALE) as i64;
    let degrees = (raw as i64 - offset) as f64 / COORD_SCALE;
    degrees.clamp(-limit, limit)
}

fn write_u24(out: &mut [u8], value: u32) {
    out.copy_from_slice(&value.to_be_bytes()[1..]);
}

fn read_u24(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]])
}
