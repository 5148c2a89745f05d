use crate::config::ModemConfig;
use crate::fsk::{goertzel_power_windowed, hann_window, TONE_TABLE};
use crate::sync::{detect_onset, locate_preamble, SyncOutcome};
use crate::{secs_to_samples, TONE_SECS, TONE_STEP_SECS};
use serde::Serialize;
use std::collections::BTreeSet;

/// Time skipped at both edges of each data tone before analysis
pub const SETTLE_SECS: f64 = 0.005;

/// Nibbles below this confidence flag their byte
pub const NIBBLE_CONFIDENCE_THRESHOLD: f32 = 0.55;

/// Captures whose peak is below this are treated as silence
pub const SILENCE_PEAK: f32 = 1e-4;

/// Best-effort demodulation result.
///
/// Uncertainty is reported through `confidence` and `error_positions`, never
/// through an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodeResult {
    pub data: Vec<u8>,
    /// Mean per-nibble discrimination, in [0, 1]
    pub confidence: f32,
    /// Byte indices with at least one low-confidence or missing nibble
    pub error_positions: BTreeSet<usize>,
    /// How the data start was found; `None` when no signal was present
    #[serde(skip)]
    pub sync: Option<SyncOutcome>,
}

impl DecodeResult {
    /// Result for a capture with nothing in it: zero bytes, all flagged.
    pub fn no_signal(expected_bytes: usize) -> Self {
        Self {
            data: vec![0u8; expected_bytes],
            confidence: 0.0,
            error_positions: (0..expected_bytes).collect(),
            sync: None,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.error_positions.is_empty()
    }

    pub fn signal_detected(&self) -> bool {
        self.sync.is_some()
    }
}

/// 16-tone FSK demodulator
///
/// Locates the preamble, then reads each nibble slot with a Hann-windowed
/// Goertzel detector at the 16 table frequencies. The receiver must know how
/// many bytes to expect.
#[derive(Debug, Clone)]
pub struct FskDemodulator {
    config: ModemConfig,
}

impl FskDemodulator {
    pub fn new(config: ModemConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    /// Recover `expected_bytes` bytes from a captured waveform.
    pub fn demodulate(&self, samples: &[f32], expected_bytes: usize) -> DecodeResult {
        let Some(normalized) = normalize_peak(samples) else {
            log::warn!("Capture is silent ({} samples)", samples.len());
            return DecodeResult::no_signal(expected_bytes);
        };

        let Some(onset) = detect_onset(&normalized, self.config.sample_rate) else {
            log::warn!("No signal onset found in {} samples", normalized.len());
            return DecodeResult::no_signal(expected_bytes);
        };

        let sync = locate_preamble(&normalized, onset, self.config.sample_rate);
        self.decode_from(&normalized, sync, expected_bytes)
    }

    /// Decode nibble slots starting at the synchronized data position.
    pub fn decode_from(
        &self,
        samples: &[f32],
        sync: SyncOutcome,
        expected_bytes: usize,
    ) -> DecodeResult {
        let sample_rate = self.config.sample_rate;
        let settle = secs_to_samples(SETTLE_SECS, sample_rate);
        let tone_len = secs_to_samples(TONE_SECS, sample_rate);
        let window_len = tone_len.saturating_sub(2 * settle).max(1);
        let window = hann_window(window_len);
        let data_start = sync.data_start();

        let mut data = vec![0u8; expected_bytes];
        let mut error_positions = BTreeSet::new();
        let mut missing = BTreeSet::new();
        let mut confidence_sum = 0.0f32;

        for slot in 0..expected_bytes * 2 {
            let byte_index = slot / 2;
            let begin =
                data_start + secs_to_samples(slot as f64 * TONE_STEP_SECS, sample_rate) + settle;
            let end = begin + window_len;

            if end > samples.len() {
                missing.insert(byte_index);
                error_positions.insert(byte_index);
                continue;
            }

            let (nibble, confidence) = self.detect_nibble(&samples[begin..end], &window);
            confidence_sum += confidence;

            if slot % 2 == 0 {
                data[byte_index] |= nibble << 4;
            } else {
                data[byte_index] |= nibble;
            }

            if confidence < NIBBLE_CONFIDENCE_THRESHOLD {
                error_positions.insert(byte_index);
            }
        }

        // A byte with a nibble past the end of the capture is left undecoded
        for &index in &missing {
            data[index] = 0;
        }

        let nibble_count = expected_bytes * 2;
        let confidence = if nibble_count == 0 {
            0.0
        } else {
            (confidence_sum / nibble_count as f32).clamp(0.0, 1.0)
        };

        log::debug!(
            "Demodulated {} bytes, confidence {:.3}, {} flagged, {} past end of capture",
            expected_bytes,
            confidence,
            error_positions.len(),
            missing.len()
        );

        DecodeResult {
            data,
            confidence,
            error_positions,
            sync: Some(sync),
        }
    }

    /// Strongest table tone in a window, with `best / (best + second)`.
    fn detect_nibble(&self, samples: &[f32], window: &[f32]) -> (u8, f32) {
        let sample_rate = self.config.sample_rate as f32;
        let mut best = (0usize, 0.0f32);
        let mut second = 0.0f32;

        for (index, &freq) in TONE_TABLE.iter().enumerate() {
            let power = goertzel_power_windowed(samples, window, freq, sample_rate);
            if power > best.1 {
                second = best.1;
                best = (index, power);
            } else if power > second {
                second = power;
            }
        }

        let total = best.1 + second;
        let confidence = if total > 0.0 { best.1 / total } else { 0.0 };
        (best.0 as u8, confidence)
    }
}

impl Default for FskDemodulator {
    fn default() -> Self {
        Self::new(ModemConfig::default())
    }
}

/// Scale to unit peak. `None` for near-silent input.
pub fn normalize_peak(samples: &[f32]) -> Option<Vec<f32>> {
    let peak = samples
        .iter()
        .filter(|s| s.is_finite())
        .fold(0.0f32, |m, s| m.max(s.abs()));
    if peak < SILENCE_PEAK {
        return None;
    }
    let gain = 1.0 / peak;
    Some(
        samples
            .iter()
            .map(|&s| if s.is_finite() { s * gain } else { 0.0 })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder_fsk::FskModulator;

    fn roundtrip(data: &[u8]) -> DecodeResult {
        let samples = FskModulator::default().modulate(data);
        FskDemodulator::default().demodulate(&samples, data.len())
    }

    #[test]
    fn test_roundtrip_short() {
        let data = b"Hello FSK!";
        let result = roundtrip(data);
        assert_eq!(result.data, data);
        assert!(result.confidence >= 0.95, "confidence {}", result.confidence);
        assert!(result.is_clean());
        assert!(result.sync.unwrap().is_located());
    }

    #[test]
    fn test_roundtrip_all_nibbles() {
        let data: Vec<u8> = (0..16u8).map(|n| (n << 4) | (15 - n)).collect();
        let result = roundtrip(&data);
        assert_eq!(result.data, data);
        assert!(result.is_clean());
    }

    #[test]
    fn test_roundtrip_repeating_patterns() {
        for pattern in [0x00u8, 0xFF, 0xAA, 0x55] {
            let data = vec![pattern; 12];
            let result = roundtrip(&data);
            assert_eq!(result.data, data, "Failed for pattern {:02X}", pattern);
        }
    }

    #[test]
    fn test_attenuated_capture() {
        let data = b"quiet";
        let mut samples = FskModulator::default().modulate(data);
        for sample in samples.iter_mut() {
            *sample *= 0.01;
        }
        let result = FskDemodulator::default().demodulate(&samples, data.len());
        assert_eq!(result.data, data);
        assert!(result.confidence >= 0.95);
    }

    #[test]
    fn test_leading_silence() {
        let data = b"delayed";
        let mut samples = vec![0.0f32; 30_000];
        samples.extend(FskModulator::default().modulate(data));
        let result = FskDemodulator::default().demodulate(&samples, data.len());
        assert_eq!(result.data, data);
        assert!(result.is_clean());
    }

    #[test]
    fn test_silence_gives_no_signal() {
        let samples = vec![0.0f32; 44_100 * 15];
        let result = FskDemodulator::default().demodulate(&samples, 120);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.error_positions.len(), 120);
        assert_eq!(result.data, vec![0u8; 120]);
        assert!(!result.signal_detected());
    }

    #[test]
    fn test_empty_capture() {
        let result = FskDemodulator::default().demodulate(&[], 4);
        assert_eq!(result, DecodeResult::no_signal(4));
    }

    #[test]
    fn test_truncated_capture_flags_missing_bytes() {
        let data: Vec<u8> = (0..20).collect();
        let samples = FskModulator::default().modulate(&data);
        let sr = 44_100;
        // Keep the preamble and the first 10 bytes only
        let keep = secs_to_samples(crate::PREAMBLE_SECS + 20.0 * TONE_STEP_SECS, sr);
        let result = FskDemodulator::default().demodulate(&samples[..keep], data.len());

        assert_eq!(&result.data[..10], &data[..10]);
        for index in 10..20 {
            assert!(result.error_positions.contains(&index), "byte {} not flagged", index);
            assert_eq!(result.data[index], 0);
        }
        for index in 0..10 {
            assert!(!result.error_positions.contains(&index));
        }
        assert!(result.confidence < 0.6);
    }

    #[test]
    fn test_normalize_peak() {
        assert_eq!(normalize_peak(&[0.0; 10]), None);
        assert_eq!(normalize_peak(&[0.5, -0.25]), Some(vec![1.0, -0.5]));
        assert_eq!(normalize_peak(&[f32::NAN, 0.5]), Some(vec![0.0, 1.0]));
    }
}
