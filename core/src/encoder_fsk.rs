use crate::config::ModemConfig;
use crate::fsk::{fade_gain, Tone, ToneSequence};
use crate::{secs_to_samples, FADE_SECS};
use std::f64::consts::PI;

/// 16-tone FSK modulator
///
/// Turns a byte buffer into the tone timeline of [`ToneSequence`] and renders
/// it to mono PCM. Each tone is a sine with a short linear fade at both edges
/// so tone boundaries do not click; tones never overlap.
///
/// Modulation is a pure function of the bytes and the configuration.
#[derive(Debug, Clone)]
pub struct FskModulator {
    config: ModemConfig,
}

impl FskModulator {
    /// An invalid config is logged; amplitude is clamped to [0, 1] when rendering.
    pub fn new(config: ModemConfig) -> Self {
        if let Err(e) = config.validate() {
            log::warn!("{}", e);
        }
        Self { config }
    }

    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    /// Tone timeline for `bytes`.
    pub fn tones<'a>(&self, bytes: &'a [u8]) -> ToneSequence<'a> {
        ToneSequence::new(bytes)
    }

    /// Render a tone timeline into a single sample buffer.
    pub fn render<I>(&self, tones: I) -> Vec<f32>
    where
        I: IntoIterator<Item = Tone>,
    {
        let sample_rate = self.config.sample_rate;
        let fade = secs_to_samples(FADE_SECS, sample_rate);
        // f32::max maps NaN to 0
        let amplitude = self.config.amplitude.max(0.0).min(1.0);
        let mut samples: Vec<f32> = Vec::new();

        for tone in tones {
            let start = secs_to_samples(tone.start_secs, sample_rate);
            let len = secs_to_samples(tone.duration_secs, sample_rate);
            let end = start + len;
            if samples.len() < end {
                samples.resize(end, 0.0);
            }

            let step = 2.0 * PI * tone.freq_hz as f64 / sample_rate as f64;
            let fade = fade.min(len / 2);
            for (i, sample) in samples[start..end].iter_mut().enumerate() {
                let gain = fade_gain(i, len, fade) * amplitude;
                *sample += gain * (step * i as f64).sin() as f32;
            }
        }

        samples
    }

    /// Encode bytes into audio samples: preamble + nibble tones + postamble
    pub fn modulate(&self, bytes: &[u8]) -> Vec<f32> {
        let samples = self.render(self.tones(bytes));
        log::debug!(
            "Modulated {} bytes into {} samples ({:.2} s at {} Hz)",
            bytes.len(),
            samples.len(),
            samples.len() as f64 / self.config.sample_rate as f64,
            self.config.sample_rate
        );
        samples
    }
}

impl Default for FskModulator {
    fn default() -> Self {
        Self::new(ModemConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{transmission_secs, PREAMBLE_SECS, TONE_SECS};

    #[test]
    fn test_modulated_length() {
        let modulator = FskModulator::default();
        let data = b"Hello";
        let samples = modulator.modulate(data);
        let expected =
            secs_to_samples(transmission_secs(data.len()), modulator.config().sample_rate);
        assert!(
            (samples.len() as i64 - expected as i64).abs() <= 1,
            "Expected ~{} samples, got {}",
            expected,
            samples.len()
        );
    }

    #[test]
    fn test_samples_within_amplitude() {
        let modulator = FskModulator::default();
        let samples = modulator.modulate(&[0x00, 0xFF, 0x5A]);
        let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak <= modulator.config().amplitude + 1e-6);
        assert!(peak > 0.5);
    }

    #[test]
    fn test_gap_is_silent_and_edges_fade() {
        let modulator = FskModulator::default();
        let sr = modulator.config().sample_rate;
        let samples = modulator.modulate(&[0x12]);

        // First tone starts from zero
        assert!(samples[0].abs() < 1e-6);

        // Middle of the gap after the first data tone
        let gap_mid = secs_to_samples(PREAMBLE_SECS + TONE_SECS + 0.005, sr);
        assert_eq!(samples[gap_mid], 0.0);

        // Sample just inside the first data tone is faded
        let data_start = secs_to_samples(PREAMBLE_SECS, sr);
        assert!(samples[data_start + 1].abs() < 0.05);
    }

    #[test]
    fn test_out_of_range_amplitude_is_clamped() {
        let mut config = ModemConfig::default();
        config.amplitude = 1.5;
        let samples = FskModulator::new(config).modulate(&[0x0F, 0xF0]);
        let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak <= 1.0, "peak {}", peak);
        assert!(peak > 0.99);

        config.amplitude = f32::NAN;
        let samples = FskModulator::new(config).modulate(&[0x0F]);
        assert!(samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_modulation_is_deterministic() {
        let a = FskModulator::default().modulate(b"Deterministic test");
        let b = FskModulator::default().modulate(b"Deterministic test");
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_payload_still_has_sync_tones() {
        let samples = FskModulator::default().modulate(&[]);
        assert!(!samples.is_empty());
        assert!(samples.iter().any(|&s| s.abs() > 0.1));
    }
}
