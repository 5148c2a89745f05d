use crate::error::{AlertError, Result};
use crate::{PREAMBLE_HIGH_HZ, SAMPLE_RATE};

/// Runtime settings shared by the modulator and demodulator.
///
/// Both ends of a link must agree on the sample rate; nothing is negotiated
/// over the air.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModemConfig {
    pub sample_rate: u32,
    /// Peak amplitude of rendered tones, in (0, 1]
    pub amplitude: f32,
}

impl ModemConfig {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        let nyquist = self.sample_rate as f32 / 2.0;
        if nyquist <= PREAMBLE_HIGH_HZ {
            return Err(AlertError::InvalidConfig(format!(
                "sample rate {} Hz cannot carry the {} Hz sentinel",
                self.sample_rate, PREAMBLE_HIGH_HZ
            )));
        }
        if !(self.amplitude > 0.0 && self.amplitude <= 1.0) {
            return Err(AlertError::InvalidConfig(format!(
                "amplitude {} outside (0, 1]",
                self.amplitude
            )));
        }
        Ok(())
    }
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            amplitude: 0.8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ModemConfig::default();
        assert_eq!(config.sample_rate, 44_100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_low_sample_rate_rejected() {
        let config = ModemConfig::new(8000);
        match config.validate() {
            Err(AlertError::InvalidConfig(_)) => {}
            other => panic!("Expected InvalidConfig, got {:?}", other),
        }
    }

    #[test]
    fn test_amplitude_bounds() {
        let mut config = ModemConfig::default();
        config.amplitude = 0.0;
        assert!(config.validate().is_err());
        config.amplitude = 1.5;
        assert!(config.validate().is_err());
        config.amplitude = 1.0;
        assert!(config.validate().is_ok());
    }
}
