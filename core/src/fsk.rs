use std::f32::consts::PI;

use crate::{
    NUM_TONES, POSTAMBLE_HZ, POSTAMBLE_SECS, PREAMBLE_CYCLES, PREAMBLE_HIGH_HZ, PREAMBLE_LOW_HZ,
    PREAMBLE_SECS, PREAMBLE_TONE_SECS, TONE_BASE_HZ, TONE_SECS, TONE_SPACING_HZ, TONE_STEP_SECS,
};

// 16-tone FSK
//
// Each nibble (0-15) selects one tone from the table below; a byte is sent as
// its high nibble then its low nibble, one tone at a time, with a short gap
// between tones. Sentinels at 500 Hz / 4500 Hz sit outside the 1000-4000 Hz data
// band so the preamble cannot be mistaken for data.

/// Data tones indexed by nibble value
pub const TONE_TABLE: [f32; NUM_TONES] = [
    1000.0, 1200.0, 1400.0, 1600.0, 1800.0, 2000.0, 2200.0, 2400.0, 2600.0, 2800.0, 3000.0,
    3200.0, 3400.0, 3600.0, 3800.0, 4000.0,
];

pub fn nibble_to_freq(nibble: u8) -> f32 {
    TONE_TABLE[(nibble & 0x0F) as usize]
}

/// Nearest table index for a frequency, if it lies on the table
pub fn freq_to_nibble(freq: f32) -> Option<u8> {
    let offset = (freq - TONE_BASE_HZ) / TONE_SPACING_HZ;
    let index = offset.round();
    if (offset - index).abs() > 0.01 || index < 0.0 || index >= NUM_TONES as f32 {
        return None;
    }
    Some(index as u8)
}

/// One scheduled tone of a transmission. Offsets are from the start of the
/// transmission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub freq_hz: f32,
    pub start_secs: f64,
    pub duration_secs: f64,
}

impl Tone {
    pub fn end_secs(&self) -> f64 {
        self.start_secs + self.duration_secs
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Preamble(usize),
    Data(usize),
    Done,
}

/// Tone timeline for one transmission: preamble, two tones per byte, postamble.
///
/// Yields each tone exactly once in time order.
#[derive(Debug, Clone)]
pub struct ToneSequence<'a> {
    bytes: &'a [u8],
    stage: Stage,
}

impl<'a> ToneSequence<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            stage: Stage::Preamble(0),
        }
    }

    fn remaining(&self) -> usize {
        let nibbles = self.bytes.len() * 2;
        match self.stage {
            Stage::Preamble(i) => (2 * PREAMBLE_CYCLES - i) + nibbles + 1,
            Stage::Data(i) => (nibbles - i) + 1,
            Stage::Done => 0,
        }
    }
}

impl Iterator for ToneSequence<'_> {
    type Item = Tone;

    fn next(&mut self) -> Option<Tone> {
        let nibbles = self.bytes.len() * 2;
        match self.stage {
            Stage::Preamble(i) => {
                self.stage = if i + 1 < 2 * PREAMBLE_CYCLES {
                    Stage::Preamble(i + 1)
                } else {
                    Stage::Data(0)
                };
                Some(Tone {
                    freq_hz: preamble_freq(i),
                    start_secs: i as f64 * PREAMBLE_TONE_SECS,
                    duration_secs: PREAMBLE_TONE_SECS,
                })
            }
            Stage::Data(i) if i < nibbles => {
                self.stage = Stage::Data(i + 1);
                let byte = self.bytes[i / 2];
                let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0F };
                Some(Tone {
                    freq_hz: nibble_to_freq(nibble),
                    start_secs: nibble_offset_secs(i),
                    duration_secs: TONE_SECS,
                })
            }
            Stage::Data(_) => {
                self.stage = Stage::Done;
                Some(Tone {
                    freq_hz: POSTAMBLE_HZ,
                    start_secs: nibble_offset_secs(nibbles),
                    duration_secs: POSTAMBLE_SECS,
                })
            }
            Stage::Done => None,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}

impl ExactSizeIterator for ToneSequence<'_> {}

/// Sentinel frequency of the i-th preamble tone (low first, alternating)
pub fn preamble_freq(index: usize) -> f32 {
    if index % 2 == 0 {
        PREAMBLE_LOW_HZ
    } else {
        PREAMBLE_HIGH_HZ
    }
}

/// Start of the i-th data nibble, from the start of the transmission
pub fn nibble_offset_secs(index: usize) -> f64 {
    PREAMBLE_SECS + index as f64 * TONE_STEP_SECS
}

/// Signal power at `freq` (Goertzel, non-integer bin).
pub fn goertzel_power(samples: &[f32], freq: f32, sample_rate: f32) -> f32 {
    let omega = 2.0 * PI * freq / sample_rate;
    let coeff = 2.0 * omega.cos();

    let mut q1 = 0.0f32;
    let mut q2 = 0.0f32;
    for &sample in samples {
        let q0 = coeff * q1 - q2 + sample;
        q2 = q1;
        q1 = q0;
    }

    (q1 * q1 + q2 * q2 - coeff * q1 * q2).max(0.0)
}

/// Goertzel power of `samples` weighted by `window` (same length).
pub fn goertzel_power_windowed(
    samples: &[f32],
    window: &[f32],
    freq: f32,
    sample_rate: f32,
) -> f32 {
    debug_assert_eq!(samples.len(), window.len());
    let omega = 2.0 * PI * freq / sample_rate;
    let coeff = 2.0 * omega.cos();

    let mut q1 = 0.0f32;
    let mut q2 = 0.0f32;
    for (&sample, &weight) in samples.iter().zip(window) {
        let q0 = coeff * q1 - q2 + sample * weight;
        q2 = q1;
        q1 = q0;
    }

    (q1 * q1 + q2 * q2 - coeff * q1 * q2).max(0.0)
}

pub fn hann_window(len: usize) -> Vec<f32> {
    if len < 2 {
        return vec![1.0; len];
    }
    let denom = (len - 1) as f32;
    (0..len)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / denom).cos())
        .collect()
}

/// Linear attack/decay gain at sample `i` of a `len`-sample tone.
pub fn fade_gain(i: usize, len: usize, fade: usize) -> f32 {
    if fade == 0 {
        return 1.0;
    }
    if i < fade {
        i as f32 / fade as f32
    } else if i + fade >= len {
        (len - 1 - i) as f32 / fade as f32
    } else {
        1.0
    }
}
