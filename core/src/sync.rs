use crate::fsk::{goertzel_power, preamble_freq};
use crate::{
    secs_to_samples, PREAMBLE_CYCLES, PREAMBLE_HIGH_HZ, PREAMBLE_LOW_HZ, PREAMBLE_SECS,
    PREAMBLE_TONE_SECS,
};

// ============================================================================
// SYNCHRONIZATION
// ============================================================================
// Two stages:
//   1. Energy onset: a coarse "something started here" position, found by
//      comparing short-window energy against the noise floor of the first
//      100 ms of the capture.
//   2. Preamble search: slide over up to 2 s starting just before the onset,
//      scoring how cleanly each expected sentinel dominates the other at every
//      preamble tone. The search never fails; a weak score falls back to
//      onset + nominal preamble length.

/// Length of the leading stretch used as the noise floor estimate
pub const NOISE_FLOOR_SECS: f64 = 0.100;

/// Energy window and stride for onset scanning
pub const ONSET_WINDOW_SECS: f64 = 0.020;
pub const ONSET_STRIDE_SECS: f64 = 0.005;

/// Onset fires at this multiple of the noise floor...
pub const ONSET_RATIO: f32 = 10.0;

/// ...or above this absolute mean-square energy (peak-normalized input)
pub const ONSET_ABS_FLOOR: f32 = 0.05;

/// How far past the onset the preamble may start
pub const PREAMBLE_SEARCH_SECS: f64 = 2.0;

/// Fraction of the maximum score a candidate needs to be accepted
pub const PREAMBLE_MIN_SCORE_RATIO: f32 = 0.4;

/// Coarse search stride; the best coarse hit is refined sample by sample
const PREAMBLE_COARSE_STRIDE_SECS: f64 = 0.002;

const MIN_TONE_ENERGY: f32 = 1e-12;

/// Result of preamble synchronization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyncOutcome {
    /// Preamble found; `data_start` is the first sample after it
    Located { data_start: usize, score: f32 },
    /// No candidate was good enough; `data_start` is onset + nominal preamble
    Fallback { data_start: usize, best_score: f32 },
}

impl SyncOutcome {
    pub fn data_start(&self) -> usize {
        match *self {
            SyncOutcome::Located { data_start, .. } => data_start,
            SyncOutcome::Fallback { data_start, .. } => data_start,
        }
    }

    pub fn is_located(&self) -> bool {
        matches!(self, SyncOutcome::Located { .. })
    }
}

pub fn mean_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|&s| s * s).sum::<f32>() / samples.len() as f32
}

/// Find the first window whose energy clearly rises above the noise floor.
///
/// Returns the window start, or `None` if nothing in the capture qualifies.
pub fn detect_onset(samples: &[f32], sample_rate: u32) -> Option<usize> {
    let window = secs_to_samples(ONSET_WINDOW_SECS, sample_rate).max(1);
    let stride = secs_to_samples(ONSET_STRIDE_SECS, sample_rate).max(1);
    let floor_len = secs_to_samples(NOISE_FLOOR_SECS, sample_rate).min(samples.len());

    let noise_floor = mean_energy(&samples[..floor_len]);
    let threshold = noise_floor * ONSET_RATIO;

    let mut pos = 0;
    while pos + window <= samples.len() {
        let energy = mean_energy(&samples[pos..pos + window]);
        if energy > threshold || energy > ONSET_ABS_FLOOR {
            log::debug!(
                "Onset at sample {} (energy {:.5}, noise floor {:.5})",
                pos,
                energy,
                noise_floor
            );
            return Some(pos);
        }
        pos += stride;
    }

    None
}

/// Highest score [`preamble_score`] can return
pub fn max_preamble_score() -> f32 {
    (2 * PREAMBLE_CYCLES) as f32
}

/// Score a candidate preamble starting at `start`.
///
/// Each preamble tone contributes `(E_expected - E_other) / (E_expected + E_other)`
/// clamped at zero, using unwindowed Goertzel energies at the two sentinels.
pub fn preamble_score(samples: &[f32], start: usize, sample_rate: u32) -> f32 {
    let tone_len = secs_to_samples(PREAMBLE_TONE_SECS, sample_rate);
    let sr = sample_rate as f32;
    let mut score = 0.0;

    for k in 0..2 * PREAMBLE_CYCLES {
        let tone_start = start + secs_to_samples(k as f64 * PREAMBLE_TONE_SECS, sample_rate);
        let tone_end = tone_start + tone_len;
        if tone_end > samples.len() {
            break;
        }
        let window = &samples[tone_start..tone_end];

        let low = goertzel_power(window, PREAMBLE_LOW_HZ, sr);
        let high = goertzel_power(window, PREAMBLE_HIGH_HZ, sr);
        let (expected, other) = if preamble_freq(k) == PREAMBLE_LOW_HZ {
            (low, high)
        } else {
            (high, low)
        };

        let total = expected + other;
        if total > MIN_TONE_ENERGY {
            score += ((expected - other) / total).max(0.0);
        }
    }

    score
}

/// Locate the end of the preamble, searching from just before `onset`.
pub fn locate_preamble(samples: &[f32], onset: usize, sample_rate: u32) -> SyncOutcome {
    let tone_len = secs_to_samples(PREAMBLE_TONE_SECS, sample_rate);
    let preamble_len = secs_to_samples(PREAMBLE_SECS, sample_rate);
    let search_len = secs_to_samples(PREAMBLE_SEARCH_SECS, sample_rate);
    let stride = secs_to_samples(PREAMBLE_COARSE_STRIDE_SECS, sample_rate).max(1);

    let fallback_start = onset + preamble_len;
    let first = onset.saturating_sub(tone_len);

    let Some(last) = samples
        .len()
        .checked_sub(preamble_len)
        .map(|limit| limit.min(first + search_len))
        .filter(|&last| last >= first)
    else {
        log::warn!("Capture too short for a preamble; falling back to onset estimate");
        return SyncOutcome::Fallback {
            data_start: fallback_start,
            best_score: 0.0,
        };
    };

    let mut best_pos = first;
    let mut best_score = f32::MIN;
    for pos in (first..=last).step_by(stride) {
        let score = preamble_score(samples, pos, sample_rate);
        if score > best_score {
            best_score = score;
            best_pos = pos;
        }
    }

    let refine_from = best_pos.saturating_sub(stride).max(first);
    let refine_to = (best_pos + stride).min(last);
    for pos in refine_from..=refine_to {
        let score = preamble_score(samples, pos, sample_rate);
        if score > best_score {
            best_score = score;
            best_pos = pos;
        }
    }

    let threshold = PREAMBLE_MIN_SCORE_RATIO * max_preamble_score();
    if best_score >= threshold {
        log::debug!(
            "Preamble located at sample {} (score {:.2}/{:.0})",
            best_pos,
            best_score,
            max_preamble_score()
        );
        SyncOutcome::Located {
            data_start: best_pos + preamble_len,
            score: best_score,
        }
    } else {
        log::warn!(
            "Preamble not found (best score {:.2} < {:.2}); assuming data at sample {}",
            best_score,
            threshold,
            fallback_start
        );
        SyncOutcome::Fallback {
            data_start: fallback_start,
            best_score,
        }
    }
}
