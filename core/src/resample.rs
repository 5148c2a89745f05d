//! Capture preparation: channel downmix and sample-rate conversion.
//!
//! Linear interpolation is enough here; every tone the modem uses sits far
//! below the Nyquist limit of any rate the receiver accepts.

use crate::error::{AlertError, Result};

/// Average interleaved channels into a mono signal.
///
/// A trailing partial frame is dropped.
pub fn downmix(interleaved: &[f32], channels: usize) -> Result<Vec<f32>> {
    match channels {
        0 => Err(AlertError::InvalidConfig("channel count must be at least 1".to_string())),
        1 => Ok(interleaved.to_vec()),
        _ => {
            let scale = 1.0 / channels as f32;
            Ok(interleaved
                .chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f32>() * scale)
                .collect())
        }
    }
}

/// Resample to `to_rate` by linear interpolation between neighbouring samples.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == 0 || to_rate == 0 {
        return Err(AlertError::InvalidConfig(format!(
            "cannot resample {} Hz -> {} Hz",
            from_rate, to_rate
        )));
    }
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let new_length =
        ((samples.len() as u64 * to_rate as u64).div_ceil(from_rate as u64)) as usize;
    let last = samples.len() - 1;

    let resampled = (0..new_length)
        .map(|i| {
            let src = i as f64 * ratio;
            let floor = (src.floor() as usize).min(last);
            let fraction = (src - floor as f64) as f32;
            if floor < last {
                samples[floor] * (1.0 - fraction) + samples[floor + 1] * fraction
            } else {
                samples[last]
            }
        })
        .collect();

    log::debug!(
        "Resampled {} samples at {} Hz to {} Hz",
        samples.len(),
        from_rate,
        to_rate
    );
    Ok(resampled)
}
