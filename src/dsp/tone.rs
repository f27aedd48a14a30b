//! Colour effects for the offline render: Haas stereo widening and
//! vinyl-style warmth.

use std::f32::consts::PI;

use super::mixer::{NORMALIZE_PEAK, soft_clip};

/// Widest Haas delay, in milliseconds, reached at `width = 1.0`.
const MAX_HAAS_MS: f32 = 20.0;

/// Delay the right channel by up to 20 ms to widen the image.
///
/// The first `delay` samples of the right channel are left unchanged.
/// Widths at or below 0.01 are a no-op.
pub fn stereo_width(right: &mut [f32], width: f32, sample_rate: u32) {
    if width <= 0.01 {
        return;
    }
    let delay_ms = width.clamp(0.0, 1.0) * MAX_HAAS_MS;
    let delay = (sample_rate as f32 * delay_ms / 1000.0) as usize;
    if delay == 0 || delay >= right.len() {
        return;
    }
    right.copy_within(0..right.len() - delay, delay);
}

/// One-pole low-pass plus tanh saturation.
///
/// Cutoff falls from 16 kHz towards 4 kHz as `warmth` rises; drive rises
/// from 1x to 4x. Output peak is held below 0.99.
pub fn vinyl_warmth(channels: &mut [Vec<f32>], warmth: f32, sample_rate: u32) {
    if warmth <= 0.01 {
        return;
    }
    let warmth = warmth.clamp(0.0, 1.0);
    let cutoff = (16_000.0 - warmth * 12_000.0).min(sample_rate as f32 * 0.45).max(2_000.0);
    let rc = 1.0 / (2.0 * PI * cutoff);
    let dt = 1.0 / sample_rate as f32;
    let alpha = dt / (rc + dt);
    let drive = 1.0 + warmth * 3.0;

    for channel in channels.iter_mut() {
        for i in 1..channel.len() {
            channel[i] = channel[i - 1] + alpha * (channel[i] - channel[i - 1]);
        }
    }

    let mut peak = 0.0f32;
    for channel in channels.iter_mut() {
        for s in channel.iter_mut() {
            *s = soft_clip(*s * drive);
            peak = peak.max(s.abs());
        }
    }
    if peak > NORMALIZE_PEAK {
        let gain = NORMALIZE_PEAK / peak;
        for s in channels.iter_mut().flat_map(|c| c.iter_mut()) {
            *s *= gain;
        }
    }
}
