//! Equal-power LFO panning.
//!
//! Both render paths call [`pan_gains`]; there is no second implementation.

use std::f64::consts::{FRAC_PI_2, TAU};

use crate::error::{SpatialError, SpatialResult};

/// Left/right gains for a normalized LFO `phase` and pan `depth`.
///
/// `leftGain² + rightGain² == 1` for every input.
#[inline]
pub fn pan_gains(phase: f64, depth: f64) -> (f32, f32) {
    let raw = (TAU * phase).sin() * depth;
    let position = (raw + 1.0) / 2.0;
    let angle = position * FRAC_PI_2;
    (angle.cos() as f32, angle.sin() as f32)
}

/// LFO phase at an absolute frame index, continuous over a whole buffer.
#[inline]
pub fn phase_at(frame: usize, pan_speed: f64, sample_rate: f64) -> f64 {
    (frame as f64 * pan_speed / sample_rate).fract()
}

/// Running LFO phase accumulator, wrapped into [0, 1).
#[derive(Debug, Clone)]
pub struct Lfo {
    phase: f64,
    sample_rate: f64,
}

impl Lfo {
    /// Fails with `InvalidBuffer` unless `sample_rate` is finite and positive.
    pub fn new(sample_rate: f64) -> SpatialResult<Self> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(SpatialError::InvalidBuffer(format!(
                "sample rate must be finite and positive, got {sample_rate}"
            )));
        }
        Ok(Self { phase: 0.0, sample_rate })
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Advance by one sample at `rate` Hz.
    #[inline]
    pub fn advance(&mut self, rate: f64) {
        self.phase += rate / self.sample_rate;
        if self.phase >= 1.0 {
            self.phase -= self.phase.floor();
        }
    }
}

/// Pan one stereo frame with the gains at `phase`.
#[inline]
pub fn pan_frame(left: f32, right: f32, phase: f64, depth: f64) -> (f32, f32) {
    let (lg, rg) = pan_gains(phase, depth);
    (left * lg, right * rg)
}

/// Apply the pan law to whole channels, phase computed per frame from the
/// frame index so the sweep is continuous over the buffer.
pub fn pan_block(left: &mut [f32], right: &mut [f32], pan_speed: f64, depth: f64, sample_rate: f64) {
    for (i, (l, r)) in left.iter_mut().zip(right.iter_mut()).enumerate() {
        let phase = phase_at(i, pan_speed, sample_rate);
        (*l, *r) = pan_frame(*l, *r, phase, depth);
    }
}
