//! Synthetic impulse response: decaying stereo noise tail.
//!
//! Cheap stand-in for a measured room: white noise shaped by an
//! exponential-style decay with a short early-reflection boost.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::buffer::SampleBuffer;
use crate::error::SpatialResult;
use crate::params::ParameterSet;

/// Shortest tail the synthesizer will produce, in seconds.
pub const MIN_TAIL_SECONDS: f64 = 0.3;

/// Fraction of the tail treated as early reflections.
const EARLY_WINDOW: f64 = 0.05;
const EARLY_BOOST: f64 = 0.3;

/// Tail length in seconds for the given room.
///
/// Grows with `room_size`, shrinks with `damping`.
pub fn tail_seconds(room_size: f64, damping: f64) -> f64 {
    (0.3 + room_size * 3.2 * (1.2 - damping)).max(MIN_TAIL_SECONDS)
}

/// Tail length in frames at `sample_rate`.
pub fn tail_frames(room_size: f64, damping: f64, sample_rate: u32) -> usize {
    (sample_rate as f64 * tail_seconds(room_size, damping)).round().max(1.0) as usize
}

/// Amplitude envelope at normalized position `t` in [0, 1).
///
/// Non-increasing in `t`. Every IR sample satisfies `|s| <= envelope(t)`.
#[inline]
pub fn envelope(t: f64, damping: f64) -> f64 {
    let decay = (1.0 - damping * 0.85).powf(t * 120.0);
    let boost = if t < EARLY_WINDOW {
        (1.0 - t / EARLY_WINDOW) * EARLY_BOOST
    } else {
        0.0
    };
    decay + boost
}

/// A synthesized stereo impulse response.
#[derive(Debug, Clone)]
pub struct ImpulseResponse {
    buffer: SampleBuffer,
    damping: f64,
}

impl ImpulseResponse {
    /// Synthesize a tail for `params` at `sample_rate`, channels drawn
    /// independently from a PCG32 stream seeded with `seed`.
    pub fn synthesize(params: &ParameterSet, sample_rate: u32, seed: u64) -> SpatialResult<Self> {
        let len = tail_frames(params.room_size(), params.damping(), sample_rate);
        let damping = params.damping();
        let mut rng = Pcg32::seed_from_u64(seed);

        let render_channel = |rng: &mut Pcg32| -> Vec<f32> {
            (0..len)
                .map(|i| {
                    let t = i as f64 / len as f64;
                    let noise: f64 = rng.gen_range(-1.0..=1.0);
                    (noise * envelope(t, damping)) as f32
                })
                .collect()
        };
        let left = render_channel(&mut rng);
        let right = render_channel(&mut rng);

        Ok(Self {
            buffer: SampleBuffer::stereo(left, right, sample_rate)?,
            damping,
        })
    }

    pub fn len(&self) -> usize {
        self.buffer.frame_count()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        self.buffer.channel(index)
    }

    /// Envelope value at frame `i` of this response.
    pub fn envelope_at(&self, i: usize) -> f64 {
        envelope(i as f64 / self.len() as f64, self.damping)
    }

    /// Per-channel gain that scales the response to unit energy.
    pub fn unit_energy_gain(&self, channel: usize) -> f32 {
        let energy: f64 = self.channel(channel).iter().map(|&s| (s as f64) * (s as f64)).sum();
        if energy > 0.0 { (1.0 / energy.sqrt()) as f32 } else { 0.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_length_follows_law() {
        let p = ParameterSet::new(0.15, 1.0, 0.5, 0.3, 0.5);
        let ir = ImpulseResponse::synthesize(&p, 44100, 7).unwrap();
        let expected = (44100.0_f64 * (0.3 + 0.5 * 3.2 * 0.7)).round() as usize;
        assert_eq!(ir.len(), expected);
        assert_eq!(ir.buffer().channel_count(), 2);
        assert_eq!(ir.buffer().sample_rate(), 44100);
    }

    #[test]
    fn minimum_tail_is_enforced() {
        assert_eq!(tail_seconds(0.0, 1.0), MIN_TAIL_SECONDS);
        assert_eq!(tail_frames(0.0, 0.0, 8000), 2400);
    }

    #[test]
    fn tail_monotonic_in_room_and_damping() {
        for d in 0..=10 {
            let damping = d as f64 / 10.0;
            let mut prev = 0.0;
            for r in 0..=10 {
                let len = tail_seconds(r as f64 / 10.0, damping);
                assert!(len >= prev, "room {r} damping {damping}");
                prev = len;
            }
        }
        for r in 0..=10 {
            let room = r as f64 / 10.0;
            let mut prev = f64::INFINITY;
            for d in 0..=10 {
                let len = tail_seconds(room, d as f64 / 10.0);
                assert!(len <= prev, "room {room} damping {d}");
                prev = len;
            }
        }
    }

    #[test]
    fn envelope_is_non_increasing() {
        for d in 0..=10 {
            let damping = d as f64 / 10.0;
            let mut prev = f64::INFINITY;
            for i in 0..2000 {
                let e = envelope(i as f64 / 2000.0, damping);
                assert!(e <= prev, "damping {damping} at {i}: {e} > {prev}");
                prev = e;
            }
        }
    }

    #[test]
    fn samples_stay_inside_envelope() {
        let p = ParameterSet::new(0.15, 1.0, 0.3, 0.3, 0.6);
        let ir = ImpulseResponse::synthesize(&p, 22050, 42).unwrap();
        for ch in 0..2 {
            for (i, &s) in ir.channel(ch).iter().enumerate() {
                assert!((s.abs() as f64) <= ir.envelope_at(i) + 1e-6, "ch {ch} frame {i}");
            }
        }
    }

    #[test]
    fn tail_energy_decays() {
        let p = ParameterSet::new(0.15, 1.0, 0.6, 0.3, 0.5);
        let ir = ImpulseResponse::synthesize(&p, 44100, 1).unwrap();
        let ch = ir.channel(0);
        let quarter = ch.len() / 4;
        let rms = |s: &[f32]| (s.iter().map(|&x| x * x).sum::<f32>() / s.len() as f32).sqrt();
        assert!(rms(&ch[..quarter]) > rms(&ch[3 * quarter..]) * 2.0);
    }

    #[test]
    fn channels_are_independent() {
        let ir = ImpulseResponse::synthesize(&ParameterSet::default(), 8000, 3).unwrap();
        assert_ne!(ir.channel(0), ir.channel(1));
    }

    #[test]
    fn noise_is_roughly_zero_mean() {
        let ir = ImpulseResponse::synthesize(&ParameterSet::new(0.15, 1.0, 1.0, 0.3, 0.0), 44100, 9).unwrap();
        let ch = ir.channel(0);
        let mean = ch.iter().map(|&s| s as f64).sum::<f64>() / ch.len() as f64;
        assert!(mean.abs() < 0.02, "mean {mean}");
    }

    #[test]
    fn unit_energy_gain_normalizes() {
        let ir = ImpulseResponse::synthesize(&ParameterSet::default(), 8000, 5).unwrap();
        let g = ir.unit_energy_gain(1) as f64;
        let energy: f64 = ir.channel(1).iter().map(|&s| (s as f64 * g).powi(2)).sum();
        assert!((energy - 1.0).abs() < 1e-3);
    }
}
