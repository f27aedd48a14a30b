//! Offline renderer: full-buffer 8D render for file delivery.
//!
//! Not time-constrained: the reverb is a true convolution against a
//! synthesized impulse response. When the accelerated path is disabled the
//! renderer pans manually and approximates the tail with a tapped echo
//! following the same length and decay envelope as the impulse response.

use serde::{Deserialize, Serialize};

use super::buffer::SampleBuffer;
use super::convolver::Convolver;
use super::impulse::{ImpulseResponse, envelope, tail_frames};
use super::mixer::{NORMALIZE_PEAK, mix_wet_dry, peak_normalize};
use super::panner::pan_block;
use super::tone::{stereo_width, vinyl_warmth};
use crate::error::SpatialResult;
use crate::job::CancelToken;
use crate::params::ParameterSet;

/// Echo taps used by the approximate (non-convolution) reverb.
const APPROX_TAPS: usize = 12;
/// Extra right-channel tap offset, decorrelating the approximate tail.
const STEREO_SPREAD: usize = 23;

/// Offline render settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderOptions {
    /// Peak-normalize the result to 0.99.
    pub normalize: bool,
    /// Seed for the impulse-response noise.
    pub seed: u64,
    /// Use FFT convolution for the reverb. When false the tapped-echo
    /// approximation is used instead.
    pub accelerated: bool,
    /// Haas widening amount, 0.0–1.0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stereo_width: Option<f32>,
    /// Low-pass + saturation amount, 0.0–1.0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vinyl_warmth: Option<f32>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            normalize: true,
            seed: 0x8D8D,
            accelerated: true,
            stereo_width: None,
            vinyl_warmth: None,
        }
    }
}

impl RenderOptions {
    /// Parse options from JSON; missing fields keep their defaults.
    pub fn from_json(json: &str) -> SpatialResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Renders a complete buffer through pan + reverb.
#[derive(Debug, Clone, Default)]
pub struct OfflineRenderPipeline {
    options: RenderOptions,
}

impl OfflineRenderPipeline {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Render `source` to a stereo buffer of the same length and rate.
    ///
    /// Reports 25/50/75 to `progress` and checks `cancel` after each.
    pub fn render(
        &self,
        source: &SampleBuffer,
        params: &ParameterSet,
        progress: &mut dyn FnMut(u8),
        cancel: &CancelToken,
    ) -> SpatialResult<SampleBuffer> {
        let sample_rate = source.sample_rate();
        let mut channels = source.to_stereo().into_channels();

        let (left, right) = split_pair(&mut channels);
        pan_block(left, right, params.pan_speed(), params.pan_depth(), sample_rate as f64);
        progress(25);
        cancel.check()?;

        let wet = if self.options.accelerated {
            let ir = ImpulseResponse::synthesize(params, sample_rate, self.options.seed)?;
            log::debug!("convolving against {} frame impulse response", ir.len());
            convolve_stereo(&channels, &ir)
        } else {
            log::debug!("accelerated path disabled, using tapped-echo reverb");
            approximate_reverb(&channels, params, sample_rate)
        };
        progress(50);
        cancel.check()?;

        let level = params.wet_level() as f32;
        for (dry, wet) in channels.iter_mut().zip(wet.iter()) {
            mix_wet_dry(dry, wet, level);
        }
        if let Some(width) = self.options.stereo_width {
            stereo_width(&mut channels[1], width, sample_rate);
        }
        if let Some(warmth) = self.options.vinyl_warmth {
            vinyl_warmth(&mut channels, warmth, sample_rate);
        }
        if self.options.normalize {
            peak_normalize(&mut channels, NORMALIZE_PEAK);
        }
        progress(75);
        cancel.check()?;

        SampleBuffer::from_channels(channels, sample_rate)
    }
}

fn split_pair(channels: &mut [Vec<f32>]) -> (&mut [f32], &mut [f32]) {
    let (left, right) = channels.split_at_mut(1);
    (left[0].as_mut_slice(), right[0].as_mut_slice())
}

/// Convolve each channel with its own IR channel, scaled to unit energy.
fn convolve_stereo(channels: &[Vec<f32>], ir: &ImpulseResponse) -> Vec<Vec<f32>> {
    channels
        .iter()
        .enumerate()
        .map(|(ch, signal)| {
            let gain = ir.unit_energy_gain(ch);
            let kernel: Vec<f32> = ir.channel(ch).iter().map(|&s| s * gain).collect();
            Convolver::new(&kernel).process(signal)
        })
        .collect()
}

/// Tap positions and weights for the approximate tail. Weights follow the
/// impulse-response envelope and are scaled to unit energy.
pub fn echo_taps(params: &ParameterSet, sample_rate: u32) -> Vec<(usize, f32)> {
    let len = tail_frames(params.room_size(), params.damping(), sample_rate);
    let mut taps: Vec<(usize, f32)> = (1..=APPROX_TAPS)
        .map(|k| {
            let t = k as f64 / (APPROX_TAPS + 1) as f64;
            let pos = (len as f64 * t) as usize;
            (pos.max(1), envelope(t, params.damping()) as f32)
        })
        .collect();

    let energy: f32 = taps.iter().map(|&(_, w)| w * w).sum();
    if energy > 0.0 {
        let norm = energy.sqrt();
        for (_, w) in taps.iter_mut() {
            *w /= norm;
        }
    }
    taps
}

fn approximate_reverb(channels: &[Vec<f32>], params: &ParameterSet, sample_rate: u32) -> Vec<Vec<f32>> {
    let taps = echo_taps(params, sample_rate);
    channels
        .iter()
        .enumerate()
        .map(|(ch, signal)| {
            let spread = if ch == 1 { STEREO_SPREAD } else { 0 };
            let mut out = vec![0.0f32; signal.len()];
            for &(pos, weight) in &taps {
                let offset = pos + spread;
                if offset >= signal.len() {
                    continue;
                }
                for (o, &x) in out[offset..].iter_mut().zip(signal.iter()) {
                    *o += x * weight;
                }
            }
            out
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::panner::pan_gains;
    use crate::error::SpatialError;

    fn run(pipeline: &OfflineRenderPipeline, source: &SampleBuffer, params: &ParameterSet) -> SampleBuffer {
        pipeline.render(source, params, &mut |_| {}, &CancelToken::new()).unwrap()
    }

    #[test]
    fn silent_input_renders_silent() {
        let source = SampleBuffer::mono(vec![0.0; 88200], 44100).unwrap();
        for accelerated in [true, false] {
            let pipeline = OfflineRenderPipeline::new(RenderOptions { accelerated, ..Default::default() });
            let out = run(&pipeline, &source, &ParameterSet::new(1.3, 0.7, 0.9, 0.8, 0.2));
            assert_eq!(out.frame_count(), 88200);
            assert_eq!(out.sample_rate(), 44100);
            assert!(out.channels().iter().flatten().all(|&s| s == 0.0));
        }
    }

    #[test]
    fn dry_render_matches_pan_law() {
        let options = RenderOptions { normalize: false, ..Default::default() };
        let pipeline = OfflineRenderPipeline::new(options);
        let params = ParameterSet::new(0.5, 1.0, 0.4, 0.0, 0.5);
        let source = SampleBuffer::mono(vec![1.0; 8000], 8000).unwrap();
        let out = run(&pipeline, &source, &params);
        for i in (0..8000).step_by(97) {
            let phase = (i as f64 * 0.5 / 8000.0).fract();
            let (lg, rg) = pan_gains(phase, 1.0);
            assert!((out.channel(0)[i] - lg).abs() < 1e-5, "frame {i}");
            assert!((out.channel(1)[i] - rg).abs() < 1e-5, "frame {i}");
        }
    }

    #[test]
    fn wet_render_adds_tail_energy() {
        let options = RenderOptions { normalize: false, ..Default::default() };
        let pipeline = OfflineRenderPipeline::new(options);
        let mut samples = vec![0.0f32; 16000];
        samples[0] = 1.0;
        let source = SampleBuffer::mono(samples, 8000).unwrap();
        let out = run(&pipeline, &source, &ParameterSet::new(0.15, 1.0, 0.5, 0.5, 0.3));
        let tail: f32 = out.channel(0)[100..4000].iter().map(|s| s * s).sum();
        assert!(tail > 1e-3, "tail energy {tail}");
    }

    #[test]
    fn normalized_peak() {
        let source = SampleBuffer::mono((0..4000).map(|i| (i as f32 * 0.05).sin() * 0.2).collect(), 8000).unwrap();
        let out = run(&OfflineRenderPipeline::default(), &source, &ParameterSet::default());
        assert!((out.peak() - NORMALIZE_PEAK).abs() < 1e-4, "peak {}", out.peak());
    }

    #[test]
    fn seeded_render_is_deterministic() {
        let source = SampleBuffer::mono((0..3000).map(|i| ((i * 31 % 17) as f32 - 8.0) / 8.0).collect(), 8000).unwrap();
        let pipeline = OfflineRenderPipeline::default();
        let a = run(&pipeline, &source, &ParameterSet::default());
        let b = run(&pipeline, &source, &ParameterSet::default());
        assert_eq!(a, b);
    }

    #[test]
    fn echo_taps_follow_envelope() {
        let params = ParameterSet::new(0.15, 1.0, 0.6, 0.3, 0.4);
        let taps = echo_taps(&params, 44100);
        assert_eq!(taps.len(), APPROX_TAPS);
        let energy: f32 = taps.iter().map(|&(_, w)| w * w).sum();
        assert!((energy - 1.0).abs() < 1e-4);
        for pair in taps.windows(2) {
            assert!(pair[1].0 > pair[0].0);
            assert!(pair[1].1 <= pair[0].1);
        }
        let len = tail_frames(0.6, 0.4, 44100);
        assert!(taps.last().unwrap().0 < len);
    }

    #[test]
    fn approximate_reverb_is_causal() {
        let options = RenderOptions { accelerated: false, normalize: false, ..Default::default() };
        let pipeline = OfflineRenderPipeline::new(options);
        let params = ParameterSet::new(0.15, 0.0, 0.5, 1.0, 0.5);
        let mut samples = vec![0.0f32; 44100];
        samples[0] = 1.0;
        let out = run(&pipeline, &SampleBuffer::mono(samples, 44100).unwrap(), &params);
        let first_tap = echo_taps(&params, 44100)[0].0;
        assert!(out.channel(0)[1..first_tap].iter().all(|&s| s == 0.0));
        assert!(out.channel(0)[first_tap].abs() > 0.0);
    }

    #[test]
    fn colour_effects_apply() {
        let source = SampleBuffer::mono((0..8000).map(|i| (i as f32 * 0.3).sin()).collect(), 8000).unwrap();
        let plain = run(&OfflineRenderPipeline::default(), &source, &ParameterSet::default());
        let coloured = run(
            &OfflineRenderPipeline::new(RenderOptions {
                stereo_width: Some(0.8),
                vinyl_warmth: Some(0.5),
                ..Default::default()
            }),
            &source,
            &ParameterSet::default(),
        );
        assert_eq!(plain.frame_count(), coloured.frame_count());
        assert_ne!(plain.channel(1), coloured.channel(1));
    }

    #[test]
    fn cancellation_checked_at_milestones() {
        let source = SampleBuffer::mono(vec![0.1; 1000], 8000).unwrap();
        let cancel = CancelToken::new();
        let mut seen = Vec::new();
        let result = OfflineRenderPipeline::default().render(
            &source,
            &ParameterSet::default(),
            &mut |p| {
                seen.push(p);
                if p == 50 {
                    cancel.cancel();
                }
            },
            &cancel,
        );
        assert!(matches!(result, Err(SpatialError::Cancelled)));
        assert_eq!(seen, vec![25, 50]);
    }

    #[test]
    fn options_from_json() {
        let opts = RenderOptions::from_json(r#"{"normalize": false, "vinylWarmth": 0.4}"#).unwrap();
        assert!(!opts.normalize);
        assert!(opts.accelerated);
        assert_eq!(opts.vinyl_warmth, Some(0.4));
        assert_eq!(opts.seed, RenderOptions::default().seed);

        assert!(matches!(
            RenderOptions::from_json(r#"{"normalize": "yes"}"#),
            Err(SpatialError::Config(_))
        ));
    }
}
