//! Planar sample buffer shared by every stage of the pipeline.

use crate::error::{SpatialError, SpatialResult};

/// Planar multi-channel f32 audio (mono or stereo).
///
/// All channel vectors have the same length. Sample values are not
/// clamped here; clamping happens when the buffer is encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl SampleBuffer {
    /// Build a buffer from per-channel sample vectors.
    pub fn from_channels(channels: Vec<Vec<f32>>, sample_rate: u32) -> SpatialResult<Self> {
        if channels.is_empty() || channels.len() > 2 {
            return Err(SpatialError::InvalidBuffer(format!(
                "expected 1 or 2 channels, got {}",
                channels.len()
            )));
        }
        if sample_rate == 0 {
            return Err(SpatialError::InvalidBuffer("sample rate must be positive".into()));
        }
        let len = channels[0].len();
        if channels.iter().any(|c| c.len() != len) {
            return Err(SpatialError::InvalidBuffer("channel lengths differ".into()));
        }
        Ok(Self { channels, sample_rate })
    }

    /// A mono buffer.
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> SpatialResult<Self> {
        Self::from_channels(vec![samples], sample_rate)
    }

    /// A stereo buffer from separate left/right vectors.
    pub fn stereo(left: Vec<f32>, right: Vec<f32>, sample_rate: u32) -> SpatialResult<Self> {
        Self::from_channels(vec![left, right], sample_rate)
    }

    /// A zero-filled buffer.
    pub fn silent(channel_count: usize, frames: usize, sample_rate: u32) -> SpatialResult<Self> {
        Self::from_channels(vec![vec![0.0; frames]; channel_count], sample_rate)
    }

    /// Split an interleaved sample stream into a planar buffer.
    pub fn from_interleaved(samples: &[f32], channel_count: usize, sample_rate: u32) -> SpatialResult<Self> {
        if channel_count == 0 {
            return Err(SpatialError::InvalidBuffer("channel count must be positive".into()));
        }
        let frames = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in samples.chunks_exact(channel_count) {
            for (ch, &s) in frame.iter().enumerate() {
                channels[ch].push(s);
            }
        }
        Self::from_channels(channels, sample_rate)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frame_count(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.channels[index]
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Left and right channels. A mono buffer returns its only channel twice.
    pub fn left_right(&self) -> (&[f32], &[f32]) {
        let left: &[f32] = &self.channels[0];
        let right = self.channels.get(1).map(Vec::as_slice).unwrap_or(left);
        (left, right)
    }

    /// Copy out a stereo version of this buffer (mono is duplicated).
    pub fn to_stereo(&self) -> SampleBuffer {
        let (left, right) = self.left_right();
        SampleBuffer {
            channels: vec![left.to_vec(), right.to_vec()],
            sample_rate: self.sample_rate,
        }
    }

    /// Copy frames `[start, end)` into a new buffer.
    pub fn slice_frames(&self, start: usize, end: usize) -> SampleBuffer {
        let end = end.min(self.frame_count());
        let start = start.min(end);
        SampleBuffer {
            channels: self.channels.iter().map(|c| c[start..end].to_vec()).collect(),
            sample_rate: self.sample_rate,
        }
    }

    /// Largest absolute sample value across all channels.
    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flat_map(|c| c.iter())
            .fold(0.0f32, |acc, &s| acc.max(s.abs()))
    }

    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }
}
