//! Execution strategies for applying the spatial effect to a buffer.
//!
//! Two implementations of [`SpatialEffect`]: [`StreamingEffect`] feeds the
//! buffer through the realtime processor block by block, [`BatchEffect`]
//! renders the whole buffer offline. [`select_effect`] picks one from the
//! host's capabilities.

use serde::{Deserialize, Serialize};

use super::buffer::SampleBuffer;
use super::realtime::RealtimeSpatialProcessor;
use super::renderer::{OfflineRenderPipeline, RenderOptions};
use crate::error::{SpatialError, SpatialResult};
use crate::job::CancelToken;
use crate::params::ParameterSet;

/// Block size used when streaming a buffer through the realtime processor.
pub const STREAM_BLOCK_FRAMES: usize = 128;

/// What the host environment can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostCapabilities {
    /// A hard-realtime audio callback (AudioWorklet or native stream).
    pub realtime_callback: bool,
    /// FFT convolution is affordable.
    pub accelerated_graph: bool,
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self {
            realtime_callback: true,
            accelerated_graph: true,
        }
    }
}

impl HostCapabilities {
    /// `Err(UnsupportedRealtimePath)` when no realtime callback exists.
    pub fn require_realtime(&self) -> SpatialResult<()> {
        if self.realtime_callback {
            Ok(())
        } else {
            Err(SpatialError::UnsupportedRealtimePath)
        }
    }
}

/// Which strategy produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Streaming,
    Batch,
}

/// Apply the 8D effect to a complete buffer.
pub trait SpatialEffect {
    fn mode(&self) -> ExecutionMode;

    /// Returns a stereo buffer with the same length and rate as `source`.
    fn apply(&mut self, source: &SampleBuffer) -> SpatialResult<SampleBuffer>;
}

/// Streams a buffer through [`RealtimeSpatialProcessor`] in fixed blocks.
pub struct StreamingEffect {
    processor: RealtimeSpatialProcessor,
}

impl StreamingEffect {
    pub fn new(sample_rate: u32, params: ParameterSet) -> SpatialResult<Self> {
        Ok(Self {
            processor: RealtimeSpatialProcessor::new(sample_rate as f64, params)?,
        })
    }

    pub fn processor_mut(&mut self) -> &mut RealtimeSpatialProcessor {
        &mut self.processor
    }
}

impl SpatialEffect for StreamingEffect {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Streaming
    }

    fn apply(&mut self, source: &SampleBuffer) -> SpatialResult<SampleBuffer> {
        let mut channels = source.to_stereo().into_channels();
        let (left, right) = channels.split_at_mut(1);
        for (l, r) in left[0]
            .chunks_mut(STREAM_BLOCK_FRAMES)
            .zip(right[0].chunks_mut(STREAM_BLOCK_FRAMES))
        {
            self.processor.process_block(l, r);
        }
        SampleBuffer::from_channels(channels, source.sample_rate())
    }
}

/// Whole-buffer render through [`OfflineRenderPipeline`].
pub struct BatchEffect {
    pipeline: OfflineRenderPipeline,
    params: ParameterSet,
}

impl BatchEffect {
    pub fn new(params: ParameterSet, options: RenderOptions) -> Self {
        Self {
            pipeline: OfflineRenderPipeline::new(options),
            params,
        }
    }
}

impl SpatialEffect for BatchEffect {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Batch
    }

    fn apply(&mut self, source: &SampleBuffer) -> SpatialResult<SampleBuffer> {
        self.pipeline
            .render(source, &self.params, &mut |_| {}, &CancelToken::new())
    }
}

/// Pick the streaming strategy when a realtime callback exists, otherwise
/// the batch strategy (with convolution only if the host affords it).
pub fn select_effect(
    capabilities: &HostCapabilities,
    params: ParameterSet,
    sample_rate: u32,
) -> SpatialResult<Box<dyn SpatialEffect>> {
    match capabilities.require_realtime() {
        Ok(()) => Ok(Box::new(StreamingEffect::new(sample_rate, params)?)),
        Err(e) => {
            log::warn!("{e}; falling back to batch processing");
            let options = RenderOptions {
                accelerated: capabilities.accelerated_graph,
                normalize: false,
                ..RenderOptions::default()
            };
            Ok(Box::new(BatchEffect::new(params, options)))
        }
    }
}
