//! Offline render jobs: state machine, progress milestones and cancellation.
//!
//! A job walks `Decoding → Rendering → Encoding → Complete`, or ends early
//! in `Failed` / `Cancelled`. Cancellation is cooperative and checked at
//! every progress milestone; a cancelled or failed job never exposes
//! output.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::decode::decode_audio;
use crate::dsp::buffer::SampleBuffer;
use crate::dsp::renderer::{OfflineRenderPipeline, RenderOptions};
use crate::error::{SpatialError, SpatialResult};
use crate::params::ParameterSet;
use crate::wav::encode_wav;

/// Progress percentages reported over a job's life.
pub const MILESTONES: [u8; 5] = [0, 25, 50, 75, 100];

/// Shared cooperative-cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// `Err(Cancelled)` once cancellation has been requested.
    pub fn check(&self) -> SpatialResult<()> {
        if self.is_cancelled() {
            Err(SpatialError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Lifecycle of a render job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Decoding,
    Rendering,
    Encoding,
    Complete,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Complete | JobState::Failed | JobState::Cancelled)
    }
}

/// Terminal signal handed to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Done,
    Error,
    Cancelled,
}

enum JobSource {
    Encoded(Vec<u8>),
    Decoded(SampleBuffer),
}

/// One offline conversion request.
pub struct RenderJob {
    source: Option<JobSource>,
    params: ParameterSet,
    options: RenderOptions,
    state: JobState,
    cancel: CancelToken,
    output: Option<Vec<u8>>,
    error: Option<SpatialError>,
}

impl RenderJob {
    /// A job over encoded source bytes (decoded when the job runs).
    pub fn from_bytes(bytes: Vec<u8>, params: ParameterSet, options: RenderOptions) -> Self {
        Self::with_source(JobSource::Encoded(bytes), params, options)
    }

    /// A job over an already-decoded buffer.
    pub fn from_buffer(buffer: SampleBuffer, params: ParameterSet, options: RenderOptions) -> Self {
        Self::with_source(JobSource::Decoded(buffer), params, options)
    }

    fn with_source(source: JobSource, params: ParameterSet, options: RenderOptions) -> Self {
        Self {
            source: Some(source),
            params,
            options,
            state: JobState::Pending,
            cancel: CancelToken::new(),
            output: None,
            error: None,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    /// Token another thread can use to cancel this job.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Encoded WAV bytes, only after the job completed.
    pub fn output(&self) -> Option<&[u8]> {
        self.output.as_deref()
    }

    pub fn take_output(&mut self) -> Option<Vec<u8>> {
        self.output.take()
    }

    /// The failure behind a `Failed` job.
    pub fn error(&self) -> Option<&SpatialError> {
        self.error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<SpatialError> {
        self.error.take()
    }

    /// Run the job to a terminal state, reporting milestones to `progress`.
    ///
    /// A job runs once; calling `run` again returns the existing terminal
    /// status.
    pub fn run(&mut self, mut progress: impl FnMut(u8)) -> JobStatus {
        if self.state.is_terminal() || self.source.is_none() {
            return self.status();
        }

        match self.execute(&mut progress) {
            Ok(bytes) => {
                self.output = Some(bytes);
                self.state = JobState::Complete;
                log::info!("render job complete");
            }
            Err(SpatialError::Cancelled) => {
                self.output = None;
                self.state = JobState::Cancelled;
                log::info!("render job cancelled");
            }
            Err(e) => {
                log::warn!("render job failed: {e}");
                self.output = None;
                self.error = Some(e);
                self.state = JobState::Failed;
            }
        }
        self.status()
    }

    fn status(&self) -> JobStatus {
        match self.state {
            JobState::Complete => JobStatus::Done,
            JobState::Cancelled => JobStatus::Cancelled,
            _ => JobStatus::Error,
        }
    }

    fn execute(&mut self, progress: &mut dyn FnMut(u8)) -> SpatialResult<Vec<u8>> {
        self.state = JobState::Decoding;
        progress(MILESTONES[0]);
        self.cancel.check()?;
        let source = self.decode_source()?;

        self.state = JobState::Rendering;
        let pipeline = OfflineRenderPipeline::new(self.options.clone());
        let rendered = pipeline.render(&source, &self.params, progress, &self.cancel)?;

        self.state = JobState::Encoding;
        let bytes = encode_wav(&rendered)?;
        self.cancel.check()?;

        progress(MILESTONES[4]);
        Ok(bytes)
    }

    /// Decoding stage. A cancel that lands while decoding stops the job
    /// here rather than after the render.
    fn decode_source(&mut self) -> SpatialResult<SampleBuffer> {
        let source = match self.source.take() {
            Some(JobSource::Encoded(bytes)) => decode_audio(&bytes)?,
            Some(JobSource::Decoded(buffer)) => buffer,
            None => return Err(SpatialError::InvalidBuffer("job has no source".into())),
        };
        log::debug!(
            "decoded source: {} ch, {} Hz, {} frames",
            source.channel_count(),
            source.sample_rate(),
            source.frame_count()
        );
        self.cancel.check()?;
        Ok(source)
    }
}
