//! Preview excerpt selection and source trimming.

use serde::{Deserialize, Serialize};

use crate::dsp::buffer::SampleBuffer;

/// Longest excerpt handed to the live preview, in seconds.
pub const MAX_PREVIEW_SECONDS: f64 = 60.0;

/// User trim bounds in seconds. `end <= 0` means "to the end of the file".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrimWindow {
    #[serde(default)]
    pub start: f64,
    #[serde(default)]
    pub end: f64,
}

impl TrimWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// The whole file.
    pub fn full() -> Self {
        Self::default()
    }
}

/// Resolved preview window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcerptWindow {
    pub start_seconds: f64,
    pub duration_seconds: f64,
}

impl ExcerptWindow {
    /// Resolve `trim` against a source of `source_duration` seconds at
    /// `sample_rate`, capping the window at `max_preview`.
    ///
    /// The window always spans at least one frame. A start at or past the
    /// end is pulled back to the last frame.
    pub fn resolve(trim: &TrimWindow, source_duration: f64, sample_rate: u32, max_preview: f64) -> Self {
        let frame = if sample_rate > 0 { 1.0 / sample_rate as f64 } else { 0.0 };
        let last_start = (source_duration - frame).max(0.0);
        let start = if trim.start.is_finite() { trim.start.clamp(0.0, last_start) } else { 0.0 };
        let trim_end = if trim.end > 0.0 && trim.end < source_duration {
            trim.end
        } else {
            source_duration
        };
        let duration = (trim_end - start).min(max_preview).min(source_duration - start);
        Self {
            start_seconds: start,
            duration_seconds: duration.max(frame),
        }
    }
}

/// Copy the preview excerpt of `source` for the given trim, capped at 60 s.
pub fn select_excerpt(source: &SampleBuffer, trim: &TrimWindow) -> SampleBuffer {
    select_excerpt_with_limit(source, trim, MAX_PREVIEW_SECONDS)
}

/// As [`select_excerpt`] with an explicit cap. Always returns at least one
/// frame; an empty source yields a single silent frame.
pub fn select_excerpt_with_limit(source: &SampleBuffer, trim: &TrimWindow, max_preview: f64) -> SampleBuffer {
    let rate = source.sample_rate() as f64;
    let total = source.frame_count();
    if total == 0 {
        return SampleBuffer::from_channels(vec![vec![0.0]; source.channel_count()], source.sample_rate())
            .unwrap_or_else(|_| source.clone());
    }

    let window = ExcerptWindow::resolve(trim, source.duration(), source.sample_rate(), max_preview);
    let start = ((window.start_seconds * rate).round() as usize).min(total - 1);
    let frames = ((window.duration_seconds * rate) as usize).max(1);
    let end = (start + frames).min(total);
    source.slice_frames(start, end)
}

/// Cut `source` to `[start_sec, end_sec)`.
///
/// `start_sec <= 0` with `end_sec <= 0` (or past the end) returns the
/// source unchanged, as does an empty or inverted window.
pub fn trim(source: &SampleBuffer, start_sec: f64, end_sec: f64) -> SampleBuffer {
    let total_duration = source.duration();
    let to_end = end_sec <= 0.0 || end_sec >= total_duration;
    if start_sec <= 0.0 && to_end {
        return source.clone();
    }

    let rate = source.sample_rate() as f64;
    let start = (start_sec.max(0.0) * rate) as usize;
    let end = if to_end {
        source.frame_count()
    } else {
        ((end_sec * rate) as usize).min(source.frame_count())
    };
    if start >= end {
        return source.clone();
    }
    source.slice_frames(start, end)
}
