//! Live preview: a looped excerpt played through the realtime processor.
//!
//! [`PreviewHost::start`] splits a preview into two halves: the
//! [`PreviewController`] stays on the control thread and pushes parameter
//! updates, the [`PreviewRenderer`] moves into the audio callback. A host
//! runs at most one preview at a time; stopping either half or dropping
//! the renderer frees the slot.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::dsp::buffer::SampleBuffer;
use crate::dsp::realtime::{ParameterSender, RealtimeSpatialProcessor, parameter_channel};
use crate::dsp::renderer::RenderOptions;
use crate::dsp::strategy::{BatchEffect, HostCapabilities, SpatialEffect};
use crate::error::{SpatialError, SpatialResult};
use crate::excerpt::{TrimWindow, select_excerpt};
use crate::params::{ParameterSet, ParameterUpdate};

/// Owns the single preview slot for one host environment.
#[derive(Debug, Default)]
pub struct PreviewHost {
    capabilities: HostCapabilities,
    session: Option<Arc<AtomicBool>>,
}

/// Result of [`PreviewHost::start_or_render`].
pub enum Preview {
    Live {
        controller: PreviewController,
        renderer: PreviewRenderer,
    },
    /// The host has no realtime callback; the excerpt was rendered in one go.
    Rendered(SampleBuffer),
}

impl PreviewHost {
    pub fn new(capabilities: HostCapabilities) -> Self {
        Self {
            capabilities,
            session: None,
        }
    }

    pub fn capabilities(&self) -> HostCapabilities {
        self.capabilities
    }

    pub fn is_active(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.load(Ordering::Acquire))
    }

    /// Start a live preview of `source` trimmed by `trim`.
    ///
    /// Fails with `UnsupportedRealtimePath` when the host has no realtime
    /// callback and with `PreviewBusy` while another preview is running.
    pub fn start(
        &mut self,
        source: &SampleBuffer,
        trim: &TrimWindow,
        params: ParameterSet,
    ) -> SpatialResult<(PreviewController, PreviewRenderer)> {
        self.capabilities.require_realtime()?;
        if self.is_active() {
            return Err(SpatialError::PreviewBusy);
        }

        let excerpt = select_excerpt(source, trim).to_stereo();
        let (sender, receiver) = parameter_channel();
        let running = Arc::new(AtomicBool::new(true));
        let processor = RealtimeSpatialProcessor::with_receiver(excerpt.sample_rate() as f64, params, receiver)?;

        log::info!(
            "preview started: {:.2}s excerpt at {} Hz",
            excerpt.duration(),
            excerpt.sample_rate()
        );
        self.session = Some(running.clone());

        Ok((
            PreviewController {
                sender,
                running: running.clone(),
            },
            PreviewRenderer {
                excerpt,
                position: 0,
                processor,
                running,
            },
        ))
    }

    /// Start a live preview, or render the excerpt offline when the host
    /// cannot run one.
    pub fn start_or_render(
        &mut self,
        source: &SampleBuffer,
        trim: &TrimWindow,
        params: ParameterSet,
    ) -> SpatialResult<Preview> {
        match self.start(source, trim, params) {
            Ok((controller, renderer)) => Ok(Preview::Live { controller, renderer }),
            Err(SpatialError::UnsupportedRealtimePath) => {
                log::warn!("no realtime callback; rendering preview offline");
                let options = RenderOptions {
                    accelerated: self.capabilities.accelerated_graph,
                    ..RenderOptions::default()
                };
                let excerpt = select_excerpt(source, trim);
                let rendered = BatchEffect::new(params, options).apply(&excerpt)?;
                Ok(Preview::Rendered(rendered))
            }
            Err(e) => Err(e),
        }
    }

    /// Stop the running preview, if any.
    pub fn stop(&mut self) {
        if let Some(session) = self.session.take() {
            session.store(false, Ordering::Release);
            log::info!("preview stopped");
        }
    }
}

/// Control-thread half of a running preview.
pub struct PreviewController {
    sender: ParameterSender,
    running: Arc<AtomicBool>,
}

impl PreviewController {
    /// Queue a parameter change. Returns false if the preview has stopped
    /// or the queue is full.
    pub fn update(&mut self, update: ParameterUpdate) -> bool {
        if !self.is_running() {
            return false;
        }
        self.sender.send(update)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire) && !self.sender.is_disconnected()
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Audio-callback half of a running preview.
pub struct PreviewRenderer {
    excerpt: SampleBuffer,
    position: usize,
    processor: RealtimeSpatialProcessor,
    running: Arc<AtomicBool>,
}

impl PreviewRenderer {
    /// Fill one block with the looped, processed excerpt.
    ///
    /// Writes silence and returns false once the preview has been stopped.
    pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) -> bool {
        if !self.running.load(Ordering::Acquire) {
            left.fill(0.0);
            right.fill(0.0);
            return false;
        }

        let (src_l, src_r) = self.excerpt.left_right();
        let len = src_l.len();
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            *l = src_l[self.position];
            *r = src_r[self.position];
            self.position += 1;
            if self.position >= len {
                self.position = 0;
            }
        }
        self.processor.process_block(left, right);
        true
    }

    pub fn excerpt(&self) -> &SampleBuffer {
        &self.excerpt
    }

    /// Parameters in effect at the end of the last block.
    pub fn params(&self) -> ParameterSet {
        self.processor.params()
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

impl Drop for PreviewRenderer {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_1_SQRT_2;

    fn counting(frames: usize) -> SampleBuffer {
        SampleBuffer::mono((0..frames).map(|i| i as f32 / frames as f32).collect(), 8000).unwrap()
    }

    fn centered() -> ParameterSet {
        ParameterSet::new(0.5, 0.0, 0.4, 0.0, 0.5)
    }

    #[test]
    fn second_preview_is_busy_until_stopped() {
        let mut host = PreviewHost::default();
        let src = counting(800);
        let (_ctl, _r) = host.start(&src, &TrimWindow::full(), centered()).unwrap();
        assert!(host.is_active());
        assert!(matches!(
            host.start(&src, &TrimWindow::full(), centered()),
            Err(SpatialError::PreviewBusy)
        ));

        host.stop();
        assert!(!host.is_active());
        assert!(host.start(&src, &TrimWindow::full(), centered()).is_ok());
    }

    #[test]
    fn dropping_renderer_frees_slot() {
        let mut host = PreviewHost::default();
        let src = counting(100);
        let (ctl, renderer) = host.start(&src, &TrimWindow::full(), centered()).unwrap();
        drop(renderer);
        assert!(!host.is_active());
        assert!(!ctl.is_running());
        assert!(host.start(&src, &TrimWindow::full(), centered()).is_ok());
    }

    #[test]
    fn loops_the_excerpt() {
        let mut host = PreviewHost::default();
        let src = counting(100);
        let (_ctl, mut renderer) = host.start(&src, &TrimWindow::full(), centered()).unwrap();
        let mut left = vec![0.0f32; 250];
        let mut right = vec![0.0f32; 250];
        assert!(renderer.render(&mut left, &mut right));
        for i in [0usize, 57, 100, 199, 249] {
            let expected = (i % 100) as f32 / 100.0 * FRAC_1_SQRT_2;
            assert!((left[i] - expected).abs() < 1e-5, "frame {i}: {}", left[i]);
            assert!((right[i] - expected).abs() < 1e-5);
        }
        assert_eq!(renderer.position(), 50);
    }

    #[test]
    fn updates_reach_the_processor() {
        let mut host = PreviewHost::default();
        let (mut ctl, mut renderer) = host.start(&counting(400), &TrimWindow::full(), centered()).unwrap();
        assert!(ctl.update(ParameterUpdate {
            wet_level: Some(0.8),
            ..Default::default()
        }));
        let mut left = vec![0.0f32; 128];
        let mut right = vec![0.0f32; 128];
        renderer.render(&mut left, &mut right);
        assert!((renderer.params().wet_level() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn stopped_renderer_is_silent() {
        let mut host = PreviewHost::default();
        let (ctl, mut renderer) = host.start(&counting(400), &TrimWindow::full(), centered()).unwrap();
        ctl.stop();
        let mut left = vec![1.0f32; 64];
        let mut right = vec![1.0f32; 64];
        assert!(!renderer.render(&mut left, &mut right));
        assert!(left.iter().chain(right.iter()).all(|&s| s == 0.0));
        assert!(!host.is_active());
    }

    #[test]
    fn falls_back_to_rendered_excerpt() {
        let caps = HostCapabilities {
            realtime_callback: false,
            accelerated_graph: false,
        };
        let mut host = PreviewHost::new(caps);
        let src = counting(8000 * 3);
        assert!(matches!(
            host.start(&src, &TrimWindow::full(), centered()),
            Err(SpatialError::UnsupportedRealtimePath)
        ));
        match host.start_or_render(&src, &TrimWindow::new(1.0, 2.0), centered()).unwrap() {
            Preview::Rendered(buffer) => {
                assert_eq!(buffer.frame_count(), 8000);
                assert_eq!(buffer.channel_count(), 2);
            }
            Preview::Live { .. } => panic!("expected an offline render"),
        }
        assert!(!host.is_active());
    }
}
