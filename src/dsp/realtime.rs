//! Realtime spatial processor. Runs inside the audio callback.
//!
//! Per sample: equal-power LFO pan, then a feedback comb as a cheap reverb
//! approximation, mixed wet/dry. Nothing in [`RealtimeSpatialProcessor::process_block`]
//! allocates, locks or blocks.
//!
//! Parameter updates travel from the control thread through a lock-free
//! SPSC ring buffer. They are drained at the start of each block, applied in
//! arrival order (last write wins for a field), and every parameter is ramped
//! linearly from its previous value to the new one across that block
//! (a-rate). The comb delay length is the exception: a room-size change
//! crossfades from the old read tap to the new one over the block instead
//! of sweeping the read head. The LFO phase and the delay buffer are never
//! reset by an update.

use rtrb::{Consumer, Producer, PushError, RingBuffer};

use super::delay::{CombDelay, comb_delay_samples, comb_feedback};
use super::panner::{Lfo, pan_gains};
use crate::error::SpatialResult;
use crate::params::{ParameterSet, ParameterUpdate};

/// Pending updates the control side may queue between two blocks.
pub const PARAM_QUEUE_CAPACITY: usize = 64;

/// Control-side handle for sending live parameter updates.
pub struct ParameterSender {
    producer: Producer<ParameterUpdate>,
}

impl ParameterSender {
    /// Queue an update. Returns `false` if the queue is full and the
    /// update was dropped.
    pub fn send(&mut self, update: ParameterUpdate) -> bool {
        match self.producer.push(update) {
            Ok(()) => true,
            Err(PushError::Full(_)) => {
                log::warn!("parameter queue full, dropping update");
                false
            }
        }
    }

    /// Whether the processor side has been dropped.
    pub fn is_disconnected(&self) -> bool {
        self.producer.is_abandoned()
    }
}

/// Audio-side end of the parameter queue.
pub struct ParameterReceiver {
    consumer: Consumer<ParameterUpdate>,
}

/// Create a connected sender/receiver pair.
pub fn parameter_channel() -> (ParameterSender, ParameterReceiver) {
    let (producer, consumer) = RingBuffer::new(PARAM_QUEUE_CAPACITY);
    (ParameterSender { producer }, ParameterReceiver { consumer })
}

/// Streaming 8D processor for a hard-realtime callback.
pub struct RealtimeSpatialProcessor {
    lfo: Lfo,
    comb: CombDelay,
    /// Parameters in effect at the end of the last processed block.
    current: ParameterSet,
    /// Parameters the next block ramps towards.
    target: ParameterSet,
    receiver: Option<ParameterReceiver>,
    sample_rate: f64,
}

impl RealtimeSpatialProcessor {
    /// Create a processor. All buffers are allocated here.
    ///
    /// Fails with `InvalidBuffer` for a zero, negative or non-finite
    /// sample rate.
    pub fn new(sample_rate: f64, params: ParameterSet) -> SpatialResult<Self> {
        Ok(Self {
            lfo: Lfo::new(sample_rate)?,
            comb: CombDelay::new(),
            current: params,
            target: params,
            receiver: None,
            sample_rate,
        })
    }

    /// Create a processor that drains `receiver` at every block boundary.
    pub fn with_receiver(
        sample_rate: f64,
        params: ParameterSet,
        receiver: ParameterReceiver,
    ) -> SpatialResult<Self> {
        let mut p = Self::new(sample_rate, params)?;
        p.receiver = Some(receiver);
        Ok(p)
    }

    /// Apply an update directly. Used when the owner of the processor is
    /// itself the audio thread (e.g. an AudioWorklet message handler).
    /// Takes effect from the next block.
    pub fn set_params(&mut self, update: &ParameterUpdate) {
        self.target = self.target.apply(update);
    }

    /// Parameters in effect after the last block.
    pub fn params(&self) -> ParameterSet {
        self.current
    }

    pub fn phase(&self) -> f64 {
        self.lfo.phase()
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Process a stereo block in place. For mono sources pass the same
    /// samples in both slices.
    pub fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.drain_updates();

        let frames = left.len().min(right.len());
        let start = self.current;
        let end = self.target;
        let from_delay = comb_delay_samples(start.room_size());
        let to_delay = comb_delay_samples(end.room_size());

        if start == end {
            for i in 0..frames {
                (left[i], right[i]) = self.process_frame(left[i], right[i], &start, (from_delay, to_delay), 1.0);
            }
        } else {
            for i in 0..frames {
                let t = (i + 1) as f64 / frames as f64;
                let params = start.lerp(&end, t);
                (left[i], right[i]) = self.process_frame(left[i], right[i], &params, (from_delay, to_delay), t as f32);
            }
        }

        if frames > 0 {
            self.current = end;
        }
    }

    /// Clear the reverb state without touching phase or parameters.
    pub fn clear(&mut self) {
        self.comb.clear();
    }

    fn drain_updates(&mut self) {
        if let Some(receiver) = &mut self.receiver {
            while let Ok(update) = receiver.consumer.pop() {
                self.target = self.target.apply(&update);
            }
        }
    }

    #[inline]
    fn process_frame(
        &mut self,
        left: f32,
        right: f32,
        params: &ParameterSet,
        (from_delay, to_delay): (usize, usize),
        tap_mix: f32,
    ) -> (f32, f32) {
        let (lg, rg) = pan_gains(self.lfo.phase(), params.pan_depth());
        let panned_l = left * lg;
        let panned_r = right * rg;

        let input = (panned_l + panned_r) * 0.5;
        let feedback = comb_feedback(params.room_size(), params.damping());
        let delayed = if from_delay == to_delay {
            self.comb.process(input, to_delay, feedback)
        } else {
            self.comb.process_crossfade(input, from_delay, to_delay, tap_mix, feedback)
        };

        let wet = params.wet_level() as f32;
        let out_l = panned_l * (1.0 - wet) + delayed * wet;
        let out_r = panned_r * (1.0 - wet) + delayed * wet;

        self.lfo.advance(params.pan_speed());
        (out_l, out_r)
    }
}
