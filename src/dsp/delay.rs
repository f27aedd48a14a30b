//! Feedback comb delay used as the in-line reverb of the realtime path.

/// Capacity of the circular delay buffer, in samples.
pub const DELAY_CAPACITY: usize = 4096;

/// Delay in samples for a room size: `floor(room_size * 2048 + 128)`.
#[inline]
pub fn comb_delay_samples(room_size: f64) -> usize {
    ((room_size * 2048.0 + 128.0).floor() as usize).min(DELAY_CAPACITY - 1)
}

/// Feedback gain for a room: `room_size * 0.6 * (1 - damping * 0.5)`.
#[inline]
pub fn comb_feedback(room_size: f64, damping: f64) -> f32 {
    (room_size * 0.6 * (1.0 - damping * 0.5)) as f32
}

/// A mono feedback comb filter over a fixed-size circular buffer.
///
/// The buffer is allocated once in [`CombDelay::new`]; nothing in the
/// per-sample path allocates.
#[derive(Debug, Clone)]
pub struct CombDelay {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl CombDelay {
    pub fn new() -> Self {
        Self {
            buffer: vec![0.0; DELAY_CAPACITY],
            write_pos: 0,
        }
    }

    /// Process one sample: returns the delayed sample and writes
    /// `input + delayed * feedback` at the write head.
    #[inline]
    pub fn process(&mut self, input: f32, delay_samples: usize, feedback: f32) -> f32 {
        let delayed = self.read(delay_samples);
        self.write(input + delayed * feedback);
        delayed
    }

    /// Like [`CombDelay::process`], but reads a blend of two taps:
    /// `from_delay` at `mix = 0` through `to_delay` at `mix = 1`.
    ///
    /// Sweeping `mix` across a block moves between delay lengths without
    /// dragging the read head through the buffer.
    #[inline]
    pub fn process_crossfade(
        &mut self,
        input: f32,
        from_delay: usize,
        to_delay: usize,
        mix: f32,
        feedback: f32,
    ) -> f32 {
        let delayed = self.read(from_delay) * (1.0 - mix) + self.read(to_delay) * mix;
        self.write(input + delayed * feedback);
        delayed
    }

    #[inline]
    fn read(&self, delay_samples: usize) -> f32 {
        let buffer_len = self.buffer.len();
        let delay_samples = delay_samples.min(buffer_len - 1);

        let read_pos = if self.write_pos >= delay_samples {
            self.write_pos - delay_samples
        } else {
            buffer_len - (delay_samples - self.write_pos)
        };
        self.buffer[read_pos]
    }

    #[inline]
    fn write(&mut self, value: f32) {
        self.buffer[self.write_pos] = value;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

impl Default for CombDelay {
    fn default() -> Self {
        Self::new()
    }
}
