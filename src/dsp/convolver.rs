//! FFT convolution (overlap-add) for the offline reverb path.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Convolves signals against one fixed kernel using overlap-add.
///
/// The kernel spectrum is computed once; each input block of `block_len`
/// frames is transformed, multiplied and added into the output.
pub struct Convolver {
    kernel_spectrum: Vec<Complex<f32>>,
    kernel_len: usize,
    block_len: usize,
    fft_len: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

impl Convolver {
    pub fn new(kernel: &[f32]) -> Self {
        let kernel_len = kernel.len().max(1);
        let block_len = kernel_len.next_power_of_two();
        let fft_len = (block_len + kernel_len - 1).next_power_of_two();

        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(fft_len);
        let inverse = planner.plan_fft_inverse(fft_len);

        let mut kernel_spectrum: Vec<Complex<f32>> = kernel
            .iter()
            .map(|&x| Complex::new(x, 0.0))
            .chain(std::iter::repeat(Complex::new(0.0, 0.0)))
            .take(fft_len)
            .collect();
        forward.process(&mut kernel_spectrum);

        Self {
            kernel_spectrum,
            kernel_len,
            block_len,
            fft_len,
            forward,
            inverse,
        }
    }

    /// Convolve `input`, returning the first `input.len()` output frames.
    pub fn process(&self, input: &[f32]) -> Vec<f32> {
        let full_len = input.len() + self.kernel_len - 1;
        let mut output = vec![0.0f32; full_len];
        let mut scratch = vec![Complex::new(0.0f32, 0.0); self.fft_len];
        let scale = 1.0 / self.fft_len as f32;

        for (block_index, block) in input.chunks(self.block_len).enumerate() {
            if block.iter().all(|&s| s == 0.0) {
                continue;
            }
            for (slot, value) in scratch.iter_mut().zip(
                block
                    .iter()
                    .map(|&x| Complex::new(x, 0.0))
                    .chain(std::iter::repeat(Complex::new(0.0, 0.0))),
            ) {
                *slot = value;
            }

            self.forward.process(&mut scratch);
            for (s, k) in scratch.iter_mut().zip(self.kernel_spectrum.iter()) {
                *s *= *k;
            }
            self.inverse.process(&mut scratch);

            let offset = block_index * self.block_len;
            let produced = (block.len() + self.kernel_len - 1).min(full_len - offset);
            for (out, c) in output[offset..offset + produced].iter_mut().zip(scratch.iter()) {
                *out += c.re * scale;
            }
        }

        output.truncate(input.len());
        output
    }
}

/// Direct O(n·m) convolution, trimmed to the input length.
pub fn convolve_direct(input: &[f32], kernel: &[f32]) -> Vec<f32> {
    let mut output = vec![0.0f32; input.len()];
    for (i, &x) in input.iter().enumerate() {
        if x == 0.0 {
            continue;
        }
        for (j, &k) in kernel.iter().enumerate() {
            match output.get_mut(i + j) {
                Some(o) => *o += x * k,
                None => break,
            }
        }
    }
    output
}
