//! Shared real-to-complex DFT primitive.
//!
//! One instance is owned per size by each extractor that needs it (mel,
//! autocorrelation), matching how `FftResolution` in the teacher's
//! `audio::analyzer` owns one `Arc<dyn Fft<f32>>` per resolution rather
//! than reaching for a process-wide cache. `rustfft` plans arbitrary
//! lengths (falling back to Bluestein's algorithm for non-power-of-two
//! sizes), so this primitive is not restricted to powers of two.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// A forward+inverse FFT pair of a fixed length, with scratch buffers
/// pre-allocated at construction.
pub struct FftPrimitive {
    len: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl FftPrimitive {
    pub fn new(len: usize) -> Self {
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(len);
        let inverse = planner.plan_fft_inverse(len);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());
        Self {
            len,
            forward,
            inverse,
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// In-place forward transform.
    pub fn forward(&mut self, buf: &mut [Complex<f32>]) {
        self.forward.process_with_scratch(buf, &mut self.scratch);
    }

    /// In-place inverse transform. Output is NOT normalized by `len`;
    /// callers divide by `len` (or by lag-0 energy, as the
    /// autocorrelation estimator does) as appropriate.
    pub fn inverse(&mut self, buf: &mut [Complex<f32>]) {
        self.inverse.process_with_scratch(buf, &mut self.scratch);
    }
}

/// Symmetric Hann window of length `n`, matching the teacher's
/// `audio::analyzer::FftResolution::new` construction
/// (`0.5 * (1 - cos(2*pi*i/(n-1)))`).
pub fn hann_window(n: usize) -> Vec<f32> {
    if n <= 1 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (n - 1) as f32).cos()))
        .collect()
}

/// Periodic Hann window of length `n` (DFT-even: the symmetric window's
/// first `n` samples of an `n+1`-point window). Used by the CQT kernel
/// bank, per spec: "periodic Hann window".
pub fn periodic_hann_window(n: usize) -> Vec<f32> {
    if n <= 1 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n as f32).cos()))
        .collect()
}
