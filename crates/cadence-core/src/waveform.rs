//! Coarse 128-sample visualization stream derived from the raw input
//! (§6 `onWaveform`), independent of the feature-extraction paths.
//!
//! Band-energy split follows the teacher's `FftAnalyzer`/`FftResolution`
//! three-band (low/mid/high) energy convention: one fixed-size,
//! Hann-windowed FFT planned once at construction, fed from the tail of
//! whatever samples arrive in a `push_samples` call (zero-padded if a
//! chunk is shorter than the window, truncated to its most recent
//! samples if longer) — the same "plan once, reuse against a rolling
//! window" shape `FftResolution::compute` uses against its own
//! longer-lived time-domain buffer.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

use crate::fft::hann_window;

const LOW_HZ: f64 = 250.0;
const HIGH_HZ: f64 = 2_000.0;
const INPUT_SR: f64 = 44_100.0;
/// Fixed band-energy analysis window, plan once / reuse forever.
const FFT_SIZE: usize = 2_048;

/// Plain-old-data layout so a host bridge can hand this across an FFI
/// boundary with `bytemuck::bytes_of` instead of a hand-rolled field-by-
/// field copy, the way the teacher packs its GPU uniform buffers.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct WaveformSummary {
    pub samples: [f32; 128],
    pub peak: f32,
    pub rms: f32,
    pub low: f32,
    pub mid: f32,
    pub high: f32,
}

/// Owns the band-energy FFT plan and its scratch buffers, planned once
/// at construction (`FftPlanner::plan_fft_forward`) rather than per
/// `push_samples` chunk.
pub struct WaveformSummarizer {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buf: Vec<Complex<f32>>,
}

impl Default for WaveformSummarizer {
    fn default() -> Self {
        Self::new()
    }
}

impl WaveformSummarizer {
    pub fn new() -> Self {
        let mut planner = FftPlanner::new();
        Self {
            fft: planner.plan_fft_forward(FFT_SIZE),
            window: hann_window(FFT_SIZE),
            buf: vec![Complex::new(0.0, 0.0); FFT_SIZE],
        }
    }

    /// Summarizes one chunk of raw 44.1 kHz samples. Returns `None` for
    /// an empty chunk (nothing to visualize).
    pub fn summarize(&mut self, chunk: &[f32]) -> Option<WaveformSummary> {
        if chunk.is_empty() {
            return None;
        }

        let mut samples = [0.0f32; 128];
        for (i, slot) in samples.iter_mut().enumerate() {
            let idx = (i * chunk.len()) / 128;
            *slot = chunk[idx.min(chunk.len() - 1)];
        }

        let peak = chunk.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()));
        let mean_sq: f32 = chunk.iter().map(|&s| s * s).sum::<f32>() / chunk.len() as f32;
        let rms = mean_sq.sqrt();

        let (low, mid, high) = self.band_energies(chunk);

        Some(WaveformSummary {
            samples,
            peak,
            rms,
            low,
            mid,
            high,
        })
    }

    /// Feeds the most recent `FFT_SIZE` samples of `chunk` (zero-padded
    /// on the left if shorter) through the owned plan, mirroring
    /// `FftResolution::compute`'s "take the tail of the time-domain
    /// buffer" framing.
    fn band_energies(&mut self, chunk: &[f32]) -> (f32, f32, f32) {
        let offset = chunk.len().saturating_sub(FFT_SIZE);
        let tail = &chunk[offset..];
        let n = tail.len();

        for i in 0..FFT_SIZE {
            let s = if i < n { tail[i] } else { 0.0 };
            self.buf[i] = Complex::new(s * self.window[i], 0.0);
        }
        self.fft.process(&mut self.buf);

        let nyquist_bin = FFT_SIZE / 2;
        let bin_hz = INPUT_SR / FFT_SIZE as f64;

        let mut low = 0.0f64;
        let mut mid = 0.0f64;
        let mut high = 0.0f64;
        for (k, c) in self.buf.iter().take(nyquist_bin).enumerate() {
            let freq = k as f64 * bin_hz;
            let energy = (c.norm() as f64).powi(2);
            if freq < LOW_HZ {
                low += energy;
            } else if freq < HIGH_HZ {
                mid += energy;
            } else {
                high += energy;
            }
        }

        let total = low + mid + high;
        if total <= 1e-12 {
            return (0.0, 0.0, 0.0);
        }
        ((low / total) as f32, (mid / total) as f32, (high / total) as f32)
    }
}
