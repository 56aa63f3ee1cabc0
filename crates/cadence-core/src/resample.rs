//! Streaming 2:1 polyphase downsampler, 44 100 Hz -> 22 050 Hz.
//!
//! A 127-tap windowed-sinc low-pass (Blackman window, cutoff at 0.45 of
//! the input Nyquist) followed by keeping every other output sample.
//! The filter is symmetric (a linear-phase FIR design), so unlike an
//! IIR stage there is no direction-dependent state beyond the last 126
//! input samples — which is exactly what streaming mode retains between
//! calls, per spec §4.3.

const NTAPS: usize = 127;
const CUTOFF_OVER_NYQUIST: f64 = 0.45;

pub struct Downsampler {
    taps: [f32; NTAPS],
    /// Last `NTAPS - 1` input samples from the previous call (or zeros
    /// before the first call / after `reset`).
    history: [f32; NTAPS - 1],
    /// Parity of the next absolute input sample index, used to keep the
    /// decimation phase consistent across calls regardless of how the
    /// caller chunks the stream.
    next_index: u64,
}

impl Default for Downsampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Downsampler {
    pub fn new() -> Self {
        Self {
            taps: design_filter(),
            history: [0.0; NTAPS - 1],
            next_index: 0,
        }
    }

    /// Feeds `input` (at 44 100 Hz) and appends the resulting 22 050 Hz
    /// samples to `out`.
    pub fn process(&mut self, input: &[f32], out: &mut Vec<f32>) {
        if input.is_empty() {
            return;
        }

        // ext[0..NTAPS-1] = history, ext[NTAPS-1 + j] = input[j]
        let mut ext = Vec::with_capacity(input.len() + NTAPS - 1);
        ext.extend_from_slice(&self.history);
        ext.extend_from_slice(input);

        for (j, _) in input.iter().enumerate() {
            let global = self.next_index + j as u64;
            if global % 2 != 0 {
                continue;
            }
            // Window ext[j .. j + NTAPS) is the NTAPS most recent samples
            // ending at (and including) input[j].
            let mut acc = 0.0f32;
            for (k, &tap) in self.taps.iter().enumerate() {
                acc += tap * ext[j + NTAPS - 1 - k];
            }
            out.push(acc);
        }

        let len = ext.len();
        self.history.copy_from_slice(&ext[len - (NTAPS - 1)..]);
        self.next_index += input.len() as u64;
    }

    pub fn reset(&mut self) {
        self.history = [0.0; NTAPS - 1];
        self.next_index = 0;
    }
}

/// Designs the windowed-sinc low-pass: ideal sinc response truncated to
/// `NTAPS` taps, centered, multiplied by a Blackman window, and
/// normalized to unity DC gain.
fn design_filter() -> [f32; NTAPS] {
    let m = (NTAPS - 1) as f64; // 126
    let center = m / 2.0;
    // cutoff expressed as a fraction of the sample rate (fc/fs); the
    // spec gives it as a fraction of Nyquist (fc/(fs/2)).
    let fc_over_fs = CUTOFF_OVER_NYQUIST / 2.0;

    let mut taps = [0.0f64; NTAPS];
    for (n, tap) in taps.iter_mut().enumerate() {
        let x = n as f64 - center;
        let sinc = if x.abs() < 1e-12 {
            2.0 * fc_over_fs
        } else {
            (2.0 * std::f64::consts::PI * fc_over_fs * x).sin() / (std::f64::consts::PI * x)
        };
        let blackman = 0.42 - 0.5 * (2.0 * std::f64::consts::PI * n as f64 / m).cos()
            + 0.08 * (4.0 * std::f64::consts::PI * n as f64 / m).cos();
        *tap = sinc * blackman;
    }

    let sum: f64 = taps.iter().sum();
    let mut out = [0.0f32; NTAPS];
    for (o, t) in out.iter_mut().zip(taps.iter()) {
        *o = (t / sum) as f32;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dc_gain_is_unity() {
        let mut ds = Downsampler::new();
        let input = vec![1.0f32; 4000];
        let mut out = Vec::new();
        ds.process(&input, &mut out);
        // after the filter settles the output should converge to ~1.0
        let tail_avg: f32 = out[out.len() - 100..].iter().sum::<f32>() / 100.0;
        assert!((tail_avg - 1.0).abs() < 0.01, "tail_avg = {tail_avg}");
    }

    #[test]
    fn halves_sample_count_in_steady_state() {
        let mut ds = Downsampler::new();
        let input = vec![0.0f32; 2000];
        let mut out = Vec::new();
        ds.process(&input, &mut out);
        assert_eq!(out.len(), 1000);
    }

    #[test]
    fn reset_zeroes_history() {
        let mut ds = Downsampler::new();
        let mut out = Vec::new();
        ds.process(&[1.0; 200], &mut out);
        ds.reset();
        assert_eq!(ds.history, [0.0; NTAPS - 1]);
        assert_eq!(ds.next_index, 0);
    }

    #[test]
    fn chunking_does_not_change_output() {
        let input: Vec<f32> = (0..3000)
            .map(|i| (i as f32 * 0.01).sin())
            .collect();

        let mut whole = Downsampler::new();
        let mut out_whole = Vec::new();
        whole.process(&input, &mut out_whole);

        let mut chunked = Downsampler::new();
        let mut out_chunked = Vec::new();
        for chunk in input.chunks(97) {
            chunked.process(chunk, &mut out_chunked);
        }

        assert_eq!(out_whole.len(), out_chunked.len());
        for (a, b) in out_whole.iter().zip(out_chunked.iter()) {
            assert!((a - b).abs() < 1e-6, "{a} vs {b}");
        }
    }
}
