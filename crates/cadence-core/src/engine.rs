//! Public orchestrator (§4.1): fans input samples to the CQT/key path
//! and the downsample/mel/recurrent/BPM path, holds published state,
//! and exposes the query/event surface.
//!
//! Scalar queries (`current_bpm`, `frame_count`, `key_frame_count`) are
//! published through atomics rather than behind a lock, following the
//! teacher's `capture::RingBuffer` preference for plain atomic counters
//! over a hand-rolled lock-free structure; `current_key` carries a
//! heap-allocated string pair so it is published behind a
//! `std::sync::Mutex` instead — a short critical section on the
//! `push_samples` thread, never blocking on I/O, same as the rest of
//! the audio path (§5).

use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use crate::autocorr::ActivationBuffer;
use crate::cqt::{CqtExtractor, NUM_BINS as CQT_BINS};
use crate::error::{EngineError, EngineResult};
use crate::event::{EngineEvent, ErrorKind, EventSink, FrameResult, KeyResult};
use crate::mel::MelExtractor;
use crate::model::beat::BeatModel;
use crate::model::key::KeyModel;
use crate::resample::Downsampler;
use crate::waveform::WaveformSummarizer;

/// Recurrent-frame rate after 2:1 downsampling (22 050 Hz / hop 441).
const RECURRENT_FPS: f64 = 50.0;
const MIN_KEY_FRAMES: usize = 100;
const KEY_RECOMPUTE_CADENCE: usize = 25;
/// Pre-allocated CQT accumulator capacity, ~2 minutes of audio at ~5 fps.
const CQT_CEILING_FRAMES: usize = 600;

pub struct Engine {
    downsampler: Downsampler,
    mel: MelExtractor,
    cqt: CqtExtractor,
    beat_model: BeatModel,
    key_model: KeyModel,
    activation: ActivationBuffer,
    waveform: WaveformSummarizer,
    /// Row-major `[time][freq]` accumulator fed to the key model after
    /// on-demand transposition.
    cqt_store: Vec<f32>,
    last_key_inference_frame: Option<usize>,
    invalid_sample_count: u64,

    frame_count: AtomicU64,
    key_frame_count: AtomicU64,
    current_bpm_bits: AtomicU32,
    current_key: Mutex<KeyResult>,

    recording: bool,
    waveform_enabled: bool,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            downsampler: Downsampler::new(),
            mel: MelExtractor::new(),
            cqt: CqtExtractor::new(),
            beat_model: BeatModel::default(),
            key_model: KeyModel::default(),
            activation: ActivationBuffer::default(),
            waveform: WaveformSummarizer::new(),
            cqt_store: Vec::with_capacity(CQT_BINS * CQT_CEILING_FRAMES),
            last_key_inference_frame: None,
            invalid_sample_count: 0,
            frame_count: AtomicU64::new(0),
            key_frame_count: AtomicU64::new(0),
            current_bpm_bits: AtomicU32::new(0.0f32.to_bits()),
            current_key: Mutex::new(KeyResult::default()),
            recording: false,
            waveform_enabled: false,
        }
    }

    pub fn load_bpm_model(&mut self, path: &Path) -> EngineResult<()> {
        self.beat_model.load(path)
    }

    pub fn load_key_model(&mut self, path: &Path) -> EngineResult<()> {
        self.key_model.load(path)
    }

    pub fn warm_up_bpm(&mut self) -> EngineResult<()> {
        self.beat_model.warm_up()
    }

    pub fn warm_up_key(&mut self) -> EngineResult<()> {
        self.key_model.warm_up()
    }

    pub fn start_recording(&mut self, enable_waveform: bool) {
        self.recording = true;
        self.waveform_enabled = enable_waveform;
    }

    pub fn stop_recording(&mut self) {
        self.recording = false;
        self.waveform_enabled = false;
    }

    /// Called by the host when the external audio-acquisition
    /// collaborator reports the microphone permission was denied; the
    /// engine stays idle and surfaces a structural error event.
    pub fn report_permission_denied(&mut self, sink: &mut dyn EventSink) {
        self.recording = false;
        sink.emit(EngineEvent::Error {
            kind: ErrorKind::PermissionDenied,
            message: "microphone permission denied",
        });
    }

    /// 0 until the activation buffer has accumulated 100 frames; the
    /// cached bits are never written before then (§8 invariant 5).
    pub fn current_bpm(&self) -> f32 {
        f32::from_bits(self.current_bpm_bits.load(Ordering::Relaxed))
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count.load(Ordering::Relaxed) as usize
    }

    pub fn key_frame_count(&self) -> usize {
        self.key_frame_count.load(Ordering::Relaxed) as usize
    }

    pub fn current_key(&self) -> KeyResult {
        self.current_key.lock().expect("current_key mutex poisoned").clone()
    }

    pub fn reset(&mut self) {
        self.downsampler.reset();
        self.mel.reset();
        self.cqt.reset();
        self.beat_model.reset_state();
        self.key_model.reset_state();
        self.activation.reset();
        self.cqt_store.clear();
        self.last_key_inference_frame = None;
        self.invalid_sample_count = 0;
        self.frame_count.store(0, Ordering::Relaxed);
        self.key_frame_count.store(0, Ordering::Relaxed);
        self.current_bpm_bits.store(0.0f32.to_bits(), Ordering::Relaxed);
        *self.current_key.lock().expect("current_key mutex poisoned") = KeyResult::default();
    }

    /// Processes `samples` (mono f32 PCM at 44 100 Hz), fanning them
    /// into the CQT/key path (step 1) and then the downsample/mel/
    /// recurrent/BPM path (step 2), per §4.1. Both steps complete before
    /// this call returns; the host observes a single atomic advance.
    pub fn push_samples(&mut self, samples: &[f32], sink: &mut dyn EventSink) -> Vec<FrameResult> {
        if samples.is_empty() {
            return Vec::new();
        }

        let clamped = self.clamp_non_finite(samples);

        self.run_cqt_path(&clamped, sink);
        let results = self.run_bpm_path(&clamped, sink);

        if self.recording && self.waveform_enabled {
            if let Some(summary) = self.waveform.summarize(&clamped) {
                sink.emit(EngineEvent::Waveform {
                    samples: &summary.samples,
                    peak: summary.peak,
                    rms: summary.rms,
                    low: summary.low,
                    mid: summary.mid,
                    high: summary.high,
                });
            }
        }

        results
    }

    fn clamp_non_finite(&mut self, samples: &[f32]) -> Vec<f32> {
        let mut bad = 0u64;
        let out: Vec<f32> = samples
            .iter()
            .map(|&s| {
                if s.is_finite() {
                    s
                } else {
                    bad += 1;
                    0.0
                }
            })
            .collect();
        if bad > 0 {
            self.invalid_sample_count += bad;
            log::warn!("clamped {bad} non-finite sample(s) to zero");
        }
        out
    }

    fn run_cqt_path(&mut self, samples: &[f32], sink: &mut dyn EventSink) {
        // Mirrors `run_bpm_path`'s gating: the key path (CQT extraction,
        // accumulation, and inference alike) is a no-op end to end while
        // its model is unloaded, not just the inference call.
        if !self.key_model.is_ready() {
            return;
        }

        let cqt_frames = self.cqt.push(samples);
        for frame in cqt_frames {
            self.cqt_store.extend_from_slice(frame.as_slice());
            let kf = self.cqt_store.len() / CQT_BINS;
            self.key_frame_count.store(kf as u64, Ordering::Relaxed);

            let due = self
                .last_key_inference_frame
                .is_none_or(|last| kf.saturating_sub(last) >= KEY_RECOMPUTE_CADENCE);

            if kf >= MIN_KEY_FRAMES && due {
                self.last_key_inference_frame = Some(kf);
                match self.key_model.infer(&self.cqt_store, kf) {
                    Ok(prediction) => {
                        let mut guard = self.current_key.lock().expect("current_key mutex poisoned");
                        let changed = guard.camelot != prediction.camelot
                            || (guard.confidence - prediction.confidence).abs() > 0.01;
                        *guard = KeyResult {
                            camelot: prediction.camelot.to_string(),
                            notation: prediction.notation.to_string(),
                            confidence: prediction.confidence,
                            valid: true,
                        };
                        if changed {
                            sink.emit(EngineEvent::Key {
                                camelot: prediction.camelot,
                                notation: prediction.notation,
                                confidence: prediction.confidence,
                            });
                        }
                    }
                    Err(EngineError::InferenceFailed { frame, reason }) => {
                        log::warn!("key inference failed on frame {frame}: {reason}");
                        if !self.key_model.is_ready() {
                            sink.emit(EngineEvent::Error {
                                kind: ErrorKind::NotReady,
                                message: "key model escalated to not-ready after repeated inference failures",
                            });
                        }
                    }
                    Err(_) => {}
                }
            }
        }
    }

    fn run_bpm_path(&mut self, samples: &[f32], sink: &mut dyn EventSink) -> Vec<FrameResult> {
        let mut results = Vec::new();
        if !self.beat_model.is_ready() {
            return results;
        }

        let mut downsampled = Vec::new();
        self.downsampler.process(samples, &mut downsampled);
        let mel_frames = self.mel.push(&downsampled);

        for frame in mel_frames {
            let frame_idx = self.frame_count.load(Ordering::Relaxed);
            match self.beat_model.infer(frame.as_slice(), frame_idx) {
                Ok(activation) => {
                    self.activation.push(activation.beat, activation.downbeat);
                    self.frame_count.store(frame_idx + 1, Ordering::Relaxed);

                    let result = FrameResult {
                        beat_activation: activation.beat,
                        downbeat_activation: activation.downbeat,
                        timestamp_seconds: frame_idx as f64 / RECURRENT_FPS,
                    };
                    sink.emit(EngineEvent::State(result));
                    results.push(result);

                    if self.activation.should_recompute() {
                        self.activation.recompute_bpm();
                        self.current_bpm_bits
                            .store(self.activation.cached_bpm().to_bits(), Ordering::Relaxed);
                    }
                }
                Err(EngineError::InferenceFailed { frame, reason }) => {
                    log::warn!("beat inference failed on frame {frame}: {reason}");
                    if !self.beat_model.is_ready() {
                        sink.emit(EngineEvent::Error {
                            kind: ErrorKind::NotReady,
                            message: "beat model escalated to not-ready after repeated inference failures",
                        });
                    }
                }
                Err(_) => {}
            }
        }

        results
    }
}
