//! Core/host event boundary (§6, §9).
//!
//! `EventSink::emit` is the only way information crosses from the
//! engine to the host during a `push_samples` call; the trait object is
//! borrowed for the duration of that call and never retained, so the
//! core stays agnostic to the host's threading model — grounded in the
//! same shape as the teacher's channel-based audio-thread handoff, but
//! expressed as a synchronous callback since the engine itself is not
//! threaded.

use serde::{Deserialize, Serialize};

/// One (beat, downbeat) activation produced per recurrent frame.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct FrameResult {
    pub beat_activation: f32,
    pub downbeat_activation: f32,
    pub timestamp_seconds: f64,
}

/// The engine's published key estimate. `valid` is false until at least
/// 100 CQT frames have been accumulated.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct KeyResult {
    pub camelot: String,
    pub notation: String,
    pub confidence: f32,
    pub valid: bool,
}

impl Default for KeyResult {
    fn default() -> Self {
        Self {
            camelot: String::new(),
            notation: String::new(),
            confidence: 0.0,
            valid: false,
        }
    }
}

/// Structural error kinds surfaced to the host via `onError`. Transient,
/// per-frame failures (`InferenceFailed`, `InvalidInput`) are logged and
/// counted, not surfaced here — see `EngineError` and §7.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    LoadFailed,
    NotReady,
    PermissionDenied,
}

pub enum EngineEvent<'a> {
    State(FrameResult),
    Waveform {
        samples: &'a [f32; 128],
        peak: f32,
        rms: f32,
        low: f32,
        mid: f32,
        high: f32,
    },
    Key {
        camelot: &'a str,
        notation: &'a str,
        confidence: f32,
    },
    Error {
        kind: ErrorKind,
        message: &'a str,
    },
}

/// Implemented by the host; the engine never stores an `EventSink`
/// beyond the scope of a single `push_samples` call.
pub trait EventSink {
    fn emit(&mut self, event: EngineEvent<'_>);
}

/// An `EventSink` that discards everything, for hosts (and tests) that
/// only care about the pull-based query surface.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: EngineEvent<'_>) {}
}
