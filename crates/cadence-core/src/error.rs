//! Error taxonomy for the engine's public surface.
//!
//! Mirrors the five error kinds of the spec: two structural failures
//! returned synchronously (`LoadFailed`, `PermissionDenied`), one that
//! demotes a call to a no-op (`NotReady`), and two that are logged and
//! counted without surfacing from the call that triggered them
//! (`InferenceFailed`, `InvalidInput`).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// A model artifact was missing, malformed, or had an incompatible shape.
    #[error("failed to load model at {path}: {reason}")]
    LoadFailed { path: String, reason: String },

    /// A processing call arrived before its model had finished loading,
    /// or five consecutive inference failures escalated the model to
    /// not-ready.
    #[error("{what} is not ready")]
    NotReady { what: &'static str },

    /// A single frame's inference failed; recoverable, counted.
    #[error("inference failed on frame {frame}: {reason}")]
    InferenceFailed { frame: u64, reason: String },

    /// Raised by the external audio-acquisition collaborator and surfaced
    /// to the host as an error event.
    #[error("microphone permission denied")]
    PermissionDenied,

    /// Non-finite samples were present in an input buffer; the engine
    /// clamps them to zero and continues.
    #[error("{count} non-finite sample(s) clamped to zero")]
    InvalidInput { count: usize },

    #[error("model file io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
