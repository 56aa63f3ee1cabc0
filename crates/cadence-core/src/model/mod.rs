//! ONNX Runtime session lifecycle shared by the beat and key model
//! wrappers.
//!
//! The "singleton model runtime" design note (§9) maps here to one
//! owned `ort::Session` per model, built once in `load` and torn down
//! with the wrapper. Grounded in the retrieval pack's ORT provider code
//! (`Session::builder()?.with_intra_threads(..)?.commit_from_file(..)`),
//! simplified: no session cache, no async — a single model loaded once
//! per path, reloaded synchronously on re-`load`.

pub mod beat;
pub mod key;

use ort::session::Session;
use std::path::Path;

use crate::error::{EngineError, EngineResult};

pub(crate) fn load_session(path: &Path) -> EngineResult<Session> {
    build(path).map_err(|e| EngineError::LoadFailed {
        path: path.display().to_string(),
        reason: format!("{e:#}"),
    })
}

/// Setup-time session construction uses `anyhow` for its error path, the
/// way `phosphor-app::audio::capture` does for cpal device setup — this
/// is off the audio path entirely (only `load_*` calls it), so there is
/// no real-time budget to protect here. The module boundary above
/// converts it to the public `EngineError` before it reaches a caller.
fn build(path: &Path) -> anyhow::Result<Session> {
    use anyhow::Context;
    Session::builder()
        .context("failed to construct ONNX Runtime session builder")?
        .with_intra_threads(1)
        .context("failed to configure session intra-op thread count")?
        .commit_from_file(path)
        .with_context(|| format!("failed to load model from {}", path.display()))
}

/// Beat model (§4.6): the wrapper only applies softmax when the raw
/// output doesn't already sum to ~1 (the reference model's own output
/// head is expected to already be a probability distribution most of
/// the time; this is a correction for when it isn't).
pub(crate) fn softmax_if_needed(logits: &mut [f32]) {
    let sum: f32 = logits.iter().sum();
    if (sum - 1.0).abs() <= 0.01 {
        return;
    }
    softmax(logits);
}

/// Key model (§4.7): "Output: [1, 24] logits -> softmax -> argmax" —
/// always a logit vector, never a pre-normalized distribution, so
/// softmax is unconditional.
pub(crate) fn softmax(logits: &mut [f32]) {
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let mut total = 0.0f32;
    for v in logits.iter_mut() {
        *v = (*v - max).exp();
        total += *v;
    }
    if total > 0.0 {
        for v in logits.iter_mut() {
            *v /= total;
        }
    }
}
