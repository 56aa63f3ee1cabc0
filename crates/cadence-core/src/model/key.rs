//! Stateless convolutional key classifier (§4.7).
//!
//! Consumes the accumulated CQT spectrogram, transposed on demand from
//! the engine's row-major `[time][freq]` storage into the model's
//! `[1, 1, 105, T]` layout.

use std::path::Path;

use ndarray::Array4;
use ort::session::Session;
use ort::value::Tensor;

use crate::cqt::NUM_BINS;
use crate::error::{EngineError, EngineResult};
use crate::key_table::KEY_TABLE;

use super::{load_session, softmax};

pub const NUM_CLASSES: usize = 24;

#[derive(Clone, Debug)]
pub struct KeyPrediction {
    pub camelot: &'static str,
    pub notation: &'static str,
    pub confidence: f32,
}

const MAX_CONSECUTIVE_FAILURES: u32 = 5;

pub struct KeyModel {
    session: Option<Session>,
    consecutive_failures: u32,
    ready: bool,
}

impl Default for KeyModel {
    fn default() -> Self {
        Self {
            session: None,
            consecutive_failures: 0,
            ready: false,
        }
    }
}

impl KeyModel {
    pub fn load(&mut self, path: &Path) -> EngineResult<()> {
        self.session = Some(load_session(path)?);
        self.consecutive_failures = 0;
        self.ready = true;
        Ok(())
    }

    /// Clears the failure-escalation counter, re-admitting the model to
    /// `is_ready` if it was previously escalated to not-ready. Unlike
    /// the beat model there is no recurrent state to zero.
    pub fn reset_state(&mut self) {
        self.consecutive_failures = 0;
        if self.session.is_some() {
            self.ready = true;
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready && self.session.is_some()
    }

    pub fn warm_up(&mut self) -> EngineResult<()> {
        if self.session.is_none() {
            return Err(EngineError::NotReady { what: "key model" });
        }
        let dummy = vec![0.0f32; NUM_BINS * 100];
        let _ = self.infer(&dummy, 100);
        Ok(())
    }

    /// `frames_time_major` is `frame_count * NUM_BINS` floats laid out
    /// `[time][freq]`, as the CQT accumulator stores them.
    pub fn infer(&mut self, frames_time_major: &[f32], frame_count: usize) -> EngineResult<KeyPrediction> {
        if !self.ready {
            return Err(EngineError::NotReady { what: "key model" });
        }
        let Some(session) = self.session.as_mut() else {
            return Err(EngineError::NotReady { what: "key model" });
        };

        match run_inference(session, frames_time_major, frame_count) {
            Ok(prediction) => {
                self.consecutive_failures = 0;
                Ok(prediction)
            }
            Err(reason) => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                    self.ready = false;
                }
                Err(EngineError::InferenceFailed {
                    frame: frame_count as u64,
                    reason,
                })
            }
        }
    }
}

fn run_inference(session: &mut Session, frames_time_major: &[f32], frame_count: usize) -> Result<KeyPrediction, String> {
    let mut transposed = vec![0.0f32; NUM_BINS * frame_count];
    for t in 0..frame_count {
        for f in 0..NUM_BINS {
            transposed[f * frame_count + t] = frames_time_major[t * NUM_BINS + f];
        }
    }

    let array = Array4::from_shape_vec((1, 1, NUM_BINS, frame_count), transposed).map_err(|e| e.to_string())?;
    let input = Tensor::from_array(array).map_err(|e| e.to_string())?;
    let inputs = ort::inputs!["input" => input].map_err(|e| e.to_string())?;

    let outputs = session.run(inputs).map_err(|e| e.to_string())?;
    let (_, logits) = outputs["output"]
        .try_extract_tensor::<f32>()
        .map_err(|e| e.to_string())?;

    if logits.len() != NUM_CLASSES {
        return Err(format!("expected {NUM_CLASSES} logits, got {}", logits.len()));
    }

    let mut probs = logits.to_vec();
    softmax(&mut probs);

    let (class, &confidence) = probs
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .ok_or_else(|| "empty logits".to_string())?;

    let entry = &KEY_TABLE[class];
    Ok(KeyPrediction {
        camelot: entry.camelot,
        notation: entry.notation,
        confidence,
    })
}
