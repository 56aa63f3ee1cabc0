//! Stateful two-layer recurrent beat/downbeat classifier (§4.6).

use std::path::Path;

use ndarray::Array;
use ort::session::Session;
use ort::value::Tensor;

use crate::error::{EngineError, EngineResult};
use crate::mel::FRAME_DIM;

use super::{load_session, softmax_if_needed};

const HIDDEN_WIDTH: usize = 150;
const LAYERS: usize = 2;
const STATE_LEN: usize = LAYERS * HIDDEN_WIDTH;
const MAX_CONSECUTIVE_FAILURES: u32 = 5;

/// Hidden/cell state threaded between consecutive inferences, shape
/// `[2, 1, 150]` each, flattened for storage.
pub struct RecurrentState {
    hidden: [f32; STATE_LEN],
    cell: [f32; STATE_LEN],
}

impl Default for RecurrentState {
    fn default() -> Self {
        Self {
            hidden: [0.0; STATE_LEN],
            cell: [0.0; STATE_LEN],
        }
    }
}

impl RecurrentState {
    pub fn reset(&mut self) {
        self.hidden = [0.0; STATE_LEN];
        self.cell = [0.0; STATE_LEN];
    }
}

/// Published (beat, downbeat) activation; the third (non-beat) class is
/// discarded after normalization.
#[derive(Clone, Copy, Debug)]
pub struct BeatActivation {
    pub beat: f32,
    pub downbeat: f32,
}

pub struct BeatModel {
    session: Option<Session>,
    path: Option<String>,
    state: RecurrentState,
    consecutive_failures: u32,
    ready: bool,
}

impl Default for BeatModel {
    fn default() -> Self {
        Self {
            session: None,
            path: None,
            state: RecurrentState::default(),
            consecutive_failures: 0,
            ready: false,
        }
    }
}

impl BeatModel {
    pub fn load(&mut self, path: &Path) -> EngineResult<()> {
        let session = load_session(path)?;
        self.session = Some(session);
        self.path = Some(path.display().to_string());
        self.state.reset();
        self.consecutive_failures = 0;
        self.ready = true;
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready && self.session.is_some()
    }

    pub fn reset_state(&mut self) {
        self.state.reset();
        self.consecutive_failures = 0;
        if self.session.is_some() {
            self.ready = true;
        }
    }

    /// Runs dummy inferences to trigger any lazy compilation, then
    /// re-zeroes recurrent state so warm-up leaves no trace.
    pub fn warm_up(&mut self) -> EngineResult<()> {
        if self.session.is_none() {
            return Err(EngineError::NotReady { what: "beat model" });
        }
        let dummy = [0.0f32; FRAME_DIM];
        let _ = self.infer(&dummy, 0);
        self.state.reset();
        Ok(())
    }

    pub fn infer(&mut self, frame: &[f32; FRAME_DIM], frame_index: u64) -> EngineResult<BeatActivation> {
        let Some(session) = self.session.as_mut() else {
            return Err(EngineError::NotReady { what: "beat model" });
        };

        let result = run_inference(session, frame, &self.state);
        match result {
            Ok((beat, downbeat, hidden, cell)) => {
                self.state.hidden = hidden;
                self.state.cell = cell;
                self.consecutive_failures = 0;
                Ok(BeatActivation { beat, downbeat })
            }
            Err(reason) => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                    self.ready = false;
                }
                Err(EngineError::InferenceFailed {
                    frame: frame_index,
                    reason,
                })
            }
        }
    }
}

#[allow(clippy::type_complexity)]
fn run_inference(
    session: &mut Session,
    frame: &[f32; FRAME_DIM],
    state: &RecurrentState,
) -> Result<(f32, f32, [f32; STATE_LEN], [f32; STATE_LEN]), String> {
    let input = Array::from_shape_vec((1, 1, FRAME_DIM), frame.to_vec()).map_err(|e| e.to_string())?;
    let hidden_in =
        Array::from_shape_vec((LAYERS, 1, HIDDEN_WIDTH), state.hidden.to_vec()).map_err(|e| e.to_string())?;
    let cell_in =
        Array::from_shape_vec((LAYERS, 1, HIDDEN_WIDTH), state.cell.to_vec()).map_err(|e| e.to_string())?;

    let input_value = Tensor::from_array(input).map_err(|e| e.to_string())?;
    let hidden_value = Tensor::from_array(hidden_in).map_err(|e| e.to_string())?;
    let cell_value = Tensor::from_array(cell_in).map_err(|e| e.to_string())?;

    let inputs = ort::inputs![
        "input" => input_value,
        "hidden_in" => hidden_value,
        "cell_in" => cell_value,
    ]
    .map_err(|e| e.to_string())?;

    let outputs = session.run(inputs).map_err(|e| e.to_string())?;

    let (_, output_data) = outputs["output"]
        .try_extract_tensor::<f32>()
        .map_err(|e| e.to_string())?;
    let (_, hidden_data) = outputs["hidden_out"]
        .try_extract_tensor::<f32>()
        .map_err(|e| e.to_string())?;
    let (_, cell_data) = outputs["cell_out"]
        .try_extract_tensor::<f32>()
        .map_err(|e| e.to_string())?;

    let mut classes: Vec<f32> = output_data.to_vec();
    if classes.len() != 3 {
        return Err(format!("expected 3 output classes, got {}", classes.len()));
    }
    softmax_if_needed(&mut classes);

    if hidden_data.len() != STATE_LEN || cell_data.len() != STATE_LEN {
        return Err(format!(
            "expected state length {STATE_LEN}, got hidden={} cell={}",
            hidden_data.len(),
            cell_data.len()
        ));
    }

    let mut hidden = [0.0f32; STATE_LEN];
    hidden.copy_from_slice(hidden_data);
    let mut cell = [0.0f32; STATE_LEN];
    cell.copy_from_slice(cell_data);

    Ok((classes[0], classes[1], hidden, cell))
}
