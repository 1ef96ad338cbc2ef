//! Simulation and pipeline results

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use crate::types::Matrix;

/// How a run finished before stepping through every requested generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Settled {
    /// Generation `at` equals generation `at - 1`
    Stable { at: u64 },
    /// Generation `at` equals generation `at - period`
    Cycle { at: u64, period: u64 },
}

/// Outcome of a simulation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationResult {
    /// State after the requested number of generations
    pub final_matrix: Matrix,
    /// Generations actually computed
    pub iterations_run: u64,
    /// Generations requested
    pub requested: u64,
    /// Set when early exit skipped redundant generations
    pub settled: Option<Settled>,
}

/// Worker progress, sent every `PROGRESS_INTERVAL` generations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub done: u64,
    pub total: u64,
}

impl Progress {
    /// Completed fraction in 0.0..=1.0
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            (self.done as f64 / self.total as f64).min(1.0)
        }
    }
}

/// What the worker hands back for one response text.
/// `image: None` means no pattern was found (or the worker failed, see `message`).
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub text: String,
    pub image: Option<RgbaImage>,
    pub message: Option<String>,
}

impl GenerationResult {
    /// Result without an image
    pub fn text_only(text: impl Into<String>, message: Option<String>) -> Self {
        Self {
            text: text.into(),
            image: None,
            message,
        }
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }
}
