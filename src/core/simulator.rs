//! LifeSimulator: B3/S23 automaton on a fixed-boundary grid
//!
//! Cells beyond the edges are permanently dead. Every generation is computed
//! from the previous one into a second buffer, then the buffers swap, so only
//! two generations are ever held.
//!
//! Early exit is on by default: when a generation repeats one of the last
//! `CYCLE_WINDOW` generations, the remaining steps are reduced modulo the
//! period. `final_matrix` is identical to stepping all the way; only
//! `iterations_run` and `settled` show the difference.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::ops::ControlFlow;

use sha2::{Digest, Sha256};

use crate::types::{Matrix, Progress, Settled, SimulationResult};
use crate::CYCLE_WINDOW;

/// Game of Life stepper
#[derive(Debug, Clone)]
pub struct LifeSimulator {
    early_exit: bool,
}

impl Default for LifeSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl LifeSimulator {
    /// Simulator with stable/cycle early exit
    pub fn new() -> Self {
        Self { early_exit: true }
    }

    /// Simulator that always steps through every generation
    pub fn without_early_exit() -> Self {
        Self { early_exit: false }
    }

    pub fn early_exit(&self) -> bool {
        self.early_exit
    }

    /// Compute one generation of `current` into `next`.
    /// Both grids must have the same shape.
    pub fn step(current: &Matrix, next: &mut Matrix) {
        debug_assert!(current.same_shape(next));
        let rows = current.rows();
        let cols = current.cols();
        let src = current.cells();
        let dst = next.cells_mut();

        for r in 0..rows {
            let r_lo = r.saturating_sub(1);
            let r_hi = (r + 1).min(rows - 1);
            for c in 0..cols {
                let c_lo = c.saturating_sub(1);
                let c_hi = (c + 1).min(cols - 1);

                let mut live = 0u8;
                for nr in r_lo..=r_hi {
                    for nc in c_lo..=c_hi {
                        if (nr != r || nc != c) && src[nr * cols + nc] {
                            live += 1;
                        }
                    }
                }

                let alive = src[r * cols + c];
                dst[r * cols + c] = matches!((alive, live), (true, 2) | (_, 3));
            }
        }
    }

    /// Run `iterations` generations
    pub fn run(&self, matrix: &Matrix, iterations: u64) -> SimulationResult {
        let never_stop = |_: Progress| ControlFlow::<Infallible>::Continue(());
        match self.run_with(matrix, iterations, never_stop) {
            Ok(result) => result,
            Err(never) => match never {},
        }
    }

    /// Run `iterations` generations, calling `observer` after each one.
    /// Stops with the observer's break value.
    pub fn run_with<F, B>(
        &self,
        matrix: &Matrix,
        iterations: u64,
        mut observer: F,
    ) -> Result<SimulationResult, B>
    where
        F: FnMut(Progress) -> ControlFlow<B>,
    {
        let mut current = matrix.clone();
        if iterations == 0 || current.rows() == 0 || current.cols() == 0 {
            return Ok(SimulationResult {
                final_matrix: current,
                iterations_run: 0,
                requested: iterations,
                settled: None,
            });
        }

        let mut next = Matrix::new(current.rows(), current.cols());
        let mut recent: VecDeque<([u8; 32], u64)> = VecDeque::with_capacity(CYCLE_WINDOW);
        if self.early_exit {
            recent.push_back((digest(&current), 0));
        }

        let mut generation = 0u64;
        while generation < iterations {
            Self::step(&current, &mut next);
            std::mem::swap(&mut current, &mut next);
            generation += 1;

            let progress = Progress {
                done: generation,
                total: iterations,
            };
            if let ControlFlow::Break(reason) = observer(progress) {
                return Err(reason);
            }

            if !self.early_exit {
                continue;
            }

            let hash = digest(&current);
            if let Some(&(_, seen_at)) = recent.iter().find(|(h, _)| *h == hash) {
                let period = generation - seen_at;
                let remaining = (iterations - generation) % period;
                for _ in 0..remaining {
                    Self::step(&current, &mut next);
                    std::mem::swap(&mut current, &mut next);
                }
                let settled = if period == 1 {
                    Settled::Stable { at: generation }
                } else {
                    Settled::Cycle {
                        at: generation,
                        period,
                    }
                };
                return Ok(SimulationResult {
                    final_matrix: current,
                    iterations_run: generation + remaining,
                    requested: iterations,
                    settled: Some(settled),
                });
            }

            if recent.len() == CYCLE_WINDOW {
                recent.pop_front();
            }
            recent.push_back((hash, generation));
        }

        Ok(SimulationResult {
            final_matrix: current,
            iterations_run: generation,
            requested: iterations,
            settled: None,
        })
    }
}

/// SHA-256 over the bit-packed cells
fn digest(matrix: &Matrix) -> [u8; 32] {
    let mut packed = vec![0u8; matrix.cells().len().div_ceil(8)];
    for (i, alive) in matrix.cells().iter().enumerate() {
        if *alive {
            packed[i / 8] |= 1 << (i % 8);
        }
    }
    let mut hasher = Sha256::new();
    hasher.update(&packed);
    hasher.finalize().into()
}

// =============================================================================
// TESTS
// =============================================================================
