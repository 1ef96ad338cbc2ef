//! Lifestream: streaming chat client with a Game of Life rendering pipeline
//!
//! Text arrives as server-sent frames, is accumulated into one response, and the
//! response is scanned for a fenced 0/1 seed plus an iteration count. The seed is
//! simulated off the interactive thread and the end state rendered to a bitmap.

pub mod core;
pub mod types;

// =============================================================================
// ADVISORY BOUNDS - what the prompt asks the model to produce
// =============================================================================

/// Smallest advised row/column count for a generated seed
pub const MIN_DIMENSION: usize = 20;

/// Largest advised row/column count for a generated seed
pub const MAX_DIMENSION: usize = 100;

/// Smallest advised iteration count
pub const MIN_ITERATIONS: u64 = 1;

/// Largest advised iteration count
pub const MAX_ITERATIONS: u64 = 100_000;

// =============================================================================
// SIMULATION
// =============================================================================

/// How many recent generation digests are kept for cycle detection.
/// Oscillators with a longer period are simply stepped through.
pub const CYCLE_WINDOW: usize = 16;

/// Generations between progress reports from the worker
pub const PROGRESS_INTERVAL: u64 = 1_000;

// =============================================================================
// STREAMING
// =============================================================================

/// Capacity of the event queue between transport and reader
pub const EVENT_QUEUE_CAPACITY: usize = 64;

/// Message sent alongside an upstream failure frame
pub const UPSTREAM_FAILURE_MESSAGE: &str = "Something went wrong!";

/// Seed prompt that asks the model for a start state in the extractable format
pub const DEFAULT_PROMPT: &str = "We are about to start playing Game of Life. Please generate random starting state and then iteration number.
The format is starting state must be 2 dimension array with 1 and 0 separated by comma in markdown code block, where 0 means dead cell and 1 represents life cell.
Array should have any number of columns between 20 and 100 and any number of rows between 20 and 100. Then comes single number number of iteration to generate between 1 and 100000.
Don't use any words.";

// =============================================================================
// VERSION
// =============================================================================

pub const VERSION: &str = "1.0.0";
