//! Reason codes for extraction outcomes
//!
//! X-codes explain why no pattern was found. B-codes flag a pattern that
//! was accepted but falls outside the advisory bounds of the prompt.

use serde::{Deserialize, Serialize};

/// Why a response yielded no pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum MissReason {
    // =========================================================================
    // X001: Block stage
    // =========================================================================
    /// No fenced block made of 0/1/commas
    X001_NO_BLOCK,
    /// Block present but contains no cells
    X001_EMPTY_BLOCK,

    // =========================================================================
    // X002: Matrix shape
    // =========================================================================
    /// A row has a different cell count than the first row
    X002_RAGGED_ROW,
    /// A token is not exactly 0 or 1
    X002_BAD_TOKEN,

    // =========================================================================
    // X003: Iteration stage
    // =========================================================================
    /// No standalone integer after the block
    X003_NO_ITERATIONS,
    /// Integer literal does not fit the counter
    X003_ITERATIONS_OVERFLOW,
}

impl MissReason {
    /// Get the code string (for logging)
    pub fn code(&self) -> &'static str {
        match self {
            Self::X001_NO_BLOCK => "X001_NO_BLOCK",
            Self::X001_EMPTY_BLOCK => "X001_EMPTY_BLOCK",
            Self::X002_RAGGED_ROW => "X002_RAGGED_ROW",
            Self::X002_BAD_TOKEN => "X002_BAD_TOKEN",
            Self::X003_NO_ITERATIONS => "X003_NO_ITERATIONS",
            Self::X003_ITERATIONS_OVERFLOW => "X003_ITERATIONS_OVERFLOW",
        }
    }

    /// Get human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::X001_NO_BLOCK => "no matrix code block found",
            Self::X001_EMPTY_BLOCK => "matrix code block is empty",
            Self::X002_RAGGED_ROW => "matrix rows have different lengths",
            Self::X002_BAD_TOKEN => "matrix contains a value other than 0 or 1",
            Self::X003_NO_ITERATIONS => "no iteration count after the matrix",
            Self::X003_ITERATIONS_OVERFLOW => "iteration count is too large",
        }
    }
}

impl std::fmt::Display for MissReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.description())
    }
}

/// Accepted pattern outside the advisory production bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum BoundsWarning {
    /// Fewer than 20 or more than 100 rows
    B001_ROWS_OUT_OF_RANGE,
    /// Fewer than 20 or more than 100 columns
    B001_COLS_OUT_OF_RANGE,
    /// Iteration count outside 1..=100000
    B002_ITERATIONS_OUT_OF_RANGE,
}

impl BoundsWarning {
    pub fn code(&self) -> &'static str {
        match self {
            Self::B001_ROWS_OUT_OF_RANGE => "B001_ROWS_OUT_OF_RANGE",
            Self::B001_COLS_OUT_OF_RANGE => "B001_COLS_OUT_OF_RANGE",
            Self::B002_ITERATIONS_OUT_OF_RANGE => "B002_ITERATIONS_OUT_OF_RANGE",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::B001_ROWS_OUT_OF_RANGE => "row count outside 20..=100",
            Self::B001_COLS_OUT_OF_RANGE => "column count outside 20..=100",
            Self::B002_ITERATIONS_OUT_OF_RANGE => "iteration count outside 1..=100000",
        }
    }
}

impl std::fmt::Display for BoundsWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.description())
    }
}
