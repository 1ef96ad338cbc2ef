//! PatternExtractor: recovers a seed matrix and iteration count from free text
//!
//! Two stages, each testable on its own:
//! 1. block matcher: first fenced code block whose body is made of digits,
//!    commas, brackets and whitespace; parsed into a rectangular 0/1 matrix
//! 2. integer matcher: first standalone digit run after that block
//!
//! Prose around the block is ignored. The block itself is strict: a ragged
//! row or a token other than 0/1 means no pattern. Out-of-bounds sizes are
//! recorded as warnings, never rejected.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::types::{BoundsWarning, Matrix, MissReason, Pattern};
use crate::{MAX_DIMENSION, MAX_ITERATIONS, MIN_DIMENSION, MIN_ITERATIONS};

lazy_static! {
    // Everything between an opening and the next closing fence
    static ref RE_FENCED_BLOCK: Regex = Regex::new(r"```([\s\S]*?)```").unwrap();

    // Digit run with a word boundary on both sides: "3 iterations" yes, "iteration5" no
    static ref RE_STANDALONE_INT: Regex = Regex::new(r"\b[0-9]+\b").unwrap();
}

/// A fenced block that looks like a matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block<'a> {
    /// Text between the fences
    pub body: &'a str,
    /// Byte offset just past the closing fence
    pub end: usize,
}

/// Result of scanning one response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Found(Pattern),
    Miss(MissReason),
}

impl Extraction {
    pub fn pattern(&self) -> Option<&Pattern> {
        match self {
            Extraction::Found(p) => Some(p),
            Extraction::Miss(_) => None,
        }
    }

    pub fn is_miss(&self) -> bool {
        matches!(self, Extraction::Miss(_))
    }
}

/// Extractor for seeds embedded in generated text
#[derive(Debug, Default)]
pub struct PatternExtractor;

impl PatternExtractor {
    /// Create new extractor
    pub fn new() -> Self {
        Self
    }

    /// Scan a finished response
    pub fn extract(&self, text: &str) -> Extraction {
        let Some(block) = self.find_block(text) else {
            return Extraction::Miss(MissReason::X001_NO_BLOCK);
        };

        let matrix = match self.parse_block(block.body) {
            Ok(m) => m,
            Err(reason) => {
                debug!("matrix block rejected: {}", reason);
                return Extraction::Miss(reason);
            }
        };

        let iterations = match self.find_iterations(&text[block.end..]) {
            Ok(n) => n,
            Err(reason) => {
                debug!("iteration count rejected: {}", reason);
                return Extraction::Miss(reason);
            }
        };

        let warnings = bounds_warnings(&matrix, iterations);
        Extraction::Found(Pattern {
            matrix,
            iterations,
            warnings,
        })
    }

    /// Stage 1a: first fenced block whose body could be a matrix
    pub fn find_block<'a>(&self, text: &'a str) -> Option<Block<'a>> {
        RE_FENCED_BLOCK.captures_iter(text).find_map(|caps| {
            let inner = caps.get(1)?.as_str();
            let whole = caps.get(0)?;
            let body = strip_info_string(inner);
            is_matrix_candidate(body).then(|| Block {
                body,
                end: whole.end(),
            })
        })
    }

    /// Stage 1b: parse a block body into a rectangular matrix.
    /// Accepts comma rows (`1,0,1`) or a bracketed array (`[[1,0],[0,1]]`).
    pub fn parse_block(&self, body: &str) -> Result<Matrix, MissReason> {
        let rows = if body.contains('[') {
            parse_bracketed(body)?
        } else {
            parse_comma_rows(body)?
        };

        if rows.is_empty() || rows[0].is_empty() {
            return Err(MissReason::X001_EMPTY_BLOCK);
        }
        Matrix::from_rows(rows).ok_or(MissReason::X002_RAGGED_ROW)
    }

    /// Stage 2: first standalone integer in `text`
    pub fn find_iterations(&self, text: &str) -> Result<u64, MissReason> {
        let m = RE_STANDALONE_INT
            .find(text)
            .ok_or(MissReason::X003_NO_ITERATIONS)?;
        m.as_str()
            .parse::<u64>()
            .map_err(|_| MissReason::X003_ITERATIONS_OVERFLOW)
    }
}

/// Drop the opening-fence line when it is a language tag (`text`, `csv`) or
/// blank. Anything else on that line, such as `1,0,1`, is the first row.
fn strip_info_string(inner: &str) -> &str {
    let (first, rest) = inner.split_once('\n').unwrap_or((inner, ""));
    let first = first.trim();
    if first.is_empty() || first.starts_with(|c: char| c.is_ascii_alphabetic()) {
        rest
    } else {
        inner
    }
}

/// Only digits, commas, brackets and whitespace, with at least one digit
fn is_matrix_candidate(body: &str) -> bool {
    body.chars().any(|c| c.is_ascii_digit())
        && body
            .chars()
            .all(|c| c.is_ascii_digit() || c == ',' || c == '[' || c == ']' || c.is_whitespace())
}

fn parse_cell(token: &str) -> Result<bool, MissReason> {
    match token {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(MissReason::X002_BAD_TOKEN),
    }
}

/// One row per non-blank line; a single trailing comma per row is tolerated
fn parse_comma_rows(body: &str) -> Result<Vec<Vec<bool>>, MissReason> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let line = line.strip_suffix(',').unwrap_or(line);
            line.split(',')
                .map(|t| parse_cell(t.trim()))
                .collect::<Result<Vec<bool>, MissReason>>()
        })
        .collect()
}

/// JSON-style nested array
fn parse_bracketed(body: &str) -> Result<Vec<Vec<bool>>, MissReason> {
    let rows: Vec<Vec<Value>> =
        serde_json::from_str(body.trim()).map_err(|_| MissReason::X002_BAD_TOKEN)?;
    rows.iter()
        .map(|row| {
            row.iter()
                .map(|v| match v.as_u64() {
                    Some(0) => Ok(false),
                    Some(1) => Ok(true),
                    _ => Err(MissReason::X002_BAD_TOKEN),
                })
                .collect::<Result<Vec<bool>, MissReason>>()
        })
        .collect()
}

fn bounds_warnings(matrix: &Matrix, iterations: u64) -> Vec<BoundsWarning> {
    let dims = MIN_DIMENSION..=MAX_DIMENSION;
    let mut warnings = Vec::new();
    if !dims.contains(&matrix.rows()) {
        warnings.push(BoundsWarning::B001_ROWS_OUT_OF_RANGE);
    }
    if !dims.contains(&matrix.cols()) {
        warnings.push(BoundsWarning::B001_COLS_OUT_OF_RANGE);
    }
    if !(MIN_ITERATIONS..=MAX_ITERATIONS).contains(&iterations) {
        warnings.push(BoundsWarning::B002_ITERATIONS_OUT_OF_RANGE);
    }
    warnings
}

// =============================================================================
// TESTS
// =============================================================================
