//! Window and progress arithmetic for the paragraph reader.
//!
//! All indices are absolute paragraph ids within `[min, max]` (inclusive).
//! The window is the contiguous run of up to [`WINDOW_SIZE`] ids starting
//! at the clamped position; it is recomputed, never mutated.

use std::ops::Range;

/// Paragraphs fetched and displayed per page.
pub const WINDOW_SIZE: u64 = 5;

/// The paragraph ids of the window anchored at `start`:
/// `[max(min, start), min(start + WINDOW_SIZE, max + 1))`.
///
/// Empty iff `min > max` (a book with no paragraphs).
pub fn window_ids(min: u64, max: u64, start: u64) -> Range<u64> {
    let effective_start = start.max(min);
    let end_exclusive = effective_start
        .saturating_add(WINDOW_SIZE)
        .min(max.saturating_add(1));
    effective_start..end_exclusive
}

pub fn at_start(min: u64, start: u64) -> bool {
    start <= min
}

pub fn at_end(max: u64, start: u64) -> bool {
    start.saturating_add(WINDOW_SIZE) > max
}

pub fn prev_start(min: u64, start: u64) -> u64 {
    start.saturating_sub(WINDOW_SIZE).max(min)
}

pub fn next_start(max: u64, start: u64) -> u64 {
    start.saturating_add(WINDOW_SIZE).min(max)
}

/// Derived reading progress. All fields are `None` while book metadata is
/// still absent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Progress {
    /// 1-based position within the book, clamped to `[1, total]`.
    pub index: Option<u64>,
    pub total: Option<u64>,
    /// `index / total * 100`, clamped to `[0, 100]`.
    pub percent: Option<f64>,
}

impl Progress {
    pub const EMPTY: Progress = Progress {
        index: None,
        total: None,
        percent: None,
    };

    /// Compute progress for `current` within `[min, max]`.
    ///
    /// Out-of-range positions are clamped rather than rejected; the
    /// controller tolerates slightly stale bounds from the server.
    pub fn compute(min: u64, max: u64, current: u64) -> Progress {
        if max < min {
            return Progress::EMPTY;
        }
        let total = max - min + 1;
        let raw_index = current as i128 - min as i128 + 1;
        let index = raw_index.clamp(1, total as i128) as u64;
        let percent = (index as f64 / total as f64 * 100.0).clamp(0.0, 100.0);
        Progress {
            index: Some(index),
            total: Some(total),
            percent: Some(percent),
        }
    }
}
