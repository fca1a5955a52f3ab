//! Gap functions and horizontal temporal inference.
//!
//! These decide whether two adjacent intervals of the same abstraction type
//! and value may be merged into one, and whether consecutive values inside a
//! candidate window are spaced acceptably.

use serde::{Deserialize, Serialize};

use crate::types::{Interval, TimeSpan};

/// Predicate over two intervals (`lhs` earlier than `rhs`) deciding if the
/// gap between them is small enough to merge across.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GapFunction {
    /// Any gap is acceptable.
    Unbounded,
    /// Accept when `rhs.start - lhs.finish <= maximum_gap`. Overlapping or
    /// meeting intervals always pass.
    Simple {
        #[serde(default)]
        maximum_gap: TimeSpan,
    },
}

impl GapFunction {
    /// Accepts meeting and overlapping intervals only.
    pub const DEFAULT: GapFunction = GapFunction::Simple {
        maximum_gap: TimeSpan::ZERO,
    };

    pub fn simple(maximum_gap: TimeSpan) -> Self {
        GapFunction::Simple { maximum_gap }
    }

    pub fn accepts(&self, lhs: &Interval, rhs: &Interval) -> bool {
        let gap = lhs.gap_to(rhs);
        match self {
            GapFunction::Unbounded => true,
            GapFunction::Simple { maximum_gap } => gap <= maximum_gap.millis(),
        }
    }
}

impl Default for GapFunction {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Bounds on the time between consecutive values inside one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MinMaxGapBetweenValues {
    #[serde(default)]
    pub minimum: Option<TimeSpan>,
    #[serde(default)]
    pub maximum: Option<TimeSpan>,
}

impl MinMaxGapBetweenValues {
    pub fn new(minimum: Option<TimeSpan>, maximum: Option<TimeSpan>) -> Self {
        Self { minimum, maximum }
    }

    pub fn is_unconstrained(&self) -> bool {
        self.minimum.is_none() && self.maximum.is_none()
    }

    /// Check the distance from the start of `prev` to the start of `next`.
    pub fn accepts(&self, prev: &Interval, next: &Interval) -> bool {
        let distance = next.start - prev.start;
        if let Some(min) = self.minimum {
            if distance < min.millis() {
                return false;
            }
        }
        if let Some(max) = self.maximum {
            if distance > max.millis() {
                return false;
            }
        }
        true
    }
}

/// Horizontal temporal inference: may two same-valued intervals be joined?
///
/// Concatenable definitions join intervals that meet; solid definitions join
/// intervals that overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HorizontalTemporalInference {
    pub concatenable: bool,
    pub solid: bool,
}

impl HorizontalTemporalInference {
    pub fn new(concatenable: bool, solid: bool) -> Self {
        Self {
            concatenable,
            solid,
        }
    }

    /// Time-based check for two intervals, `lhs` starting no later than `rhs`.
    pub fn execute(&self, lhs: &Interval, rhs: &Interval) -> bool {
        if lhs.meets(rhs) || rhs.meets(lhs) {
            return self.concatenable;
        }
        lhs.overlaps(rhs) && self.solid
    }

    /// Index-based check for two windows over the same sequence. Windows that
    /// touch (`rhs_first == lhs_last + 1`) are concatenated; windows that share
    /// elements overlap.
    pub fn execute_indices(
        &self,
        lhs_first: usize,
        lhs_last: usize,
        rhs_first: usize,
        rhs_last: usize,
    ) -> bool {
        let overlapping = rhs_first <= lhs_last && lhs_first <= rhs_last;
        if overlapping {
            return self.solid;
        }
        let adjacent = rhs_first == lhs_last + 1 || lhs_first == rhs_last + 1;
        adjacent && self.concatenable
    }
}
