//! Slices and aggregations.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::TimeSpan;

/// Selects elements `[min_index, max_index)` of the time-sorted sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceDefinition {
    pub abstracted_from: BTreeSet<String>,
    #[serde(default)]
    pub min_index: usize,
    /// Exclusive; `None` runs to the end.
    #[serde(default)]
    pub max_index: Option<usize>,
    /// Assert one fact spanning the selection instead of one per element.
    #[serde(default)]
    pub merged_interval: bool,
}

impl SliceDefinition {
    pub fn new<I, S>(abstracted_from: I, min_index: usize, max_index: Option<usize>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            abstracted_from: abstracted_from.into_iter().map(Into::into).collect(),
            min_index,
            max_index,
            merged_interval: false,
        }
    }

    /// Index range to select from `len` sorted sources.
    pub fn range(&self, len: usize) -> std::ops::Range<usize> {
        let end = self.max_index.map_or(len, |m| m.min(len));
        let start = self.min_index.min(end);
        start..end
    }
}

/// Summary over a window of one source. Carried as data; no rule is built
/// for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationDefinition {
    pub abstracted_from: String,
    #[serde(default)]
    pub window_start_offset: Option<TimeSpan>,
    #[serde(default)]
    pub window_finish_offset: Option<TimeSpan>,
    pub function: String,
}
