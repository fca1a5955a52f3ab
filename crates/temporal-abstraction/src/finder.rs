//! Sliding-window pattern finder.
//!
//! [`find_patterns`] walks candidate windows over a time-sorted
//! [`Sequence`], asks a classifier for a value for each window, merges
//! neighbouring matches with equal values, and advances according to the
//! skip directives in [`WindowSettings`]. [`LowLevelAbstractionFinder`]
//! drives it for a low-level abstraction definition and asserts the
//! resulting abstract parameters.

use std::sync::Arc;

use tracing::debug;

use crate::algorithm::Algorithm;
use crate::definition::{LowLevelAbstractionDefinition, PropositionDefinition};
use crate::derivations::DerivationsBuilder;
use crate::gap::{GapFunction, HorizontalTemporalInference, MinMaxGapBetweenValues};
use crate::proposition::Proposition;
use crate::sequence::{Segment, Sequence, Temporal};
use crate::types::{AbstractionError, AbstractionResult, Interval};

/// Constraint on consecutive values inside a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueGap {
    MinMax(MinMaxGapBetweenValues),
    Function(GapFunction),
}

impl ValueGap {
    fn accepts(&self, prev: &Interval, next: &Interval) -> bool {
        match self {
            ValueGap::MinMax(g) => g.accepts(prev, next),
            ValueGap::Function(g) => g.accepts(prev, next),
        }
    }
}

impl Default for ValueGap {
    fn default() -> Self {
        ValueGap::MinMax(MinMaxGapBetweenValues::default())
    }
}

/// Window bounds and search directives for one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSettings {
    /// `0` means no minimum: the first window spans the whole sequence and
    /// later windows hold at least one value.
    pub minimum_values: usize,
    pub maximum_values: Option<usize>,
    /// Each window runs to the end of the sequence and a match ends the scan.
    pub all: bool,
    pub minimum_duration: Option<i64>,
    pub maximum_duration: Option<i64>,
    pub value_gap: ValueGap,
    pub skip_start: usize,
    pub skip_end: usize,
    pub skip: usize,
    pub max_overlapping: usize,
    pub advance_row_skip_end: Option<usize>,
    pub hti: HorizontalTemporalInference,
    pub gap_function: GapFunction,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            minimum_values: 1,
            maximum_values: None,
            all: false,
            minimum_duration: None,
            maximum_duration: None,
            value_gap: ValueGap::default(),
            skip_start: 0,
            skip_end: 1,
            skip: 0,
            max_overlapping: 0,
            advance_row_skip_end: None,
            hti: HorizontalTemporalInference::new(true, true),
            gap_function: GapFunction::DEFAULT,
        }
    }
}

/// A merged run of matching windows.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternMatch<V> {
    pub first: usize,
    pub last: usize,
    pub value: V,
    pub interval: Interval,
}

enum Placement {
    Accept(usize, usize),
    Reject(usize, usize),
    End,
}

struct Scanner<'a, T> {
    sequence: &'a Sequence<T>,
    settings: &'a WindowSettings,
    minimum: usize,
}

impl<'a, T: Temporal> Scanner<'a, T> {
    fn new(sequence: &'a Sequence<T>, settings: &'a WindowSettings) -> Self {
        Self {
            sequence,
            settings,
            minimum: settings.minimum_values.max(1),
        }
    }

    fn len(&self) -> usize {
        self.sequence.len()
    }

    /// Widen to the minimum number of values and pull the start forward when
    /// the window exceeds the maximum.
    fn normalize(&self, mut first: usize, mut last: usize) -> (usize, usize) {
        if self.settings.all {
            return (first, self.len().saturating_sub(1).max(first));
        }
        last = last.max(first + self.minimum - 1);
        if let Some(max) = self.settings.maximum_values {
            let max = max.max(self.minimum);
            if last - first + 1 > max {
                first = last + 1 - max;
            }
        }
        (first, last)
    }

    /// Grow the window until it reaches the minimum duration, then check the
    /// maxima.
    fn place(&self, first: usize, mut last: usize) -> Placement {
        if last >= self.len() {
            return Placement::End;
        }
        let duration = |last: usize| {
            self.sequence
                .interval_of(first, last)
                .map(|i| i.duration_millis())
                .unwrap_or_default()
        };
        if let Some(min_duration) = self.settings.minimum_duration {
            while duration(last) < min_duration {
                if last + 1 >= self.len() {
                    return Placement::End;
                }
                last += 1;
                if let Some(max) = self.settings.maximum_values {
                    if last - first + 1 > max {
                        return Placement::Reject(first, last);
                    }
                }
            }
        }
        if let Some(max_duration) = self.settings.maximum_duration {
            if duration(last) > max_duration {
                return Placement::Reject(first, last);
            }
        }
        Placement::Accept(first, last)
    }

    /// Place a window, falling back to row advances while it is rejected.
    fn settle(&self, first: usize, last: usize) -> Option<(usize, usize)> {
        let (mut first, mut last) = self.normalize(first, last);
        loop {
            match self.place(first, last) {
                Placement::Accept(f, l) => return Some((f, l)),
                Placement::End => return None,
                Placement::Reject(f, l) => {
                    debug!(first = f, last = l, "window rejected by maximum constraint");
                    (first, last) = self.normalize(f + 1, self.row_advance_last(f, l));
                }
            }
        }
    }

    fn row_advance_last(&self, first: usize, last: usize) -> usize {
        match self.settings.advance_row_skip_end {
            Some(k) if !self.settings.all => last + k,
            _ => first + self.minimum,
        }
    }

    fn initial(&self) -> Option<(usize, usize)> {
        if self.settings.minimum_values == 0 {
            return self.settle(0, self.len() - 1);
        }
        self.settle(0, self.minimum - 1)
    }

    fn row_advance(&self, first: usize, last: usize) -> Option<(usize, usize)> {
        self.settle(first + 1, self.row_advance_last(first, last))
    }

    /// Next window after a match at `[first, last]` with the pending merged
    /// match at `[pending_first, pending_last]`.
    fn after_match(
        &self,
        first: usize,
        last: usize,
        pending_first: usize,
        pending_last: usize,
    ) -> Option<(usize, usize)> {
        let s = self.settings;
        if s.all {
            return None;
        }
        let mut next_first = first + 1;
        let mut next_last = (last + 1).max(pending_last + s.skip_end.max(1));
        if s.skip_start > 0 {
            next_first = next_first.max(pending_first + s.skip_start);
        }
        if s.max_overlapping > 0 {
            next_first = next_first.max((pending_last + 2).saturating_sub(s.max_overlapping));
        }
        if s.skip > 0 {
            next_first = pending_last + s.skip;
            next_last = next_first + self.minimum - 1;
        }
        self.settle(next_first, next_last)
    }

    fn gaps_ok(&self, segment: &Segment<'_, T>) -> bool {
        let items = segment.items();
        items
            .windows(2)
            .all(|pair| self.settings.value_gap.accepts(&pair[0].interval(), &pair[1].interval()))
    }
}

/// Scan `sequence` and return the merged matches in time order.
///
/// `classify` is called once per candidate window that passes the value gap
/// check; an error aborts the scan.
pub fn find_patterns<T, V, F>(
    sequence: &Sequence<T>,
    settings: &WindowSettings,
    mut classify: F,
) -> AbstractionResult<Vec<PatternMatch<V>>>
where
    T: Temporal,
    V: PartialEq,
    F: FnMut(&Segment<'_, T>) -> AbstractionResult<Option<V>>,
{
    let mut matches = Vec::new();
    if sequence.is_empty() {
        return Ok(matches);
    }
    let scanner = Scanner::new(sequence, settings);
    let mut pending: Option<PatternMatch<V>> = None;
    let mut window = scanner.initial();
    let mut segment = Segment::new(sequence, 0, 0)
        .ok_or_else(|| AbstractionError::Internal("empty sequence".into()))?;

    while let Some((first, last)) = window {
        if !segment.reset(first, last) {
            return Err(AbstractionError::Internal(format!("invalid window [{first}, {last}]")));
        }
        let value = if scanner.gaps_ok(&segment) {
            classify(&segment)?
        } else {
            debug!(first, last, "window skipped by value gap constraint");
            None
        };

        let Some(value) = value else {
            window = scanner.row_advance(first, last);
            continue;
        };

        let interval = segment.interval();
        let merged = match pending.as_mut() {
            Some(p)
                if p.value == value
                    && (settings.hti.execute_indices(p.first, p.last, first, last)
                        || settings.gap_function.accepts(&p.interval, &interval)) =>
            {
                p.first = p.first.min(first);
                p.last = p.last.max(last);
                p.interval = p.interval.span(&interval);
                true
            }
            _ => false,
        };
        if !merged {
            if let Some(done) = pending.take() {
                matches.push(done);
            }
            pending = Some(PatternMatch {
                first,
                last,
                value,
                interval,
            });
        }

        window = match &pending {
            Some(p) => scanner.after_match(first, last, p.first, p.last),
            None => None,
        };
    }

    if let Some(done) = pending {
        matches.push(done);
    }
    Ok(matches)
}

/// Receives facts produced by a consequence.
pub trait ObjectAsserter {
    fn assert_object(&mut self, proposition: Arc<Proposition>);
}

impl ObjectAsserter for Vec<Arc<Proposition>> {
    fn assert_object(&mut self, proposition: Arc<Proposition>) {
        self.push(proposition);
    }
}

/// Finds instances of one low-level abstraction in a parameter sequence.
pub struct LowLevelAbstractionFinder<'a> {
    definition: &'a PropositionDefinition,
    low_level: &'a LowLevelAbstractionDefinition,
    algorithm: Option<&'a dyn Algorithm>,
}

impl<'a> LowLevelAbstractionFinder<'a> {
    /// Fails when `definition` is not a low-level abstraction.
    pub fn new(
        definition: &'a PropositionDefinition,
        algorithm: Option<&'a dyn Algorithm>,
    ) -> AbstractionResult<Self> {
        let low_level = definition.as_low_level().ok_or_else(|| {
            AbstractionError::InvalidDefinition(format!(
                "{} is not a low-level abstraction",
                definition.id()
            ))
        })?;
        Ok(Self {
            definition,
            low_level,
            algorithm,
        })
    }

    /// Initialize the algorithm against every value definition's arguments.
    pub fn initialize(&self) -> AbstractionResult<()> {
        if let Some(algorithm) = self.algorithm {
            for value_definition in &self.low_level.value_definitions {
                algorithm.initialize(&value_definition.parameters)?;
            }
        }
        Ok(())
    }

    /// Scan `sequence`, assert one abstract parameter per merged match, and
    /// link every contributing parameter to it. Returns the number asserted.
    pub fn process(
        &self,
        sequence: &Sequence<Arc<Proposition>>,
        asserter: &mut dyn ObjectAsserter,
        derivations: &mut DerivationsBuilder,
    ) -> AbstractionResult<usize> {
        let settings = self.low_level.window_settings(
            self.algorithm,
            self.definition.horizontal_temporal_inference(),
        );
        let matches = find_patterns(sequence, &settings, |segment| {
            Ok(self
                .low_level
                .satisfied_by(segment, self.algorithm)?
                .map(|vd| vd.value.clone()))
        })?;

        for m in &matches {
            let abstraction = Arc::new(Proposition::abstract_parameter(
                self.definition.id(),
                m.interval,
                Some(m.value.clone()),
            ));
            for source in &sequence.as_slice()[m.first..=m.last] {
                derivations.proposition_asserted(source, &abstraction);
            }
            debug!(
                definition = self.definition.id(),
                value = %m.value,
                first = m.first,
                last = m.last,
                "asserting low-level abstraction"
            );
            asserter.assert_object(abstraction);
        }
        Ok(matches.len())
    }
}
