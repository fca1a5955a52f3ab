//! Time-ordered sequences of facts and index-range segments over them.

use crate::types::Interval;

/// Anything with a position on the time line.
pub trait Temporal {
    fn interval(&self) -> Interval;
}

impl Temporal for Interval {
    fn interval(&self) -> Interval {
        *self
    }
}

/// A list of temporal items sorted by start, then finish.
#[derive(Debug, Clone)]
pub struct Sequence<T> {
    items: Vec<T>,
}

impl<T: Temporal> Sequence<T> {
    /// Build a sequence, sorting the items by time. The sort is stable so
    /// simultaneous items keep their input order.
    pub fn new(mut items: Vec<T>) -> Self {
        items.sort_by_key(|item| {
            let i = item.interval();
            (i.start, i.finish)
        });
        Self { items }
    }

    /// Items falling entirely inside `interval`.
    pub fn within(&self, interval: &Interval) -> Sequence<T>
    where
        T: Clone,
    {
        Sequence {
            items: self
                .items
                .iter()
                .filter(|item| interval.contains(&item.interval()))
                .cloned()
                .collect(),
        }
    }

    /// Hull of the items in `[first, last]`.
    pub fn interval_of(&self, first: usize, last: usize) -> Option<Interval> {
        if first > last || last >= self.items.len() {
            return None;
        }
        self.items[first..=last]
            .iter()
            .map(Temporal::interval)
            .reduce(|a, b| a.span(&b))
    }
}

impl<T> Sequence<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn into_inner(self) -> Vec<T> {
        self.items
    }
}

/// A contiguous `[first, last]` view over a [`Sequence`].
pub struct Segment<'a, T> {
    sequence: &'a Sequence<T>,
    first: usize,
    last: usize,
}

impl<T> Clone for Segment<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Segment<'_, T> {}

impl<'a, T: Temporal> Segment<'a, T> {
    /// Returns `None` when the range is empty or out of bounds.
    pub fn new(sequence: &'a Sequence<T>, first: usize, last: usize) -> Option<Self> {
        (first <= last && last < sequence.len()).then_some(Self {
            sequence,
            first,
            last,
        })
    }

    /// Move the view in place; leaves it unchanged and returns false if the
    /// new range is invalid.
    pub fn reset(&mut self, first: usize, last: usize) -> bool {
        if first <= last && last < self.sequence.len() {
            self.first = first;
            self.last = last;
            true
        } else {
            false
        }
    }

    pub fn first_index(&self) -> usize {
        self.first
    }

    pub fn last_index(&self) -> usize {
        self.last
    }

    pub fn len(&self) -> usize {
        self.last - self.first + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn items(&self) -> &'a [T] {
        &self.sequence.as_slice()[self.first..=self.last]
    }

    pub fn first(&self) -> &'a T {
        &self.items()[0]
    }

    pub fn last(&self) -> &'a T {
        &self.items()[self.len() - 1]
    }

    pub fn sequence(&self) -> &'a Sequence<T> {
        self.sequence
    }

    /// Hull of every item in the segment.
    pub fn interval(&self) -> Interval {
        self.items()
            .iter()
            .map(Temporal::interval)
            .reduce(|a, b| a.span(&b))
            .unwrap_or_default()
    }

    pub fn duration_millis(&self) -> i64 {
        self.interval().duration_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(times: &[i64]) -> Sequence<Interval> {
        Sequence::new(times.iter().map(|t| Interval::point(*t)).collect())
    }

    #[test]
    fn test_sequence_sorts_by_time() {
        let seq = points(&[30, 10, 20]);
        let starts: Vec<i64> = seq.iter().map(|i| i.start).collect();
        assert_eq!(starts, vec![10, 20, 30]);
    }

    #[test]
    fn test_segment_bounds() {
        let seq = points(&[0, 1, 2]);
        assert!(Segment::new(&seq, 0, 2).is_some());
        assert!(Segment::new(&seq, 0, 3).is_none());
        assert!(Segment::new(&seq, 2, 1).is_none());
    }

    #[test]
    fn test_segment_interval_and_reset() {
        let seq = points(&[0, 5, 9, 14]);
        let mut seg = Segment::new(&seq, 0, 1).unwrap();
        assert_eq!(seg.interval(), Interval::new(0, 5));
        assert!(seg.reset(1, 3));
        assert_eq!(seg.len(), 3);
        assert_eq!(seg.duration_millis(), 9);
        assert!(!seg.reset(2, 4));
        assert_eq!(seg.first_index(), 1);
    }

    #[test]
    fn test_within() {
        let seq = points(&[0, 5, 9, 14]);
        let sub = seq.within(&Interval::new(4, 10));
        assert_eq!(sub.len(), 2);
    }
}
