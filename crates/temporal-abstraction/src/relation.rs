//! Temporal relations between two intervals.

use serde::{Deserialize, Serialize};

use crate::types::{Interval, TimeSpan};

/// One of Allen's thirteen interval relations, read as `lhs <relation> rhs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllenRelation {
    Before,
    Meets,
    Overlaps,
    Starts,
    During,
    Finishes,
    Equals,
    FinishedBy,
    Contains,
    StartedBy,
    OverlappedBy,
    MetBy,
    After,
}

impl AllenRelation {
    pub fn holds(self, lhs: &Interval, rhs: &Interval) -> bool {
        let (ls, lf, rs, rf) = (lhs.start, lhs.finish, rhs.start, rhs.finish);
        match self {
            AllenRelation::Before => lf < rs,
            AllenRelation::Meets => lf == rs && ls < lf,
            AllenRelation::Overlaps => ls < rs && rs < lf && lf < rf,
            AllenRelation::Starts => ls == rs && lf < rf,
            AllenRelation::During => rs < ls && lf < rf,
            AllenRelation::Finishes => lf == rf && rs < ls,
            AllenRelation::Equals => ls == rs && lf == rf,
            AllenRelation::FinishedBy => AllenRelation::Finishes.holds(rhs, lhs),
            AllenRelation::Contains => AllenRelation::During.holds(rhs, lhs),
            AllenRelation::StartedBy => AllenRelation::Starts.holds(rhs, lhs),
            AllenRelation::OverlappedBy => AllenRelation::Overlaps.holds(rhs, lhs),
            AllenRelation::MetBy => AllenRelation::Meets.holds(rhs, lhs),
            AllenRelation::After => AllenRelation::Before.holds(rhs, lhs),
        }
    }
}

/// Endpoint-distance constraints between `lhs` and `rhs`. Every bound that is
/// set must hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DistanceConstraints {
    /// `rhs.start - lhs.start`
    #[serde(default)]
    pub min_distance_between_starts: Option<TimeSpan>,
    #[serde(default)]
    pub max_distance_between_starts: Option<TimeSpan>,
    /// `rhs.finish - lhs.finish`
    #[serde(default)]
    pub min_distance_between_finishes: Option<TimeSpan>,
    #[serde(default)]
    pub max_distance_between_finishes: Option<TimeSpan>,
    /// `rhs.start - lhs.finish`
    #[serde(default)]
    pub min_distance_between: Option<TimeSpan>,
    #[serde(default)]
    pub max_distance_between: Option<TimeSpan>,
    /// `rhs.finish - lhs.start`
    #[serde(default)]
    pub min_span: Option<TimeSpan>,
    #[serde(default)]
    pub max_span: Option<TimeSpan>,
}

impl DistanceConstraints {
    pub fn holds(&self, lhs: &Interval, rhs: &Interval) -> bool {
        within(
            rhs.start - lhs.start,
            self.min_distance_between_starts,
            self.max_distance_between_starts,
        ) && within(
            rhs.finish - lhs.finish,
            self.min_distance_between_finishes,
            self.max_distance_between_finishes,
        ) && within(
            rhs.start - lhs.finish,
            self.min_distance_between,
            self.max_distance_between,
        ) && within(rhs.finish - lhs.start, self.min_span, self.max_span)
    }
}

fn within(distance: i64, min: Option<TimeSpan>, max: Option<TimeSpan>) -> bool {
    min.map_or(true, |m| distance >= m.millis()) && max.map_or(true, |m| distance <= m.millis())
}

/// A relation between two intervals used by pattern and high-level matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Relation {
    Allen { relation: AllenRelation },
    Distance(DistanceConstraints),
}

impl Relation {
    pub fn allen(relation: AllenRelation) -> Self {
        Relation::Allen { relation }
    }

    /// `rhs` starts after `lhs` finishes, by at most `within` when given.
    pub fn followed_by(within: Option<TimeSpan>) -> Self {
        Relation::Distance(DistanceConstraints {
            min_distance_between: Some(TimeSpan::new(1, crate::types::TimeUnit::Millisecond)),
            max_distance_between: within,
            ..DistanceConstraints::default()
        })
    }

    pub fn has_relation(&self, lhs: &Interval, rhs: &Interval) -> bool {
        match self {
            Relation::Allen { relation } => relation.holds(lhs, rhs),
            Relation::Distance(constraints) => constraints.holds(lhs, rhs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TimeUnit;

    #[test]
    fn test_allen_relations() {
        let a = Interval::new(0, 10);
        assert!(AllenRelation::Before.holds(&a, &Interval::new(11, 20)));
        assert!(AllenRelation::Meets.holds(&a, &Interval::new(10, 20)));
        assert!(AllenRelation::Overlaps.holds(&a, &Interval::new(5, 20)));
        assert!(AllenRelation::During.holds(&Interval::new(2, 8), &a));
        assert!(AllenRelation::Contains.holds(&a, &Interval::new(2, 8)));
        assert!(AllenRelation::Equals.holds(&a, &Interval::new(0, 10)));
        assert!(AllenRelation::After.holds(&Interval::new(11, 20), &a));
        assert!(!AllenRelation::Before.holds(&a, &Interval::new(10, 20)));
    }

    #[test]
    fn test_followed_by_within() {
        let rel = Relation::followed_by(Some(TimeSpan::new(5, TimeUnit::Millisecond)));
        let a = Interval::new(0, 10);
        assert!(rel.has_relation(&a, &Interval::new(12, 14)));
        assert!(!rel.has_relation(&a, &Interval::new(16, 18)));
        assert!(!rel.has_relation(&a, &Interval::new(10, 18)));
    }

    #[test]
    fn test_relation_json() {
        let json = r#"{"type":"allen","relation":"before"}"#;
        let rel: Relation = serde_json::from_str(json).unwrap();
        assert_eq!(rel, Relation::allen(AllenRelation::Before));
    }
}
