//! Per-category layer visibility predicates.
//!
//! For a cursor `n`, each main-map layer shows the features of its
//! category that happened strictly before `n`:
//!
//! ```text
//! visible(feature) = feature.index < n AND feature.type == category
//! ```
//!
//! The controller never evaluates these on the host's behalf; it pushes
//! them as declarative [`FilterExpression`]s. [`CategoryPredicate::matches`]
//! exists for headless hosts, exports and tests.

use crate::incidents::{IncidentCollection, IncidentFeature, IncidentKind};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// The three categories the main map animates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelineCategory {
    Fire,
    Police,
    Shots,
}

impl TimelineCategory {
    /// All categories, in layer order.
    pub const ALL: [TimelineCategory; 3] = [
        TimelineCategory::Fire,
        TimelineCategory::Police,
        TimelineCategory::Shots,
    ];

    /// The `type` property value this category selects.
    pub fn kind(&self) -> IncidentKind {
        match self {
            TimelineCategory::Fire => IncidentKind::Fire,
            TimelineCategory::Police => IncidentKind::Police,
            TimelineCategory::Shots => IncidentKind::Shots,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TimelineCategory::Fire => "fire",
            TimelineCategory::Police => "police",
            TimelineCategory::Shots => "shots",
        }
    }
}

impl fmt::Display for TimelineCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Opaque declarative filter in the host renderer's expression language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterExpression(Value);

impl FilterExpression {
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `index < before AND type == category`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPredicate {
    pub category: TimelineCategory,
    pub before: i64,
}

impl CategoryPredicate {
    pub fn new(category: TimelineCategory, before: i64) -> Self {
        Self { category, before }
    }

    /// Evaluates the predicate against one feature.
    pub fn matches(&self, feature: &IncidentFeature) -> bool {
        feature.index < self.before && feature.kind == self.category.kind()
    }

    /// Builds the Mapbox-GL style filter expression.
    pub fn to_expression(&self) -> FilterExpression {
        FilterExpression(json!([
            "all",
            ["<", ["get", "index"], self.before],
            ["==", ["get", "type"], self.category.name()]
        ]))
    }
}

/// Match counts per category for one predicate set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub fire: usize,
    pub police: usize,
    pub shots: usize,
}

impl CategoryCounts {
    pub fn get(&self, category: TimelineCategory) -> usize {
        match category {
            TimelineCategory::Fire => self.fire,
            TimelineCategory::Police => self.police,
            TimelineCategory::Shots => self.shots,
        }
    }

    pub fn total(&self) -> usize {
        self.fire + self.police + self.shots
    }
}

/// The three predicates derived from a single cursor value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateSet {
    pub cursor: i64,
    predicates: [CategoryPredicate; 3],
}

impl PredicateSet {
    /// Derives all category predicates for `cursor`.
    pub fn for_cursor(cursor: i64) -> Self {
        Self {
            cursor,
            predicates: TimelineCategory::ALL.map(|c| CategoryPredicate::new(c, cursor)),
        }
    }

    pub fn get(&self, category: TimelineCategory) -> &CategoryPredicate {
        match category {
            TimelineCategory::Fire => &self.predicates[0],
            TimelineCategory::Police => &self.predicates[1],
            TimelineCategory::Shots => &self.predicates[2],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &CategoryPredicate> {
        self.predicates.iter()
    }

    /// Counts the visible features per category.
    pub fn count_matches(&self, collection: &IncidentCollection) -> CategoryCounts {
        let mut counts = CategoryCounts::default();
        for feature in collection.iter() {
            for predicate in &self.predicates {
                if predicate.matches(feature) {
                    match predicate.category {
                        TimelineCategory::Fire => counts.fire += 1,
                        TimelineCategory::Police => counts.police += 1,
                        TimelineCategory::Shots => counts.shots += 1,
                    }
                }
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incidents::test_support::incident;
    use proptest::prelude::*;

    #[test]
    fn test_strict_less_than_boundary() {
        let fire = CategoryPredicate::new(TimelineCategory::Fire, 10);

        assert!(fire.matches(&incident(9, "fire", "d", None)));
        assert!(!fire.matches(&incident(10, "fire", "d", None)));
        assert!(!fire.matches(&incident(11, "fire", "d", None)));
    }

    #[test]
    fn test_category_must_match() {
        let police = CategoryPredicate::new(TimelineCategory::Police, 100);

        assert!(police.matches(&incident(1, "police", "d", None)));
        assert!(!police.matches(&incident(1, "fire", "d", None)));
        assert!(!police.matches(&incident(1, "311", "d", None)));
    }

    #[test]
    fn test_expression_shape() {
        let expr = CategoryPredicate::new(TimelineCategory::Shots, 42).to_expression();
        assert_eq!(
            expr.as_value(),
            &json!(["all", ["<", ["get", "index"], 42], ["==", ["get", "type"], "shots"]])
        );
        assert_eq!(
            expr.to_string(),
            r#"["all",["<",["get","index"],42],["==",["get","type"],"shots"]]"#
        );
    }

    #[test]
    fn test_count_matches() {
        let collection = IncidentCollection::new(vec![
            incident(0, "fire", "d", None),
            incident(1, "fire", "d", None),
            incident(1, "police", "d", None),
            incident(2, "shots", "d", None),
            incident(3, "311", "d", None),
        ]);

        let counts = PredicateSet::for_cursor(2).count_matches(&collection);
        assert_eq!(counts, CategoryCounts { fire: 2, police: 1, shots: 0 });
        assert_eq!(counts.total(), 3);

        let counts = PredicateSet::for_cursor(100).count_matches(&collection);
        assert_eq!(counts.get(TimelineCategory::Shots), 1);
        assert_eq!(counts.total(), 4);
    }

    proptest! {
        #[test]
        fn prop_predicate_matches_definition(
            cursor in -50i64..50,
            index in -50i64..50,
            kind in prop::sample::select(vec!["fire", "police", "shots", "311"]),
        ) {
            let feature = incident(index, kind, "d", None);
            let set = PredicateSet::for_cursor(cursor);
            for predicate in set.iter() {
                let expected = index < cursor && kind == predicate.category.name();
                prop_assert_eq!(predicate.matches(&feature), expected);
            }
        }
    }
}
