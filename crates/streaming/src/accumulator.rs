use std::collections::{BTreeMap, BTreeSet};

use foundation::Category;

use crate::protocol::Feature;

/// Outcome of one [`FeatureAccumulator::ingest`] call.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct IngestSummary {
    /// Records whose id was not present yet.
    pub inserted: usize,
    /// Records that overwrote an earlier record with the same id.
    pub replaced: usize,
    /// Categories seen for the first time in this query.
    pub new_categories: usize,
}

/// Materialized collection for one logical query.
///
/// Notes on determinism:
/// - Records are keyed by id in a `BTreeMap`, so snapshots come out in id
///   order no matter how batches were split.
/// - The latest arrival for an id replaces the earlier one entirely.
/// - Nothing is evicted until [`FeatureAccumulator::reset`].
#[derive(Debug, Default)]
pub struct FeatureAccumulator {
    features: BTreeMap<String, Feature>,
    categories: BTreeSet<Category>,
    categories_changed: bool,
}

impl FeatureAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.features.clear();
        self.categories.clear();
        self.categories_changed = false;
    }

    pub fn ingest(&mut self, features: impl IntoIterator<Item = Feature>) -> IngestSummary {
        let mut summary = IngestSummary::default();
        for feature in features {
            if !self.categories.contains(feature.category()) {
                self.categories.insert(feature.category().clone());
                self.categories_changed = true;
                summary.new_categories += 1;
            }
            match self.features.insert(feature.id().to_string(), feature) {
                Some(_) => summary.replaced += 1,
                None => summary.inserted += 1,
            }
        }
        summary
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Feature> {
        self.features.get(id)
    }

    /// Current collection, ordered by id. Safe to call mid-stream.
    pub fn snapshot(&self) -> Vec<Feature> {
        self.features.values().cloned().collect()
    }

    /// Every category seen since the last reset.
    pub fn categories(&self) -> &BTreeSet<Category> {
        &self.categories
    }

    /// Reports whether new categories were discovered since the last call.
    pub fn take_categories_changed(&mut self) -> bool {
        std::mem::take(&mut self.categories_changed)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::FeatureAccumulator;
    use crate::protocol::{EventProperties, Feature, Geometry};
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    /// Test record; `version` shifts `updated_at` by that many minutes.
    pub(crate) fn record(id: &str, category: &str, version: i64) -> Feature {
        let started = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        Feature::new(
            Geometry::point(10.0, 20.0),
            EventProperties {
                id: id.to_string(),
                title: format!("{category} {id} v{version}"),
                category: category.into(),
                source: "test".to_string(),
                severity: None,
                magnitude: None,
                started_at: started,
                updated_at: started + Duration::minutes(version),
                url: None,
                description: None,
                metadata: None,
            },
        )
    }

    #[test]
    fn last_write_wins_per_id() {
        let mut acc = FeatureAccumulator::new();
        acc.ingest([record("a", "flood", 1), record("b", "flood", 1)]);
        let summary = acc.ingest([record("a", "flood", 2)]);

        assert_eq!(summary.replaced, 1);
        assert_eq!(summary.inserted, 0);
        assert_eq!(acc.len(), 2);
        assert_eq!(acc.get("a"), Some(&record("a", "flood", 2)));
    }

    #[test]
    fn final_state_is_independent_of_batch_splits() {
        let stream = vec![
            record("a", "flood", 1),
            record("b", "storm", 1),
            record("a", "flood", 3),
            record("c", "volcano", 1),
            record("b", "storm", 2),
            record("a", "flood", 4),
        ];

        let mut whole = FeatureAccumulator::new();
        whole.ingest(stream.clone());
        let expected = whole.snapshot();
        assert_eq!(expected.len(), 3);

        for batch_size in 1..=stream.len() {
            let mut acc = FeatureAccumulator::new();
            for chunk in stream.chunks(batch_size) {
                acc.ingest(chunk.to_vec());
            }
            assert_eq!(acc.snapshot(), expected, "batch size {batch_size}");
        }
        assert_eq!(whole.get("a"), Some(&record("a", "flood", 4)));
        assert_eq!(whole.get("b"), Some(&record("b", "storm", 2)));
    }

    #[test]
    fn reingesting_same_batch_is_idempotent() {
        let batch = vec![record("a", "flood", 1), record("b", "storm", 1)];
        let mut acc = FeatureAccumulator::new();
        acc.ingest(batch.clone());
        let before = acc.snapshot();
        acc.take_categories_changed();

        let summary = acc.ingest(batch);
        assert_eq!(summary.inserted, 0);
        assert_eq!(summary.new_categories, 0);
        assert_eq!(acc.snapshot(), before);
        assert!(!acc.take_categories_changed());
    }

    #[test]
    fn discovers_categories_and_flags_changes() {
        let mut acc = FeatureAccumulator::new();
        let s = acc.ingest([record("a", "flood", 1), record("b", "flood", 1)]);
        assert_eq!(s.new_categories, 1);
        assert!(acc.take_categories_changed());
        assert!(!acc.take_categories_changed());

        acc.ingest([record("c", "wildfire", 1)]);
        assert!(acc.take_categories_changed());
        let names: Vec<&str> = acc.categories().iter().map(|c| c.as_str()).collect();
        assert_eq!(names, vec!["flood", "wildfire"]);
    }

    #[test]
    fn size_never_shrinks_until_reset() {
        let mut acc = FeatureAccumulator::new();
        let mut last = 0;
        for (i, id) in ["a", "b", "a", "c", "b"].iter().enumerate() {
            acc.ingest([record(id, "storm", i as i64)]);
            assert!(acc.len() >= last);
            last = acc.len();
        }

        acc.reset();
        assert!(acc.is_empty());
        assert!(acc.categories().is_empty());
        assert!(!acc.take_categories_changed());
    }
}
