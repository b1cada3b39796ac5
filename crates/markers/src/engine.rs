#![forbid(unsafe_code)]

use crate::sighting::TreeSighting;
use crate::surface::MarkerSurface;
use canopy_core::geo::GeoPoint;
use canopy_core::ids::TreeKey;
use serde_json::Value;
use std::collections::HashMap;
use std::collections::VecDeque;

/// One rendered marker.
#[derive(Clone, Debug)]
struct Marker {
    position: GeoPoint,
    popup: Value,
}

/// Result of one reconciliation pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub seq: u64,
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    /// Result rows without a resolvable key (corrupt coordinates).
    pub skipped: usize,
    /// True when the whole response was stale and nothing changed.
    pub discarded: bool,
}

/// Cumulative counters across the session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineMetrics {
    pub fetches: u64,
    pub failed_fetches: u64,
    pub discarded_responses: u64,
    pub created_total: u64,
    pub updated_total: u64,
    pub removed_total: u64,
    pub last_sync: Option<SyncOutcome>,
}

/// Reconciles successive query result sets against a rendering surface.
///
/// Markers are keyed by tree identity; a tree seen again is updated in
/// place, never destroyed and recreated, so overlapping re-fetches cause no
/// visual churn. When the active set exceeds the capacity, the
/// oldest-inserted markers are evicted first, regardless of whether they
/// appeared in the current result set.
///
/// Each `apply` is one indivisible state transition. Responses carry a
/// monotonically increasing fetch sequence number; a response older than the
/// last applied one is discarded whole, so a slow stale fetch can never
/// overwrite fresher rendered state.
#[derive(Debug)]
pub struct MarkerEngine<S: MarkerSurface> {
    surface: S,
    capacity: usize,
    markers: HashMap<TreeKey, Marker>,
    order: VecDeque<TreeKey>,
    last_applied_seq: Option<u64>,
    metrics: EngineMetrics,
}

impl<S: MarkerSurface> MarkerEngine<S> {
    pub fn new(surface: S, capacity: usize) -> Self {
        Self {
            surface,
            capacity: capacity.max(1),
            markers: HashMap::new(),
            order: VecDeque::new(),
            last_applied_seq: None,
            metrics: EngineMetrics::default(),
        }
    }

    /// Apply one fetched result sequence.
    pub fn apply(&mut self, seq: u64, results: &[TreeSighting]) -> SyncOutcome {
        if self.last_applied_seq.is_some_and(|last| seq < last) {
            let outcome = SyncOutcome {
                seq,
                discarded: true,
                ..SyncOutcome::default()
            };
            self.metrics.discarded_responses += 1;
            self.metrics.last_sync = Some(outcome.clone());
            return outcome;
        }

        let mut outcome = SyncOutcome {
            seq,
            ..SyncOutcome::default()
        };

        for sighting in results {
            let Some(key) = sighting.key() else {
                outcome.skipped += 1;
                continue;
            };
            // key() only resolves when the position is valid.
            let Some(position) = sighting.position() else {
                outcome.skipped += 1;
                continue;
            };
            let popup = sighting.popup();
            match self.markers.get_mut(&key) {
                Some(marker) => {
                    marker.position = position;
                    marker.popup = popup;
                    self.surface.update(&key, position, &marker.popup);
                    outcome.updated += 1;
                }
                None => {
                    self.surface.create(&key, position, &popup);
                    self.markers.insert(key.clone(), Marker { position, popup });
                    self.order.push_back(key);
                    outcome.created += 1;
                }
            }
        }

        // FIFO eviction by first-seen time, independent of current
        // relevance to the viewport.
        while self.markers.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if self.markers.remove(&oldest).is_some() {
                self.surface.remove(&oldest);
                outcome.removed += 1;
            }
        }

        self.last_applied_seq = Some(seq);
        self.metrics.fetches += 1;
        self.metrics.created_total += outcome.created as u64;
        self.metrics.updated_total += outcome.updated as u64;
        self.metrics.removed_total += outcome.removed as u64;
        self.metrics.last_sync = Some(outcome.clone());
        outcome
    }

    /// A fetch failed: log it in the metrics, touch nothing else.
    pub fn record_failed_fetch(&mut self) {
        self.metrics.failed_fetches += 1;
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, key: &TreeKey) -> bool {
        self.markers.contains_key(key)
    }

    /// Active keys, oldest first.
    pub fn keys_by_insertion(&self) -> impl Iterator<Item = &TreeKey> {
        self.order.iter()
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{RecordingSurface, SurfaceEvent};
    use crate::MARKER_CAPACITY;

    fn sighting(objectid: i64) -> TreeSighting {
        TreeSighting {
            source: "Toronto Open Data Street Trees".to_string(),
            objectid: Some(objectid),
            common_name: Some("Red Oak".to_string()),
            botanical_name: None,
            address: None,
            streetname: None,
            dbh: Some(40),
            latitude: 43.6532 + objectid as f64 * 1e-4,
            longitude: -79.3832,
            distance: objectid as f64,
        }
    }

    fn key(objectid: i64) -> TreeKey {
        TreeKey::object("Toronto Open Data Street Trees", objectid)
    }

    #[test]
    fn identical_consecutive_results_only_update() {
        let mut engine = MarkerEngine::new(RecordingSurface::default(), 10);
        let results: Vec<TreeSighting> = (1..=4).map(sighting).collect();

        let first = engine.apply(1, &results);
        assert_eq!(first.created, 4);
        assert_eq!(first.updated, 0);
        assert_eq!(first.removed, 0);

        let second = engine.apply(2, &results);
        assert_eq!(second.created, 0);
        assert_eq!(second.removed, 0);
        assert_eq!(second.updated, results.len());
        assert_eq!(engine.len(), 4);
    }

    #[test]
    fn capacity_evicts_oldest_first() {
        let mut engine = MarkerEngine::new(RecordingSurface::default(), MARKER_CAPACITY);
        for objectid in 1..=700 {
            engine.apply(objectid as u64, &[sighting(objectid)]);
        }
        assert_eq!(engine.len(), MARKER_CAPACITY);
        // The 100 earliest keys are gone, in strict insertion order.
        for objectid in 1..=100 {
            assert!(!engine.contains(&key(objectid)));
        }
        for objectid in 101..=700 {
            assert!(engine.contains(&key(objectid)));
        }
        let removed: Vec<&SurfaceEvent> = engine
            .surface()
            .events
            .iter()
            .filter(|event| matches!(event, SurfaceEvent::Removed(_)))
            .collect();
        let expected: Vec<SurfaceEvent> = (1..=100).map(|id| SurfaceEvent::Removed(key(id))).collect();
        assert_eq!(removed.len(), 100);
        for (got, want) in removed.iter().zip(expected.iter()) {
            assert_eq!(*got, want);
        }
        assert_eq!(engine.metrics().removed_total, 100);
    }

    #[test]
    fn updates_do_not_reset_insertion_order() {
        let mut engine = MarkerEngine::new(RecordingSurface::default(), 2);
        engine.apply(1, &[sighting(1), sighting(2)]);
        // Tree 1 is seen again; it is still the oldest insertion.
        engine.apply(2, &[sighting(1)]);
        engine.apply(3, &[sighting(3)]);
        assert!(!engine.contains(&key(1)));
        assert!(engine.contains(&key(2)));
        assert!(engine.contains(&key(3)));
    }

    #[test]
    fn stale_response_is_discarded_whole() {
        let mut engine = MarkerEngine::new(RecordingSurface::default(), 10);
        engine.apply(5, &[sighting(1)]);
        let stale = engine.apply(4, &[sighting(2), sighting(3)]);
        assert!(stale.discarded);
        assert_eq!(engine.len(), 1);
        assert!(engine.contains(&key(1)));
        assert!(!engine.contains(&key(2)));
        assert_eq!(engine.metrics().discarded_responses, 1);
        // Stale responses do not count as applied fetches.
        assert_eq!(engine.metrics().fetches, 1);
    }

    #[test]
    fn eviction_ignores_current_result_membership() {
        let mut engine = MarkerEngine::new(RecordingSurface::default(), 2);
        engine.apply(1, &[sighting(1)]);
        // Tree 1 appears in the same pass that overflows the capacity; it is
        // still the oldest and still evicted.
        let outcome = engine.apply(2, &[sighting(1), sighting(2), sighting(3)]);
        assert_eq!(outcome.updated, 1);
        assert_eq!(outcome.created, 2);
        assert_eq!(outcome.removed, 1);
        assert!(!engine.contains(&key(1)));
    }

    #[test]
    fn failed_fetch_leaves_state_intact() {
        let mut engine = MarkerEngine::new(RecordingSurface::default(), 10);
        engine.apply(1, &[sighting(1)]);
        let before = engine.surface().events.len();
        engine.record_failed_fetch();
        assert_eq!(engine.len(), 1);
        assert_eq!(engine.surface().events.len(), before);
        assert_eq!(engine.metrics().failed_fetches, 1);
    }

    #[test]
    fn corrupt_rows_are_skipped_not_rendered() {
        let mut engine = MarkerEngine::new(RecordingSurface::default(), 10);
        let mut bad = sighting(1);
        bad.latitude = 999.0;
        let outcome = engine.apply(1, &[bad, sighting(2)]);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.created, 1);
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn positional_keys_keep_markers_stable_without_ids() {
        let mut engine = MarkerEngine::new(RecordingSurface::default(), 10);
        let mut anonymous = sighting(1);
        anonymous.objectid = None;
        engine.apply(1, &[anonymous.clone()]);
        let second = engine.apply(2, &[anonymous]);
        assert_eq!(second.created, 0);
        assert_eq!(second.updated, 1);
    }
}
