#![forbid(unsafe_code)]

use canopy_core::city::City;
use canopy_storage::{
    DEFAULT_LIMIT, ImportRequest, NearestRequest, QueryError, TreeStore,
};
use serde_json::{Value, json};
use std::path::PathBuf;

fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = base.join(format!("canopy_query_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

const ORIGIN_LAT: f64 = 43.6500;
const ORIGIN_LNG: f64 = -79.3800;

fn feature(objectid: i64, lat: f64, lng: f64) -> Value {
    json!({
        "type": "Feature",
        "properties": { "OBJECTID": objectid, "COMMON_NAME": "Red Oak" },
        "geometry": { "type": "Point", "coordinates": [lng, lat] }
    })
}

fn seed(dir: &PathBuf, features: Vec<Value>) -> TreeStore {
    let mut store = TreeStore::open(dir).expect("open store");
    let path = dir.join("seed.geojson");
    let body = json!({ "type": "FeatureCollection", "features": features });
    std::fs::write(&path, serde_json::to_string(&body).expect("serialize fixture"))
        .expect("write fixture");
    store
        .import(&ImportRequest::new(City::Toronto, &path))
        .expect("seed import");
    store
}

// One degree of latitude is roughly 111.2 km; offsets below pick distances.

#[test]
fn results_rank_by_ascending_distance() {
    let dir = temp_dir("results_rank_by_ascending_distance");
    let store = seed(
        &dir,
        vec![
            feature(1, ORIGIN_LAT + 0.0100, ORIGIN_LNG), // ~1112 m
            feature(2, ORIGIN_LAT + 0.0004, ORIGIN_LNG), // ~44 m
            feature(3, ORIGIN_LAT + 0.0020, ORIGIN_LNG), // ~222 m
        ],
    );

    let results = store
        .nearest(&NearestRequest::new(ORIGIN_LAT, ORIGIN_LNG))
        .expect("nearest");
    let ids: Vec<i64> = results.iter().map(|t| t.record.objectid).collect();
    assert_eq!(ids, vec![2, 3, 1]);
    assert!(results[0].distance_m < results[1].distance_m);
    assert!((results[0].distance_m - 44.5).abs() < 1.0);
}

#[test]
fn equal_distances_break_ties_by_objectid() {
    let dir = temp_dir("equal_distances_break_ties_by_objectid");
    // Symmetric north/south offsets give exactly equal haversine distances.
    let store = seed(
        &dir,
        vec![
            feature(9, ORIGIN_LAT + 0.001, ORIGIN_LNG),
            feature(4, ORIGIN_LAT - 0.001, ORIGIN_LNG),
        ],
    );

    let results = store
        .nearest(&NearestRequest::new(ORIGIN_LAT, ORIGIN_LNG))
        .expect("nearest");
    let ids: Vec<i64> = results.iter().map(|t| t.record.objectid).collect();
    assert_eq!(ids, vec![4, 9]);
}

#[test]
fn limit_defaults_and_clamps() {
    let dir = temp_dir("limit_defaults_and_clamps");
    let features: Vec<Value> = (1..=12)
        .map(|id| feature(id, ORIGIN_LAT + id as f64 * 1e-4, ORIGIN_LNG))
        .collect();
    let store = seed(&dir, features);

    let defaulted = store
        .nearest(&NearestRequest::new(ORIGIN_LAT, ORIGIN_LNG))
        .expect("default limit");
    assert_eq!(defaulted.len(), DEFAULT_LIMIT);

    let mut request = NearestRequest::new(ORIGIN_LAT, ORIGIN_LNG);
    request.limit = Some(3);
    assert_eq!(store.nearest(&request).expect("limit 3").len(), 3);

    // Zero clamps up to one result rather than failing.
    request.limit = Some(0);
    assert_eq!(store.nearest(&request).expect("limit 0").len(), 1);
}

#[test]
fn radius_filters_by_exact_distance() {
    let dir = temp_dir("radius_filters_by_exact_distance");
    let store = seed(
        &dir,
        vec![
            feature(1, ORIGIN_LAT + 0.0004, ORIGIN_LNG), // ~44 m
            feature(2, ORIGIN_LAT + 0.0150, ORIGIN_LNG), // ~1668 m
        ],
    );

    let mut request = NearestRequest::new(ORIGIN_LAT, ORIGIN_LNG);
    request.max_distance_m = Some(100.0);
    let results = store.nearest(&request).expect("bounded search");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].record.objectid, 1);
}

#[test]
fn radius_clamps_to_the_service_bounds() {
    let dir = temp_dir("radius_clamps_to_the_service_bounds");
    let store = seed(
        &dir,
        vec![
            feature(1, ORIGIN_LAT, ORIGIN_LNG),          // at the origin
            feature(2, ORIGIN_LAT + 0.0600, ORIGIN_LNG), // ~6672 m
        ],
    );

    // An absurdly large radius still cuts off at 5000 m.
    let mut request = NearestRequest::new(ORIGIN_LAT, ORIGIN_LNG);
    request.max_distance_m = Some(1.0e9);
    let results = store.nearest(&request).expect("clamped radius");
    let ids: Vec<i64> = results.iter().map(|t| t.record.objectid).collect();
    assert_eq!(ids, vec![1]);

    // A sub-metre radius clamps up to 1 m and still finds the origin tree.
    request.max_distance_m = Some(0.001);
    let results = store.nearest(&request).expect("minimum radius");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].record.objectid, 1);
}

#[test]
fn invalid_origins_are_rejected_before_any_read() {
    let dir = temp_dir("invalid_origins_are_rejected_before_any_read");
    let store = seed(&dir, vec![feature(1, ORIGIN_LAT, ORIGIN_LNG)]);

    let out_of_bounds = store.nearest(&NearestRequest::new(95.0, ORIGIN_LNG));
    assert!(matches!(
        out_of_bounds,
        Err(QueryError::Validation("lat must be within [-90, 90]"))
    ));

    let wrapped = store.nearest(&NearestRequest::new(ORIGIN_LAT, 181.0));
    assert!(matches!(
        wrapped,
        Err(QueryError::Validation("lng must be within [-180, 180]"))
    ));

    let not_finite = store.nearest(&NearestRequest::new(f64::NAN, ORIGIN_LNG));
    assert!(matches!(
        not_finite,
        Err(QueryError::Validation("lat and lng must be finite numbers"))
    ));

    let mut request = NearestRequest::new(ORIGIN_LAT, ORIGIN_LNG);
    request.max_distance_m = Some(f64::NAN);
    assert!(matches!(
        store.nearest(&request),
        Err(QueryError::Validation("max_distance_m must be a number"))
    ));
}

#[test]
fn empty_store_returns_an_empty_list() {
    let dir = temp_dir("empty_store_returns_an_empty_list");
    let store = TreeStore::open(&dir).expect("open store");
    let results = store
        .nearest(&NearestRequest::new(ORIGIN_LAT, ORIGIN_LNG))
        .expect("nearest on empty store");
    assert!(results.is_empty());
}
