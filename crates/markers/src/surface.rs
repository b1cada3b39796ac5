#![forbid(unsafe_code)]

use canopy_core::geo::GeoPoint;
use canopy_core::ids::TreeKey;
use serde_json::Value;

/// The rendering seam. The engine calls these in reconciliation order; the
/// real implementation forwards to the map widget, tests record the calls.
pub trait MarkerSurface {
    fn create(&mut self, key: &TreeKey, position: GeoPoint, popup: &Value);
    fn update(&mut self, key: &TreeKey, position: GeoPoint, popup: &Value);
    fn remove(&mut self, key: &TreeKey);
}

/// Surface that renders nothing. Useful for headless metric runs.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSurface;

impl MarkerSurface for NullSurface {
    fn create(&mut self, _key: &TreeKey, _position: GeoPoint, _popup: &Value) {}
    fn update(&mut self, _key: &TreeKey, _position: GeoPoint, _popup: &Value) {}
    fn remove(&mut self, _key: &TreeKey) {}
}

/// Test double that records every surface call in order.
#[derive(Clone, Debug, Default)]
pub struct RecordingSurface {
    pub events: Vec<SurfaceEvent>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SurfaceEvent {
    Created(TreeKey),
    Updated(TreeKey),
    Removed(TreeKey),
}

impl MarkerSurface for RecordingSurface {
    fn create(&mut self, key: &TreeKey, _position: GeoPoint, _popup: &Value) {
        self.events.push(SurfaceEvent::Created(key.clone()));
    }

    fn update(&mut self, key: &TreeKey, _position: GeoPoint, _popup: &Value) {
        self.events.push(SurfaceEvent::Updated(key.clone()));
    }

    fn remove(&mut self, key: &TreeKey) {
        self.events.push(SurfaceEvent::Removed(key.clone()));
    }
}
