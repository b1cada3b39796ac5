#![forbid(unsafe_code)]

//! Marker reconciliation: keeps a capacity-bounded, insertion-ordered set of
//! map markers consistent with successive, possibly overlapping, query
//! result sets. The engine owns all marker state and performs no I/O; a
//! fetch driver hands it one ordered result sequence per cycle.

mod engine;
mod sighting;
mod surface;

pub use engine::{EngineMetrics, MarkerEngine, SyncOutcome};
pub use sighting::TreeSighting;
pub use surface::{MarkerSurface, NullSurface, RecordingSurface, SurfaceEvent};

/// Hard cap on simultaneously rendered markers.
pub const MARKER_CAPACITY: usize = 600;

/// Inactivity window the fetch driver waits before issuing a new fetch.
/// Exported for the (out-of-scope) UI layer; the engine itself never sleeps.
pub const DEBOUNCE_MS: u64 = 300;
