#![forbid(unsafe_code)]

use crate::geo::GeoPoint;

/// Stable identity for one physical tree.
///
/// Server-side records always carry `(source, objectid)`. Client-side result
/// rows may lack a usable object id; those fall back to a positional key
/// built from microdegree-rounded coordinates plus the common name. The
/// fallback can collide for distinct same-species trees at near-identical
/// coordinates; that approximation is accepted, not special-cased.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TreeKey {
    Object { source: String, objectid: i64 },
    Positional { lat_e6: i64, lng_e6: i64, common_name: String },
}

impl TreeKey {
    pub fn object(source: impl Into<String>, objectid: i64) -> Self {
        Self::Object {
            source: source.into(),
            objectid,
        }
    }

    pub fn positional(position: GeoPoint, common_name: Option<&str>) -> Self {
        Self::Positional {
            lat_e6: to_e6(position.lat()),
            lng_e6: to_e6(position.lng()),
            common_name: common_name.unwrap_or("").trim().to_string(),
        }
    }

    /// Resolve a key for a query result row: identity when present, else the
    /// positional fallback. Repeated responses for the same tree resolve to
    /// the same key, which is what keeps upserts idempotent and markers
    /// stable.
    pub fn resolve(
        source: &str,
        objectid: Option<i64>,
        position: GeoPoint,
        common_name: Option<&str>,
    ) -> Self {
        match objectid {
            Some(objectid) => Self::object(source, objectid),
            None => Self::positional(position, common_name),
        }
    }
}

fn to_e6(degrees: f64) -> i64 {
    (degrees * 1_000_000.0).round() as i64
}

impl std::fmt::Display for TreeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Object { source, objectid } => write!(f, "{source}/{objectid}"),
            Self::Positional {
                lat_e6,
                lng_e6,
                common_name,
            } => write!(
                f,
                "{:.6},{:.6}/{common_name}",
                *lat_e6 as f64 / 1_000_000.0,
                *lng_e6 as f64 / 1_000_000.0
            ),
        }
    }
}
