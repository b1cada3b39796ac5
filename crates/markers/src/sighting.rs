#![forbid(unsafe_code)]

use canopy_core::geo::GeoPoint;
use canopy_core::ids::TreeKey;
use serde::{Deserialize, Serialize};

/// One row of an already-fetched nearest-neighbor response, as the client
/// sees it. Mirrors the query endpoint's response object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreeSighting {
    pub source: String,
    pub objectid: Option<i64>,
    pub common_name: Option<String>,
    pub botanical_name: Option<String>,
    pub address: Option<String>,
    pub streetname: Option<String>,
    pub dbh: Option<i64>,
    pub latitude: f64,
    pub longitude: f64,
    pub distance: f64,
}

impl TreeSighting {
    /// The position, when the coordinates are valid. Responses come from the
    /// canonical store, so invalid coordinates mean a corrupt payload; the
    /// engine drops such rows rather than rendering them.
    pub fn position(&self) -> Option<GeoPoint> {
        GeoPoint::try_new(self.latitude, self.longitude).ok()
    }

    /// Stable marker key: record identity when present, positional fallback
    /// otherwise.
    pub fn key(&self) -> Option<TreeKey> {
        let position = self.position()?;
        Some(TreeKey::resolve(
            &self.source,
            self.objectid,
            position,
            self.common_name.as_deref(),
        ))
    }

    /// Popup payload rendered for this sighting.
    pub fn popup(&self) -> serde_json::Value {
        serde_json::json!({
            "common_name": self.common_name,
            "botanical_name": self.botanical_name,
            "address": self.address,
            "streetname": self.streetname,
            "dbh": self.dbh,
            "distance": self.distance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sighting(objectid: Option<i64>) -> TreeSighting {
        TreeSighting {
            source: "Toronto Open Data Street Trees".to_string(),
            objectid,
            common_name: Some("Red Oak".to_string()),
            botanical_name: Some("Quercus rubra".to_string()),
            address: None,
            streetname: None,
            dbh: Some(40),
            latitude: 43.6532,
            longitude: -79.3832,
            distance: 12.5,
        }
    }

    #[test]
    fn key_prefers_identity() {
        assert_eq!(
            sighting(Some(7)).key(),
            Some(TreeKey::object("Toronto Open Data Street Trees", 7))
        );
    }

    #[test]
    fn key_falls_back_to_position_and_name() {
        let key = sighting(None).key().unwrap();
        assert!(matches!(key, TreeKey::Positional { .. }));
    }

    #[test]
    fn invalid_coordinates_yield_no_key() {
        let mut bad = sighting(Some(1));
        bad.latitude = 123.0;
        assert_eq!(bad.key(), None);
    }
}
