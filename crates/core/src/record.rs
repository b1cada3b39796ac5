#![forbid(unsafe_code)]

use crate::geo::GeoPoint;
use crate::ids::TreeKey;

/// Canonical representation of one physical tree from one source dataset.
///
/// `(source, objectid)` is the unique identity; the position is always
/// present. The import pipeline owns and mutates these rows; the query
/// engine only reads them.
#[derive(Clone, Debug, PartialEq)]
pub struct TreeRecord {
    pub source: String,
    pub city_id: Option<String>,
    pub objectid: i64,
    pub structid: Option<String>,
    pub address: Option<String>,
    pub streetname: Option<String>,
    pub crossstreet1: Option<String>,
    pub crossstreet2: Option<String>,
    pub suffix: Option<String>,
    pub unit_number: Option<String>,
    pub tree_position_number: Option<String>,
    pub site: Option<String>,
    pub ward: Option<String>,
    pub botanical_name: Option<String>,
    pub common_name: Option<String>,
    pub dbh_trunk: Option<i64>,
    pub position: GeoPoint,
}

impl TreeRecord {
    /// A record with identity and position set and every optional field
    /// absent. Adapters fill in whatever their source provides.
    pub fn new(source: impl Into<String>, objectid: i64, position: GeoPoint) -> Self {
        Self {
            source: source.into(),
            city_id: None,
            objectid,
            structid: None,
            address: None,
            streetname: None,
            crossstreet1: None,
            crossstreet2: None,
            suffix: None,
            unit_number: None,
            tree_position_number: None,
            site: None,
            ward: None,
            botanical_name: None,
            common_name: None,
            dbh_trunk: None,
            position,
        }
    }

    pub fn key(&self) -> TreeKey {
        TreeKey::object(self.source.clone(), self.objectid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_uses_source_and_objectid() {
        let position = GeoPoint::try_new(43.6532, -79.3832).unwrap();
        let record = TreeRecord::new("Toronto Open Data Street Trees", 42, position);
        assert_eq!(record.key(), TreeKey::object("Toronto Open Data Street Trees", 42));
    }
}
