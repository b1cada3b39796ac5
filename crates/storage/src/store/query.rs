#![forbid(unsafe_code)]

//! Bounded nearest-neighbor lookup over the canonical table.

use super::requests::NearestRequest;
use super::TreeStore;
use canopy_core::geo::GeoPoint;
use canopy_core::record::TreeRecord;
use rusqlite::params;

pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 100;
pub const MIN_RADIUS_M: f64 = 1.0;
pub const MAX_RADIUS_M: f64 = 5000.0;

#[derive(Debug)]
pub enum QueryError {
    /// Malformed request input. Client-class; nothing was read or changed.
    Validation(&'static str),
    Sql(rusqlite::Error),
    /// A stored row violates the geometry invariant. Should be impossible
    /// given the schema CHECK constraints.
    CorruptRow { source: String, objectid: i64 },
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(message) => write!(f, "invalid query: {message}"),
            Self::Sql(err) => write!(f, "sqlite: {err}"),
            Self::CorruptRow { source, objectid } => {
                write!(f, "corrupt geometry for ({source}, {objectid})")
            }
        }
    }
}

impl std::error::Error for QueryError {}

impl From<rusqlite::Error> for QueryError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql(value)
    }
}

/// One result row: the record annotated with its distance in metres.
#[derive(Clone, Debug, PartialEq)]
pub struct NearestTree {
    pub record: TreeRecord,
    pub distance_m: f64,
}

impl TreeStore {
    /// Records ranked by ascending distance from the request point, ties
    /// broken by object id (then source) so identical queries return a
    /// stable order. `limit` clamps to `[1, MAX_LIMIT]`; a radius clamps to
    /// `[MIN_RADIUS_M, MAX_RADIUS_M]` and pre-filters candidates through the
    /// `(latitude, longitude)` index before the exact distance check.
    pub fn nearest(&self, request: &NearestRequest) -> Result<Vec<NearestTree>, QueryError> {
        let origin = validate_origin(request.lat, request.lng)?;
        let limit = request.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let max_distance_m = match request.max_distance_m {
            None => None,
            Some(radius) => {
                if !radius.is_finite() {
                    return Err(QueryError::Validation("max_distance_m must be a number"));
                }
                Some(radius.clamp(MIN_RADIUS_M, MAX_RADIUS_M))
            }
        };

        let mut results = match max_distance_m {
            Some(radius) => {
                let bbox = origin.bounding_box(radius);
                let mut stmt = self.conn().prepare_cached(&format!(
                    "{SELECT_COLUMNS} WHERE latitude BETWEEN ?1 AND ?2 AND longitude BETWEEN ?3 AND ?4"
                ))?;
                let rows = stmt.query_map(
                    params![bbox.min_lat, bbox.max_lat, bbox.min_lng, bbox.max_lng],
                    raw_row,
                )?;
                collect_within(rows, &origin, Some(radius))?
            }
            None => {
                let mut stmt = self.conn().prepare_cached(SELECT_COLUMNS)?;
                let rows = stmt.query_map([], raw_row)?;
                collect_within(rows, &origin, None)?
            }
        };

        results.sort_by(|a, b| {
            a.distance_m
                .total_cmp(&b.distance_m)
                .then_with(|| a.record.objectid.cmp(&b.record.objectid))
                .then_with(|| a.record.source.cmp(&b.record.source))
        });
        results.truncate(limit);
        Ok(results)
    }
}

fn validate_origin(lat: f64, lng: f64) -> Result<GeoPoint, QueryError> {
    use canopy_core::geo::GeoPointError;
    GeoPoint::try_new(lat, lng).map_err(|err| match err {
        GeoPointError::NotFinite => QueryError::Validation("lat and lng must be finite numbers"),
        GeoPointError::LatOutOfBounds => QueryError::Validation("lat must be within [-90, 90]"),
        GeoPointError::LngOutOfBounds => QueryError::Validation("lng must be within [-180, 180]"),
    })
}

const SELECT_COLUMNS: &str = r#"
    SELECT source, objectid, city_id, structid, address, streetname,
           crossstreet1, crossstreet2, suffix, unit_number,
           tree_position_number, site, ward, botanical_name, common_name,
           dbh_trunk, latitude, longitude
    FROM street_trees
"#;

struct RawRow {
    fields: TreeRecordFields,
    latitude: f64,
    longitude: f64,
}

struct TreeRecordFields {
    source: String,
    objectid: i64,
    city_id: Option<String>,
    structid: Option<String>,
    address: Option<String>,
    streetname: Option<String>,
    crossstreet1: Option<String>,
    crossstreet2: Option<String>,
    suffix: Option<String>,
    unit_number: Option<String>,
    tree_position_number: Option<String>,
    site: Option<String>,
    ward: Option<String>,
    botanical_name: Option<String>,
    common_name: Option<String>,
    dbh_trunk: Option<i64>,
}

fn raw_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        fields: TreeRecordFields {
            source: row.get(0)?,
            objectid: row.get(1)?,
            city_id: row.get(2)?,
            structid: row.get(3)?,
            address: row.get(4)?,
            streetname: row.get(5)?,
            crossstreet1: row.get(6)?,
            crossstreet2: row.get(7)?,
            suffix: row.get(8)?,
            unit_number: row.get(9)?,
            tree_position_number: row.get(10)?,
            site: row.get(11)?,
            ward: row.get(12)?,
            botanical_name: row.get(13)?,
            common_name: row.get(14)?,
            dbh_trunk: row.get(15)?,
        },
        latitude: row.get(16)?,
        longitude: row.get(17)?,
    })
}

fn collect_within(
    rows: impl Iterator<Item = rusqlite::Result<RawRow>>,
    origin: &GeoPoint,
    radius: Option<f64>,
) -> Result<Vec<NearestTree>, QueryError> {
    let mut results = Vec::new();
    for raw in rows {
        let raw = raw?;
        let fields = raw.fields;
        let position = GeoPoint::try_new(raw.latitude, raw.longitude).map_err(|_| {
            QueryError::CorruptRow {
                source: fields.source.clone(),
                objectid: fields.objectid,
            }
        })?;
        let distance_m = origin.distance_m(&position);
        if radius.is_some_and(|r| distance_m > r) {
            continue;
        }
        let mut record = TreeRecord::new(fields.source, fields.objectid, position);
        record.city_id = fields.city_id;
        record.structid = fields.structid;
        record.address = fields.address;
        record.streetname = fields.streetname;
        record.crossstreet1 = fields.crossstreet1;
        record.crossstreet2 = fields.crossstreet2;
        record.suffix = fields.suffix;
        record.unit_number = fields.unit_number;
        record.tree_position_number = fields.tree_position_number;
        record.site = fields.site;
        record.ward = fields.ward;
        record.botanical_name = fields.botanical_name;
        record.common_name = fields.common_name;
        record.dbh_trunk = fields.dbh_trunk;
        results.push(NearestTree { record, distance_m });
    }
    Ok(results)
}
