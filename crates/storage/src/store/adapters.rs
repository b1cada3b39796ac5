#![forbid(unsafe_code)]

//! Per-source schema adapters.
//!
//! Each city dataset maps its own field names onto the canonical
//! `TreeRecord`. Coercion rules are shared: diameters become rounded
//! integers when numeric-like and stay absent otherwise; object ids must
//! coerce to an integer; coordinates are normalized to a validated WGS-84
//! point. A failed row yields a `MappingError` and is skipped by the
//! pipeline; it never aborts the run.

use super::csv::{CsvRecord, CsvTable};
use super::error::StoreError;
use canopy_core::city::City;
use canopy_core::geo::GeoPoint;
use canopy_core::record::TreeRecord;
use serde_json::Value;
use std::path::Path;

/// Row-level mapping failure. The record is skipped and counted; the import
/// run continues.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MappingError {
    MissingGeometry,
    MalformedGeometry(&'static str),
    MissingObjectId,
}

impl std::fmt::Display for MappingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingGeometry => write!(f, "record has no geometry"),
            Self::MalformedGeometry(message) => write!(f, "malformed geometry: {message}"),
            Self::MissingObjectId => write!(f, "record has no coercible object id"),
        }
    }
}

impl std::error::Error for MappingError {}

pub(crate) type MappedRow = Result<TreeRecord, MappingError>;

/// Read and map a raw city file. Outer errors (io, malformed container) are
/// run-level; per-row failures stay inside the vector.
pub(crate) fn map_file(city: City, path: &Path) -> Result<Vec<MappedRow>, StoreError> {
    match city {
        City::Toronto => geojson_rows(path, toronto_row),
        City::Ottawa => geojson_rows(path, ottawa_row),
        City::Montreal => csv_rows(path, montreal_row),
        City::Calgary => csv_rows(path, calgary_row),
        City::Waterloo => geojson_rows(path, waterloo_row),
        City::Boston => geojson_rows(path, boston_row),
        City::Markham => geojson_rows(path, markham_row),
        City::Oakville => geojson_rows(path, oakville_row),
        City::Peterborough => geojson_rows(path, peterborough_row),
    }
}

fn geojson_rows(
    path: &Path,
    row: fn(&Value) -> MappedRow,
) -> Result<Vec<MappedRow>, StoreError> {
    let file = std::fs::File::open(path)?;
    let data: Value = serde_json::from_reader(std::io::BufReader::new(file))?;
    let features = data
        .get("features")
        .and_then(Value::as_array)
        .ok_or(StoreError::InvalidInput("file is not a GeoJSON feature collection"))?;
    Ok(features.iter().map(row).collect())
}

fn csv_rows(
    path: &Path,
    row: fn(&CsvRecord<'_>) -> MappedRow,
) -> Result<Vec<MappedRow>, StoreError> {
    let raw = std::fs::read_to_string(path)?;
    let table = CsvTable::parse(&raw).map_err(|_| StoreError::InvalidInput("malformed CSV file"))?;
    Ok(table.records().map(|record| row(&record)).collect())
}

// --- shared coercions ---

fn prop<'a>(feature: &'a Value, key: &str) -> Option<&'a Value> {
    feature
        .get("properties")
        .and_then(|properties| properties.get(key))
        .filter(|value| !value.is_null())
}

/// Text field: strings are trimmed (empty → absent); bare numbers keep their
/// decimal form, matching sources that type codes as numbers.
fn text(feature: &Value, key: &str) -> Option<String> {
    match prop(feature, key)? {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Diameter: numeric-like values round to an integer, everything else
/// (including `""`, `"--"`, `"null"`) is absent. Never a row error.
fn dbh(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_f64().map(|v| v.round() as i64),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed == "--" || trimmed.eq_ignore_ascii_case("null") {
                return None;
            }
            trimmed.parse::<f64>().ok().map(|v| v.round() as i64)
        }
        _ => None,
    }
}

fn dbh_text(value: Option<&str>) -> Option<i64> {
    let trimmed = value?.trim();
    if trimmed.is_empty() || trimmed == "--" || trimmed.eq_ignore_ascii_case("null") {
        return None;
    }
    trimmed.parse::<f64>().ok().map(|v| v.round() as i64)
}

/// Object id: integer, integral float, or digit string.
fn objectid(feature: &Value, key: &str) -> Result<i64, MappingError> {
    let value = prop(feature, key).ok_or(MappingError::MissingObjectId)?;
    match value {
        Value::Number(n) => {
            if let Some(id) = n.as_i64() {
                return Ok(id);
            }
            match n.as_f64() {
                Some(v) if v.fract() == 0.0 => Ok(v as i64),
                _ => Err(MappingError::MissingObjectId),
            }
        }
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| MappingError::MissingObjectId),
        _ => Err(MappingError::MissingObjectId),
    }
}

/// GeoJSON geometry → point. `Point` is taken directly, `MultiPoint` by its
/// first coordinate (the canonical schema historically stored MultiPoint).
fn feature_point(feature: &Value) -> Result<GeoPoint, MappingError> {
    let geometry = feature
        .get("geometry")
        .filter(|value| !value.is_null())
        .ok_or(MappingError::MissingGeometry)?;
    let kind = geometry
        .get("type")
        .and_then(Value::as_str)
        .ok_or(MappingError::MalformedGeometry("missing geometry type"))?;
    let coordinates = geometry
        .get("coordinates")
        .and_then(Value::as_array)
        .ok_or(MappingError::MalformedGeometry("missing coordinates"))?;
    let position = match kind {
        "Point" => coordinates.as_slice(),
        "MultiPoint" => coordinates
            .first()
            .and_then(Value::as_array)
            .ok_or(MappingError::MalformedGeometry("empty MultiPoint"))?
            .as_slice(),
        _ => return Err(MappingError::MalformedGeometry("unsupported geometry type")),
    };
    let (Some(lng), Some(lat)) = (
        position.first().and_then(Value::as_f64),
        position.get(1).and_then(Value::as_f64),
    ) else {
        return Err(MappingError::MalformedGeometry("non-numeric coordinates"));
    };
    GeoPoint::try_new(lat, lng).map_err(|_| MappingError::MalformedGeometry("coordinates out of bounds"))
}

/// WKT `POINT (lng lat)` → point (Calgary ships WKT in its CSV export).
fn wkt_point(raw: &str) -> Result<GeoPoint, MappingError> {
    let trimmed = raw.trim();
    let rest = trimmed
        .get(..5)
        .filter(|head| head.eq_ignore_ascii_case("POINT"))
        .map(|_| trimmed[5..].trim())
        .ok_or(MappingError::MalformedGeometry("not a WKT point"))?;
    let inner = rest
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or(MappingError::MalformedGeometry("not a WKT point"))?;
    let mut parts = inner.split_whitespace();
    let (Some(lng), Some(lat)) = (
        parts.next().and_then(|v| v.parse::<f64>().ok()),
        parts.next().and_then(|v| v.parse::<f64>().ok()),
    ) else {
        return Err(MappingError::MalformedGeometry("non-numeric coordinates"));
    };
    GeoPoint::try_new(lat, lng).map_err(|_| MappingError::MalformedGeometry("coordinates out of bounds"))
}

// --- per-city adapters ---

fn toronto_row(feature: &Value) -> MappedRow {
    let position = feature_point(feature)?;
    let mut record = TreeRecord::new(
        City::Toronto.source_name(),
        objectid(feature, "OBJECTID")?,
        position,
    );
    record.city_id = text(feature, "city_id");
    record.structid = text(feature, "STRUCTID");
    record.address = text(feature, "ADDRESS");
    record.streetname = text(feature, "STREETNAME");
    record.crossstreet1 = text(feature, "CROSSSTREET1");
    record.crossstreet2 = text(feature, "CROSSSTREET2");
    record.suffix = text(feature, "SUFFIX");
    record.unit_number = text(feature, "UNIT_NUMBER");
    record.tree_position_number = text(feature, "TREE_POSITION_NUMBER");
    record.site = text(feature, "SITE");
    record.ward = text(feature, "WARD");
    record.botanical_name = text(feature, "BOTANICAL_NAME");
    record.common_name = text(feature, "COMMON_NAME");
    record.dbh_trunk = dbh(prop(feature, "DBH_TRUNK"));
    Ok(record)
}

fn ottawa_row(feature: &Value) -> MappedRow {
    let position = feature_point(feature)?;
    let mut record = TreeRecord::new(
        City::Ottawa.source_name(),
        objectid(feature, "OBJECTID")?,
        position,
    );
    record.address = text(feature, "ADDNUM");
    record.streetname = text(feature, "ADDSTR");
    // Ottawa publishes one species column; it serves as both names.
    record.botanical_name = text(feature, "SPECIES");
    record.common_name = text(feature, "SPECIES");
    record.dbh_trunk = dbh(prop(feature, "DBH"));
    Ok(record)
}

fn waterloo_row(feature: &Value) -> MappedRow {
    let position = feature_point(feature)?;
    let mut record = TreeRecord::new(
        City::Waterloo.source_name(),
        objectid(feature, "ASSET_ID")?,
        position,
    );
    record.common_name = text(feature, "COM_NAME");
    record.botanical_name = text(feature, "LATIN_NAME");
    record.address = text(feature, "ADDRESS");
    record.dbh_trunk = dbh(prop(feature, "DBH_CM"));
    Ok(record)
}

fn boston_row(feature: &Value) -> MappedRow {
    let position = feature_point(feature)?;
    let mut record = TreeRecord::new(
        City::Boston.source_name(),
        objectid(feature, "OBJECTID")?,
        position,
    );
    record.address = text(feature, "address");
    record.streetname = text(feature, "street");
    record.suffix = text(feature, "suffix");
    record.ward = text(feature, "neighborhood");
    record.botanical_name = text(feature, "spp_bot");
    record.common_name = text(feature, "spp_com");
    record.dbh_trunk = dbh(prop(feature, "dbh"));
    Ok(record)
}

fn markham_row(feature: &Value) -> MappedRow {
    let position = feature_point(feature)?;
    let mut record = TreeRecord::new(
        City::Markham.source_name(),
        objectid(feature, "OBJECTID")?,
        position,
    );
    record.streetname = text(feature, "ONSTREET");
    record.crossstreet1 = text(feature, "XSTREET1");
    record.crossstreet2 = text(feature, "XSTREET2");
    record.site = text(feature, "RDSECTYPE");
    record.ward = text(feature, "MUNICIPALITY");
    record.botanical_name = text(feature, "SPECIES");
    record.common_name = text(feature, "COMMONNAME");
    record.dbh_trunk = dbh(prop(feature, "CURRENTDBH"));
    Ok(record)
}

fn oakville_row(feature: &Value) -> MappedRow {
    let position = feature_point(feature)?;
    let mut record = TreeRecord::new(
        City::Oakville.source_name(),
        objectid(feature, "OBJECTID")?,
        position,
    );
    let street_number = text(feature, "STREET_NUMBER");
    let street_name = text(feature, "STREET_NAME");
    record.address = match (&street_number, &street_name) {
        (Some(number), Some(name)) => Some(format!("{number} {name}")),
        (Some(number), None) => Some(number.clone()),
        (None, Some(name)) => Some(name.clone()),
        (None, None) => None,
    };
    record.streetname = street_name;
    record.crossstreet1 = text(feature, "CROSS_ROADS");
    record.site = text(feature, "LOCSITE");
    record.ward = text(feature, "FORESTRY_ZONE");
    // Oakville packs "Common - Botanical" into one species field.
    match text(feature, "SPECIES") {
        Some(value) => match value.split_once(" - ") {
            Some((common, botanical)) => {
                record.common_name = non_empty(common);
                record.botanical_name = non_empty(botanical);
            }
            None => record.common_name = Some(value),
        },
        None => {}
    }
    record.dbh_trunk = dbh(prop(feature, "DBH"));
    Ok(record)
}

fn peterborough_row(feature: &Value) -> MappedRow {
    let position = feature_point(feature)?;
    let mut record = TreeRecord::new(
        City::Peterborough.source_name(),
        objectid(feature, "OBJECTID")?,
        position,
    );
    record.address = text(feature, "ADDNUM");
    record.streetname = text(feature, "STREET");
    record.site = text(feature, "INVENTORY_LOC").or_else(|| text(feature, "TREE_LOCATION"));
    record.ward = text(feature, "ZONE");
    record.botanical_name = text(feature, "BOTANICAL");
    record.common_name = text(feature, "COMMON");
    Ok(record)
}

fn montreal_row(record_in: &CsvRecord<'_>) -> MappedRow {
    let (Some(lng), Some(lat)) = (
        record_in.text("Longitude").and_then(|v| v.parse::<f64>().ok()),
        record_in.text("Latitude").and_then(|v| v.parse::<f64>().ok()),
    ) else {
        return Err(MappingError::MissingGeometry);
    };
    let position = GeoPoint::try_new(lat, lng)
        .map_err(|_| MappingError::MalformedGeometry("coordinates out of bounds"))?;
    let objectid = record_in
        .text("EMP_NO")
        .and_then(|v| v.parse::<i64>().ok())
        .ok_or(MappingError::MissingObjectId)?;

    let mut record = TreeRecord::new(City::Montreal.source_name(), objectid, position);
    record.ward = record_in.text("ARROND_NOM").map(str::to_string);
    record.streetname = record_in.text("LOCALISATION").map(str::to_string);
    record.site = record_in.text("Emplacement").map(str::to_string);
    record.botanical_name = record_in.text("Essence_latin").map(str::to_string);
    record.common_name = match (record_in.text("Essence_fr"), record_in.text("ESSENCE_ANG")) {
        (Some(fr), Some(en)) => Some(format!("{fr} ({en})")),
        (Some(fr), None) => Some(fr.to_string()),
        (None, Some(en)) => Some(en.to_string()),
        (None, None) => None,
    };
    record.dbh_trunk = dbh_text(record_in.get("DHP"));
    Ok(record)
}

fn calgary_row(record_in: &CsvRecord<'_>) -> MappedRow {
    let point_wkt = record_in.text("POINT").ok_or(MappingError::MissingGeometry)?;
    let position = wkt_point(point_wkt)?;
    // Calgary has no plain numeric id; extract the digits of the asset ids.
    let objectid = digits_to_i64(record_in.get("WAM_ID"))
        .or_else(|| digits_to_i64(record_in.get("TREE_ASSET_CD")))
        .ok_or(MappingError::MissingObjectId)?;

    let mut record = TreeRecord::new(City::Calgary.source_name(), objectid, position);
    record.structid = record_in.text("TREE_ASSET_CD").map(str::to_string);
    record.common_name = record_in.text("COMMON_NAME").map(str::to_string);
    let botanical: Vec<&str> = ["GENUS", "SPECIES", "CULTIVAR"]
        .iter()
        .filter_map(|key| record_in.text(key))
        .collect();
    record.botanical_name = if botanical.is_empty() {
        None
    } else {
        Some(botanical.join(" "))
    };
    record.dbh_trunk = dbh_text(record_in.get("DBH_CM"));
    record.address = record_in.text("LOCATION_DETAIL").map(str::to_string);
    record.streetname = record_in.text("COMM_CODE").map(str::to_string);
    record.site = record_in
        .text("ASSET_SUBTYPE")
        .or_else(|| record_in.text("ASSET_TYPE"))
        .map(str::to_string);
    Ok(record)
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
}

fn digits_to_i64(value: Option<&str>) -> Option<i64> {
    let digits: String = value?.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<i64>().ok()
}
