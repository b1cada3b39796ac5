#![forbid(unsafe_code)]

/// Mean Earth radius in metres (IUGG). All distances are haversine over this
/// sphere; the store has no geography type and callers only need metre-level
/// agreement with a geodesic distance.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// A validated WGS-84 coordinate. Latitude and longitude are always finite
/// and inside world bounds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoPoint {
    lat: f64,
    lng: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeoPointError {
    NotFinite,
    LatOutOfBounds,
    LngOutOfBounds,
}

impl std::fmt::Display for GeoPointError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFinite => write!(f, "coordinates must be finite numbers"),
            Self::LatOutOfBounds => write!(f, "latitude must be within [-90, 90]"),
            Self::LngOutOfBounds => write!(f, "longitude must be within [-180, 180]"),
        }
    }
}

impl std::error::Error for GeoPointError {}

impl GeoPoint {
    pub fn try_new(lat: f64, lng: f64) -> Result<Self, GeoPointError> {
        if !lat.is_finite() || !lng.is_finite() {
            return Err(GeoPointError::NotFinite);
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(GeoPointError::LatOutOfBounds);
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(GeoPointError::LngOutOfBounds);
        }
        Ok(Self { lat, lng })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }

    /// Haversine distance in metres to another point.
    pub fn distance_m(&self, other: &GeoPoint) -> f64 {
        let lat_a = self.lat.to_radians();
        let lat_b = other.lat.to_radians();
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lng = (other.lng - self.lng).to_radians();

        let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * h.sqrt().asin()
    }

    /// Bounding box containing every point within `radius_m` metres.
    ///
    /// The box widens with latitude and is clamped at the poles and the
    /// antimeridian, so it never produces out-of-range bounds. Candidates
    /// inside the box still need an exact distance check.
    pub fn bounding_box(&self, radius_m: f64) -> BoundingBox {
        let d_lat = (radius_m / EARTH_RADIUS_M).to_degrees();
        // Longitude degrees shrink by cos(lat); keep the divisor away from
        // zero so near-polar queries degrade to a full longitude sweep
        // instead of dividing by zero.
        let cos_lat = self.lat.to_radians().cos().max(1e-6);
        let d_lng = (radius_m / (EARTH_RADIUS_M * cos_lat)).to_degrees();

        BoundingBox {
            min_lat: (self.lat - d_lat).max(-90.0),
            max_lat: (self.lat + d_lat).min(90.0),
            min_lng: (self.lng - d_lng).max(-180.0),
            max_lng: (self.lng + d_lng).min(180.0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.lat() >= self.min_lat
            && point.lat() <= self.max_lat
            && point.lng() >= self.min_lng
            && point.lng() <= self.max_lng
    }
}
