use crate::math::{Geodetic, geodetic_to_web_mercator, web_mercator_to_geodetic};

/// Well-known spatial reference identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SpatialReference {
    pub wkid: u32,
}

impl SpatialReference {
    /// Esri's legacy Web Mercator id, as reported by most map views.
    pub const WEB_MERCATOR: Self = Self { wkid: 102_100 };
    pub const WGS84: Self = Self { wkid: 4326 };

    pub fn new(wkid: u32) -> Self {
        Self { wkid }
    }

    pub fn is_web_mercator(&self) -> bool {
        matches!(self.wkid, 102_100 | 102_113 | 900_913 | 3857)
    }

    pub fn is_geographic(&self) -> bool {
        self.wkid == 4326
    }

    /// Converts planar/geographic coordinates in this reference to geodetic.
    pub fn to_geodetic(&self, x: f64, y: f64) -> Result<Geodetic, GeometryError> {
        if self.is_web_mercator() {
            Ok(web_mercator_to_geodetic(x, y))
        } else if self.is_geographic() {
            Ok(Geodetic::from_degrees(y, x))
        } else {
            Err(GeometryError::UnsupportedSpatialReference(self.wkid))
        }
    }

    /// Converts geodetic coordinates into `(x, y)` in this reference.
    pub fn from_geodetic(&self, geo: Geodetic) -> Result<(f64, f64), GeometryError> {
        if self.is_web_mercator() {
            Ok(geodetic_to_web_mercator(geo))
        } else if self.is_geographic() {
            Ok((geo.lon_deg(), geo.lat_deg()))
        } else {
            Err(GeometryError::UnsupportedSpatialReference(self.wkid))
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
    pub spatial_reference: SpatialReference,
}

impl Point {
    pub fn new(x: f64, y: f64, spatial_reference: SpatialReference) -> Self {
        Self {
            x,
            y,
            z: None,
            spatial_reference,
        }
    }

    pub fn with_z(mut self, z: f64) -> Self {
        self.z = Some(z);
        self
    }

    /// Drops the elevation component.
    pub fn flattened(mut self) -> Self {
        self.z = None;
        self
    }

    /// Raises the point by `offset` meters; a missing z counts as ground level.
    pub fn raised(mut self, offset: f64) -> Self {
        self.z = Some(self.z.unwrap_or(0.0) + offset);
        self
    }
}

/// Polygon made of closed `(x, y)` rings.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub rings: Vec<Vec<[f64; 2]>>,
    pub spatial_reference: SpatialReference,
}

impl Polygon {
    pub fn new(rings: Vec<Vec<[f64; 2]>>, spatial_reference: SpatialReference) -> Self {
        Self {
            rings,
            spatial_reference,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.rings.iter().map(Vec::len).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Point),
    Polygon(Polygon),
}

impl Geometry {
    pub fn spatial_reference(&self) -> SpatialReference {
        match self {
            Geometry::Point(p) => p.spatial_reference,
            Geometry::Polygon(p) => p.spatial_reference,
        }
    }

    pub fn as_point(&self) -> Option<&Point> {
        match self {
            Geometry::Point(p) => Some(p),
            Geometry::Polygon(_) => None,
        }
    }

    pub fn as_polygon(&self) -> Option<&Polygon> {
        match self {
            Geometry::Polygon(p) => Some(p),
            Geometry::Point(_) => None,
        }
    }
}

impl From<Point> for Geometry {
    fn from(p: Point) -> Self {
        Geometry::Point(p)
    }
}

impl From<Polygon> for Geometry {
    fn from(p: Polygon) -> Self {
        Geometry::Polygon(p)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeometryError {
    UnsupportedSpatialReference(u32),
    InvalidDistance(f64),
}

impl std::fmt::Display for GeometryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedSpatialReference(wkid) => {
                write!(f, "unsupported spatial reference wkid {wkid}")
            }
            Self::InvalidDistance(d) => write!(f, "buffer distance must be positive, got {d}"),
        }
    }
}

impl std::error::Error for GeometryError {}
