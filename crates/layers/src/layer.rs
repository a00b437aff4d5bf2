use foundation::Geometry;

/// The three single-feature layers driven by a viewshed analysis.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LayerKind {
    Observer,
    Distance,
    Result,
}

impl LayerKind {
    pub const ALL: [LayerKind; 3] = [LayerKind::Observer, LayerKind::Distance, LayerKind::Result];

    pub fn as_str(&self) -> &'static str {
        match self {
            LayerKind::Observer => "observer",
            LayerKind::Distance => "distance",
            LayerKind::Result => "viewshed",
        }
    }

    pub fn geometry_type(&self) -> GeometryType {
        match self {
            LayerKind::Observer => GeometryType::Point,
            LayerKind::Distance | LayerKind::Result => GeometryType::Polygon,
        }
    }
}

impl std::fmt::Display for LayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum GeometryType {
    Point,
    Polygon,
}

impl GeometryType {
    pub fn of(geometry: &Geometry) -> Self {
        match geometry {
            Geometry::Point(_) => GeometryType::Point,
            Geometry::Polygon(_) => GeometryType::Polygon,
        }
    }
}

pub trait Layer {
    fn kind(&self) -> LayerKind;
}
