use crate::geometry::{GeometryError, Point, Polygon};
use crate::math::destination;

/// Default ring resolution: one vertex every 5 degrees of azimuth.
pub const DEFAULT_BUFFER_SEGMENTS: usize = 72;

/// Builds a geodesic circle of `radius_m` meters around `center`.
///
/// The buffer is computed on the WGS84 ellipsoid and expressed in the
/// center's spatial reference. Elevation is ignored. The single ring runs
/// clockwise from north and is explicitly closed.
pub fn geodesic_buffer(
    center: &Point,
    radius_m: f64,
    segments: usize,
) -> Result<Polygon, GeometryError> {
    if !radius_m.is_finite() || radius_m <= 0.0 {
        return Err(GeometryError::InvalidDistance(radius_m));
    }
    let sr = center.spatial_reference;
    let origin = sr.to_geodetic(center.x, center.y)?;
    let segments = segments.max(3);

    let mut ring = Vec::with_capacity(segments + 1);
    for i in 0..segments {
        let azimuth = std::f64::consts::TAU * i as f64 / segments as f64;
        let (x, y) = sr.from_geodetic(destination(origin, azimuth, radius_m))?;
        ring.push([x, y]);
    }
    ring.push(ring[0]);

    Ok(Polygon::new(vec![ring], sr))
}
