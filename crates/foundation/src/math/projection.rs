use super::{Geodetic, WGS84_A};

/// Latitude limit of the square Web Mercator world (degrees).
pub const WEB_MERCATOR_MAX_LAT_DEG: f64 = 85.051_128_779_806_59;

/// Projects geodetic coordinates to spherical Web Mercator meters `(x, y)`.
///
/// Latitudes beyond the Web Mercator limit are clamped.
pub fn geodetic_to_web_mercator(geo: Geodetic) -> (f64, f64) {
    let max_lat = WEB_MERCATOR_MAX_LAT_DEG.to_radians();
    let lat = geo.lat_rad.clamp(-max_lat, max_lat);
    let x = WGS84_A * geo.lon_rad;
    let y = WGS84_A * (std::f64::consts::FRAC_PI_4 + lat / 2.0).tan().ln();
    (x, y)
}

pub fn web_mercator_to_geodetic(x: f64, y: f64) -> Geodetic {
    let lon = x / WGS84_A;
    let lat = 2.0 * (y / WGS84_A).exp().atan() - std::f64::consts::FRAC_PI_2;
    Geodetic::new(lat, lon)
}
