/// WGS84 semi-major axis (meters).
pub const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening.
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;
/// WGS84 semi-minor axis (meters).
pub const WGS84_B: f64 = WGS84_A * (1.0 - WGS84_F);

const VINCENTY_EPSILON: f64 = 1e-12;
const VINCENTY_MAX_ITERATIONS: usize = 200;

/// Geodetic coordinates in radians.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Geodetic {
    pub lat_rad: f64,
    pub lon_rad: f64,
}

impl Geodetic {
    pub fn new(lat_rad: f64, lon_rad: f64) -> Self {
        Self { lat_rad, lon_rad }
    }

    pub fn from_degrees(lat_deg: f64, lon_deg: f64) -> Self {
        Self::new(lat_deg.to_radians(), lon_deg.to_radians())
    }

    pub fn lat_deg(&self) -> f64 {
        self.lat_rad.to_degrees()
    }

    pub fn lon_deg(&self) -> f64 {
        self.lon_rad.to_degrees()
    }
}

/// Solves the direct geodesic problem on the WGS84 ellipsoid (Vincenty).
///
/// Returns the point reached by travelling `distance_m` meters from `origin`
/// along the initial bearing `azimuth_rad` (clockwise from north).
pub fn destination(origin: Geodetic, azimuth_rad: f64, distance_m: f64) -> Geodetic {
    let f = WGS84_F;
    let (sin_alpha1, cos_alpha1) = azimuth_rad.sin_cos();

    let tan_u1 = (1.0 - f) * origin.lat_rad.tan();
    let cos_u1 = 1.0 / (1.0 + tan_u1 * tan_u1).sqrt();
    let sin_u1 = tan_u1 * cos_u1;

    let sigma1 = tan_u1.atan2(cos_alpha1);
    let sin_alpha = cos_u1 * sin_alpha1;
    let cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
    let u_sq = cos_sq_alpha * (WGS84_A * WGS84_A - WGS84_B * WGS84_B) / (WGS84_B * WGS84_B);
    let a = 1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
    let b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));

    let sigma0 = distance_m / (WGS84_B * a);
    let mut sigma = sigma0;
    let mut cos_2sigma_m;
    let mut sin_sigma;
    let mut cos_sigma;
    let mut iterations = 0;
    loop {
        cos_2sigma_m = (2.0 * sigma1 + sigma).cos();
        sin_sigma = sigma.sin();
        cos_sigma = sigma.cos();
        let delta_sigma = b
            * sin_sigma
            * (cos_2sigma_m
                + b / 4.0
                    * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)
                        - b / 6.0
                            * cos_2sigma_m
                            * (-3.0 + 4.0 * sin_sigma * sin_sigma)
                            * (-3.0 + 4.0 * cos_2sigma_m * cos_2sigma_m)));
        let previous = sigma;
        sigma = sigma0 + delta_sigma;
        iterations += 1;
        if (sigma - previous).abs() <= VINCENTY_EPSILON || iterations >= VINCENTY_MAX_ITERATIONS {
            break;
        }
    }

    // Refresh the trig terms for the converged sigma.
    cos_2sigma_m = (2.0 * sigma1 + sigma).cos();
    sin_sigma = sigma.sin();
    cos_sigma = sigma.cos();

    let x = sin_u1 * sin_sigma - cos_u1 * cos_sigma * cos_alpha1;
    let lat = (sin_u1 * cos_sigma + cos_u1 * sin_sigma * cos_alpha1)
        .atan2((1.0 - f) * (sin_alpha * sin_alpha + x * x).sqrt());
    let lambda = (sin_sigma * sin_alpha1).atan2(cos_u1 * cos_sigma - sin_u1 * sin_sigma * cos_alpha1);
    let c = f / 16.0 * cos_sq_alpha * (4.0 + f * (4.0 - 3.0 * cos_sq_alpha));
    let l = lambda
        - (1.0 - c)
            * f
            * sin_alpha
            * (sigma
                + c * sin_sigma
                    * (cos_2sigma_m + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)));

    Geodetic::new(lat, normalize_lon(origin.lon_rad + l))
}

/// Wraps a longitude into `[-PI, PI]`.
pub fn normalize_lon(lon_rad: f64) -> f64 {
    use std::f64::consts::{PI, TAU};
    let wrapped = (lon_rad + PI).rem_euclid(TAU) - PI;
    if wrapped == -PI && lon_rad > 0.0 {
        PI
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::{Geodetic, WGS84_A, destination, normalize_lon};
    use std::f64::consts::{FRAC_PI_2, PI};

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn east_along_equator_follows_the_semi_major_circle() {
        let origin = Geodetic::new(0.0, 0.0);
        let dest = destination(origin, FRAC_PI_2, 5_000.0);
        assert_close(dest.lat_rad, 0.0, 1e-12);
        assert_close(dest.lon_rad, 5_000.0 / WGS84_A, 1e-12);
    }

    #[test]
    fn quarter_meridian_reaches_the_pole() {
        let origin = Geodetic::new(0.0, 0.0);
        let dest = destination(origin, 0.0, 10_001_965.729);
        assert_close(dest.lat_deg(), 90.0, 1e-6);
    }

    #[test]
    fn short_hop_north_moves_roughly_one_arc_minute() {
        // One nautical mile is close to one arc-minute of latitude.
        let origin = Geodetic::from_degrees(45.0, 10.0);
        let dest = destination(origin, 0.0, 1_852.0);
        assert_close(dest.lat_deg() - 45.0, 1.0 / 60.0, 1e-4);
        assert_close(dest.lon_deg(), 10.0, 1e-9);
    }

    #[test]
    fn zero_distance_is_identity() {
        let origin = Geodetic::from_degrees(-33.9, 151.2);
        let dest = destination(origin, 1.234, 0.0);
        assert_close(dest.lat_rad, origin.lat_rad, 1e-12);
        assert_close(dest.lon_rad, origin.lon_rad, 1e-12);
    }

    #[test]
    fn longitudes_wrap_across_the_antimeridian() {
        assert_close(normalize_lon(PI + 0.1), -PI + 0.1, 1e-12);
        assert_close(normalize_lon(-PI - 0.1), PI - 0.1, 1e-12);
        assert_close(normalize_lon(PI), PI, 1e-12);
    }
}
