//! Great-circle distance and azimuths on the WGS84 ellipsoid
//!
//! Vincenty's inverse formula; nearly antipodal pairs where the iteration
//! does not converge fall back to the spherical solution.

use std::f64::consts::PI;

use crate::error::{PredictError, PredictResult};

/// WGS84 semi-major axis (m)
const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening
const WGS84_F: f64 = 1.0 / 298.257_223_563;
/// WGS84 mean radius (km), used by the spherical fallback
const MEAN_RADIUS_KM: f64 = 6371.0088;

/// Earth radius (km) used to convert epicentral distance to degrees for travel-time lookup
pub const EARTH_RADIUS_KM: f64 = 6370.0;

const MAX_ITERATIONS: usize = 200;
const CONVERGENCE: f64 = 1e-12;

/// Distance and azimuths between two points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geodesic {
    pub distance_km: f64,
    /// Azimuth at point 1 towards point 2, degrees clockwise from north in [0, 360)
    pub forward_azimuth: f64,
    /// Azimuth at point 2 towards point 1, degrees clockwise from north in [0, 360)
    pub back_azimuth: f64,
}

/// Distance and azimuths from (lat1, lon1) to (lat2, lon2), degrees in, km out
pub fn distance_and_azimuth(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> PredictResult<Geodesic> {
    validate_coordinate(lat1, lon1)?;
    validate_coordinate(lat2, lon2)?;

    if lat1 == lat2 && normalize_longitude_delta((lon2 - lon1).to_radians()) == 0.0 {
        return Ok(Geodesic {
            distance_km: 0.0,
            forward_azimuth: 0.0,
            back_azimuth: 0.0,
        });
    }

    Ok(vincenty_inverse(lat1, lon1, lat2, lon2).unwrap_or_else(|| spherical(lat1, lon1, lat2, lon2)))
}

/// Epicentral distance in degrees as used by the travel-time table
pub fn km_to_degrees(distance_km: f64) -> f64 {
    distance_km / EARTH_RADIUS_KM * (180.0 / PI)
}

/// Latitude in [-90, 90], longitude in [-180, 360], both finite
pub fn validate_coordinate(lat: f64, lon: f64) -> PredictResult<()> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(PredictError::InvalidCoordinate(format!("latitude {}", lat)));
    }
    if !lon.is_finite() || !(-180.0..=360.0).contains(&lon) {
        return Err(PredictError::InvalidCoordinate(format!("longitude {}", lon)));
    }
    Ok(())
}

/// Wrap a longitude difference (radians) into (-PI, PI]
fn normalize_longitude_delta(delta: f64) -> f64 {
    let mut d = delta % (2.0 * PI);
    if d > PI {
        d -= 2.0 * PI;
    } else if d <= -PI {
        d += 2.0 * PI;
    }
    d
}

fn normalize_azimuth(degrees: f64) -> f64 {
    let a = degrees.rem_euclid(360.0);
    // rem_euclid can return 360.0 for tiny negative inputs
    if a >= 360.0 {
        0.0
    } else {
        a
    }
}

fn vincenty_inverse(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> Option<Geodesic> {
    let a = WGS84_A;
    let f = WGS84_F;
    let b = (1.0 - f) * a;

    let l = normalize_longitude_delta((lon2 - lon1).to_radians());
    let u1 = ((1.0 - f) * lat1.to_radians().tan()).atan();
    let u2 = ((1.0 - f) * lat2.to_radians().tan()).atan();
    let (sin_u1, cos_u1) = u1.sin_cos();
    let (sin_u2, cos_u2) = u2.sin_cos();

    let mut lambda = l;
    let mut converged = false;
    let (mut sin_sigma, mut cos_sigma, mut sigma) = (0.0, 0.0, 0.0);
    let (mut cos_sq_alpha, mut cos_2sigma_m) = (0.0, 0.0);
    let (mut sin_lambda, mut cos_lambda) = (0.0, 0.0);

    for _ in 0..MAX_ITERATIONS {
        (sin_lambda, cos_lambda) = lambda.sin_cos();
        let t1 = cos_u2 * sin_lambda;
        let t2 = cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda;
        sin_sigma = (t1 * t1 + t2 * t2).sqrt();
        if sin_sigma == 0.0 {
            // Coincident points
            return Some(Geodesic {
                distance_km: 0.0,
                forward_azimuth: 0.0,
                back_azimuth: 0.0,
            });
        }
        cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;
        sigma = sin_sigma.atan2(cos_sigma);
        let sin_alpha = cos_u1 * cos_u2 * sin_lambda / sin_sigma;
        cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
        cos_2sigma_m = if cos_sq_alpha != 0.0 {
            cos_sigma - 2.0 * sin_u1 * sin_u2 / cos_sq_alpha
        } else {
            // Equatorial line
            0.0
        };
        let c = f / 16.0 * cos_sq_alpha * (4.0 + f * (4.0 - 3.0 * cos_sq_alpha));
        let previous = lambda;
        lambda = l
            + (1.0 - c)
                * f
                * sin_alpha
                * (sigma
                    + c * sin_sigma
                        * (cos_2sigma_m + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)));
        if (lambda - previous).abs() < CONVERGENCE {
            converged = true;
            break;
        }
    }

    if !converged || lambda.abs() > PI {
        return None;
    }

    let u_sq = cos_sq_alpha * (a * a - b * b) / (b * b);
    let big_a = 1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
    let big_b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));
    let delta_sigma = big_b
        * sin_sigma
        * (cos_2sigma_m
            + big_b / 4.0
                * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)
                    - big_b / 6.0
                        * cos_2sigma_m
                        * (-3.0 + 4.0 * sin_sigma * sin_sigma)
                        * (-3.0 + 4.0 * cos_2sigma_m * cos_2sigma_m)));
    let distance_m = b * big_a * (sigma - delta_sigma);

    let alpha1 = (cos_u2 * sin_lambda).atan2(cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda);
    let alpha2 = (cos_u1 * sin_lambda).atan2(-sin_u1 * cos_u2 + cos_u1 * sin_u2 * cos_lambda);

    Some(Geodesic {
        distance_km: distance_m / 1000.0,
        forward_azimuth: normalize_azimuth(alpha1.to_degrees()),
        back_azimuth: normalize_azimuth(alpha2.to_degrees() + 180.0),
    })
}

fn spherical(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> Geodesic {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = phi2 - phi1;
    let dlambda = normalize_longitude_delta((lon2 - lon1).to_radians());

    let h = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    let azimuth = |p1: f64, p2: f64, dl: f64| {
        let y = dl.sin() * p2.cos();
        let x = p1.cos() * p2.sin() - p1.sin() * p2.cos() * dl.cos();
        normalize_azimuth(y.atan2(x).to_degrees())
    };

    Geodesic {
        distance_km: MEAN_RADIUS_KM * c,
        forward_azimuth: azimuth(phi1, phi2, dlambda),
        back_azimuth: azimuth(phi2, phi1, -dlambda),
    }
}
