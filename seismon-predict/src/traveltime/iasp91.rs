//! Built-in IASP91 travel-time table
//!
//! Surface-focus times for the first-arriving branches of each phase family,
//! tabulated every few degrees and interpolated linearly. Source depth is
//! handled with a first-order delay-time correction through the IASP91
//! velocity profile, bounded below by the straight chord from source to
//! station so that near-field times for deep events stay physical.

use std::f64::consts::PI;

use super::{ModelError, PhaseArrival, TravelTimeTable};
use crate::geodesy::EARTH_RADIUS_KM;

/// Deepest supported source (km)
pub const MAX_SOURCE_DEPTH_KM: f64 = 700.0;

/// Integration step for the depth correction (km)
const DEPTH_STEP_KM: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wave {
    P,
    S,
}

struct Branch {
    name: &'static str,
    wave: Wave,
    /// Direct phase; near-field times are bounded by the source-station chord
    direct: bool,
    /// (distance deg, surface-focus time s), ascending distance
    points: &'static [(f64, f64)],
}

const P_DIRECT: &[(f64, f64)] = &[
    (0.0, 0.0),
    (1.0, 19.2),
    (2.0, 35.2),
    (5.0, 76.6),
    (10.0, 142.0),
    (15.0, 207.0),
    (20.0, 275.0),
    (25.0, 326.0),
    (30.0, 372.0),
    (35.0, 416.0),
    (40.0, 458.5),
    (45.0, 499.5),
    (50.0, 539.0),
    (55.0, 577.0),
    (60.0, 612.5),
    (65.0, 646.0),
    (70.0, 677.5),
    (75.0, 707.0),
    (80.0, 734.5),
    (85.0, 760.0),
    (90.0, 784.0),
    (95.0, 807.0),
    (100.0, 829.5),
];

const P_DIFF: &[(f64, f64)] = &[(100.0, 829.5), (110.0, 873.9), (120.0, 918.3), (130.0, 962.7)];

const PKIKP: &[(f64, f64)] = &[
    (110.0, 1100.0),
    (120.0, 1122.0),
    (130.0, 1143.0),
    (140.0, 1162.0),
    (150.0, 1179.0),
    (160.0, 1193.0),
    (170.0, 1203.0),
    (180.0, 1207.0),
];

const S_DIRECT: &[(f64, f64)] = &[
    (0.0, 0.0),
    (1.0, 33.1),
    (2.0, 61.9),
    (5.0, 136.6),
    (10.0, 250.0),
    (15.0, 372.0),
    (20.0, 489.0),
    (25.0, 583.0),
    (30.0, 668.0),
    (35.0, 750.0),
    (40.0, 829.0),
    (45.0, 903.0),
    (50.0, 973.0),
    (55.0, 1041.0),
    (60.0, 1105.0),
    (65.0, 1166.0),
    (70.0, 1224.0),
    (75.0, 1279.0),
    (80.0, 1331.0),
    (85.0, 1381.0),
    (90.0, 1428.0),
    (95.0, 1471.0),
    (100.0, 1512.0),
];

const S_DIFF: &[(f64, f64)] = &[(100.0, 1512.0), (110.0, 1595.0), (120.0, 1678.0), (130.0, 1761.0)];

const SKS: &[(f64, f64)] = &[
    (65.0, 1255.0),
    (70.0, 1290.0),
    (75.0, 1316.0),
    (80.0, 1340.0),
    (85.0, 1372.0),
    (90.0, 1403.0),
    (100.0, 1460.0),
    (110.0, 1510.0),
    (120.0, 1555.0),
    (130.0, 1594.0),
    (140.0, 1628.0),
];

const SKIKS: &[(f64, f64)] = &[
    (140.0, 1630.0),
    (150.0, 1650.0),
    (160.0, 1665.0),
    (170.0, 1674.0),
    (180.0, 1677.0),
];

const BRANCHES: &[Branch] = &[
    Branch { name: "P", wave: Wave::P, direct: true, points: P_DIRECT },
    Branch { name: "Pdiff", wave: Wave::P, direct: false, points: P_DIFF },
    Branch { name: "PKIKP", wave: Wave::P, direct: false, points: PKIKP },
    Branch { name: "S", wave: Wave::S, direct: true, points: S_DIRECT },
    Branch { name: "Sdiff", wave: Wave::S, direct: false, points: S_DIFF },
    Branch { name: "SKS", wave: Wave::S, direct: false, points: SKS },
    Branch { name: "SKIKS", wave: Wave::S, direct: false, points: SKIKS },
];

// (depth km, velocity km/s); repeated depths mark discontinuities
const VP_PROFILE: &[(f64, f64)] = &[
    (0.0, 5.80),
    (20.0, 5.80),
    (20.0, 6.50),
    (35.0, 6.50),
    (35.0, 8.04),
    (210.0, 8.30),
    (410.0, 9.03),
    (410.0, 9.36),
    (660.0, 10.20),
    (660.0, 10.79),
    (760.0, 11.06),
    (2740.0, 13.68),
    (2889.0, 13.69),
    (2889.0, 8.01),
    (5153.0, 10.26),
    (5153.0, 11.04),
    (6371.0, 11.26),
];

// Core legs of S-family phases travel as P
const VS_PROFILE: &[(f64, f64)] = &[
    (0.0, 3.36),
    (20.0, 3.36),
    (20.0, 3.75),
    (35.0, 3.75),
    (35.0, 4.47),
    (210.0, 4.52),
    (410.0, 4.87),
    (410.0, 5.07),
    (660.0, 5.61),
    (660.0, 5.96),
    (760.0, 6.21),
    (2740.0, 7.27),
    (2889.0, 7.30),
    (2889.0, 8.01),
    (5153.0, 10.26),
    (5153.0, 11.04),
    (6371.0, 11.26),
];

/// IASP91 surface-focus tables with depth correction
#[derive(Debug, Clone, Default)]
pub struct Iasp91Table;

impl Iasp91Table {
    pub fn new() -> Self {
        Self
    }
}

impl TravelTimeTable for Iasp91Table {
    fn name(&self) -> &str {
        "iasp91"
    }

    fn arrivals(&self, depth_km: f64, distance_deg: f64) -> Result<Vec<PhaseArrival>, ModelError> {
        if !depth_km.is_finite() || !(0.0..=MAX_SOURCE_DEPTH_KM).contains(&depth_km) {
            return Err(ModelError::UnsupportedDepth(depth_km));
        }
        if !distance_deg.is_finite() || !(0.0..=180.0).contains(&distance_deg) {
            return Err(ModelError::UnsupportedDistance(distance_deg));
        }

        let mut arrivals: Vec<PhaseArrival> = BRANCHES
            .iter()
            .filter_map(|branch| branch_arrival(branch, depth_km, distance_deg))
            .collect();
        arrivals.sort_by(|a, b| a.time_s.total_cmp(&b.time_s));
        Ok(arrivals)
    }
}

fn branch_arrival(branch: &Branch, depth_km: f64, distance_deg: f64) -> Option<PhaseArrival> {
    let (surface_time, slowness_deg) = interpolate(branch.points, distance_deg)?;
    let corrected = surface_time - delay_time(branch.wave, slowness_deg, depth_km);

    if branch.direct {
        if let Some(chord) = upgoing_time(branch.wave, depth_km, distance_deg).filter(|t| *t > corrected) {
            // Upgoing leg from the source dominates
            return Some(PhaseArrival {
                name: branch.name.to_ascii_lowercase(),
                time_s: chord,
            });
        }
    }

    Some(PhaseArrival {
        name: branch.name.to_string(),
        time_s: corrected.max(0.0),
    })
}

/// Time and slowness (s/deg) at `distance_deg`, `None` outside the branch
fn interpolate(points: &[(f64, f64)], distance_deg: f64) -> Option<(f64, f64)> {
    let first = points.first()?;
    let last = points.last()?;
    if distance_deg < first.0 || distance_deg > last.0 {
        return None;
    }
    points.windows(2).find_map(|w| {
        let (d0, t0) = w[0];
        let (d1, t1) = w[1];
        if distance_deg >= d0 && distance_deg <= d1 && d1 > d0 {
            let slowness = (t1 - t0) / (d1 - d0);
            Some((t0 + slowness * (distance_deg - d0), slowness))
        } else {
            None
        }
    })
}

fn profile(wave: Wave) -> &'static [(f64, f64)] {
    match wave {
        Wave::P => VP_PROFILE,
        Wave::S => VS_PROFILE,
    }
}

/// Velocity at depth; takes the shallower side of a discontinuity
fn velocity(wave: Wave, depth_km: f64) -> f64 {
    let points = profile(wave);
    for w in points.windows(2) {
        let (z0, v0) = w[0];
        let (z1, v1) = w[1];
        if depth_km <= z1 {
            if z1 > z0 {
                return v0 + (v1 - v0) * (depth_km - z0) / (z1 - z0);
            }
            return v0;
        }
    }
    points.last().map(|p| p.1).unwrap_or(1.0)
}

/// Fastest velocity between the surface and `depth_km`
fn max_velocity_to(wave: Wave, depth_km: f64) -> f64 {
    profile(wave)
        .iter()
        .take_while(|(z, _)| *z <= depth_km)
        .map(|(_, v)| *v)
        .fold(velocity(wave, depth_km), f64::max)
}

/// Travel time saved by starting the ray at depth: integral of the vertical slowness
fn delay_time(wave: Wave, slowness_deg: f64, depth_km: f64) -> f64 {
    if depth_km <= 0.0 {
        return 0.0;
    }
    // Ray parameter in s/rad; horizontal slowness at radius r is p / r
    let p_rad = slowness_deg * 180.0 / PI;
    let mut total = 0.0;
    let mut z = 0.0;
    while z < depth_km {
        let dz = DEPTH_STEP_KM.min(depth_km - z);
        let mid = z + dz / 2.0;
        let u = 1.0 / velocity(wave, mid);
        let horizontal = p_rad / (EARTH_RADIUS_KM - mid);
        let eta_sq = u * u - horizontal * horizontal;
        if eta_sq > 0.0 {
            total += eta_sq.sqrt() * dz;
        }
        z += dz;
    }
    total
}

/// Straight chord from source to station at the fastest velocity above the source
///
/// Only defined while the source is the deepest point of the chord; beyond
/// that the real ray dives below the source and the table time governs.
fn upgoing_time(wave: Wave, depth_km: f64, distance_deg: f64) -> Option<f64> {
    let r0 = EARTH_RADIUS_KM;
    let r1 = EARTH_RADIUS_KM - depth_km;
    let theta = distance_deg.to_radians();

    // Station at (r0, 0), source at (r1 cos theta, r1 sin theta)
    let (dx, dy) = (r1 * theta.cos() - r0, r1 * theta.sin());
    let length_sq = dx * dx + dy * dy;
    if length_sq == 0.0 {
        return None;
    }

    // Closest approach to the Earth's center along the chord
    let t = -(r0 * dx) / length_sq;
    if t < 1.0 {
        return None;
    }

    Some(length_sq.sqrt() / max_velocity_to(wave, depth_km))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first(arrivals: &[PhaseArrival], prefix: char) -> PhaseArrival {
        arrivals
            .iter()
            .find(|a| a.name.to_ascii_lowercase().starts_with(prefix))
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_rejects_out_of_range() {
        let table = Iasp91Table::new();
        assert!(matches!(table.arrivals(-1.0, 10.0), Err(ModelError::UnsupportedDepth(_))));
        assert!(matches!(table.arrivals(701.0, 10.0), Err(ModelError::UnsupportedDepth(_))));
        assert!(matches!(table.arrivals(10.0, -0.1), Err(ModelError::UnsupportedDistance(_))));
        assert!(matches!(table.arrivals(10.0, 180.5), Err(ModelError::UnsupportedDistance(_))));
        assert!(matches!(table.arrivals(f64::NAN, 10.0), Err(ModelError::UnsupportedDepth(_))));
    }

    #[test]
    fn test_arrivals_sorted() {
        let table = Iasp91Table::new();
        for distance in [0.0, 3.0, 45.0, 99.0, 103.8, 125.0, 179.0] {
            let arrivals = table.arrivals(33.0, distance).unwrap();
            assert!(!arrivals.is_empty());
            assert!(arrivals.windows(2).all(|w| w[0].time_s <= w[1].time_s));
        }
    }

    #[test]
    fn test_p_and_s_available_everywhere() {
        let table = Iasp91Table::new();
        for depth in [0.0, 10.0, 150.0, 600.0, 700.0] {
            for distance in [0.0, 0.5, 10.0, 64.9, 100.0, 115.0, 135.0, 180.0] {
                let arrivals = table.arrivals(depth, distance).unwrap();
                let p = first(&arrivals, 'p');
                let s = first(&arrivals, 's');
                assert!(p.time_s >= 0.0);
                assert!(p.time_s <= s.time_s, "P after S at {} km, {} deg", depth, distance);
            }
        }
    }

    #[test]
    fn test_surface_focus_reference_times() {
        let table = Iasp91Table::new();
        let arrivals = table.arrivals(0.0, 30.0).unwrap();
        assert_eq!(first(&arrivals, 'p').time_s, 372.0);
        assert_eq!(first(&arrivals, 's').time_s, 668.0);
    }

    #[test]
    fn test_teleseismic_branches() {
        let table = Iasp91Table::new();

        // Beyond the core shadow edge P diffracts and S is overtaken by SKS
        let arrivals = table.arrivals(10.0, 103.8).unwrap();
        assert_eq!(first(&arrivals, 'p').name, "Pdiff");
        assert_eq!(first(&arrivals, 's').name, "SKS");

        let arrivals = table.arrivals(10.0, 150.0).unwrap();
        assert_eq!(first(&arrivals, 'p').name, "PKIKP");
    }

    #[test]
    fn test_deeper_source_arrives_earlier_at_teleseismic_distance() {
        let table = Iasp91Table::new();
        let shallow = first(&table.arrivals(10.0, 60.0).unwrap(), 'p').time_s;
        let deep = first(&table.arrivals(600.0, 60.0).unwrap(), 'p').time_s;
        assert!(deep < shallow);
        // Roughly a minute of delay time for a 600 km source
        assert!(shallow - deep > 40.0 && shallow - deep < 100.0, "{}", shallow - deep);
    }

    #[test]
    fn test_deep_source_near_field_is_upgoing() {
        let table = Iasp91Table::new();
        let arrivals = table.arrivals(600.0, 0.0).unwrap();
        let p = first(&arrivals, 'p');
        assert_eq!(p.name, "p");
        // 600 km straight up through the upper mantle
        assert!(p.time_s > 50.0 && p.time_s < 80.0, "{}", p.time_s);
    }

    #[test]
    fn test_interpolation_inside_segment() {
        let (t, slowness) = interpolate(P_DIRECT, 32.5).unwrap();
        assert!((t - 394.0).abs() < 1e-9);
        assert!((slowness - 8.8).abs() < 1e-9);
        assert!(interpolate(P_DIFF, 99.0).is_none());
    }

    #[test]
    fn test_velocity_profile_discontinuity() {
        assert_eq!(velocity(Wave::P, 20.0), 5.80);
        assert_eq!(velocity(Wave::P, 20.5), 6.50);
        assert!(max_velocity_to(Wave::P, 3000.0) >= 13.69);
    }
}
