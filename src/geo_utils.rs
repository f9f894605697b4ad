//! # Geographic Utilities
//!
//! Great-circle distance and cumulative-distance bookkeeping for track points.
//!
//! ## Haversine Formula
//!
//! The haversine formula calculates the great-circle distance between two points on a
//! sphere. Distances here are in **kilometres** on a sphere of radius 6371 km, which is
//! what every distance field in this crate is measured in.
//!
//! ```rust
//! use track_engine::{LatLng, geo_utils};
//!
//! let bern = LatLng::new(46.9480, 7.4474);
//! let zurich = LatLng::new(47.3769, 8.5417);
//! let km = geo_utils::haversine_distance(bern, zurich);
//! assert!((km - 95.5).abs() < 1.0);
//! ```

use crate::{LatLng, TrackPoint};

/// Earth radius used for all distance computations, in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two positions in kilometres.
///
/// Total for all finite inputs: 0 for identical positions and symmetric in
/// its arguments.
#[inline]
pub fn haversine_distance(a: LatLng, b: LatLng) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Distance between two track points in kilometres.
#[inline]
pub fn point_distance(a: &TrackPoint, b: &TrackPoint) -> f64 {
    haversine_distance(a.lat_lng(), b.lat_lng())
}

/// Recompute cumulative `distance` over the sequence from scratch.
///
/// The first point gets 0; each later point gets its predecessor's distance
/// plus the leg between them. Whatever was stored in `distance` before is
/// ignored.
pub fn accumulate_distance(points: &mut [TrackPoint]) {
    let mut total = 0.0;
    for i in 0..points.len() {
        if i > 0 {
            total += point_distance(&points[i - 1], &points[i]);
        }
        points[i].distance = total;
    }
}

/// Total length of a point sequence in kilometres.
pub fn path_length(points: &[TrackPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| point_distance(&w[0], &w[1]))
        .sum()
}

/// First and last position of a sequence.
pub fn endpoints(points: &[TrackPoint]) -> (Option<LatLng>, Option<LatLng>) {
    (
        points.first().map(TrackPoint::lat_lng),
        points.last().map(TrackPoint::lat_lng),
    )
}
