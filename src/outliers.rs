//! # Outlier Filter
//!
//! Removes points that imply impossible motion or that are isolated elevation
//! spikes. Two passes, each run exactly once:
//!
//! 1. **Distance**: point `i` survives only if the leg from the *original*
//!    point `i - 1` is at most `max_step_km`. The first point always survives.
//! 2. **Elevation spike**: on the distance-filtered sequence, an interior
//!    point is dropped when it differs from both neighbours by more than
//!    `spike_threshold_m`. Points with a missing elevation (or a neighbour
//!    without one) are kept.
//!
//! The passes are not iterated to a fixed point: a spike that only becomes
//! isolated after another spike is removed stays in the output.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::geo_utils::point_distance;
use crate::TrackPoint;

/// Thresholds for outlier rejection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlierConfig {
    /// Largest plausible leg between consecutive samples, in kilometres.
    /// Default: 1.0
    pub max_step_km: f64,

    /// Elevation jump (meters) against both neighbours that marks a spike.
    /// Default: 100.0
    pub spike_threshold_m: f64,

    /// Sequences shorter than this pass through untouched.
    /// Default: 3
    pub min_points: usize,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            max_step_km: 1.0,
            spike_threshold_m: 100.0,
            min_points: 3,
        }
    }
}

/// Filter outliers with the default thresholds.
pub fn filter_points(points: Vec<TrackPoint>) -> Vec<TrackPoint> {
    filter_points_with_config(points, &OutlierConfig::default())
}

/// Filter outliers with explicit thresholds.
///
/// Order is preserved; nothing is reordered or deduplicated.
pub fn filter_points_with_config(points: Vec<TrackPoint>, config: &OutlierConfig) -> Vec<TrackPoint> {
    if points.len() < config.min_points {
        return points;
    }

    // Pass 1 compares against the unfiltered predecessor
    let keep_step: Vec<bool> = (0..points.len())
        .map(|i| i == 0 || point_distance(&points[i - 1], &points[i]) <= config.max_step_km)
        .collect();

    let stepped: Vec<TrackPoint> = points
        .into_iter()
        .zip(keep_step)
        .filter_map(|(p, keep)| keep.then_some(p))
        .collect();

    let last = stepped.len().saturating_sub(1);
    let keep_ele: Vec<bool> = (0..stepped.len())
        .map(|i| {
            if i == 0 || i == last {
                return true;
            }
            !is_spike(&stepped[i - 1], &stepped[i], &stepped[i + 1], config.spike_threshold_m)
        })
        .collect();

    stepped
        .into_iter()
        .zip(keep_ele)
        .filter_map(|(p, keep)| keep.then_some(p))
        .collect()
}

fn is_spike(prev: &TrackPoint, point: &TrackPoint, next: &TrackPoint, threshold: f64) -> bool {
    let (Some(ele), Some(prev_ele), Some(next_ele)) = (point.ele, prev.ele, next.ele) else {
        return false;
    };

    let spike = (ele - prev_ele).abs() > threshold && (ele - next_ele).abs() > threshold;
    if spike {
        debug!("[OutlierFilter] Dropped elevation spike: {:.1}m", ele);
    }
    spike
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Points ~111 m apart heading north, with the given elevations.
    fn column(eles: &[Option<f64>]) -> Vec<TrackPoint> {
        eles.iter()
            .enumerate()
            .map(|(i, ele)| TrackPoint {
                ele: *ele,
                ..TrackPoint::new(46.0 + i as f64 * 0.001, 7.0)
            })
            .collect()
    }

    #[test]
    fn test_short_sequences_pass_through() {
        let mut points = column(&[Some(100.0), Some(900.0)]);
        points[1].lat = 60.0; // far away, still untouched
        let out = filter_points(points.clone());
        assert_eq!(out, points);
    }

    #[test]
    fn test_drops_distance_jump() {
        let mut points = column(&[Some(100.0), Some(101.0), Some(102.0), Some(103.0)]);
        points[2].lat = 47.0; // ~110 km away from its predecessor

        let out = filter_points(points);

        // point 2 fails the step check; point 3 is compared with the original
        // point 2 (also ~110 km away) and is dropped as well
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].ele, Some(100.0));
        assert_eq!(out[1].ele, Some(101.0));
    }

    #[test]
    fn test_distance_pass_uses_original_neighbor() {
        // 0 -> 1 ok, 1 -> 2 too far, 2 -> 3 ok (both far away): 3 is kept
        let mut points = column(&[None, None, None, None]);
        points[2].lat = 47.0;
        points[3].lat = 47.001;

        let out = filter_points(points);
        assert_eq!(out.len(), 3);
        assert_eq!(out[2].lat, 47.001);
    }

    #[test]
    fn test_drops_elevation_spike() {
        let points = column(&[Some(500.0), Some(505.0), Some(900.0), Some(510.0), Some(515.0)]);
        let out = filter_points(points);
        let eles: Vec<_> = out.iter().map(|p| p.ele.unwrap()).collect();
        assert_eq!(eles, vec![500.0, 505.0, 510.0, 515.0]);
    }

    #[test]
    fn test_spike_needs_both_neighbors() {
        // a step change (only one side differs) is not a spike
        let points = column(&[Some(500.0), Some(505.0), Some(800.0), Some(805.0)]);
        let out = filter_points(points);
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn test_endpoints_never_dropped_as_spikes() {
        let points = column(&[Some(2000.0), Some(500.0), Some(505.0), Some(-900.0)]);
        let out = filter_points(points);
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn test_missing_elevation_is_kept() {
        let points = column(&[Some(500.0), None, Some(900.0), Some(505.0)]);
        let out = filter_points(points);
        // point 2 has a neighbour without elevation, so it cannot be judged
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn test_spikes_judged_against_same_input() {
        let points = column(&[Some(500.0), Some(900.0), Some(1300.0), Some(505.0)]);
        let out = filter_points(points);
        // 900 and 1300 are each > 100 m away from both original neighbours
        assert_eq!(out.len(), 2);

        // a plateau of two high points shields both
        let points = column(&[Some(500.0), Some(900.0), Some(950.0), Some(505.0)]);
        assert_eq!(filter_points(points).len(), 4);
    }

    #[test]
    fn test_not_iterated_to_fixed_point() {
        // 0 -> 1 is a jump; 2 and 3 sit next to 1, so they survive this pass
        let mut points = column(&[None, None, None, None]);
        points[1].lat = 47.0;
        points[2].lat = 47.001;
        points[3].lat = 47.002;

        let once = filter_points(points);
        assert_eq!(once.len(), 3);
        assert_eq!(once[1].lat, 47.001);

        // a second application sees the jump 0 -> 2 and removes more
        let twice = filter_points(once.clone());
        assert_eq!(twice.len(), 2);
        assert_ne!(twice, once);
    }

    #[test]
    fn test_clean_sequence_unchanged() {
        let points = column(&[Some(500.0), Some(510.0), Some(520.0), Some(515.0)]);
        assert_eq!(filter_points(points.clone()), points);
    }

    #[test]
    fn test_custom_thresholds() {
        let config = OutlierConfig {
            spike_threshold_m: 10.0,
            ..OutlierConfig::default()
        };
        let points = column(&[Some(500.0), Some(530.0), Some(505.0)]);
        let out = filter_points_with_config(points, &config);
        assert_eq!(out.len(), 2);
    }
}
