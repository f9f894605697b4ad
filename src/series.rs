//! # Elevation Series
//!
//! Derived vertical series over a track's points, one value per point:
//!
//! - **Elevation**: the raw `ele`, `None` where the sample has none
//! - **Delta**: `ele - ele[0]`, with a missing first elevation treated as 0
//! - **Gain**: running sum of positive elevation steps; always defined
//!
//! Missing elevation never counts as a drop. A gap simply contributes nothing
//! to the gain series.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{SeriesMode, TrackPoint};

/// Summary statistics for one point sequence.
///
/// `max_ele`/`min_ele` are `None` when no point carries an elevation; that is
/// distinct from an elevation of 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackStats {
    /// Kilometres
    pub total_distance: f64,
    /// Meters of cumulative climb
    pub elevation_gain: f64,
    pub max_ele: Option<f64>,
    pub min_ele: Option<f64>,
    pub point_count: usize,
    /// Time of the first point
    pub started_at: Option<DateTime<Utc>>,
    /// Time of the last point
    pub finished_at: Option<DateTime<Utc>>,
}

/// Compute the series for `mode`, same length and order as `points`.
pub fn compute_series(points: &[TrackPoint], mode: SeriesMode) -> Vec<Option<f64>> {
    match mode {
        SeriesMode::Elevation => points.iter().map(|p| p.ele).collect(),
        SeriesMode::Delta => {
            let base = points.first().and_then(|p| p.ele).unwrap_or(0.0);
            points.iter().map(|p| p.ele.map(|e| e - base)).collect()
        }
        SeriesMode::Gain => gain_series(points).into_iter().map(Some).collect(),
    }
}

/// Cumulative elevation gain; `gain[0] == 0` and the series never decreases.
pub fn gain_series(points: &[TrackPoint]) -> Vec<f64> {
    let mut gain = Vec::with_capacity(points.len());
    let mut total = 0.0;
    for (i, point) in points.iter().enumerate() {
        if i > 0 {
            if let (Some(prev), Some(curr)) = (points[i - 1].ele, point.ele) {
                total += (curr - prev).max(0.0);
            }
        }
        gain.push(total);
    }
    gain
}

/// Summary statistics for a point sequence. An empty sequence yields zeros and
/// `None`s.
pub fn compute_stats(points: &[TrackPoint]) -> TrackStats {
    let elevations = points.iter().filter_map(|p| p.ele);
    let (min_ele, max_ele) = elevations.fold((None, None), |(min, max): (Option<f64>, Option<f64>), e| {
        (
            Some(min.map_or(e, |m| m.min(e))),
            Some(max.map_or(e, |m| m.max(e))),
        )
    });

    TrackStats {
        total_distance: points.last().map(|p| p.distance).unwrap_or(0.0),
        elevation_gain: gain_series(points).last().copied().unwrap_or(0.0),
        max_ele,
        min_ele,
        point_count: points.len(),
        started_at: points.first().and_then(|p| p.time),
        finished_at: points.last().and_then(|p| p.time),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_utils::accumulate_distance;

    fn points(eles: &[Option<f64>]) -> Vec<TrackPoint> {
        let mut pts: Vec<TrackPoint> = eles
            .iter()
            .enumerate()
            .map(|(i, ele)| TrackPoint {
                ele: *ele,
                ..TrackPoint::new(46.0 + i as f64 * 0.001, 7.0)
            })
            .collect();
        accumulate_distance(&mut pts);
        pts
    }

    #[test]
    fn test_elevation_passes_through() {
        let pts = points(&[Some(100.0), None, Some(120.0)]);
        assert_eq!(
            compute_series(&pts, SeriesMode::Elevation),
            vec![Some(100.0), None, Some(120.0)]
        );
    }

    #[test]
    fn test_delta_relative_to_first() {
        let pts = points(&[Some(100.0), Some(90.0), None, Some(130.0)]);
        assert_eq!(
            compute_series(&pts, SeriesMode::Delta),
            vec![Some(0.0), Some(-10.0), None, Some(30.0)]
        );
    }

    #[test]
    fn test_delta_missing_baseline_is_zero() {
        let pts = points(&[None, Some(40.0)]);
        assert_eq!(compute_series(&pts, SeriesMode::Delta), vec![None, Some(40.0)]);
    }

    #[test]
    fn test_gain_ignores_drops_and_gaps() {
        let pts = points(&[Some(100.0), Some(110.0), Some(105.0), None, Some(200.0), Some(210.0)]);
        let gain = gain_series(&pts);
        // 100 -> 110 (+10), -> 105 (0), gap, gap, -> 210 (+10)
        assert_eq!(gain, vec![0.0, 10.0, 10.0, 10.0, 10.0, 20.0]);
        for w in gain.windows(2) {
            assert!(w[1] >= w[0]);
        }
        assert!(compute_series(&pts, SeriesMode::Gain).iter().all(Option::is_some));
    }

    #[test]
    fn test_stats() {
        let pts = points(&[Some(100.0), Some(150.0), Some(120.0), Some(180.0)]);
        let stats = compute_stats(&pts);
        assert_eq!(stats.elevation_gain, 110.0);
        assert_eq!(stats.max_ele, Some(180.0));
        assert_eq!(stats.min_ele, Some(100.0));
        assert_eq!(stats.point_count, 4);
        assert_eq!(stats.total_distance, pts[3].distance);
    }

    #[test]
    fn test_stats_without_elevation() {
        let stats = compute_stats(&points(&[None, None]));
        assert_eq!(stats.max_ele, None);
        assert_eq!(stats.min_ele, None);
        assert_eq!(stats.elevation_gain, 0.0);
    }

    #[test]
    fn test_stats_empty() {
        let stats = compute_stats(&[]);
        assert_eq!(stats.total_distance, 0.0);
        assert_eq!(stats.point_count, 0);
        assert!(stats.started_at.is_none());
    }
}
