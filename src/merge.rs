//! # Track Merge
//!
//! Chronological concatenation of several tracks into one continuous series.
//!
//! Tracks are ordered by start time (untimed tracks last, stable among
//! themselves). Each track's own series is computed independently and then
//! shifted:
//!
//! - `x` by the running distance offset (the last merged `x` so far)
//! - `y` by the running offset of the active mode (Delta and Gain only), so
//!   that consecutive tracks connect without a jump
//!
//! `total_gain` sums each track's own final gain whatever the mode.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::series::{compute_series, gain_series};
use crate::{SeriesMode, Track, TrackPoint};

/// One sample of a merged series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedPoint {
    /// Offset-adjusted distance in kilometres
    pub x: f64,
    /// Offset-adjusted series value
    pub y: Option<f64>,
    pub source_track_id: String,
    /// Display name of the source track
    pub source_label: String,
    pub color: String,
    /// The untouched source sample; its `lat`/`lng` are real positions
    pub original_point: TrackPoint,
}

/// Result of [`merge_tracks`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedSeries {
    pub points: Vec<MergedPoint>,
    pub total_gain: f64,
    pub total_distance: f64,
}

impl MergedSeries {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Merge `tracks` into one series for `mode`.
///
/// Empty input gives an empty series; a track without points contributes
/// nothing and leaves every offset unchanged.
pub fn merge_tracks<T: AsRef<Track>>(tracks: &[T], mode: SeriesMode) -> MergedSeries {
    let mut ordered: Vec<&Track> = tracks.iter().map(AsRef::as_ref).collect();
    // sort_by is stable
    ordered.sort_by(|a, b| match (a.meta.time, b.meta.time) {
        (Some(ta), Some(tb)) => ta.cmp(&tb),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    let total_points = ordered.iter().map(|t| t.points.len()).sum();
    let mut merged = MergedSeries {
        points: Vec::with_capacity(total_points),
        ..MergedSeries::default()
    };

    let mut x_offset = 0.0;
    let mut y_offset_delta = 0.0;
    let mut y_offset_gain = 0.0;

    for track in ordered {
        if track.points.is_empty() {
            continue;
        }

        let segment = compute_series(&track.points, mode);
        let applied = match mode {
            SeriesMode::Elevation => 0.0,
            SeriesMode::Delta => y_offset_delta,
            SeriesMode::Gain => y_offset_gain,
        };

        let first = merged.points.len();
        for (point, y) in track.points.iter().zip(segment) {
            merged.points.push(MergedPoint {
                x: point.distance + x_offset,
                y: y.map(|v| v + applied),
                source_track_id: track.meta.id.clone(),
                source_label: track.meta.name.clone(),
                color: track.meta.color.clone(),
                original_point: point.clone(),
            });
        }
        let emitted = &merged.points[first..];

        if let Some(last) = emitted.last() {
            x_offset = last.x;
        }

        // Carry the last defined value; a track ending in a gap still connects
        let last_y = emitted.iter().rev().find_map(|p| p.y);
        match mode {
            SeriesMode::Elevation => {}
            SeriesMode::Delta => y_offset_delta = last_y.unwrap_or(y_offset_delta),
            SeriesMode::Gain => y_offset_gain = last_y.unwrap_or(y_offset_gain),
        }

        merged.total_gain += gain_series(&track.points).last().copied().unwrap_or(0.0);
    }

    merged.total_distance = x_offset;
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TrackMeta;
    use chrono::{TimeZone, Utc};

    /// Track whose points have the given (distance, ele) pairs.
    fn track(id: &str, hour: Option<u32>, samples: &[(f64, Option<f64>)]) -> Track {
        Track {
            meta: TrackMeta {
                id: id.to_string(),
                file_name: format!("{}.gpx", id),
                name: format!("Track {}", id),
                original_name: format!("Track {}", id),
                time: hour.map(|h| Utc.with_ymd_and_hms(2024, 5, 1, h, 0, 0).unwrap()),
                color: format!("color-{}", id),
                start_point: None,
                end_point: None,
            },
            points: samples
                .iter()
                .enumerate()
                .map(|(i, &(distance, ele))| TrackPoint {
                    distance,
                    ele,
                    ..TrackPoint::new(46.0 + i as f64 * 0.01, 7.0)
                })
                .collect(),
        }
    }

    #[test]
    fn test_single_track_elevation_is_identity() {
        let t = track("a", Some(8), &[(0.0, Some(500.0)), (1.2, Some(530.0)), (2.5, None)]);
        let merged = merge_tracks(std::slice::from_ref(&t), SeriesMode::Elevation);

        assert_eq!(merged.points.len(), 3);
        for (m, p) in merged.points.iter().zip(&t.points) {
            assert_eq!(m.x, p.distance);
            assert_eq!(m.y, p.ele);
            assert_eq!(&m.original_point, p);
            assert_eq!(m.source_track_id, "a");
            assert_eq!(m.source_label, "Track a");
            assert_eq!(m.color, "color-a");
        }
        assert_eq!(merged.total_distance, 2.5);
        assert_eq!(merged.total_gain, 30.0);
    }

    #[test]
    fn test_gain_mode_continues_offsets() {
        let a = track("a", Some(8), &[(0.0, Some(0.0)), (2.0, Some(60.0)), (5.0, Some(100.0))]);
        let b = track("b", Some(12), &[(0.0, Some(10.0)), (1.0, Some(40.0)), (3.0, Some(60.0))]);

        // input order must not matter, time does
        let merged = merge_tracks(&[b, a], SeriesMode::Gain);

        let b_first = &merged.points[3];
        assert_eq!(b_first.source_track_id, "b");
        assert_eq!(b_first.x, 5.0);
        assert_eq!(b_first.y, Some(100.0));

        let last = merged.points.last().unwrap();
        assert_eq!(last.x, 8.0);
        assert_eq!(last.y, Some(150.0));
        assert_eq!(merged.total_gain, 150.0);
        assert_eq!(merged.total_distance, 8.0);
    }

    #[test]
    fn test_delta_mode_connects_tracks() {
        let a = track("a", Some(8), &[(0.0, Some(200.0)), (1.0, Some(250.0))]);
        let b = track("b", Some(9), &[(0.0, Some(900.0)), (1.0, Some(880.0))]);
        let merged = merge_tracks(&[a, b], SeriesMode::Delta);

        let ys: Vec<_> = merged.points.iter().map(|p| p.y).collect();
        assert_eq!(ys, vec![Some(0.0), Some(50.0), Some(50.0), Some(30.0)]);
    }

    #[test]
    fn test_elevation_mode_has_no_y_offset() {
        let a = track("a", Some(8), &[(0.0, Some(200.0)), (1.0, Some(250.0))]);
        let b = track("b", Some(9), &[(0.0, Some(900.0)), (1.0, Some(880.0))]);
        let merged = merge_tracks(&[a, b], SeriesMode::Elevation);

        assert_eq!(merged.points[2].y, Some(900.0));
        assert_eq!(merged.points[2].x, 1.0);
        // total gain is mode independent
        assert_eq!(merged.total_gain, 50.0);
    }

    #[test]
    fn test_untimed_tracks_sort_last_and_stable() {
        let n1 = track("n1", None, &[(0.0, None)]);
        let t = track("t", Some(10), &[(0.0, None)]);
        let n2 = track("n2", None, &[(0.0, None)]);
        let merged = merge_tracks(&[n1, t, n2], SeriesMode::Elevation);

        let ids: Vec<_> = merged.points.iter().map(|p| p.source_track_id.as_str()).collect();
        assert_eq!(ids, vec!["t", "n1", "n2"]);
    }

    #[test]
    fn test_empty_track_leaves_offsets() {
        let a = track("a", Some(8), &[(0.0, Some(0.0)), (4.0, Some(20.0))]);
        let empty = track("e", Some(9), &[]);
        let b = track("b", Some(10), &[(0.0, Some(5.0)), (1.0, Some(15.0))]);
        let merged = merge_tracks(&[a, empty, b], SeriesMode::Gain);

        assert_eq!(merged.points.len(), 4);
        assert_eq!(merged.points[2].x, 4.0);
        assert_eq!(merged.points[2].y, Some(20.0));
        assert_eq!(merged.total_gain, 30.0);
    }

    #[test]
    fn test_no_tracks() {
        let merged = merge_tracks::<Track>(&[], SeriesMode::Gain);
        assert!(merged.is_empty());
        assert_eq!(merged.total_distance, 0.0);
        assert_eq!(merged.total_gain, 0.0);
    }
}
