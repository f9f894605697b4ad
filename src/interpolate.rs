//! # Cursor Interpolation
//!
//! One linear scan that answers "what is under the cursor at x?" for any
//! ordered x/y sequence: a single track's points (`distance`/`ele`) or a merged
//! series (`x`/`y`). Positions are interpolated between the *source* samples,
//! never between offset-adjusted merge coordinates, so every answer maps back
//! to a real place on the map.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::merge::MergedPoint;
use crate::{Track, TrackPoint};

/// An entry of an ordered series that can be probed by [`interpolate_at`].
pub trait SeriesSample {
    /// Position along the horizontal axis (non-decreasing along the series).
    fn x(&self) -> f64;
    /// Series value at `x`.
    fn y(&self) -> Option<f64>;
    /// The underlying recorded sample.
    fn source(&self) -> &TrackPoint;
    fn color(&self) -> Option<&str> {
        None
    }
    fn label(&self) -> Option<&str> {
        None
    }
}

impl SeriesSample for TrackPoint {
    fn x(&self) -> f64 {
        self.distance
    }

    fn y(&self) -> Option<f64> {
        self.ele
    }

    fn source(&self) -> &TrackPoint {
        self
    }
}

impl SeriesSample for MergedPoint {
    fn x(&self) -> f64 {
        self.x
    }

    fn y(&self) -> Option<f64> {
        self.y
    }

    fn source(&self) -> &TrackPoint {
        &self.original_point
    }

    fn color(&self) -> Option<&str> {
        Some(&self.color)
    }

    fn label(&self) -> Option<&str> {
        Some(&self.source_label)
    }
}

/// Result of probing a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpolatedPoint {
    pub lat: f64,
    pub lng: f64,
    /// Interpolated series value (elevation, delta or gain)
    pub ele: Option<f64>,
    /// The probed x
    pub distance: f64,
    pub time: Option<DateTime<Utc>>,
    pub color: Option<String>,
    pub label: Option<String>,
}

/// Probe `series` at `target_x`.
///
/// Returns `None` for fewer than two samples, for a target outside
/// `[first.x, last.x]`, or for a NaN target. The first bracketing pair wins; a
/// zero-length segment resolves to its first sample. Time, color and label are
/// always taken from the first sample of the pair, even at `t == 1`.
pub fn interpolate_at<S: SeriesSample>(series: &[S], target_x: f64) -> Option<InterpolatedPoint> {
    if series.len() < 2 {
        return None;
    }

    let (p1, p2) = series
        .windows(2)
        .map(|w| (&w[0], &w[1]))
        .find(|(p1, p2)| p1.x() <= target_x && target_x <= p2.x())?;

    let span = p2.x() - p1.x();
    let t = if span != 0.0 { (target_x - p1.x()) / span } else { 0.0 };

    let (a, b) = (p1.source(), p2.source());

    Some(InterpolatedPoint {
        lat: lerp(a.lat, b.lat, t),
        lng: lerp(a.lng, b.lng, t),
        ele: lerp_opt(p1.y(), p2.y(), t),
        distance: target_x,
        time: a.time,
        color: p1.color().map(str::to_string),
        label: p1.label().map(str::to_string),
    })
}

/// Probe a single track, labelling the result with the track's name and color.
pub fn interpolate_track(track: &Track, target_km: f64) -> Option<InterpolatedPoint> {
    interpolate_at(&track.points, target_km).map(|p| InterpolatedPoint {
        color: Some(track.meta.color.clone()),
        label: Some(track.meta.name.clone()),
        ..p
    })
}

/// Probe `series` at a horizontal pixel position of a chart.
pub fn interpolate_at_pixel<S: SeriesSample>(series: &[S], axis: &XAxis, px: f64) -> Option<InterpolatedPoint> {
    interpolate_at(series, axis.value_for_pixel(px)?)
}

/// Linear mapping between chart pixels and series x values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XAxis {
    pub pixel_left: f64,
    pub pixel_right: f64,
    pub min: f64,
    pub max: f64,
}

impl XAxis {
    pub fn new(pixel_left: f64, pixel_right: f64, min: f64, max: f64) -> Self {
        Self {
            pixel_left,
            pixel_right,
            min,
            max,
        }
    }

    /// Axis value under `px`, `None` outside the plot area.
    pub fn value_for_pixel(&self, px: f64) -> Option<f64> {
        let width = self.pixel_right - self.pixel_left;
        if width.is_nan() || width <= 0.0 || px < self.pixel_left || px > self.pixel_right {
            return None;
        }
        let fraction = (px - self.pixel_left) / width;
        Some(lerp(self.min, self.max, fraction))
    }
}

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    if t == 0.0 {
        a
    } else if t == 1.0 {
        b
    } else {
        a + (b - a) * t
    }
}

fn lerp_opt(a: Option<f64>, b: Option<f64>, t: f64) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(lerp(a, b, t)),
        (Some(a), None) if t == 0.0 => Some(a),
        (None, Some(b)) if t == 1.0 => Some(b),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{merge_tracks, SeriesMode, TrackMeta};
    use chrono::TimeZone;

    fn sample(x: f64, y: f64, lat: f64) -> TrackPoint {
        TrackPoint {
            distance: x,
            ..TrackPoint::new(lat, 7.0).with_ele(y)
        }
    }

    fn two_points() -> Vec<TrackPoint> {
        vec![sample(0.0, 10.0, 46.0), sample(1.0, 20.0, 46.01)]
    }

    #[test]
    fn test_exact_samples_and_midpoint() {
        let series = two_points();

        let at0 = interpolate_at(&series, 0.0).unwrap();
        assert_eq!(at0.ele, Some(10.0));
        assert_eq!((at0.lat, at0.lng), (46.0, 7.0));

        let at1 = interpolate_at(&series, 1.0).unwrap();
        assert_eq!(at1.ele, Some(20.0));
        assert_eq!(at1.lat, 46.01);

        let mid = interpolate_at(&series, 0.5).unwrap();
        assert_eq!(mid.ele, Some(15.0));
        assert_eq!(mid.distance, 0.5);
    }

    #[test]
    fn test_no_extrapolation() {
        let series = two_points();
        assert!(interpolate_at(&series, -1.0).is_none());
        assert!(interpolate_at(&series, 2.0).is_none());
        assert!(interpolate_at(&series, f64::NAN).is_none());
    }

    #[test]
    fn test_needs_two_samples() {
        assert!(interpolate_at::<TrackPoint>(&[], 0.0).is_none());
        assert!(interpolate_at(&[sample(0.0, 1.0, 46.0)], 0.0).is_none());
    }

    #[test]
    fn test_zero_length_segment() {
        let series = vec![sample(0.0, 10.0, 46.0), sample(0.0, 30.0, 46.5), sample(1.0, 40.0, 46.6)];
        let hit = interpolate_at(&series, 0.0).unwrap();
        assert_eq!(hit.ele, Some(10.0));
        assert_eq!(hit.lat, 46.0);
    }

    #[test]
    fn test_missing_elevation_side() {
        let mut series = two_points();
        series[1].ele = None;
        assert_eq!(interpolate_at(&series, 0.0).unwrap().ele, Some(10.0));
        assert_eq!(interpolate_at(&series, 0.5).unwrap().ele, None);
        // position is still interpolated
        assert!(interpolate_at(&series, 0.5).unwrap().lat > 46.0);
    }

    #[test]
    fn test_repeatable() {
        let series = two_points();
        let a = interpolate_at(&series, 0.37).unwrap();
        let b = interpolate_at(&series, 0.37).unwrap();
        assert_eq!(a.ele.unwrap().to_bits(), b.ele.unwrap().to_bits());
        assert_eq!(a, b);
    }

    #[test]
    fn test_time_from_first_sample_of_pair() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 10, 5, 0).unwrap();
        let mut series = two_points();
        series[0].time = Some(t0);
        series[1].time = Some(t1);

        assert_eq!(interpolate_at(&series, 0.9).unwrap().time, Some(t0));
        // the right edge of the pair still reports the left sample
        let end = interpolate_at(&series, 1.0).unwrap();
        assert_eq!(end.time, Some(t0));
        assert_eq!(end.lat, 46.01);
    }

    #[test]
    fn test_merged_series_uses_original_positions() {
        let track = |id: &str, hour: u32, lat: f64| Track {
            meta: TrackMeta {
                id: id.to_string(),
                file_name: format!("{}.gpx", id),
                name: id.to_uppercase(),
                original_name: id.to_uppercase(),
                time: Some(Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap()),
                color: format!("c-{}", id),
                start_point: None,
                end_point: None,
            },
            points: vec![sample(0.0, 100.0, lat), sample(2.0, 120.0, lat + 0.02)],
        };
        let merged = merge_tracks(&[track("a", 8, 46.0), track("b", 9, 10.0)], SeriesMode::Gain);

        // x = 3 lies inside b (merged x 2..4), b's own positions are near lat 10
        let hit = interpolate_at(&merged.points, 3.0).unwrap();
        assert!((hit.lat - 10.01).abs() < 1e-9);
        assert_eq!(hit.label.as_deref(), Some("B"));
        assert_eq!(hit.color.as_deref(), Some("c-b"));
        assert_eq!(hit.ele, Some(30.0));
    }

    #[test]
    fn test_interpolate_track_labels() {
        let track = Track {
            meta: TrackMeta {
                id: "t".to_string(),
                file_name: "t.gpx".to_string(),
                name: "Lakeside".to_string(),
                original_name: "Lakeside".to_string(),
                time: None,
                color: "hsl(200, 90%, 50%)".to_string(),
                start_point: None,
                end_point: None,
            },
            points: two_points(),
        };
        let hit = interpolate_track(&track, 0.25).unwrap();
        assert_eq!(hit.label.as_deref(), Some("Lakeside"));
        assert_eq!(hit.color.as_deref(), Some("hsl(200, 90%, 50%)"));
        assert_eq!(hit.ele, Some(12.5));
    }

    #[test]
    fn test_pixel_axis() {
        let axis = XAxis::new(50.0, 250.0, 0.0, 1.0);
        assert_eq!(axis.value_for_pixel(50.0), Some(0.0));
        assert_eq!(axis.value_for_pixel(150.0), Some(0.5));
        assert_eq!(axis.value_for_pixel(250.0), Some(1.0));
        assert!(axis.value_for_pixel(10.0).is_none());
        assert!(axis.value_for_pixel(251.0).is_none());

        let hit = interpolate_at_pixel(&two_points(), &axis, 150.0).unwrap();
        assert_eq!(hit.ele, Some(15.0));
    }
}
