//! # Track Engine
//!
//! GPX track analytics for interactive inspection of recorded rides, runs and hikes.
//!
//! This library provides:
//! - GPX parsing into a cleaned, distance-annotated point series
//! - Outlier rejection (impossible jumps, elevation spikes)
//! - Elevation, elevation-delta and cumulative-gain series with summary statistics
//! - Chronological merging of several tracks into one continuous series
//! - Cursor interpolation along a single track or a merged series
//! - Keyword / date-range / bounding-box filtering of track metadata
//! - A track library that lazily hydrates point series from an async store
//!
//! ## Features
//!
//! - **`parallel`** - Parse batches of files with rayon
//! - **`persistence`** - SQLite-backed [`store::TrackStore`]
//! - **`cli`** - The `track-engine-cli` inspection tool
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use track_engine::{parse_gpx, merge_tracks, interpolate_at, SeriesMode};
//!
//! let gpx = r#"<?xml version="1.0"?>
//! <gpx version="1.1">
//!   <trk><name>Morning Loop</name><trkseg>
//!     <trkpt lat="46.5000" lon="7.5000"><ele>1000</ele></trkpt>
//!     <trkpt lat="46.5010" lon="7.5000"><ele>1010</ele></trkpt>
//!     <trkpt lat="46.5020" lon="7.5000"><ele>1030</ele></trkpt>
//!   </trkseg></trk>
//! </gpx>"#;
//!
//! let parsed = parse_gpx(gpx).unwrap();
//! assert_eq!(parsed.name, "Morning Loop");
//!
//! let track = parsed.into_track("t1", "loop.gpx", "hsl(200, 90%, 50%)");
//! let merged = merge_tracks(&[track], SeriesMode::Gain);
//! assert_eq!(merged.total_gain, 30.0);
//!
//! let probe = interpolate_at(&merged.points, merged.total_distance / 2.0).unwrap();
//! assert!(probe.lat > 46.5 && probe.lat < 46.502);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, ParseError, Result, TrackError};

// Geographic utilities (haversine distance, cumulative distance)
pub mod geo_utils;
pub use geo_utils::haversine_distance;

// Outlier rejection applied to freshly parsed points
pub mod outliers;
pub use outliers::{filter_points, filter_points_with_config, OutlierConfig};

// GPX parsing
pub mod parser;
pub use parser::{parse_batch, parse_gpx, parse_gpx_with_config, ParsedTrack, ParserConfig};

// Elevation-derived series and summary statistics
pub mod series;
pub use series::{compute_series, compute_stats, gain_series, TrackStats};

// Chronological multi-track merge
pub mod merge;
pub use merge::{merge_tracks, MergedPoint, MergedSeries};

// Cursor interpolation along a series
pub mod interpolate;
pub use interpolate::{
    interpolate_at, interpolate_at_pixel, interpolate_track, InterpolatedPoint, SeriesSample,
    XAxis,
};

// Metadata filtering
pub mod filter;
pub use filter::{filter_tracks, sort_newest_first, TrackFilter};

// Track display colors
pub mod color;
pub use color::{hue_of, next_color, next_color_with, ColorConfig};

// Async store boundary
pub mod store;
pub use store::{MemoryStore, TrackStore};

// SQLite-backed store
#[cfg(feature = "persistence")]
pub mod persistence;
#[cfg(feature = "persistence")]
pub use persistence::SqliteStore;

// Working set: visibility, focus, lazy hydration
pub mod library;
pub use library::{ImportReport, LibraryConfig, LibraryEntry, TrackLibrary};

// ============================================================================
// Core Types
// ============================================================================

/// A geographic position in WGS84 degrees.
///
/// # Example
/// ```
/// use track_engine::LatLng;
/// let bern = LatLng::new(46.9480, 7.4474);
/// assert!(bern.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Create a new position.
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Check if the position has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && self.lat >= -90.0
            && self.lat <= 90.0
            && self.lng >= -180.0
            && self.lng <= 180.0
    }
}

/// Geographic bounding box (south/west/north/east edges).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    /// South edge
    pub min_lat: f64,
    /// North edge
    pub max_lat: f64,
    /// West edge
    pub min_lng: f64,
    /// East edge
    pub max_lng: f64,
}

impl Bounds {
    /// Build bounds from the south, west, north and east edges.
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            min_lat: south,
            max_lat: north,
            min_lng: west,
            max_lng: east,
        }
    }

    /// Inclusive containment test.
    pub fn contains(&self, p: LatLng) -> bool {
        p.lat >= self.min_lat && p.lat <= self.max_lat && p.lng >= self.min_lng && p.lng <= self.max_lng
    }

    /// Create bounds enclosing all positions.
    pub fn from_points(points: &[LatLng]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lng = f64::MAX;
        let mut max_lng = f64::MIN;

        for p in points {
            min_lat = min_lat.min(p.lat);
            max_lat = max_lat.max(p.lat);
            min_lng = min_lng.min(p.lng);
            max_lng = max_lng.max(p.lng);
        }

        Some(Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        })
    }
}

/// One sample of a track.
///
/// `distance` is the cumulative great-circle distance in kilometres from the
/// first point of the owning track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub lat: f64,
    pub lng: f64,
    /// Elevation in meters
    pub ele: Option<f64>,
    pub time: Option<DateTime<Utc>>,
    /// Cumulative distance in kilometres
    pub distance: f64,
}

impl TrackPoint {
    /// Create a point with no elevation, time or distance yet.
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            ele: None,
            time: None,
            distance: 0.0,
        }
    }

    /// Builder-style elevation setter.
    pub fn with_ele(mut self, ele: f64) -> Self {
        self.ele = Some(ele);
        self
    }

    /// Builder-style timestamp setter.
    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn lat_lng(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }
}

/// Which derived vertical quantity a series carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesMode {
    /// Raw elevation in meters
    #[default]
    Elevation,
    /// Elevation relative to the first point
    Delta,
    /// Cumulative elevation gain
    Gain,
}

/// Track metadata: everything but the point series.
///
/// This is what the store returns from `get_metadata` and what filtering
/// operates on. `start_point`/`end_point` are derived once at parse time so
/// bounding-box queries never need the points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackMeta {
    pub id: String,
    pub file_name: String,
    /// Display name (user editable)
    pub name: String,
    /// Name as parsed from the file
    pub original_name: String,
    /// Track start time
    pub time: Option<DateTime<Utc>>,
    /// Display color, `hsl(...)` or any CSS color the host accepts
    pub color: String,
    pub start_point: Option<LatLng>,
    pub end_point: Option<LatLng>,
}

impl TrackMeta {
    /// Apply a partial update in place.
    pub fn apply(&mut self, update: &TrackUpdate) {
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(color) = &update.color {
            self.color = color.clone();
        }
    }
}

impl AsRef<TrackMeta> for TrackMeta {
    fn as_ref(&self) -> &TrackMeta {
        self
    }
}

/// A fully hydrated track: metadata plus its point series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    #[serde(flatten)]
    pub meta: TrackMeta,
    pub points: Vec<TrackPoint>,
}

impl Track {
    pub fn id(&self) -> &str {
        &self.meta.id
    }

    /// Total distance in kilometres (0 for an empty track).
    pub fn total_distance(&self) -> f64 {
        self.points.last().map(|p| p.distance).unwrap_or(0.0)
    }
}

impl AsRef<TrackMeta> for Track {
    fn as_ref(&self) -> &TrackMeta {
        &self.meta
    }
}

impl AsRef<Track> for Track {
    fn as_ref(&self) -> &Track {
        self
    }
}

/// A track as held in a working set.
///
/// `Metadata` is the "listed but not loaded" state, not an error; `Hydrated`
/// carries the point series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum TrackRecord {
    Metadata(TrackMeta),
    Hydrated(Track),
}

impl TrackRecord {
    pub fn meta(&self) -> &TrackMeta {
        match self {
            TrackRecord::Metadata(meta) => meta,
            TrackRecord::Hydrated(track) => &track.meta,
        }
    }

    pub fn meta_mut(&mut self) -> &mut TrackMeta {
        match self {
            TrackRecord::Metadata(meta) => meta,
            TrackRecord::Hydrated(track) => &mut track.meta,
        }
    }

    pub fn id(&self) -> &str {
        &self.meta().id
    }

    /// The hydrated track, if its points are loaded.
    pub fn track(&self) -> Option<&Track> {
        match self {
            TrackRecord::Metadata(_) => None,
            TrackRecord::Hydrated(track) => Some(track),
        }
    }

    pub fn is_hydrated(&self) -> bool {
        matches!(self, TrackRecord::Hydrated(_))
    }

    /// Drop the point series, keeping the metadata.
    pub fn dehydrate(self) -> Self {
        match self {
            TrackRecord::Hydrated(track) => TrackRecord::Metadata(track.meta),
            meta => meta,
        }
    }
}

impl AsRef<TrackMeta> for TrackRecord {
    fn as_ref(&self) -> &TrackMeta {
        self.meta()
    }
}

impl From<TrackMeta> for TrackRecord {
    fn from(meta: TrackMeta) -> Self {
        TrackRecord::Metadata(meta)
    }
}

impl From<Track> for TrackRecord {
    fn from(track: Track) -> Self {
        TrackRecord::Hydrated(track)
    }
}

/// Partial update merged into a stored track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackUpdate {
    pub name: Option<String>,
    pub color: Option<String>,
}

impl TrackUpdate {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            color: None,
        }
    }

    pub fn color(color: impl Into<String>) -> Self {
        Self {
            name: None,
            color: Some(color.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(id: &str) -> TrackMeta {
        TrackMeta {
            id: id.to_string(),
            file_name: format!("{}.gpx", id),
            name: "Ridge Walk".to_string(),
            original_name: "Ridge Walk".to_string(),
            time: None,
            color: "hsl(10, 90%, 50%)".to_string(),
            start_point: None,
            end_point: None,
        }
    }

    #[test]
    fn test_bounds_contains_is_inclusive() {
        let bounds = Bounds::new(46.0, 7.0, 47.0, 8.0);
        assert!(bounds.contains(LatLng::new(46.0, 7.0)));
        assert!(bounds.contains(LatLng::new(47.0, 8.0)));
        assert!(!bounds.contains(LatLng::new(47.0001, 7.5)));
    }

    #[test]
    fn test_track_record_dehydrate() {
        let record = TrackRecord::Hydrated(Track {
            meta: meta("a"),
            points: vec![TrackPoint::new(46.0, 7.0)],
        });
        assert!(record.is_hydrated());

        let record = record.dehydrate();
        assert!(!record.is_hydrated());
        assert_eq!(record.id(), "a");
        assert!(record.track().is_none());
    }

    #[test]
    fn test_meta_apply_update() {
        let mut m = meta("a");
        m.apply(&TrackUpdate::name("Evening Walk"));
        assert_eq!(m.name, "Evening Walk");
        assert_eq!(m.original_name, "Ridge Walk");

        m.apply(&TrackUpdate::color("hsl(200, 90%, 50%)"));
        assert_eq!(m.color, "hsl(200, 90%, 50%)");
        assert_eq!(m.name, "Evening Walk");
    }

    #[test]
    fn test_track_json_is_flat_camel_case() {
        let track = Track {
            meta: meta("a"),
            points: vec![],
        };
        let json = serde_json::to_value(&track).unwrap();
        assert_eq!(json["fileName"], "a.gpx");
        assert_eq!(json["originalName"], "Ridge Walk");
        assert!(json["points"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_series_mode_default() {
        assert_eq!(SeriesMode::default(), SeriesMode::Elevation);
        assert_eq!(serde_json::to_string(&SeriesMode::Gain).unwrap(), "\"gain\"");
    }
}
