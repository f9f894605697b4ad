//! # Track Parser
//!
//! Turns GPX text into a cleaned [`ParsedTrack`]:
//!
//! 1. name = first `<name>` element in document order (default "Untitled Track"),
//!    start time = first `<time>` element in document order
//! 2. every `<trkpt>` becomes a point; `lat`/`lon` are required, `<ele>` and
//!    `<time>` are optional
//! 3. outlier filter
//! 4. cumulative distance recomputed over the filtered sequence
//! 5. start/end point taken from the filtered sequence
//!
//! The whole file is rejected on malformed XML or on any malformed coordinate;
//! there is no partial result.

use std::borrow::Cow;

use chrono::{DateTime, NaiveDateTime, Utc};
use log::{debug, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::ParseError;
use crate::geo_utils::{accumulate_distance, endpoints};
use crate::outliers::{filter_points_with_config, OutlierConfig};
use crate::{LatLng, Track, TrackMeta, TrackPoint};

/// Parser configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParserConfig {
    /// Name used when the file has none.
    /// Default: "Untitled Track"
    pub default_name: String,
    /// Outlier rejection applied before distances are computed.
    pub outliers: OutlierConfig,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            default_name: "Untitled Track".to_string(),
            outliers: OutlierConfig::default(),
        }
    }
}

/// Output of parsing one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedTrack {
    pub name: String,
    pub original_name: String,
    pub time: Option<DateTime<Utc>>,
    pub points: Vec<TrackPoint>,
    pub start_point: Option<LatLng>,
    pub end_point: Option<LatLng>,
}

impl ParsedTrack {
    /// Attach identity and display color, producing a storable track.
    pub fn into_track(
        self,
        id: impl Into<String>,
        file_name: impl Into<String>,
        color: impl Into<String>,
    ) -> Track {
        Track {
            meta: TrackMeta {
                id: id.into(),
                file_name: file_name.into(),
                name: self.name,
                original_name: self.original_name,
                time: self.time,
                color: color.into(),
                start_point: self.start_point,
                end_point: self.end_point,
            },
            points: self.points,
        }
    }
}

/// Parse GPX text with the default configuration.
pub fn parse_gpx(text: &str) -> Result<ParsedTrack, ParseError> {
    parse_gpx_with_config(text, &ParserConfig::default())
}

/// Parse GPX text.
pub fn parse_gpx_with_config(text: &str, config: &ParserConfig) -> Result<ParsedTrack, ParseError> {
    let raw = read_document(text)?;
    let raw_count = raw.points.len();

    let mut points = filter_points_with_config(raw.points, &config.outliers);
    accumulate_distance(&mut points);
    let (start_point, end_point) = endpoints(&points);

    let name = raw
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| config.default_name.clone());

    debug!(
        "[TrackParser] '{}': {} points ({} rejected as outliers)",
        name,
        points.len(),
        raw_count - points.len()
    );

    Ok(ParsedTrack {
        original_name: name.clone(),
        name,
        time: raw.time,
        points,
        start_point,
        end_point,
    })
}

/// Parse many `(file_name, text)` pairs, one result per file in input order.
///
/// Failures are logged and returned in place; one bad file never affects the
/// others.
pub fn parse_batch<N, T>(files: &[(N, T)], config: &ParserConfig) -> Vec<Result<ParsedTrack, ParseError>>
where
    N: AsRef<str> + Sync,
    T: AsRef<str> + Sync,
{
    let parse_one = |(file_name, text): &(N, T)| {
        let result = parse_gpx_with_config(text.as_ref(), config);
        if let Err(e) = &result {
            warn!("[TrackParser] Skipping '{}': {}", file_name.as_ref(), e);
        }
        result
    };

    #[cfg(feature = "parallel")]
    {
        files.par_iter().map(parse_one).collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        files.iter().map(parse_one).collect()
    }
}

/// Parse a GPX timestamp: RFC 3339, or a zone-less ISO date-time read as UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

// ============================================================================
// Document reader
// ============================================================================

/// What the XML pass extracts before any cleaning.
struct RawDocument {
    name: Option<String>,
    time: Option<DateTime<Utc>>,
    points: Vec<TrackPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Name,
    Time,
    Ele,
}

impl Field {
    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"name" => Some(Field::Name),
            b"time" => Some(Field::Time),
            b"ele" => Some(Field::Ele),
            _ => None,
        }
    }
}

#[derive(Default)]
struct DocumentState {
    name: Option<String>,
    name_seen: bool,
    time: Option<DateTime<Utc>>,
    time_seen: bool,
    points: Vec<TrackPoint>,
    current: Option<TrackPoint>,
    field: Option<Field>,
    text: String,
}

impl DocumentState {
    fn open_field(&mut self, field: Field) {
        self.field = Some(field);
        self.text.clear();
    }

    fn close_field(&mut self, field: Field) {
        if self.field != Some(field) {
            return;
        }
        self.field = None;
        let text = std::mem::take(&mut self.text);

        match field {
            Field::Name => {
                if !self.name_seen {
                    self.name_seen = true;
                    self.name = Some(text);
                }
            }
            Field::Time => {
                let parsed = parse_timestamp(&text);
                if !self.time_seen {
                    self.time_seen = true;
                    self.time = parsed;
                }
                if let Some(point) = self.current.as_mut() {
                    point.time = parsed;
                }
            }
            Field::Ele => {
                if let Some(point) = self.current.as_mut() {
                    point.ele = text.trim().parse::<f64>().ok().filter(|e| e.is_finite());
                }
            }
        }
    }

    fn finish_point(&mut self) {
        if let Some(point) = self.current.take() {
            self.points.push(point);
        }
    }
}

fn read_document(text: &str) -> Result<RawDocument, ParseError> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut state = DocumentState::default();
    let mut depth: usize = 0;
    let mut saw_root = false;

    loop {
        let event = reader.read_event().map_err(|e| {
            ParseError::malformed(format!("at byte {}: {}", reader.buffer_position(), e))
        })?;

        match event {
            Event::Start(e) => {
                if depth == 0 && saw_root {
                    return Err(ParseError::malformed("multiple root elements"));
                }
                saw_root = true;
                depth += 1;

                let tag = e.local_name();
                if tag.as_ref() == b"trkpt" {
                    state.current = Some(read_point(&e, state.points.len())?);
                } else if let Some(field) = Field::from_tag(tag.as_ref()) {
                    state.open_field(field);
                }
            }
            Event::Empty(e) => {
                if depth == 0 && saw_root {
                    return Err(ParseError::malformed("multiple root elements"));
                }
                saw_root = true;

                let tag = e.local_name();
                if tag.as_ref() == b"trkpt" {
                    state.current = Some(read_point(&e, state.points.len())?);
                    state.finish_point();
                } else if let Some(field) = Field::from_tag(tag.as_ref()) {
                    state.open_field(field);
                    state.close_field(field);
                }
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                let tag = e.local_name();
                if tag.as_ref() == b"trkpt" {
                    state.finish_point();
                } else if let Some(field) = Field::from_tag(tag.as_ref()) {
                    state.close_field(field);
                }
            }
            Event::Text(t) => {
                if state.field.is_some() {
                    let text = t
                        .unescape()
                        .map_err(|e| ParseError::malformed(e.to_string()))?;
                    state.text.push_str(&text);
                }
            }
            Event::CData(c) => {
                if state.field.is_some() {
                    state.text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(ParseError::malformed("no root element"));
    }
    if depth != 0 {
        return Err(ParseError::malformed("unexpected end of document"));
    }

    Ok(RawDocument {
        name: state.name,
        time: state.time,
        points: state.points,
    })
}

fn read_point(e: &BytesStart<'_>, index: usize) -> Result<TrackPoint, ParseError> {
    let mut lat: Option<Cow<'_, str>> = None;
    let mut lon: Option<Cow<'_, str>> = None;

    for attr in e.attributes() {
        let attr = attr.map_err(|err| ParseError::malformed(err.to_string()))?;
        let value = attr
            .unescape_value()
            .map_err(|err| ParseError::malformed(err.to_string()))?;
        match attr.key.local_name().as_ref() {
            b"lat" => lat = Some(value),
            b"lon" => lon = Some(value),
            _ => {}
        }
    }

    Ok(TrackPoint::new(
        coordinate(lat, "lat", index)?,
        coordinate(lon, "lon", index)?,
    ))
}

fn coordinate(value: Option<Cow<'_, str>>, attribute: &'static str, index: usize) -> Result<f64, ParseError> {
    let parsed = value
        .as_deref()
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite());
    parsed.ok_or_else(|| ParseError::MalformedCoordinate {
        index,
        attribute,
        value: value.map(|v| v.into_owned()),
    })
}
