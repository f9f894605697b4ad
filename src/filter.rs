//! # Track Filter
//!
//! AND-combined predicates over track metadata. Only metadata is consulted,
//! never point series: the bounding-box test uses the stored start/end points.

use std::cmp::Ordering;

use chrono::{Days, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::{Bounds, TrackMeta};

/// Filter criteria. The default filter matches everything and is inactive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackFilter {
    /// Case-insensitive substring of the name; empty matches all
    pub keyword: String,
    /// First included calendar day (UTC)
    pub start_date: Option<NaiveDate>,
    /// Last included calendar day (UTC), inclusive of the whole day
    pub end_date: Option<NaiveDate>,
    pub use_bounds: bool,
    pub bounds: Option<Bounds>,
}

impl TrackFilter {
    pub fn keyword(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            ..Self::default()
        }
    }

    pub fn with_dates(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.use_bounds = true;
        self.bounds = Some(bounds);
        self
    }

    /// Whether any predicate would exclude anything.
    pub fn is_active(&self) -> bool {
        !self.keyword.is_empty()
            || self.start_date.is_some()
            || self.end_date.is_some()
            || self.active_bounds().is_some()
    }

    fn active_bounds(&self) -> Option<&Bounds> {
        if self.use_bounds {
            self.bounds.as_ref()
        } else {
            None
        }
    }

    /// Test one track against every active predicate.
    pub fn matches(&self, meta: &TrackMeta) -> bool {
        self.matches_keyword(meta) && self.matches_dates(meta) && self.matches_bounds(meta)
    }

    fn matches_keyword(&self, meta: &TrackMeta) -> bool {
        self.keyword.is_empty()
            || meta.name.to_lowercase().contains(&self.keyword.to_lowercase())
    }

    fn matches_dates(&self, meta: &TrackMeta) -> bool {
        if self.start_date.is_none() && self.end_date.is_none() {
            return true;
        }
        let Some(time) = meta.time else {
            return false;
        };

        if let Some(start) = self.start_date {
            if time < start.and_time(NaiveTime::MIN).and_utc() {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            // [start, end + 1 day)
            let limit = end
                .checked_add_days(Days::new(1))
                .map(|next| next.and_time(NaiveTime::MIN).and_utc());
            if let Some(limit) = limit {
                if time >= limit {
                    return false;
                }
            }
        }
        true
    }

    fn matches_bounds(&self, meta: &TrackMeta) -> bool {
        match self.active_bounds() {
            None => true,
            Some(bounds) => [meta.start_point, meta.end_point]
                .into_iter()
                .flatten()
                .any(|p| bounds.contains(p)),
        }
    }
}

/// The subset of `tracks` that `filter` accepts, in input order.
pub fn filter_tracks<'a, T: AsRef<TrackMeta>>(tracks: &'a [T], filter: &TrackFilter) -> Vec<&'a T> {
    tracks.iter().filter(|t| filter.matches(t.as_ref())).collect()
}

/// Library order: newest first, untimed tracks last.
pub fn sort_newest_first<T: AsRef<TrackMeta>>(tracks: &mut [T]) {
    tracks.sort_by(|a, b| match (a.as_ref().time, b.as_ref().time) {
        (Some(ta), Some(tb)) => tb.cmp(&ta),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}
