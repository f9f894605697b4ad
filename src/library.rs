//! # Track Library
//!
//! Caller-side working set over a [`TrackStore`]: which tracks are listed,
//! which are visible (and therefore hydrated), which one is focused, and the
//! active filter.
//!
//! ## Lifecycle
//!
//! - `load` lists metadata only; nothing is hydrated
//! - showing a track hydrates it from the store, hiding it drops its points
//! - focusing hydrates the focused track independently of visibility
//! - deleting removes tracks from the store and from every working set
//!
//! All state lives in the library value itself; every analytic call receives
//! its inputs (tracks, mode) explicitly.

use std::collections::HashSet;

use chrono::Utc;
use futures::future::try_join_all;
use log::{debug, info, warn};
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

use crate::color::{next_color_with, ColorConfig};
use crate::error::{OptionExt, ParseError, Result};
use crate::filter::{sort_newest_first, TrackFilter};
use crate::merge::{merge_tracks, MergedSeries};
use crate::parser::{parse_batch, ParserConfig};
use crate::series::{compute_stats, TrackStats};
use crate::store::TrackStore;
use crate::{Bounds, SeriesMode, Track, TrackMeta, TrackRecord, TrackUpdate};

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryConfig {
    /// How many filter matches are shown (and hydrated) automatically.
    /// Default: 20
    pub max_auto_visible: usize,
    pub parser: ParserConfig,
    pub color: ColorConfig,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            max_auto_visible: 20,
            parser: ParserConfig::default(),
            color: ColorConfig::default(),
        }
    }
}

// ============================================================================
// Core Types
// ============================================================================

/// One listed track and whether it is shown.
///
/// A visible entry is always hydrated; a hidden one is always metadata only.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryEntry {
    pub record: TrackRecord,
    pub visible: bool,
}

impl LibraryEntry {
    fn hidden(meta: TrackMeta) -> Self {
        Self {
            record: TrackRecord::Metadata(meta),
            visible: false,
        }
    }

    pub fn meta(&self) -> &TrackMeta {
        self.record.meta()
    }

    fn hide(&mut self) {
        self.visible = false;
        if let TrackRecord::Hydrated(track) = &self.record {
            let meta = track.meta.clone();
            self.record = TrackRecord::Metadata(meta);
        }
    }

    fn show(&mut self, track: Track) {
        self.record = TrackRecord::Hydrated(track);
        self.visible = true;
    }
}

impl AsRef<TrackMeta> for LibraryEntry {
    fn as_ref(&self) -> &TrackMeta {
        self.meta()
    }
}

/// Outcome of [`TrackLibrary::import`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub imported: Vec<TrackMeta>,
    /// File names already present in the library (or repeated in the batch)
    pub skipped_duplicates: Vec<String>,
    /// Files that failed to parse, with the reason
    pub failed: Vec<(String, ParseError)>,
}

/// Start/end point of a track for viewport queries.
#[derive(Debug, Clone)]
struct EndpointEntry {
    track_id: String,
    position: [f64; 2],
}

impl RTreeObject for EndpointEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

// ============================================================================
// Track Library
// ============================================================================

pub struct TrackLibrary<S: TrackStore> {
    store: S,
    config: LibraryConfig,

    // Listed tracks, newest first
    entries: Vec<LibraryEntry>,
    focused: Option<Track>,
    filter: TrackFilter,

    // Spatial index over start/end points, rebuilt whenever the listing changes
    spatial_index: RTree<EndpointEntry>,
}

impl<S: TrackStore> TrackLibrary<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, LibraryConfig::default())
    }

    pub fn with_config(store: S, config: LibraryConfig) -> Self {
        Self {
            store,
            config,
            entries: Vec::new(),
            focused: None,
            filter: TrackFilter::default(),
            spatial_index: RTree::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    pub fn entries(&self) -> &[LibraryEntry] {
        &self.entries
    }

    pub fn entry(&self, id: &str) -> Option<&LibraryEntry> {
        self.entries.iter().find(|e| e.meta().id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn filter(&self) -> &TrackFilter {
        &self.filter
    }

    fn position(&self, id: &str) -> Result<usize> {
        self.entries
            .iter()
            .position(|e| e.meta().id == id)
            .ok_or_not_found(id)
    }

    // ========================================================================
    // Loading and Import
    // ========================================================================

    /// Replace the working set with the store's metadata.
    ///
    /// Records without a color get one assigned and written back.
    pub async fn load(&mut self) -> Result<()> {
        let mut metas = self.store.get_metadata().await?;

        let uncolored: Vec<(String, String)> = {
            let mut rng = rand::thread_rng();
            metas
                .iter_mut()
                .filter(|m| m.color.trim().is_empty())
                .map(|m| {
                    m.color = next_color_with(&mut rng, &self.config.color);
                    (m.id.clone(), m.color.clone())
                })
                .collect()
        };
        for (id, color) in uncolored {
            self.store.update(&id, TrackUpdate::color(color)).await?;
        }

        sort_newest_first(&mut metas);
        self.entries = metas.into_iter().map(LibraryEntry::hidden).collect();
        self.focused = None;
        self.filter = TrackFilter::default();
        self.rebuild_spatial_index();

        info!("[TrackLibrary] Loaded {} tracks", self.entries.len());
        Ok(())
    }

    /// Parse and store a batch of `(file_name, text)` files.
    ///
    /// Files whose name is already listed are skipped, as are files that fail
    /// to parse; neither aborts the batch. Store failures do.
    pub async fn import<N, T>(&mut self, files: &[(N, T)]) -> Result<ImportReport>
    where
        N: AsRef<str> + Sync,
        T: AsRef<str> + Sync,
    {
        let mut report = ImportReport::default();
        let mut seen: HashSet<String> = self.entries.iter().map(|e| e.meta().file_name.clone()).collect();

        let mut candidates: Vec<(&str, &str)> = Vec::with_capacity(files.len());
        for (name, text) in files {
            let name = name.as_ref();
            if seen.insert(name.to_string()) {
                candidates.push((name, text.as_ref()));
            } else {
                debug!("[TrackLibrary] Skipping duplicate file '{}'", name);
                report.skipped_duplicates.push(name.to_string());
            }
        }

        let results = parse_batch(&candidates, &self.config.parser);

        let tracks: Vec<Track> = {
            let mut rng = rand::thread_rng();
            let stamp = Utc::now().timestamp_millis();
            candidates
                .iter()
                .zip(results)
                .filter_map(|(&(file_name, _), result)| match result {
                    Ok(parsed) => {
                        let color = next_color_with(&mut rng, &self.config.color);
                        Some(parsed.into_track(format!("{}-{}", stamp, file_name), file_name, color))
                    }
                    Err(e) => {
                        report.failed.push((file_name.to_string(), e));
                        None
                    }
                })
                .collect()
        };

        let mut stored = Ok(());
        for track in tracks {
            let meta = track.meta.clone();
            if let Err(e) = self.store.put(track).await {
                stored = Err(e);
                break;
            }
            self.entries.push(LibraryEntry::hidden(meta.clone()));
            report.imported.push(meta);
        }

        // Entries already written stay listed, so ordering and the index
        // must cover them even when a write failed.
        sort_newest_first(&mut self.entries);
        self.rebuild_spatial_index();
        stored?;

        info!(
            "[TrackLibrary] Imported {} tracks ({} duplicates, {} failed)",
            report.imported.len(),
            report.skipped_duplicates.len(),
            report.failed.len()
        );
        if !report.failed.is_empty() {
            warn!(
                "[TrackLibrary] Failed files: {:?}",
                report.failed.iter().map(|(name, _)| name).collect::<Vec<_>>()
            );
        }
        Ok(report)
    }

    // ========================================================================
    // Visibility and Focus
    // ========================================================================

    /// Show (hydrating from the store) or hide (dropping points) a track.
    pub async fn set_visible(&mut self, id: &str, visible: bool) -> Result<()> {
        let index = self.position(id)?;

        if !visible {
            self.entries[index].hide();
            return Ok(());
        }

        if self.entries[index].visible && self.entries[index].record.is_hydrated() {
            return Ok(());
        }
        let track = self.store.get_full(id).await?.ok_or_not_found(id)?;
        self.entries[index].show(track);
        Ok(())
    }

    /// Focus a track, loading its full point series.
    pub async fn focus(&mut self, id: &str) -> Result<&Track> {
        let track = self.store.get_full(id).await?.ok_or_not_found(id)?;
        Ok(self.focused.insert(track))
    }

    pub fn clear_focus(&mut self) {
        self.focused = None;
    }

    pub fn focused_track(&self) -> Option<&Track> {
        self.focused.as_ref()
    }

    // ========================================================================
    // Filtering and Selection
    // ========================================================================

    /// Store `filter`. An active filter hides everything, then shows and
    /// hydrates the first `max_auto_visible` matches concurrently.
    pub async fn apply_filter(&mut self, filter: TrackFilter) -> Result<()> {
        self.filter = filter;
        if !self.filter.is_active() {
            return Ok(());
        }

        for entry in &mut self.entries {
            entry.hide();
        }

        let ids: Vec<String> = self
            .entries
            .iter()
            .filter(|e| self.filter.matches(e.meta()))
            .take(self.config.max_auto_visible)
            .map(|e| e.meta().id.clone())
            .collect();

        let store = &self.store;
        let loaded = try_join_all(ids.iter().map(|id| async move {
            store.get_full(id).await?.ok_or_not_found(id)
        }))
        .await?;

        for track in loaded {
            if let Ok(index) = self.position(&track.meta.id) {
                self.entries[index].show(track);
            }
        }

        debug!("[TrackLibrary] Filter shows {} tracks", ids.len());
        Ok(())
    }

    /// The filtered listing when a filter is active, everything otherwise.
    pub fn listed_tracks(&self) -> Vec<&LibraryEntry> {
        self.entries
            .iter()
            .filter(|e| self.filter.matches(e.meta()))
            .collect()
    }

    /// Hide everything and clear the focus.
    pub fn reset_selection(&mut self) {
        for entry in &mut self.entries {
            entry.hide();
        }
        self.focused = None;
    }

    /// Delete every visible track from the store and the working set.
    ///
    /// Returns the deleted ids.
    pub async fn delete_selected(&mut self) -> Result<Vec<String>> {
        let ids: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.visible)
            .map(|e| e.meta().id.clone())
            .collect();
        if ids.is_empty() {
            return Ok(ids);
        }

        self.store.delete(&ids).await?;

        let deleted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        self.entries.retain(|e| !deleted.contains(e.meta().id.as_str()));
        if self
            .focused
            .as_ref()
            .is_some_and(|t| deleted.contains(t.meta.id.as_str()))
        {
            self.focused = None;
        }
        self.rebuild_spatial_index();

        info!("[TrackLibrary] Deleted {} tracks", ids.len());
        Ok(ids)
    }

    // ========================================================================
    // Editing
    // ========================================================================

    pub async fn rename(&mut self, id: &str, name: &str) -> Result<()> {
        self.update(id, TrackUpdate::name(name)).await
    }

    pub async fn recolor(&mut self, id: &str, color: &str) -> Result<()> {
        self.update(id, TrackUpdate::color(color)).await
    }

    /// Restore the name parsed from the file.
    pub async fn reset_name(&mut self, id: &str) -> Result<()> {
        let original = self.entries[self.position(id)?].meta().original_name.clone();
        self.update(id, TrackUpdate::name(original)).await
    }

    async fn update(&mut self, id: &str, update: TrackUpdate) -> Result<()> {
        let index = self.position(id)?;
        self.store.update(id, update.clone()).await?;

        self.entries[index].record.meta_mut().apply(&update);
        if let Some(focused) = self.focused.as_mut().filter(|t| t.meta.id == id) {
            focused.meta.apply(&update);
        }
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Visible, hydrated tracks in listing order.
    pub fn visible_tracks(&self) -> Vec<&Track> {
        self.entries
            .iter()
            .filter(|e| e.visible)
            .filter_map(|e| e.record.track())
            .collect()
    }

    /// Merge of the visible tracks.
    pub fn merged(&self, mode: SeriesMode) -> MergedSeries {
        merge_tracks(&self.visible_tracks(), mode)
    }

    /// Statistics for one track, loading it from the store if it is not
    /// hydrated in the working set.
    pub async fn stats(&self, id: &str) -> Result<TrackStats> {
        let loaded = self
            .entries
            .iter()
            .filter_map(|e| e.record.track())
            .chain(self.focused.as_ref())
            .find(|t| t.meta.id == id);

        match loaded {
            Some(track) => Ok(compute_stats(&track.points)),
            None => {
                let track = self.store.get_full(id).await?.ok_or_not_found(id)?;
                Ok(compute_stats(&track.points))
            }
        }
    }

    /// Listed tracks whose start or end point lies in `bounds` (inclusive).
    pub fn tracks_in_viewport(&self, bounds: &Bounds) -> Vec<&TrackMeta> {
        let search_bounds = AABB::from_corners(
            [bounds.min_lng, bounds.min_lat],
            [bounds.max_lng, bounds.max_lat],
        );

        let hits: HashSet<&str> = self
            .spatial_index
            .locate_in_envelope_intersecting(&search_bounds)
            .map(|e| e.track_id.as_str())
            .collect();

        self.entries
            .iter()
            .map(LibraryEntry::meta)
            .filter(|m| hits.contains(m.id.as_str()))
            .collect()
    }

    fn rebuild_spatial_index(&mut self) {
        let points: Vec<EndpointEntry> = self
            .entries
            .iter()
            .flat_map(|e| {
                let meta = e.meta();
                [meta.start_point, meta.end_point]
                    .into_iter()
                    .flatten()
                    .map(move |p| EndpointEntry {
                        track_id: meta.id.clone(),
                        position: [p.lng, p.lat],
                    })
            })
            .collect();

        self.spatial_index = RTree::bulk_load(points);
    }
}
