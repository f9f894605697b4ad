//! # Track Store
//!
//! The persisted-store boundary. This is the only asynchronous seam in the
//! crate: everything else is a pure function over in-memory data.
//!
//! Stores own persisted records and read/write them wholesale; the only
//! partial write is [`TrackStore::update`], which merges name/color fields.
//! Failures are surfaced unmodified, never retried.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::{OptionExt, Result};
use crate::{Track, TrackMeta, TrackUpdate};

/// Async persisted-store collaborator.
pub trait TrackStore: Send + Sync {
    /// All tracks without their point series.
    fn get_metadata(&self) -> impl Future<Output = Result<Vec<TrackMeta>>> + Send;

    /// One track including points, `None` when the id is unknown.
    fn get_full(&self, id: &str) -> impl Future<Output = Result<Option<Track>>> + Send;

    /// Upsert a full record.
    fn put(&self, track: Track) -> impl Future<Output = Result<()>> + Send;

    /// Bulk delete; unknown ids are ignored.
    fn delete(&self, ids: &[String]) -> impl Future<Output = Result<()>> + Send;

    /// Merge `update` into the stored record. Fails with `NotFound` for an
    /// unknown id.
    fn update(&self, id: &str, update: TrackUpdate) -> impl Future<Output = Result<()>> + Send;

    /// Remove every record.
    fn clear(&self) -> impl Future<Output = Result<()>> + Send;
}

/// In-memory store, shared between clones.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tracks: Arc<RwLock<HashMap<String, Track>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tracks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tracks.read().await.is_empty()
    }
}

impl TrackStore for MemoryStore {
    async fn get_metadata(&self) -> Result<Vec<TrackMeta>> {
        let tracks = self.tracks.read().await;
        let mut metas: Vec<TrackMeta> = tracks.values().map(|t| t.meta.clone()).collect();
        metas.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(metas)
    }

    async fn get_full(&self, id: &str) -> Result<Option<Track>> {
        Ok(self.tracks.read().await.get(id).cloned())
    }

    async fn put(&self, track: Track) -> Result<()> {
        self.tracks.write().await.insert(track.meta.id.clone(), track);
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        let mut tracks = self.tracks.write().await;
        for id in ids {
            tracks.remove(id);
        }
        Ok(())
    }

    async fn update(&self, id: &str, update: TrackUpdate) -> Result<()> {
        let mut tracks = self.tracks.write().await;
        let track = tracks.get_mut(id).ok_or_not_found(id)?;
        track.meta.apply(&update);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.tracks.write().await.clear();
        Ok(())
    }
}
