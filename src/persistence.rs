//! # SQLite Track Store
//!
//! [`TrackStore`] backed by a single SQLite file.
//!
//! ## Schema
//!
//! - `tracks`: one row of metadata per track (always cheap to list)
//! - `track_points`: MessagePack-encoded point series, loaded on demand only,
//!   removed together with its track via `ON DELETE CASCADE`
//!
//! rusqlite is blocking, so every call runs on tokio's blocking pool behind a
//! shared connection.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{Result, TrackError};
use crate::store::TrackStore;
use crate::{LatLng, Track, TrackMeta, TrackPoint, TrackUpdate};

const META_COLUMNS: &str = "id, file_name, name, original_name, time_ms, color,
     start_lat, start_lng, end_lat, end_lng";

/// SQLite-backed store. Clones share the connection.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<Connection>>,
    db_path: String,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("db_path", &self.db_path)
            .finish()
    }
}

impl SqliteStore {
    /// Open (or create) the database at `db_path`.
    pub fn new(db_path: &str) -> Result<Self> {
        let db = Connection::open(db_path)?;
        Self::init_schema(&db)?;
        info!("[SqliteStore] Opened {}", db_path);

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: db_path.to_string(),
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        Self::new(":memory:")
    }

    pub fn path(&self) -> &str {
        &self.db_path
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            -- Track metadata (listed without points)
            CREATE TABLE IF NOT EXISTS tracks (
                id TEXT PRIMARY KEY,
                file_name TEXT NOT NULL,
                name TEXT NOT NULL,
                original_name TEXT NOT NULL,
                time_ms INTEGER,
                color TEXT NOT NULL,
                start_lat REAL,
                start_lng REAL,
                end_lat REAL,
                end_lng REAL
            );

            -- Point series (loaded on demand only)
            CREATE TABLE IF NOT EXISTS track_points (
                track_id TEXT PRIMARY KEY,
                points BLOB NOT NULL,
                point_count INTEGER NOT NULL,
                FOREIGN KEY (track_id) REFERENCES tracks(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_tracks_time ON tracks(time_ms);
            CREATE INDEX IF NOT EXISTS idx_tracks_file_name ON tracks(file_name);

            PRAGMA foreign_keys = ON;
        "#,
        )?;
        Ok(())
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut conn = db
                .lock()
                .map_err(|_| TrackError::storage("connection lock poisoned"))?;
            f(&mut conn)
        })
        .await?
    }
}

fn meta_from_row(row: &Row<'_>) -> rusqlite::Result<TrackMeta> {
    let time_ms: Option<i64> = row.get(4)?;
    Ok(TrackMeta {
        id: row.get(0)?,
        file_name: row.get(1)?,
        name: row.get(2)?,
        original_name: row.get(3)?,
        time: time_ms.and_then(DateTime::<Utc>::from_timestamp_millis),
        color: row.get(5)?,
        start_point: lat_lng(row.get(6)?, row.get(7)?),
        end_point: lat_lng(row.get(8)?, row.get(9)?),
    })
}

fn lat_lng(lat: Option<f64>, lng: Option<f64>) -> Option<LatLng> {
    lat.zip(lng).map(|(lat, lng)| LatLng::new(lat, lng))
}

fn encode_points(points: &[TrackPoint]) -> Result<Vec<u8>> {
    rmp_serde::to_vec(points).map_err(|e| TrackError::storage(format!("encode points: {}", e)))
}

fn decode_points(blob: &[u8]) -> Result<Vec<TrackPoint>> {
    rmp_serde::from_slice(blob).map_err(|e| TrackError::storage(format!("decode points: {}", e)))
}

impl TrackStore for SqliteStore {
    async fn get_metadata(&self) -> Result<Vec<TrackMeta>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {} FROM tracks ORDER BY id", META_COLUMNS))?;
            let metas = stmt
                .query_map([], meta_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(metas)
        })
        .await
    }

    async fn get_full(&self, id: &str) -> Result<Option<Track>> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let meta = conn
                .query_row(
                    &format!("SELECT {} FROM tracks WHERE id = ?", META_COLUMNS),
                    params![id],
                    meta_from_row,
                )
                .optional()?;
            let Some(meta) = meta else {
                return Ok(None);
            };

            let blob: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT points FROM track_points WHERE track_id = ?",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            let points = match blob {
                Some(blob) => decode_points(&blob)?,
                None => Vec::new(),
            };

            Ok(Some(Track { meta, points }))
        })
        .await
    }

    async fn put(&self, track: Track) -> Result<()> {
        self.with_conn(move |conn| {
            let blob = encode_points(&track.points)?;
            let m = &track.meta;

            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO tracks (id, file_name, name, original_name, time_ms, color,
                                     start_lat, start_lng, end_lat, end_lng)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(id) DO UPDATE SET
                    file_name = excluded.file_name,
                    name = excluded.name,
                    original_name = excluded.original_name,
                    time_ms = excluded.time_ms,
                    color = excluded.color,
                    start_lat = excluded.start_lat,
                    start_lng = excluded.start_lng,
                    end_lat = excluded.end_lat,
                    end_lng = excluded.end_lng",
                params![
                    m.id,
                    m.file_name,
                    m.name,
                    m.original_name,
                    m.time.map(|t| t.timestamp_millis()),
                    m.color,
                    m.start_point.map(|p| p.lat),
                    m.start_point.map(|p| p.lng),
                    m.end_point.map(|p| p.lat),
                    m.end_point.map(|p| p.lng),
                ],
            )?;
            tx.execute(
                "INSERT OR REPLACE INTO track_points (track_id, points, point_count)
                 VALUES (?, ?, ?)",
                params![m.id, blob, track.points.len() as i64],
            )?;
            tx.commit()?;

            debug!("[SqliteStore] Stored '{}' ({} points)", m.id, track.points.len());
            Ok(())
        })
        .await
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        let ids = ids.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare("DELETE FROM tracks WHERE id = ?")?;
                for id in &ids {
                    stmt.execute(params![id])?;
                }
            }
            tx.commit()?;
            info!("[SqliteStore] Deleted {} tracks", ids.len());
            Ok(())
        })
        .await
    }

    async fn update(&self, id: &str, update: TrackUpdate) -> Result<()> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE tracks SET name = COALESCE(?1, name), color = COALESCE(?2, color)
                 WHERE id = ?3",
                params![update.name, update.color, id],
            )?;
            if changed == 0 {
                return Err(TrackError::NotFound { id });
            }
            Ok(())
        })
        .await
    }

    async fn clear(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute_batch(
                "DELETE FROM track_points;
                 DELETE FROM tracks;",
            )?;
            info!("[SqliteStore] Cleared all tracks");
            Ok(())
        })
        .await
    }
}
