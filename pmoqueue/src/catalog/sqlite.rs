//! Catalogue SQLite
//!
//! Les horodatages sont stockés en millisecondes UTC. Les suppressions en
//! cascade (file, favoris) sont faites explicitement dans `delete_track`.

use super::Catalog;
use crate::model::{NewTrack, QueueEntry, Track, TrackUpdate};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use tracing::debug;

const TRACK_COLUMNS: &str =
    "id, filename, artist, title, duration_secs, last_played_ms, playcount, created_ms";

/// SQLite-backed catalog
pub struct SqliteCatalog {
    conn: Connection,
}

impl SqliteCatalog {
    /// Opens (or creates) the database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        debug!("Opened catalog database {}", path.display());
        Self::init(conn)
    }

    /// Base en mémoire, détruite avec l'instance
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS tracks (
                id TEXT PRIMARY KEY,
                filename TEXT NOT NULL UNIQUE,
                artist TEXT NOT NULL,
                title TEXT NOT NULL,
                duration_secs INTEGER NOT NULL,
                last_played_ms INTEGER,
                playcount INTEGER NOT NULL DEFAULT 0,
                created_ms INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS queue (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                track_id TEXT NOT NULL,
                requested INTEGER NOT NULL,
                added_ms INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_queue_track ON queue(track_id);
            CREATE TABLE IF NOT EXISTS favourites (
                user_id TEXT NOT NULL,
                track_id TEXT NOT NULL,
                PRIMARY KEY (user_id, track_id)
            );",
        )?;
        Ok(Self { conn })
    }

    fn query_tracks(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Track>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, track_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn query_track(&self, sql: &str, params: impl rusqlite::Params) -> Result<Option<Track>> {
        Ok(self.conn.query_row(sql, params, track_from_row).optional()?)
    }
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default()
}

fn track_from_row(row: &Row<'_>) -> rusqlite::Result<Track> {
    Ok(Track {
        id: row.get(0)?,
        filename: row.get(1)?,
        artist: row.get(2)?,
        title: row.get(3)?,
        duration_secs: row.get::<_, i64>(4)? as u64,
        last_played: row.get::<_, Option<i64>>(5)?.map(from_millis),
        playcount: row.get::<_, i64>(6)? as u64,
        created_at: from_millis(row.get(7)?),
    })
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<QueueEntry> {
    Ok(QueueEntry {
        id: row.get(0)?,
        track_id: row.get(1)?,
        requested: row.get(2)?,
        added_at: from_millis(row.get(3)?),
    })
}

impl Catalog for SqliteCatalog {
    fn get_track(&self, id: &str) -> Result<Option<Track>> {
        self.query_track(
            &format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE id = ?1"),
            [id],
        )
    }

    fn find_track_by_filename(&self, filename: &str) -> Result<Option<Track>> {
        self.query_track(
            &format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE filename = ?1"),
            [filename],
        )
    }

    fn find_track_by_artist_title(&self, artist: &str, title: &str) -> Result<Option<Track>> {
        self.query_track(
            &format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE artist = ?1 AND title = ?2"),
            [artist, title],
        )
    }

    fn list_tracks(&self) -> Result<Vec<Track>> {
        self.query_tracks(
            &format!("SELECT {TRACK_COLUMNS} FROM tracks ORDER BY created_ms, rowid"),
            [],
        )
    }

    fn recently_played(&self, limit: usize) -> Result<Vec<Track>> {
        self.query_tracks(
            &format!(
                "SELECT {TRACK_COLUMNS} FROM tracks
                 WHERE last_played_ms IS NOT NULL
                 ORDER BY last_played_ms DESC
                 LIMIT ?1"
            ),
            [limit as i64],
        )
    }

    fn insert_track(&mut self, track: NewTrack) -> Result<Track> {
        let track = Track {
            id: uuid::Uuid::new_v4().to_string(),
            filename: track.filename,
            artist: track.artist,
            title: track.title,
            duration_secs: track.duration_secs,
            last_played: None,
            playcount: 0,
            created_at: Utc::now(),
        };
        self.conn.execute(
            "INSERT INTO tracks (id, filename, artist, title, duration_secs, last_played_ms, playcount, created_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, NULL, 0, ?6)",
            params![
                track.id,
                track.filename,
                track.artist,
                track.title,
                track.duration_secs as i64,
                track.created_at.timestamp_millis(),
            ],
        )?;
        Ok(track)
    }

    fn update_track(&mut self, id: &str, update: &TrackUpdate) -> Result<Track> {
        let mut track = self
            .get_track(id)?
            .ok_or_else(|| Error::TrackNotFound(id.to_string()))?;
        update.apply(&mut track);
        self.conn.execute(
            "UPDATE tracks SET artist = ?2, title = ?3, playcount = ?4, last_played_ms = ?5
             WHERE id = ?1",
            params![
                track.id,
                track.artist,
                track.title,
                track.playcount as i64,
                track.last_played.map(|t| t.timestamp_millis()),
            ],
        )?;
        Ok(track)
    }

    fn delete_track(&mut self, id: &str) -> Result<()> {
        let removed = self.conn.execute("DELETE FROM tracks WHERE id = ?1", [id])?;
        if removed == 0 {
            return Err(Error::TrackNotFound(id.to_string()));
        }
        self.conn
            .execute("DELETE FROM queue WHERE track_id = ?1", [id])?;
        self.conn
            .execute("DELETE FROM favourites WHERE track_id = ?1", [id])?;
        Ok(())
    }

    fn max_playcount(&self) -> Result<u64> {
        let max: Option<i64> =
            self.conn
                .query_row("SELECT MAX(playcount) FROM tracks", [], |row| row.get(0))?;
        Ok(max.unwrap_or(0) as u64)
    }

    fn list_queue(&self) -> Result<Vec<QueueEntry>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, track_id, requested, added_ms FROM queue ORDER BY id")?;
        let rows = stmt.query_map([], entry_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn insert_queue_entry(&mut self, track_id: &str, requested: bool) -> Result<QueueEntry> {
        let added_at = Utc::now();
        self.conn.execute(
            "INSERT INTO queue (track_id, requested, added_ms) VALUES (?1, ?2, ?3)",
            params![track_id, requested, added_at.timestamp_millis()],
        )?;
        Ok(QueueEntry {
            id: self.conn.last_insert_rowid(),
            track_id: track_id.to_string(),
            requested,
            added_at,
        })
    }

    fn delete_queue_entry(&mut self, id: i64) -> Result<()> {
        let removed = self.conn.execute("DELETE FROM queue WHERE id = ?1", [id])?;
        if removed == 0 {
            return Err(Error::QueueEntryNotFound(id));
        }
        Ok(())
    }

    fn count_queue(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM queue", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn add_favourite(&mut self, user: &str, track_id: &str) -> Result<()> {
        if self.get_track(track_id)?.is_none() {
            return Err(Error::TrackNotFound(track_id.to_string()));
        }
        self.conn.execute(
            "INSERT OR IGNORE INTO favourites (user_id, track_id) VALUES (?1, ?2)",
            [user, track_id],
        )?;
        Ok(())
    }

    fn remove_favourite(&mut self, user: &str, track_id: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM favourites WHERE user_id = ?1 AND track_id = ?2",
            [user, track_id],
        )?;
        Ok(())
    }

    fn list_favourites(&self, user: &str) -> Result<Vec<Track>> {
        self.query_tracks(
            "SELECT t.id, t.filename, t.artist, t.title, t.duration_secs, t.last_played_ms, t.playcount, t.created_ms
             FROM favourites f JOIN tracks t ON t.id = f.track_id
             WHERE f.user_id = ?1
             ORDER BY t.artist, t.title",
            [user],
        )
    }

    fn begin(&mut self) -> Result<()> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_track(n: usize) -> NewTrack {
        NewTrack {
            filename: format!("track{n}.ogg"),
            artist: format!("Artist {n}"),
            title: format!("Title {n}"),
            duration_secs: 180,
        }
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut catalog = SqliteCatalog::open_in_memory().unwrap();
        let track = catalog.insert_track(new_track(1)).unwrap();

        let found = catalog.get_track(&track.id).unwrap().unwrap();
        assert_eq!(found.filename, track.filename);
        assert_eq!(found.playcount, 0);
        assert!(found.last_played.is_none());
        assert!(catalog
            .find_track_by_filename("track1.ogg")
            .unwrap()
            .is_some());
        assert!(catalog
            .find_track_by_artist_title("Artist 1", "Title 1")
            .unwrap()
            .is_some());
        assert!(catalog.get_track("missing").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_filename_rejected() {
        let mut catalog = SqliteCatalog::open_in_memory().unwrap();
        catalog.insert_track(new_track(1)).unwrap();
        assert!(matches!(
            catalog.insert_track(new_track(1)),
            Err(Error::Database(_))
        ));
    }

    #[test]
    fn test_queue_order_and_delete() {
        let mut catalog = SqliteCatalog::open_in_memory().unwrap();
        let a = catalog.insert_track(new_track(1)).unwrap();
        let b = catalog.insert_track(new_track(2)).unwrap();

        let first = catalog.insert_queue_entry(&b.id, true).unwrap();
        let second = catalog.insert_queue_entry(&a.id, false).unwrap();
        assert!(first.id < second.id);

        let ids: Vec<i64> = catalog.list_queue().unwrap().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);

        catalog.delete_queue_entry(first.id).unwrap();
        assert_eq!(catalog.count_queue().unwrap(), 1);
        assert!(matches!(
            catalog.delete_queue_entry(first.id),
            Err(Error::QueueEntryNotFound(_))
        ));
    }

    #[test]
    fn test_delete_track_cascades() {
        let mut catalog = SqliteCatalog::open_in_memory().unwrap();
        let track = catalog.insert_track(new_track(1)).unwrap();
        catalog.insert_queue_entry(&track.id, true).unwrap();
        catalog.add_favourite("alice", &track.id).unwrap();

        catalog.delete_track(&track.id).unwrap();

        assert_eq!(catalog.count_queue().unwrap(), 0);
        assert!(catalog.list_favourites("alice").unwrap().is_empty());
    }

    #[test]
    fn test_rollback_discards_changes() {
        let mut catalog = SqliteCatalog::open_in_memory().unwrap();
        catalog.begin().unwrap();
        catalog.insert_track(new_track(1)).unwrap();
        catalog.rollback().unwrap();
        assert!(catalog.list_tracks().unwrap().is_empty());
    }

    #[test]
    fn test_update_and_recently_played() {
        let mut catalog = SqliteCatalog::open_in_memory().unwrap();
        let a = catalog.insert_track(new_track(1)).unwrap();
        let b = catalog.insert_track(new_track(2)).unwrap();
        let now = Utc::now();

        catalog
            .update_track(&a.id, &TrackUpdate::played(&a, now - chrono::Duration::minutes(5)))
            .unwrap();
        let b = catalog
            .update_track(&b.id, &TrackUpdate::played(&b, now))
            .unwrap();
        assert_eq!(b.playcount, 1);

        let recent = catalog.recently_played(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, b.id);
        assert_eq!(catalog.max_playcount().unwrap(), 1);
    }
}
