//! Catalogue en mémoire, utilisé pour les tests et les stations éphémères

use super::Catalog;
use crate::model::{NewTrack, QueueEntry, Track, TrackUpdate};
use crate::{Error, Result};
use chrono::Utc;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    tracks: Vec<Track>,
    queue: Vec<QueueEntry>,
    favourites: Vec<(String, String)>,
    next_queue_id: i64,
}

/// In-memory catalog with snapshot based transactions
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    state: MemoryState,
    snapshot: Option<MemoryState>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insère un morceau tel quel (identifiant et statistiques compris)
    pub fn with_track(mut self, track: Track) -> Self {
        self.state.tracks.push(track);
        self
    }
}

impl Catalog for MemoryCatalog {
    fn get_track(&self, id: &str) -> Result<Option<Track>> {
        Ok(self.state.tracks.iter().find(|t| t.id == id).cloned())
    }

    fn find_track_by_filename(&self, filename: &str) -> Result<Option<Track>> {
        Ok(self
            .state
            .tracks
            .iter()
            .find(|t| t.filename == filename)
            .cloned())
    }

    fn find_track_by_artist_title(&self, artist: &str, title: &str) -> Result<Option<Track>> {
        Ok(self
            .state
            .tracks
            .iter()
            .find(|t| t.artist == artist && t.title == title)
            .cloned())
    }

    fn list_tracks(&self) -> Result<Vec<Track>> {
        Ok(self.state.tracks.clone())
    }

    fn recently_played(&self, limit: usize) -> Result<Vec<Track>> {
        let mut played: Vec<Track> = self
            .state
            .tracks
            .iter()
            .filter(|t| t.last_played.is_some())
            .cloned()
            .collect();
        played.sort_by(|a, b| b.last_played.cmp(&a.last_played));
        played.truncate(limit);
        Ok(played)
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
        self.state.tracks.push(track.clone());
        Ok(track)
    }

    fn update_track(&mut self, id: &str, update: &TrackUpdate) -> Result<Track> {
        let track = self
            .state
            .tracks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| Error::TrackNotFound(id.to_string()))?;
        update.apply(track);
        Ok(track.clone())
    }

    fn delete_track(&mut self, id: &str) -> Result<()> {
        let before = self.state.tracks.len();
        self.state.tracks.retain(|t| t.id != id);
        if self.state.tracks.len() == before {
            return Err(Error::TrackNotFound(id.to_string()));
        }
        self.state.queue.retain(|e| e.track_id != id);
        self.state.favourites.retain(|(_, track)| track != id);
        Ok(())
    }

    fn max_playcount(&self) -> Result<u64> {
        Ok(self
            .state
            .tracks
            .iter()
            .map(|t| t.playcount)
            .max()
            .unwrap_or(0))
    }

    fn list_queue(&self) -> Result<Vec<QueueEntry>> {
        Ok(self.state.queue.clone())
    }

    fn insert_queue_entry(&mut self, track_id: &str, requested: bool) -> Result<QueueEntry> {
        self.state.next_queue_id += 1;
        let entry = QueueEntry {
            id: self.state.next_queue_id,
            track_id: track_id.to_string(),
            requested,
            added_at: Utc::now(),
        };
        self.state.queue.push(entry.clone());
        Ok(entry)
    }

    fn delete_queue_entry(&mut self, id: i64) -> Result<()> {
        let before = self.state.queue.len();
        self.state.queue.retain(|e| e.id != id);
        if self.state.queue.len() == before {
            return Err(Error::QueueEntryNotFound(id));
        }
        Ok(())
    }

    fn count_queue(&self) -> Result<usize> {
        Ok(self.state.queue.len())
    }

    fn add_favourite(&mut self, user: &str, track_id: &str) -> Result<()> {
        if self.get_track(track_id)?.is_none() {
            return Err(Error::TrackNotFound(track_id.to_string()));
        }
        let pair = (user.to_string(), track_id.to_string());
        if !self.state.favourites.contains(&pair) {
            self.state.favourites.push(pair);
        }
        Ok(())
    }

    fn remove_favourite(&mut self, user: &str, track_id: &str) -> Result<()> {
        self.state
            .favourites
            .retain(|(u, t)| !(u == user && t == track_id));
        Ok(())
    }

    fn list_favourites(&self, user: &str) -> Result<Vec<Track>> {
        Ok(self
            .state
            .favourites
            .iter()
            .filter(|(u, _)| u == user)
            .filter_map(|(_, id)| self.state.tracks.iter().find(|t| &t.id == id).cloned())
            .collect())
    }

    fn begin(&mut self) -> Result<()> {
        self.snapshot = Some(self.state.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.snapshot = None;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if let Some(snapshot) = self.snapshot.take() {
            self.state = snapshot;
        }
        Ok(())
    }
}
