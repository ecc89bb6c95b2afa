//! Repository interface over tracks, the play queue and favourites
//!
//! Every scheduler operation runs inside [`transaction`] while holding the
//! shared catalog lock, so no caller observes a half-updated queue.

mod memory;
mod sqlite;

pub use memory::MemoryCatalog;
pub use sqlite::SqliteCatalog;

use crate::model::{NewTrack, QueueEntry, Track, TrackUpdate};
use crate::Result;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Catalogue partagé entre l'ordonnanceur et la station
pub type SharedCatalog = Arc<Mutex<Box<dyn Catalog>>>;

/// Track catalog and queue persistence
pub trait Catalog: Send {
    fn get_track(&self, id: &str) -> Result<Option<Track>>;
    fn find_track_by_filename(&self, filename: &str) -> Result<Option<Track>>;
    fn find_track_by_artist_title(&self, artist: &str, title: &str) -> Result<Option<Track>>;
    /// All tracks, oldest first
    fn list_tracks(&self) -> Result<Vec<Track>>;
    /// Played tracks, most recent play first
    fn recently_played(&self, limit: usize) -> Result<Vec<Track>>;
    fn insert_track(&mut self, track: NewTrack) -> Result<Track>;
    fn update_track(&mut self, id: &str, update: &TrackUpdate) -> Result<Track>;
    /// Removes the track with its queue entries and favourites
    fn delete_track(&mut self, id: &str) -> Result<()>;
    fn max_playcount(&self) -> Result<u64>;

    /// Queue entries in insertion order
    fn list_queue(&self) -> Result<Vec<QueueEntry>>;
    fn insert_queue_entry(&mut self, track_id: &str, requested: bool) -> Result<QueueEntry>;
    fn delete_queue_entry(&mut self, id: i64) -> Result<()>;
    fn count_queue(&self) -> Result<usize>;

    fn add_favourite(&mut self, user: &str, track_id: &str) -> Result<()>;
    fn remove_favourite(&mut self, user: &str, track_id: &str) -> Result<()>;
    fn list_favourites(&self, user: &str) -> Result<Vec<Track>>;

    fn begin(&mut self) -> Result<()>;
    fn commit(&mut self) -> Result<()>;
    fn rollback(&mut self) -> Result<()>;
}

/// Wraps a catalog into the shared handle used by the scheduler
pub fn shared(catalog: impl Catalog + 'static) -> SharedCatalog {
    Arc::new(Mutex::new(Box::new(catalog)))
}

/// Runs `f` as one unit: committed on success, rolled back on error
pub fn transaction<T>(
    catalog: &mut dyn Catalog,
    f: impl FnOnce(&mut dyn Catalog) -> Result<T>,
) -> Result<T> {
    catalog.begin()?;
    match f(&mut *catalog) {
        Ok(value) => {
            catalog.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = catalog.rollback() {
                warn!("Catalog rollback failed: {}", rollback_err);
            }
            Err(err)
        }
    }
}
