//! Queue Scheduler
//!
//! Keeps the queue topped up with weighted random fill, proportionally to
//! the number of listener requests, and pops the next track to play.
//! Every public operation runs as one catalog transaction under the shared
//! lock, on a blocking thread.

use crate::catalog::{transaction, Catalog, SharedCatalog};
use crate::eligibility::{self, QUEUE_CEILING};
use crate::library::{self, ReloadReport};
use crate::model::{Eligibility, NewTrack, QueueEntry, QueueState, Track, TrackUpdate};
use crate::now_playing::{self, NowPlaying};
use crate::sampling::{sample_weighted, DEFAULT_FILL};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::path::PathBuf;
use tokio::task::spawn_blocking;
use tracing::{debug, info, warn};

/// Minimum number of random entries wanted for `requested` listener requests
///
/// `ceil((10 - min(requested, 10)) / 2)`
pub fn fill_threshold(requested: usize) -> usize {
    (QUEUE_CEILING - requested.min(QUEUE_CEILING)).div_ceil(2)
}

/// Tops up the queue with weighted random tracks; returns the entries added
pub fn generate_fill<R: Rng + ?Sized>(
    catalog: &mut dyn Catalog,
    rng: &mut R,
) -> Result<Vec<QueueEntry>> {
    let queue = catalog.list_queue()?;
    let requested = queue.iter().filter(|e| e.requested).count();
    let random = queue.len() - requested;

    let to_add = if queue.is_empty() {
        DEFAULT_FILL
    } else {
        let threshold = fill_threshold(requested);
        if random >= threshold {
            return Ok(Vec::new());
        }
        threshold.abs_diff(random)
    };

    let tracks = catalog.list_tracks()?;
    let max_playcount = catalog.max_playcount()?;
    let chosen = sample_weighted(&tracks, max_playcount, to_add, rng);

    let mut added = Vec::with_capacity(chosen.len());
    for track in &chosen {
        added.push(catalog.insert_queue_entry(&track.id, false)?);
    }
    if !added.is_empty() {
        debug!(
            requested,
            random,
            added = added.len(),
            "Queue topped up with random fill"
        );
    }
    Ok(added)
}

/// Fills, then pops the oldest entry and marks its track as played at `now`
///
/// Entries whose track vanished from the catalog are dropped.
pub fn dequeue_next<R: Rng + ?Sized>(
    catalog: &mut dyn Catalog,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<Option<Track>> {
    loop {
        generate_fill(catalog, rng)?;
        let Some(entry) = catalog.list_queue()?.into_iter().next() else {
            return Ok(None);
        };
        catalog.delete_queue_entry(entry.id)?;

        match catalog.get_track(&entry.track_id)? {
            Some(track) => {
                let played = catalog.update_track(&track.id, &TrackUpdate::played(&track, now))?;
                return Ok(Some(played));
            }
            None => {
                warn!(
                    entry_id = entry.id,
                    track_id = %entry.track_id,
                    "Dropping queue entry for a missing track"
                );
            }
        }
    }
}

/// Appends a listener request if the track is currently requestable
pub fn enqueue_request(
    catalog: &mut dyn Catalog,
    track_id: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    let info = eligibility_of(catalog, track_id, now)?;
    if !info.requestable {
        debug!(
            track_id,
            reason = info.reason.as_deref().unwrap_or(""),
            "Request refused"
        );
        return Ok(false);
    }
    catalog.insert_queue_entry(track_id, true)?;
    Ok(true)
}

fn eligibility_of(catalog: &dyn Catalog, track_id: &str, now: DateTime<Utc>) -> Result<Eligibility> {
    let track = catalog
        .get_track(track_id)?
        .ok_or_else(|| Error::TrackNotFound(track_id.to_string()))?;
    let queue = catalog.list_queue()?;
    let state = eligibility::queue_state(track_id, &queue);
    Ok(eligibility::eligibility(&track, &state, queue.len(), now))
}

/// Inserts a track unless one with the same artist and title exists
///
/// Returns the stored track and whether it was created.
pub fn insert_unique(catalog: &mut dyn Catalog, track: NewTrack) -> Result<(Track, bool)> {
    if let Some(existing) = catalog.find_track_by_artist_title(&track.artist, &track.title)? {
        return Ok((existing, false));
    }
    Ok((catalog.insert_track(track)?, true))
}

/// Async handle over a shared catalog
#[derive(Clone)]
pub struct Scheduler {
    catalog: SharedCatalog,
}

impl Scheduler {
    pub fn new(catalog: SharedCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> SharedCatalog {
        self.catalog.clone()
    }

    /// Runs `f` in one transaction on a blocking thread
    pub async fn with_catalog<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn Catalog) -> Result<T> + Send + 'static,
    {
        let catalog = self.catalog.clone();
        spawn_blocking(move || {
            let mut guard = catalog.lock().unwrap();
            transaction(&mut **guard, f)
        })
        .await
        .map_err(|e| Error::Other(anyhow::anyhow!("Catalog task failed: {}", e)))?
    }

    pub async fn generate_fill(&self) -> Result<Vec<QueueEntry>> {
        self.with_catalog(|c| generate_fill(c, &mut rand::rng())).await
    }

    pub async fn dequeue_next(&self) -> Result<Option<Track>> {
        let track = self
            .with_catalog(|c| dequeue_next(c, &mut rand::rng(), Utc::now()))
            .await?;
        if let Some(track) = &track {
            info!(
                track_id = %track.id,
                playcount = track.playcount,
                "Next track: {}",
                track.display_title()
            );
        }
        Ok(track)
    }

    pub async fn enqueue_request(&self, track_id: &str) -> Result<bool> {
        let track_id = track_id.to_string();
        self.with_catalog(move |c| enqueue_request(c, &track_id, Utc::now()))
            .await
    }

    pub async fn queue_state(&self, track_id: &str) -> Result<QueueState> {
        let track_id = track_id.to_string();
        self.with_catalog(move |c| Ok(eligibility::queue_state(&track_id, &c.list_queue()?)))
            .await
    }

    pub async fn eligibility(&self, track_id: &str) -> Result<Eligibility> {
        self.eligibility_at(track_id, Utc::now()).await
    }

    pub async fn eligibility_at(&self, track_id: &str, now: DateTime<Utc>) -> Result<Eligibility> {
        let track_id = track_id.to_string();
        self.with_catalog(move |c| eligibility_of(c, &track_id, now))
            .await
    }

    pub async fn insert_track(&self, track: NewTrack) -> Result<(Track, bool)> {
        self.with_catalog(move |c| insert_unique(c, track)).await
    }

    pub async fn delete_track(&self, track_id: &str) -> Result<()> {
        let track_id = track_id.to_string();
        self.with_catalog(move |c| c.delete_track(&track_id)).await
    }

    pub async fn add_favourite(&self, user: &str, track_id: &str) -> Result<()> {
        let (user, track_id) = (user.to_string(), track_id.to_string());
        self.with_catalog(move |c| c.add_favourite(&user, &track_id))
            .await
    }

    pub async fn remove_favourite(&self, user: &str, track_id: &str) -> Result<()> {
        let (user, track_id) = (user.to_string(), track_id.to_string());
        self.with_catalog(move |c| c.remove_favourite(&user, &track_id))
            .await
    }

    pub async fn list_favourites(&self, user: &str) -> Result<Vec<Track>> {
        let user = user.to_string();
        self.with_catalog(move |c| c.list_favourites(&user)).await
    }

    /// Synchronises the catalog with the files of `music_dir`
    pub async fn reload_library(&self, music_dir: impl Into<PathBuf>) -> Result<ReloadReport> {
        let music_dir = music_dir.into();
        let report = self
            .with_catalog(move |c| library::reload_library(c, &music_dir))
            .await?;
        info!(
            added = report.added.len(),
            removed = report.removed.len(),
            rejected = report.rejected.len(),
            "Music library reloaded"
        );
        Ok(report)
    }

    pub async fn now_playing(&self) -> Result<NowPlaying> {
        self.with_catalog(|c| now_playing::now_playing(c, Utc::now()))
            .await
    }
}
