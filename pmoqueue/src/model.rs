//! Entités du catalogue : morceaux et entrées de file

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A playable track with its play statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    /// Nom du fichier, relatif au répertoire musical
    pub filename: String,
    pub artist: String,
    pub title: String,
    pub duration_secs: u64,
    pub last_played: Option<DateTime<Utc>>,
    pub playcount: u64,
    pub created_at: DateTime<Utc>,
}

impl Track {
    pub fn duration(&self) -> Duration {
        Duration::seconds(self.duration_secs as i64)
    }

    /// `Artist - Title`, as pushed to listeners
    pub fn display_title(&self) -> String {
        format!("{} - {}", self.artist, self.title)
    }
}

/// Données nécessaires à la création d'un morceau
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTrack {
    pub filename: String,
    pub artist: String,
    pub title: String,
    pub duration_secs: u64,
}

/// Partial update of a track; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackUpdate {
    pub artist: Option<String>,
    pub title: Option<String>,
    pub playcount: Option<u64>,
    pub last_played: Option<DateTime<Utc>>,
}

impl TrackUpdate {
    /// Update recorded when a track leaves the queue for playback
    pub fn played(track: &Track, at: DateTime<Utc>) -> Self {
        Self {
            playcount: Some(track.playcount + 1),
            last_played: Some(at),
            ..Self::default()
        }
    }

    pub(crate) fn apply(&self, track: &mut Track) {
        if let Some(artist) = &self.artist {
            track.artist = artist.clone();
        }
        if let Some(title) = &self.title {
            track.title = title.clone();
        }
        if let Some(playcount) = self.playcount {
            track.playcount = playcount;
        }
        if let Some(last_played) = self.last_played {
            track.last_played = Some(last_played);
        }
    }
}

/// A scheduled, not yet played reference to a track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Croissant avec l'ordre d'insertion
    pub id: i64,
    pub track_id: String,
    /// `true` for listener requests, `false` for scheduler fill
    pub requested: bool,
    pub added_at: DateTime<Utc>,
}

/// Origin of the most recent queue entry of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueKind {
    None,
    Fill,
    Requested,
}

/// Queue status of one track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueState {
    pub queued: bool,
    pub kind: QueueKind,
    pub queued_at: Option<DateTime<Utc>>,
}

impl QueueState {
    pub fn not_queued() -> Self {
        Self {
            queued: false,
            kind: QueueKind::None,
            queued_at: None,
        }
    }
}

/// Whether a track may currently be requested, and why not
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eligibility {
    pub requestable: bool,
    pub reason: Option<String>,
    /// Relative time until the track becomes requestable ("in 20 minutes")
    pub humanized_wait: String,
    /// Relative time since the last play ("2 hours ago", "Never before")
    pub humanized_lastplayed: String,
    pub next_eligible: Option<DateTime<Utc>>,
}
