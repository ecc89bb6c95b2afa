//! Instantané « en cours de lecture » : morceau courant, file projetée,
//! historique récent

use crate::catalog::Catalog;
use crate::model::Track;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Upcoming queue entries included in the snapshot
pub const QUEUE_PREVIEW: usize = 10;
/// Previously played tracks included in the snapshot
pub const HISTORY_LEN: usize = 5;

/// A track placed on the station timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledTrack {
    pub track: Track,
    pub requested: bool,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NowPlaying {
    pub now: DateTime<Utc>,
    /// Most recently played track, `None` before the first play
    pub current: Option<ScheduledTrack>,
    /// Queue head, start times chained from the end of `current`
    pub queue: Vec<ScheduledTrack>,
    /// Tracks played before `current`, most recent first
    pub history: Vec<ScheduledTrack>,
    pub total_tracks: usize,
    pub total_plays: u64,
}

pub fn now_playing(catalog: &dyn Catalog, now: DateTime<Utc>) -> Result<NowPlaying> {
    let mut played = catalog.recently_played(HISTORY_LEN + 1)?.into_iter();

    let current = played.next().and_then(|track| {
        let start = track.last_played?;
        let end = start + track.duration();
        Some(ScheduledTrack {
            track,
            requested: false,
            start,
            end,
        })
    });

    let mut cursor = current.as_ref().map(|c| c.end).unwrap_or(now);
    let mut queue = Vec::new();
    for entry in catalog.list_queue()?.into_iter().take(QUEUE_PREVIEW) {
        // Entrée orpheline : ignorée, elle sera purgée au prochain dépilement
        let Some(track) = catalog.get_track(&entry.track_id)? else {
            continue;
        };
        let end = cursor + track.duration();
        queue.push(ScheduledTrack {
            track,
            requested: entry.requested,
            start: cursor,
            end,
        });
        cursor = end;
    }

    let mut cursor = current.as_ref().map(|c| c.start).unwrap_or(now);
    let history = played
        .map(|track| {
            let start = cursor - track.duration();
            let scheduled = ScheduledTrack {
                track,
                requested: false,
                start,
                end: cursor,
            };
            cursor = start;
            scheduled
        })
        .collect();

    let tracks = catalog.list_tracks()?;
    Ok(NowPlaying {
        now,
        current,
        queue,
        history,
        total_tracks: tracks.len(),
        total_plays: tracks.iter().map(|t| t.playcount).sum(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::model::{NewTrack, TrackUpdate};
    use chrono::Duration;

    #[test]
    fn test_timeline() {
        let mut catalog = MemoryCatalog::new();
        let mut ids = Vec::new();
        for i in 0..4 {
            let track = catalog
                .insert_track(NewTrack {
                    filename: format!("{i}.ogg"),
                    artist: "A".into(),
                    title: format!("T{i}"),
                    duration_secs: 100 + i as u64,
                })
                .unwrap();
            ids.push(track);
        }
        let now = Utc::now();
        catalog
            .update_track(&ids[0].id, &TrackUpdate::played(&ids[0], now - Duration::seconds(300)))
            .unwrap();
        catalog
            .update_track(&ids[1].id, &TrackUpdate::played(&ids[1], now - Duration::seconds(30)))
            .unwrap();
        catalog.insert_queue_entry(&ids[2].id, true).unwrap();
        catalog.insert_queue_entry(&ids[3].id, false).unwrap();

        let np = now_playing(&catalog, now).unwrap();
        let current = np.current.unwrap();
        assert_eq!(current.track.id, ids[1].id);
        assert_eq!(current.end, current.start + Duration::seconds(101));

        assert_eq!(np.queue.len(), 2);
        assert!(np.queue[0].requested);
        assert_eq!(np.queue[0].start, current.end);
        assert_eq!(np.queue[1].start, np.queue[0].end);

        assert_eq!(np.history.len(), 1);
        assert_eq!(np.history[0].end, current.start);
        assert_eq!(np.total_tracks, 4);
        assert_eq!(np.total_plays, 2);
    }

    #[test]
    fn test_nothing_played_yet() {
        let catalog = MemoryCatalog::new();
        let now = Utc::now();
        let np = now_playing(&catalog, now).unwrap();
        assert!(np.current.is_none());
        assert!(np.queue.is_empty());
        assert_eq!(np.total_plays, 0);
    }
}
