//! Request eligibility rules
//!
//! Pure functions: they only look at a track, the current queue and a
//! reference instant, which keeps the cooldown arithmetic testable.

use crate::humanize::humanize;
use crate::model::{Eligibility, QueueEntry, QueueKind, QueueState, Track};
use chrono::{DateTime, Duration, Utc};

/// Queue size at which listener requests are refused
pub const QUEUE_CEILING: usize = 10;

/// Buffer added after a track's end before it can be requested again (seconds)
pub const COOLDOWN_SECS: i64 = 30 * 60;

pub const REASON_QUEUE_FULL: &str = "queue full";
pub const REASON_ALREADY_QUEUED: &str = "already queued, retry after playback + cooldown";

const NEVER_PLAYED: &str = "Never before";

/// Queue status of `track_id`, taken from its most recent entry
///
/// `entries` must be in insertion order, as returned by the catalog.
pub fn queue_state(track_id: &str, entries: &[QueueEntry]) -> QueueState {
    match entries.iter().rev().find(|e| e.track_id == track_id) {
        Some(entry) => QueueState {
            queued: true,
            kind: if entry.requested {
                QueueKind::Requested
            } else {
                QueueKind::Fill
            },
            queued_at: Some(entry.added_at),
        },
        None => QueueState::not_queued(),
    }
}

/// Instant from which a played track may be requested again
///
/// `last_played + duration + 30 min`, measured from the play start.
pub fn next_eligible(track: &Track) -> Option<DateTime<Utc>> {
    track
        .last_played
        .map(|played| played + track.duration() + Duration::seconds(COOLDOWN_SECS))
}

/// Decides whether `track` may be requested at `now`
///
/// Checks run in order: queue ceiling, already queued, cooldown.
pub fn eligibility(
    track: &Track,
    state: &QueueState,
    queue_len: usize,
    now: DateTime<Utc>,
) -> Eligibility {
    let humanized_lastplayed = match track.last_played {
        Some(played) => humanize(played - now),
        None => NEVER_PLAYED.to_string(),
    };
    let next = next_eligible(track);
    let humanized_wait = match next {
        Some(at) if at > now => humanize(at - now),
        _ => "now".to_string(),
    };

    let mut info = Eligibility {
        requestable: true,
        reason: None,
        humanized_wait,
        humanized_lastplayed,
        next_eligible: next,
    };

    if queue_len >= QUEUE_CEILING {
        info.requestable = false;
        info.reason = Some(REASON_QUEUE_FULL.to_string());
    } else if state.queued {
        info.requestable = false;
        info.reason = Some(REASON_ALREADY_QUEUED.to_string());
    } else if let Some(at) = next {
        if now < at {
            info.requestable = false;
            info.reason = Some(format!("cooling down, requestable again {}", info.humanized_wait));
        }
    }

    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn track(last_played: Option<DateTime<Utc>>, duration_secs: u64) -> Track {
        Track {
            id: "t1".into(),
            filename: "t1.ogg".into(),
            artist: "Artist".into(),
            title: "Title".into(),
            duration_secs,
            last_played,
            playcount: 1,
            created_at: Utc.timestamp_opt(0, 0).unwrap(),
        }
    }

    fn entry(id: i64, track_id: &str, requested: bool) -> QueueEntry {
        QueueEntry {
            id,
            track_id: track_id.into(),
            requested,
            added_at: Utc.timestamp_opt(1_000 + id, 0).unwrap(),
        }
    }

    #[test]
    fn cooldown_boundary_is_duration_plus_thirty_minutes() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let d = 240;
        let track = track(Some(t0), d);
        let state = QueueState::not_queued();

        let at = t0 + Duration::seconds(d as i64 + 1800);
        assert!(eligibility(&track, &state, 0, at).requestable);

        let early = at - Duration::seconds(1);
        let info = eligibility(&track, &state, 0, early);
        assert!(!info.requestable);
        assert!(info.reason.unwrap().contains("requestable again"));
    }

    #[test]
    fn full_queue_wins_over_other_reasons() {
        let now = Utc::now();
        let track = track(Some(now), 200);
        let state = QueueState::not_queued();
        let info = eligibility(&track, &state, QUEUE_CEILING, now);
        assert!(!info.requestable);
        assert_eq!(info.reason.as_deref(), Some(REASON_QUEUE_FULL));
    }

    #[test]
    fn queued_track_is_not_requestable() {
        let entries = vec![entry(1, "other", false), entry(2, "t1", true)];
        let state = queue_state("t1", &entries);
        assert_eq!(state.kind, QueueKind::Requested);

        let info = eligibility(&track(None, 100), &state, entries.len(), Utc::now());
        assert!(!info.requestable);
        assert_eq!(info.reason.as_deref(), Some(REASON_ALREADY_QUEUED));
    }

    #[test]
    fn queue_state_reports_most_recent_entry() {
        let entries = vec![entry(1, "t1", true), entry(2, "t1", false)];
        let state = queue_state("t1", &entries);
        assert!(state.queued);
        assert_eq!(state.kind, QueueKind::Fill);
        assert_eq!(state.queued_at, Some(entries[1].added_at));

        assert_eq!(queue_state("t2", &entries), QueueState::not_queued());
    }

    #[test]
    fn never_played_track_is_requestable() {
        let info = eligibility(&track(None, 100), &QueueState::not_queued(), 3, Utc::now());
        assert!(info.requestable);
        assert_eq!(info.reason, None);
        assert_eq!(info.humanized_lastplayed, "Never before");
        assert_eq!(info.humanized_wait, "now");
    }
}
