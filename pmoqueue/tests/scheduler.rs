//! Tests d'intégration de l'ordonnanceur sur un catalogue SQLite

use chrono::{Duration, Utc};
use pmoqueue::catalog::{shared, Catalog};
use pmoqueue::eligibility::REASON_QUEUE_FULL;
use pmoqueue::sampling::{weight, DEFAULT_FILL};
use pmoqueue::{fill_threshold, NewTrack, Scheduler, SqliteCatalog, Track};
use tempfile::TempDir;

async fn scheduler_with(n: usize) -> (TempDir, Scheduler, Vec<Track>) {
    let dir = tempfile::tempdir().unwrap();
    let catalog = SqliteCatalog::open(dir.path().join("radio.db")).unwrap();
    let scheduler = Scheduler::new(shared(catalog));

    let mut tracks = Vec::new();
    for i in 0..n {
        let (track, created) = scheduler
            .insert_track(NewTrack {
                filename: format!("{i:02}.ogg"),
                artist: format!("Artist {i}"),
                title: format!("Title {i}"),
                duration_secs: 180,
            })
            .await
            .unwrap();
        assert!(created);
        tracks.push(track);
    }
    (dir, scheduler, tracks)
}

async fn counts(scheduler: &Scheduler) -> (usize, usize) {
    scheduler
        .with_catalog(|c| {
            let queue = c.list_queue()?;
            let requested = queue.iter().filter(|e| e.requested).count();
            Ok((requested, queue.len() - requested))
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn test_empty_queue_fill_then_requests() {
    let (_dir, scheduler, tracks) = scheduler_with(10).await;

    let added = scheduler.generate_fill().await.unwrap();
    assert_eq!(added.len(), DEFAULT_FILL);
    assert_eq!(counts(&scheduler).await, (0, 6));

    // Les morceaux non encore en file peuvent être demandés
    let queued = scheduler.with_catalog(|c| c.list_queue()).await.unwrap();
    let free: Vec<&Track> = tracks
        .iter()
        .filter(|t| !queued.iter().any(|e| e.track_id == t.id))
        .collect();
    assert_eq!(free.len(), 4);
    for track in &free {
        assert!(scheduler.enqueue_request(&track.id).await.unwrap());
    }
    assert_eq!(counts(&scheduler).await, (4, 6));

    // 6 aléatoires ≥ seuil 3 : aucun ajout
    assert!(scheduler.generate_fill().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_fill_tops_up_to_threshold() {
    let (_dir, scheduler, tracks) = scheduler_with(10).await;

    for track in &tracks[..5] {
        assert!(scheduler.enqueue_request(&track.id).await.unwrap());
    }
    assert_eq!(counts(&scheduler).await, (5, 0));

    let added = scheduler.generate_fill().await.unwrap();
    assert_eq!(added.len(), fill_threshold(5));
    let (requested, random) = counts(&scheduler).await;
    assert_eq!(requested, 5);
    assert!(random >= fill_threshold(requested));
}

#[tokio::test]
async fn test_dequeue_marks_exactly_one_track_played() {
    let (_dir, scheduler, _tracks) = scheduler_with(10).await;
    let before = Utc::now();

    let played = scheduler.dequeue_next().await.unwrap().unwrap();
    assert_eq!(played.playcount, 1);
    let last_played = played.last_played.unwrap();
    assert!(last_played >= before - Duration::seconds(1));

    let all = scheduler.with_catalog(|c| c.list_tracks()).await.unwrap();
    assert_eq!(all.iter().map(|t| t.playcount).sum::<u64>(), 1);

    // L'entrée dépilée n'existe plus
    let (requested, random) = counts(&scheduler).await;
    assert_eq!(requested + random, DEFAULT_FILL - 1);
    let state = scheduler.queue_state(&played.id).await.unwrap();
    assert!(!state.queued);
}

#[tokio::test]
async fn test_dequeue_is_fifo() {
    let (_dir, scheduler, tracks) = scheduler_with(10).await;
    assert!(scheduler.enqueue_request(&tracks[7].id).await.unwrap());
    assert!(scheduler.enqueue_request(&tracks[2].id).await.unwrap());

    let first = scheduler.dequeue_next().await.unwrap().unwrap();
    let second = scheduler.dequeue_next().await.unwrap().unwrap();
    assert_eq!(first.id, tracks[7].id);
    assert_eq!(second.id, tracks[2].id);
}

#[tokio::test]
async fn test_played_track_is_cooling_down() {
    let (_dir, scheduler, tracks) = scheduler_with(1).await;
    let played = scheduler.dequeue_next().await.unwrap().unwrap();
    assert_eq!(played.id, tracks[0].id);

    let info = scheduler.eligibility(&played.id).await.unwrap();
    assert!(!info.requestable);
    assert!(!scheduler.enqueue_request(&played.id).await.unwrap());

    let later = played.last_played.unwrap() + Duration::seconds(180 + 1800);
    let info = scheduler.eligibility_at(&played.id, later).await.unwrap();
    assert!(info.requestable);
}

#[tokio::test]
async fn test_queue_full() {
    let (_dir, scheduler, tracks) = scheduler_with(11).await;
    for track in &tracks[..10] {
        assert!(scheduler.enqueue_request(&track.id).await.unwrap());
    }

    let info = scheduler.eligibility(&tracks[10].id).await.unwrap();
    assert!(!info.requestable);
    assert_eq!(info.reason.as_deref(), Some(REASON_QUEUE_FULL));
    assert!(!scheduler.enqueue_request(&tracks[10].id).await.unwrap());
}

#[tokio::test]
async fn test_dangling_entry_is_dropped() {
    let (_dir, scheduler, tracks) = scheduler_with(2).await;
    let ghost = "00000000-0000-0000-0000-000000000000".to_string();
    scheduler
        .with_catalog(move |c| {
            c.insert_queue_entry(&ghost, true)?;
            Ok(())
        })
        .await
        .unwrap();
    assert!(scheduler.enqueue_request(&tracks[1].id).await.unwrap());

    let played = scheduler.dequeue_next().await.unwrap().unwrap();
    assert_eq!(played.id, tracks[1].id);
}

#[tokio::test]
async fn test_empty_catalog_yields_none() {
    let (_dir, scheduler, _) = scheduler_with(0).await;
    assert!(scheduler.dequeue_next().await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_track_cascades_to_queue_and_favourites() {
    let (_dir, scheduler, tracks) = scheduler_with(3).await;
    assert!(scheduler.enqueue_request(&tracks[0].id).await.unwrap());
    scheduler.add_favourite("alice", &tracks[0].id).await.unwrap();
    scheduler.add_favourite("alice", &tracks[1].id).await.unwrap();

    scheduler.delete_track(&tracks[0].id).await.unwrap();

    assert_eq!(counts(&scheduler).await, (0, 0));
    let favourites = scheduler.list_favourites("alice").await.unwrap();
    assert_eq!(favourites.len(), 1);
    assert_eq!(favourites[0].id, tracks[1].id);

    scheduler
        .remove_favourite("alice", &tracks[1].id)
        .await
        .unwrap();
    assert!(scheduler.list_favourites("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_weights_always_positive() {
    let (_dir, scheduler, _) = scheduler_with(5).await;
    for _ in 0..7 {
        scheduler.dequeue_next().await.unwrap();
    }
    let (tracks, max) = scheduler
        .with_catalog(|c| Ok((c.list_tracks()?, c.max_playcount()?)))
        .await
        .unwrap();
    assert!(max >= 1);
    assert!(tracks.iter().all(|t| weight(t.playcount, max) > 0));
}

#[tokio::test]
async fn test_now_playing_follows_dequeue() {
    let (_dir, scheduler, _) = scheduler_with(8).await;
    let played = scheduler.dequeue_next().await.unwrap().unwrap();

    let np = scheduler.now_playing().await.unwrap();
    assert_eq!(np.current.unwrap().track.id, played.id);
    assert_eq!(np.queue.len(), DEFAULT_FILL - 1);
    assert_eq!(np.total_plays, 1);
}
