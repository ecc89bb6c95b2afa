//! Boucle de station avec un catalogue en mémoire et des sorties en mémoire

use pmobroadcast::{
    MemoryFactory, MountDescriptor, SkipChannel, StreamFormat, TrackOutcome, WorkerPool,
    WorkerSettings,
};
use pmoqueue::catalog::shared;
use pmoqueue::{Catalog, MemoryCatalog, NewTrack, Scheduler};
use pmostation::{Cycle, Station};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn settings() -> WorkerSettings {
    WorkerSettings {
        chunk_size: 4,
        max_retries: 1,
        retry_delay: Duration::ZERO,
        ffmpeg: PathBuf::from("/nonexistent/ffmpeg"),
        pace: false,
    }
}

fn mounts() -> Vec<MountDescriptor> {
    vec![
        MountDescriptor::new("localhost", 8000, "/radio", StreamFormat::Ogg),
        MountDescriptor::new("localhost", 8000, "/radio", StreamFormat::Mp3),
    ]
}

/// Catalogue de `n` morceaux de 32 octets chacun
fn library(dir: &Path, n: usize) -> MemoryCatalog {
    let mut catalog = MemoryCatalog::new();
    for i in 0..n {
        let filename = format!("{i}.ogg");
        std::fs::write(dir.join(&filename), vec![i as u8; 32]).unwrap();
        catalog
            .insert_track(NewTrack {
                filename,
                artist: format!("Artist {i}"),
                title: format!("Title {i}"),
                duration_secs: 0,
            })
            .unwrap();
    }
    catalog
}

fn station(
    n: usize,
    descriptors: Vec<MountDescriptor>,
) -> (TempDir, Station, MemoryFactory, Scheduler) {
    let dir = tempfile::tempdir().unwrap();
    let scheduler = Scheduler::new(shared(library(dir.path(), n)));
    let factory = MemoryFactory::new();
    let pool = WorkerPool::spawn(
        descriptors,
        Arc::new(factory.clone()),
        SkipChannel::new(),
        settings(),
    );
    let station = Station::new(
        scheduler.clone(),
        pool,
        dir.path(),
        Duration::from_millis(10),
    );
    (dir, station, factory, scheduler)
}

#[tokio::test]
async fn test_track_is_streamed_on_every_mount() {
    let (_dir, mut station, factory, scheduler) = station(3, mounts());

    let Cycle::Played { track, outcomes } = station.play_once().await.unwrap() else {
        panic!("expected a track");
    };
    assert_eq!(outcomes.len(), 2);
    for (_, outcome) in &outcomes {
        assert!(matches!(outcome, TrackOutcome::Finished { bytes: 32, .. }));
    }
    assert_eq!(factory.record("/radio.ogg").bytes.len(), 32);
    assert_eq!(factory.record("/radio.mp3").bytes.len(), 32);
    assert_eq!(
        factory.record("/radio.mp3").metadata,
        vec![track.display_title()]
    );

    let stored = scheduler
        .with_catalog({
            let id = track.id.clone();
            move |c| c.get_track(&id)
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.playcount, 1);
}

#[tokio::test]
async fn test_skip_is_reset_between_tracks() {
    let (_dir, mut station, factory, _scheduler) = station(3, mounts());
    let skip = station.skip_channel();
    factory.skip_after_chunks("/radio.ogg", 1, &skip);

    let Cycle::Played { outcomes, .. } = station.play_once().await.unwrap() else {
        panic!("expected a track");
    };
    let ogg = &outcomes.iter().find(|(m, _)| m == "/radio.ogg").unwrap().1;
    assert!(matches!(ogg, TrackOutcome::Skipped { bytes: 4, .. }));
    // Les deux workers ont atteint un état terminal avant le retour
    assert!(outcomes
        .iter()
        .all(|(_, o)| !matches!(o, TrackOutcome::Failed { .. })));
    assert!(!skip.is_set());

    // La piste suivante n'est pas sautée
    let Cycle::Played { outcomes, .. } = station.play_once().await.unwrap() else {
        panic!("expected a track");
    };
    assert!(outcomes
        .iter()
        .all(|(_, o)| matches!(o, TrackOutcome::Finished { bytes: 32, .. })));
}

#[tokio::test]
async fn test_skip_while_idle_does_not_consume_next_track() {
    let (_dir, mut station, factory, _scheduler) = station(2, mounts());
    station.skip();

    let Cycle::Played { outcomes, .. } = station.play_once().await.unwrap() else {
        panic!("expected a track");
    };
    assert!(outcomes
        .iter()
        .all(|(_, o)| matches!(o, TrackOutcome::Finished { bytes: 32, .. })));
    assert_eq!(factory.record("/radio.ogg").bytes.len(), 32);
}

#[tokio::test]
async fn test_transcoder_failure_does_not_affect_passthrough() {
    let transcoded = MountDescriptor::new("localhost", 8000, "/radio", StreamFormat::Mp3).transcoded(128);
    let ogg = MountDescriptor::new("localhost", 8000, "/radio", StreamFormat::Ogg);
    let (_dir, mut station, factory, _scheduler) = station(2, vec![ogg, transcoded]);

    let Cycle::Played { outcomes, .. } = station.play_once().await.unwrap() else {
        panic!("expected a track");
    };
    assert!(matches!(outcomes[0].1, TrackOutcome::Finished { bytes: 32, .. }));
    assert!(matches!(outcomes[1].1, TrackOutcome::Failed { .. }));
    assert_eq!(factory.record("/radio.ogg").bytes.len(), 32);
    assert!(factory.record("/radio.mp3").bytes.is_empty());

    // La station continue
    assert!(matches!(
        station.play_once().await.unwrap(),
        Cycle::Played { .. }
    ));
}

#[tokio::test]
async fn test_empty_catalog_is_idle() {
    let (_dir, mut station, _factory, _scheduler) = station(0, mounts());
    assert!(matches!(station.play_once().await.unwrap(), Cycle::Idle));
}

#[tokio::test]
async fn test_run_stops_on_shutdown() {
    let (_dir, station, _factory, _scheduler) = station(0, mounts());
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let running = tokio::spawn(station.run(async {
        let _ = rx.await;
    }));
    tokio::time::sleep(Duration::from_millis(50)).await;
    tx.send(()).unwrap();

    tokio::time::timeout(Duration::from_secs(2), running)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_run_keeps_playing() {
    let (_dir, station, factory, scheduler) = station(4, vec![mounts().remove(0)]);
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let running = tokio::spawn(station.run(async {
        let _ = rx.await;
    }));

    for _ in 0..200 {
        if factory.record("/radio.ogg").bytes.len() >= 3 * 32 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tx.send(()).unwrap();
    running.await.unwrap().unwrap();

    let plays: u64 = scheduler
        .with_catalog(|c| c.list_tracks())
        .await
        .unwrap()
        .iter()
        .map(|t| t.playcount)
        .sum();
    assert!(plays >= 3);
}
