//! Station Loop
//!
//! `dequeue → dispatch to every worker → wait for all → reset skip`, one
//! track at a time. The loop never dies from a worker failure or an empty
//! catalog: it logs and backs off.

use anyhow::Context;
use pmobroadcast::{
    BroadcastConfigExt, SinkFactory, SkipChannel, TrackJob, TrackOutcome, WorkerPool,
};
use pmoconfig::Config;
use pmoqueue::{library, QueueConfigExt, Scheduler, Track};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Result of one station cycle
#[derive(Debug)]
pub enum Cycle {
    /// Nothing to play: the catalog is empty
    Idle,
    Played {
        track: Track,
        outcomes: Vec<(String, TrackOutcome)>,
    },
}

pub struct Station {
    scheduler: Scheduler,
    pool: WorkerPool,
    skip: SkipChannel,
    music_dir: PathBuf,
    idle_backoff: Duration,
}

impl Station {
    pub fn new(
        scheduler: Scheduler,
        pool: WorkerPool,
        music_dir: impl Into<PathBuf>,
        idle_backoff: Duration,
    ) -> Self {
        let skip = pool.skip().clone();
        Self {
            scheduler,
            pool,
            skip,
            music_dir: music_dir.into(),
            idle_backoff,
        }
    }

    /// Opens the catalog, syncs the music directory and spawns the workers
    ///
    /// Only a catalog that cannot be opened is fatal.
    pub async fn from_config(config: &Config, factory: Arc<dyn SinkFactory>) -> anyhow::Result<Self> {
        let catalog = config
            .open_catalog()
            .context("Cannot open the track catalog")?;
        let scheduler = Scheduler::new(catalog);

        let music_dir = config.get_music_dir()?;
        if let Err(e) = scheduler.reload_library(&music_dir).await {
            warn!("Library reload failed: {}", e);
        }

        let mounts = config.mount_descriptors();
        for mount in &mounts {
            info!(mount = %mount, transcode = mount.transcode, "Output configured");
        }
        let pool = WorkerPool::spawn(mounts, factory, SkipChannel::new(), config.worker_settings());

        Ok(Self::new(
            scheduler,
            pool,
            music_dir,
            Duration::from_secs(config.get_station_idle_backoff_secs() as u64),
        ))
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Handle usable from other tasks to skip while `run` is active
    pub fn skip_channel(&self) -> SkipChannel {
        self.skip.clone()
    }

    /// Abandons the current track on every output
    pub fn skip(&self) {
        info!("Skip requested");
        self.skip.publish();
    }

    /// One full cycle: dequeue, stream on every mount, join, reset skip
    pub async fn play_once(&mut self) -> anyhow::Result<Cycle> {
        let Some(track) = self.scheduler.dequeue_next().await? else {
            return Ok(Cycle::Idle);
        };

        let job = TrackJob {
            path: library::track_path(&self.music_dir, &track),
            artist: track.artist.clone(),
            title: track.title.clone(),
            duration: Duration::from_secs(track.duration_secs),
        };
        // Un saut publié avant la diffusion ne vise pas cette piste
        self.skip.reset();
        let outcomes = self.pool.play_all(&job).await;
        self.skip.reset();

        Ok(Cycle::Played { track, outcomes })
    }

    /// Plays tracks until `shutdown` resolves
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> anyhow::Result<()> {
        tokio::pin!(shutdown);
        let idle_backoff = self.idle_backoff;
        info!("Station started with {} output(s)", self.pool.len());

        loop {
            let backoff = tokio::select! {
                _ = &mut shutdown => break,
                cycle = self.play_once() => match cycle {
                    Ok(Cycle::Played { .. }) => continue,
                    Ok(Cycle::Idle) => {
                        warn!("No track to play, retrying in {:?}", idle_backoff);
                        idle_backoff
                    }
                    Err(e) => {
                        error!("Station cycle failed: {:#}", e);
                        idle_backoff
                    }
                },
            };

            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(backoff) => {}
            }
        }

        info!("Station stopping");
        self.skip.publish();
        self.pool.shutdown().await;
        Ok(())
    }
}
