//! Supervision des workers de diffusion
//!
//! The pool dispatches each track to every worker and waits for all of
//! them. A worker whose task died is respawned from its descriptor before
//! the next dispatch.

use crate::mount::MountDescriptor;
use crate::sink::SinkFactory;
use crate::skip::SkipChannel;
use crate::worker::{BroadcastWorker, TrackJob, TrackOutcome, WorkerSettings, WorkerState};
use std::sync::Arc;
use tracing::{error, warn};

pub struct WorkerPool {
    workers: Vec<BroadcastWorker>,
    factory: Arc<dyn SinkFactory>,
    skip: SkipChannel,
    settings: WorkerSettings,
}

impl WorkerPool {
    pub fn spawn(
        descriptors: Vec<MountDescriptor>,
        factory: Arc<dyn SinkFactory>,
        skip: SkipChannel,
        settings: WorkerSettings,
    ) -> Self {
        let workers = descriptors
            .into_iter()
            .map(|d| BroadcastWorker::spawn(d, factory.clone(), &skip, settings.clone()))
            .collect();
        Self {
            workers,
            factory,
            skip,
            settings,
        }
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn skip(&self) -> &SkipChannel {
        &self.skip
    }

    /// Current state of each worker, by mount
    pub fn states(&self) -> Vec<(String, WorkerState)> {
        self.workers
            .iter()
            .map(|w| (w.descriptor().mount.clone(), w.state()))
            .collect()
    }

    fn respawn_dead(&mut self) {
        for worker in &mut self.workers {
            if worker.is_alive() {
                continue;
            }
            let descriptor = worker.descriptor().clone();
            warn!(mount = %descriptor, "Broadcast worker died, respawning");
            *worker = BroadcastWorker::spawn(
                descriptor,
                self.factory.clone(),
                &self.skip,
                self.settings.clone(),
            );
        }
    }

    /// Streams `job` on every mount and waits until all of them are done
    pub async fn play_all(&mut self, job: &TrackJob) -> Vec<(String, TrackOutcome)> {
        self.respawn_dead();

        let mut pending = Vec::with_capacity(self.workers.len());
        for worker in &self.workers {
            let mount = worker.descriptor().mount.clone();
            pending.push((mount, worker.play(job.clone()).await));
        }

        let mut outcomes = Vec::with_capacity(pending.len());
        for (mount, dispatched) in pending {
            let outcome = match dispatched {
                Ok(receiver) => receiver.await.unwrap_or_else(|_| TrackOutcome::Failed {
                    reason: "worker stopped during the track".to_string(),
                }),
                Err(err) => TrackOutcome::Failed {
                    reason: err.to_string(),
                },
            };
            if let TrackOutcome::Failed { reason } = &outcome {
                error!(mount = %mount, "Track failed on this mount: {}", reason);
            }
            outcomes.push((mount, outcome));
        }
        outcomes
    }

    pub async fn shutdown(self) {
        for worker in self.workers {
            worker.shutdown().await;
        }
    }
}
