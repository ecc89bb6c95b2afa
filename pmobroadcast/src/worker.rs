//! Broadcast Worker
//!
//! One long-lived tokio task per mount. The task owns its connection and
//! receives tracks through a command channel; the caller gets the outcome
//! of each track back on a oneshot channel.
//!
//! States: `Disconnected → Connecting → Streaming → (Skipped | Finished | Error)`.
//! A broken connection is reset and the chunk resent, a bounded number of
//! times; past that bound the track is abandoned for this mount only.

use crate::mount::MountDescriptor;
use crate::pacer::Pacer;
use crate::sink::{SinkFactory, StreamSink};
use crate::skip::{SkipChannel, SkipSignal};
use crate::source::AudioSource;
use crate::{Error, Result};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

const BACKOFF_MULTIPLIER: u32 = 2;
const BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Runtime parameters shared by every worker
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub chunk_size: usize,
    /// Connection resets attempted before a track is abandoned
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub ffmpeg: PathBuf,
    /// Keep sending at the stream's real-time rate
    pub pace: bool,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            chunk_size: 4096,
            max_retries: 5,
            retry_delay: Duration::from_secs(3),
            ffmpeg: PathBuf::from("ffmpeg"),
            pace: true,
        }
    }
}

/// A track handed to the workers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackJob {
    pub path: PathBuf,
    pub artist: String,
    pub title: String,
    pub duration: Duration,
}

impl TrackJob {
    pub fn song(&self) -> String {
        format!("{} - {}", self.artist, self.title)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Disconnected,
    Connecting,
    Streaming,
    Skipped,
    Finished,
    Error,
}

impl WorkerState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkerState::Skipped | WorkerState::Finished | WorkerState::Error
        )
    }
}

/// How one worker ended one track
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackOutcome {
    Finished { bytes: u64, elapsed: Duration },
    Skipped { bytes: u64, elapsed: Duration },
    Failed { reason: String },
}

#[derive(Debug)]
enum WorkerCommand {
    Play {
        job: TrackJob,
        done: oneshot::Sender<TrackOutcome>,
    },
    Shutdown,
}

/// Handle to the spawned worker task
pub struct BroadcastWorker {
    descriptor: MountDescriptor,
    tx: mpsc::Sender<WorkerCommand>,
    state: watch::Receiver<WorkerState>,
    join_handle: JoinHandle<()>,
}

impl BroadcastWorker {
    pub fn spawn(
        descriptor: MountDescriptor,
        factory: Arc<dyn SinkFactory>,
        skip: &SkipChannel,
        settings: WorkerSettings,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel(4);
        let (state_tx, state_rx) = watch::channel(WorkerState::Disconnected);

        let mut task = WorkerTask {
            descriptor: descriptor.clone(),
            factory,
            settings,
            skip: skip.subscribe(),
            sink: None,
            state: state_tx,
        };

        let join_handle = tokio::spawn(async move {
            info!(mount = %task.descriptor, "Starting broadcast worker");

            match task.ensure_connected().await {
                Ok(false) => {}
                Ok(true) => debug!(mount = %task.descriptor, "Skip raised, connecting on next track"),
                Err(err) => warn!(mount = %task.descriptor, "Initial connection failed: {}", err),
            }

            while let Some(cmd) = rx.recv().await {
                match cmd {
                    WorkerCommand::Play { job, done } => {
                        let outcome = task.play(&job).await;
                        if done.send(outcome).is_err() {
                            debug!(mount = %task.descriptor, "Track outcome dropped by caller");
                        }
                    }
                    WorkerCommand::Shutdown => break,
                }
            }

            task.disconnect().await;
            info!(mount = %task.descriptor, "Broadcast worker stopped");
        });

        Self {
            descriptor,
            tx,
            state: state_rx,
            join_handle,
        }
    }

    pub fn descriptor(&self) -> &MountDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<WorkerState> {
        self.state.clone()
    }

    /// `false` once the task has returned or panicked
    pub fn is_alive(&self) -> bool {
        !self.join_handle.is_finished()
    }

    /// Queues a track; the receiver yields its outcome
    pub async fn play(&self, job: TrackJob) -> Result<oneshot::Receiver<TrackOutcome>> {
        let (done, outcome) = oneshot::channel();
        self.tx
            .send(WorkerCommand::Play { job, done })
            .await
            .map_err(|_| Error::WorkerGone(self.descriptor.mount.clone()))?;
        Ok(outcome)
    }

    pub async fn shutdown(self) {
        // Canal fermé : la tâche est déjà terminée
        let _ = self.tx.send(WorkerCommand::Shutdown).await;
        if let Err(err) = self.join_handle.await {
            warn!(mount = %self.descriptor, "Broadcast worker ended abnormally: {}", err);
        }
    }
}

struct BackoffState {
    initial: Duration,
    current: Option<Duration>,
}

impl BackoffState {
    fn new(initial: Duration) -> Self {
        Self {
            initial,
            current: None,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let next = match self.current {
            Some(current) => (current * BACKOFF_MULTIPLIER).min(BACKOFF_MAX),
            None => self.initial,
        };
        self.current = Some(next);
        next
    }
}

struct WorkerTask {
    descriptor: MountDescriptor,
    factory: Arc<dyn SinkFactory>,
    settings: WorkerSettings,
    skip: SkipSignal,
    sink: Option<Box<dyn StreamSink>>,
    state: watch::Sender<WorkerState>,
}

impl WorkerTask {
    fn set_state(&self, state: WorkerState) {
        self.state.send_replace(state);
    }

    /// `Ok(true)` : un saut a interrompu la connexion
    async fn connect_once(&mut self) -> Result<bool> {
        self.set_state(WorkerState::Connecting);
        let attempt = tokio::select! {
            biased;
            _ = self.skip.raised() => None,
            result = self.factory.connect(&self.descriptor) => Some(result),
        };
        match attempt {
            Some(Ok(sink)) => {
                self.sink = Some(sink);
                Ok(false)
            }
            Some(Err(err)) => {
                self.set_state(WorkerState::Disconnected);
                Err(err)
            }
            None => {
                self.set_state(WorkerState::Disconnected);
                Ok(true)
            }
        }
    }

    /// Waits out a backoff delay; `true` if a skip cut it short
    async fn backoff_or_skip(&mut self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.skip.raised() => true,
            _ = tokio::time::sleep(delay) => false,
        }
    }

    /// `Ok(true)` when a skip arrived before the connection was up
    async fn ensure_connected(&mut self) -> Result<bool> {
        if self.sink.is_some() {
            return Ok(false);
        }

        let mut backoff = BackoffState::new(self.settings.retry_delay);
        let mut attempt = 0;
        loop {
            match self.connect_once().await {
                Ok(skipped) => return Ok(skipped),
                Err(err) if attempt < self.settings.max_retries => {
                    attempt += 1;
                    let delay = backoff.next_delay();
                    warn!(
                        mount = %self.descriptor,
                        attempt,
                        "Connection failed: {}, retrying in {:?}",
                        err,
                        delay
                    );
                    if self.backoff_or_skip(delay).await {
                        return Ok(true);
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn disconnect(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            if let Err(err) = sink.close().await {
                debug!(mount = %self.descriptor, "Close failed: {}", err);
            }
        }
        self.set_state(WorkerState::Disconnected);
    }

    /// Sends one chunk, resetting the connection on failure
    ///
    /// Returns `Ok(true)` if a skip arrived while the connection was being reset.
    async fn send_with_retry(&mut self, chunk: &[u8]) -> Result<bool> {
        let mut backoff = BackoffState::new(self.settings.retry_delay);
        let mut attempt = 0;
        loop {
            let result = match self.sink.as_mut() {
                Some(sink) => match sink.send(chunk).await {
                    Ok(()) => sink.sync().await,
                    Err(err) => Err(err),
                },
                None => Err(Error::Send(io::Error::new(
                    io::ErrorKind::NotConnected,
                    "no connection",
                ))),
            };

            match result {
                Ok(()) => return Ok(false),
                Err(err) if attempt >= self.settings.max_retries => return Err(err),
                Err(err) => {
                    attempt += 1;
                    warn!(
                        mount = %self.descriptor,
                        attempt,
                        "Send failed: {}, resetting connection",
                        err
                    );
                    self.disconnect().await;
                    if self.backoff_or_skip(backoff.next_delay()).await {
                        return Ok(true);
                    }
                    match self.connect_once().await {
                        Ok(true) => return Ok(true),
                        Ok(false) => self.set_state(WorkerState::Streaming),
                        Err(err) => warn!(mount = %self.descriptor, "Reconnect failed: {}", err),
                    }
                }
            }
        }
    }

    fn fail(&self, reason: String) -> TrackOutcome {
        error!(mount = %self.descriptor, "Track abandoned: {}", reason);
        self.set_state(WorkerState::Error);
        TrackOutcome::Failed { reason }
    }

    fn skipped(&self, job: &TrackJob, bytes: u64, elapsed: Duration) -> TrackOutcome {
        info!(mount = %self.descriptor, "Skipped {}", job.song());
        self.set_state(WorkerState::Skipped);
        TrackOutcome::Skipped { bytes, elapsed }
    }

    async fn play(&mut self, job: &TrackJob) -> TrackOutcome {
        let started = Instant::now();

        match self.ensure_connected().await {
            Ok(false) => {}
            Ok(true) => return self.skipped(job, 0, started.elapsed()),
            Err(err) => return self.fail(format!("cannot connect: {}", err)),
        }

        if self.descriptor.format.needs_metadata_update() {
            if let Some(sink) = self.sink.as_mut() {
                if let Err(err) = sink.update_metadata(&job.song()).await {
                    warn!(mount = %self.descriptor, "{}", err);
                }
            }
        }

        let mut source =
            match AudioSource::open(&self.descriptor, &self.settings.ffmpeg, &job.path).await {
                Ok(source) => source,
                Err(err) => {
                    return self.fail(format!("cannot open {}: {}", job.path.display(), err))
                }
            };

        info!(mount = %self.descriptor, "Streaming {}", job.song());
        self.set_state(WorkerState::Streaming);

        let mut pacer = pacer_for(&self.descriptor, &self.settings, job).await;
        let mut buf = vec![0u8; self.settings.chunk_size.max(1)];
        let mut sent: u64 = 0;

        // Ok(true) : saut demandé
        let result: Result<bool> = loop {
            if self.skip.is_set() {
                break Ok(true);
            }
            let n = match source.read(&mut buf).await {
                Ok(0) => break Ok(false),
                Ok(n) => n,
                Err(err) => break Err(err),
            };
            match self.send_with_retry(&buf[..n]).await {
                Ok(false) => {}
                Ok(true) => break Ok(true),
                Err(err) => break Err(err),
            }
            sent += n as u64;
            pacer.record(n);
            pacer.wait(&mut self.skip).await;
        };

        let elapsed = started.elapsed();
        let secs = elapsed.as_secs_f64();
        let kbps = if secs > 0.0 {
            sent as f64 * 8.0 / 1000.0 / secs
        } else {
            0.0
        };
        info!(
            mount = %self.descriptor,
            "Sent {} bytes in {:.1} seconds ({:.0} kbps)",
            sent,
            secs,
            kbps
        );

        match result {
            Ok(true) => {
                if let Err(err) = source.finish(false).await {
                    debug!(mount = %self.descriptor, "{}", err);
                }
                self.skipped(job, sent, elapsed)
            }
            Ok(false) => match source.finish(true).await {
                Ok(()) => {
                    self.set_state(WorkerState::Finished);
                    TrackOutcome::Finished {
                        bytes: sent,
                        elapsed,
                    }
                }
                Err(err) => self.fail(err.to_string()),
            },
            Err(err) => {
                if let Err(finish_err) = source.finish(false).await {
                    debug!(mount = %self.descriptor, "{}", finish_err);
                }
                self.disconnect().await;
                self.fail(err.to_string())
            }
        }
    }
}

/// Real-time rate for one track on one mount
async fn pacer_for(
    descriptor: &MountDescriptor,
    settings: &WorkerSettings,
    job: &TrackJob,
) -> Pacer {
    if !settings.pace {
        return Pacer::new(None);
    }
    if descriptor.transcode {
        return Pacer::for_bitrate(
            descriptor
                .bitrate_kbps
                .unwrap_or(crate::source::DEFAULT_TRANSCODE_KBPS),
        );
    }
    match tokio::fs::metadata(&job.path).await {
        Ok(meta) => Pacer::for_file(meta.len(), job.duration),
        Err(_) => Pacer::new(None),
    }
}
