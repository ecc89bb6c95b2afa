//! Sortie en mémoire
//!
//! Records what each mount received instead of talking to a server, and
//! injects send failures, refused connections and mid-track skips. Only
//! built for tests and with the `test-utils` feature.

use crate::mount::MountDescriptor;
use crate::sink::{SinkFactory, StreamSink};
use crate::skip::SkipChannel;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

/// What one mount received
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountRecord {
    pub bytes: Vec<u8>,
    pub chunks: usize,
    pub metadata: Vec<String>,
    pub connects: usize,
    pub closes: usize,
}

#[derive(Default)]
struct MemoryState {
    mounts: HashMap<String, MountRecord>,
    failing_sends: usize,
    refuse_connects: bool,
    skip_after: HashMap<String, (usize, SkipChannel)>,
}

/// Factory of in-memory sinks sharing one record book
#[derive(Clone, Default)]
pub struct MemoryFactory {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` sends, on any mount, fail with a broken pipe
    pub fn fail_next_sends(&self, n: usize) {
        self.state.lock().unwrap().failing_sends = n;
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.state.lock().unwrap().refuse_connects = refuse;
    }

    /// Publishes `skip` right after `mount` received its `n`-th chunk
    pub fn skip_after_chunks(&self, mount: &str, n: usize, skip: &SkipChannel) {
        self.state
            .lock()
            .unwrap()
            .skip_after
            .insert(mount.to_string(), (n, skip.clone()));
    }

    pub fn record(&self, mount: &str) -> MountRecord {
        self.state
            .lock()
            .unwrap()
            .mounts
            .get(mount)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl SinkFactory for MemoryFactory {
    async fn connect(&self, descriptor: &MountDescriptor) -> Result<Box<dyn StreamSink>> {
        let mut state = self.state.lock().unwrap();
        if state.refuse_connects {
            return Err(Error::Connect {
                addr: descriptor.addr(),
                source: io::ErrorKind::ConnectionRefused.into(),
            });
        }
        state
            .mounts
            .entry(descriptor.mount.clone())
            .or_default()
            .connects += 1;
        Ok(Box::new(MemorySink {
            mount: descriptor.mount.clone(),
            state: self.state.clone(),
        }))
    }
}

struct MemorySink {
    mount: String,
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySink {
    fn with_record<T>(&self, f: impl FnOnce(&mut MountRecord) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        f(state.mounts.entry(self.mount.clone()).or_default())
    }
}

#[async_trait]
impl StreamSink for MemorySink {
    async fn send(&mut self, chunk: &[u8]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.failing_sends > 0 {
            state.failing_sends -= 1;
            return Err(Error::Send(io::ErrorKind::BrokenPipe.into()));
        }

        let record = state.mounts.entry(self.mount.clone()).or_default();
        record.bytes.extend_from_slice(chunk);
        record.chunks += 1;
        let chunks = record.chunks;

        if let Some((n, skip)) = state.skip_after.get(&self.mount) {
            if chunks == *n {
                skip.publish();
            }
        }
        Ok(())
    }

    async fn sync(&mut self) -> Result<()> {
        Ok(())
    }

    async fn update_metadata(&mut self, song: &str) -> Result<()> {
        self.with_record(|r| r.metadata.push(song.to_string()));
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.with_record(|r| r.closes += 1);
        Ok(())
    }
}
