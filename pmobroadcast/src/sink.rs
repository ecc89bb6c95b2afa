//! Abstractions de sortie : une connexion active et sa fabrique

use crate::mount::MountDescriptor;
use crate::Result;
use async_trait::async_trait;

/// A live connection to a streaming destination
#[async_trait]
pub trait StreamSink: Send {
    async fn send(&mut self, chunk: &[u8]) -> Result<()>;

    /// Flushes buffered bytes to the destination
    async fn sync(&mut self) -> Result<()>;

    /// Pushes `Artist - Title` out of band
    async fn update_metadata(&mut self, song: &str) -> Result<()>;

    async fn close(&mut self) -> Result<()>;
}

/// Produces fresh connections from an immutable descriptor
#[async_trait]
pub trait SinkFactory: Send + Sync {
    async fn connect(&self, descriptor: &MountDescriptor) -> Result<Box<dyn StreamSink>>;
}
