//! # pmobroadcast - Workers de diffusion Icecast
//!
//! Chaque point de montage est servi par un worker indépendant :
//! - Connexion source Icecast persistante, recréée depuis un descripteur immuable
//! - Transcodage optionnel via un sous-processus ffmpeg
//! - Signal de saut partagé, vérifié avant chaque bloc envoyé
//! - Reprise bornée sur coupure de connexion
//! - Supervision : un worker mort est relancé avant la piste suivante
//!
//! # Exemple d'utilisation
//!
//! ```no_run
//! use pmobroadcast::{
//!     IcecastFactory, MountDescriptor, SkipChannel, StreamFormat, TrackJob, WorkerPool,
//!     WorkerSettings,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> pmobroadcast::Result<()> {
//! let ogg = MountDescriptor::new("localhost", 8000, "/radio", StreamFormat::Ogg)
//!     .with_credentials("source", "hackme");
//! let mut pool = WorkerPool::spawn(
//!     vec![ogg],
//!     Arc::new(IcecastFactory::new()?),
//!     SkipChannel::new(),
//!     WorkerSettings::default(),
//! );
//!
//! let job = TrackJob {
//!     path: "music/lithium.ogg".into(),
//!     artist: "Nirvana".into(),
//!     title: "Lithium".into(),
//!     duration: Duration::from_secs(257),
//! };
//! for (mount, outcome) in pool.play_all(&job).await {
//!     println!("{mount}: {outcome:?}");
//! }
//! # Ok(())
//! # }
//! ```

mod error;
pub mod icecast;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
mod mount;
pub mod pacer;
mod pool;
pub mod sink;
mod skip;
pub mod source;
pub mod transcoder;
pub mod worker;

#[cfg(feature = "pmoconfig")]
mod config_ext;

// Réexports publics
pub use error::{Error, Result};
pub use icecast::{IcecastConnection, IcecastFactory};
#[cfg(any(test, feature = "test-utils"))]
pub use memory::{MemoryFactory, MountRecord};
pub use mount::{MountDescriptor, StreamFormat};
pub use pool::WorkerPool;
pub use sink::{SinkFactory, StreamSink};
pub use skip::{SkipChannel, SkipSignal};
pub use worker::{BroadcastWorker, TrackJob, TrackOutcome, WorkerSettings, WorkerState};

#[cfg(feature = "pmoconfig")]
pub use config_ext::BroadcastConfigExt;
