//! # pmoqueue - Catalogue, éligibilité des requêtes et file de diffusion
//!
//! Cette crate fournit le cœur de l'ordonnancement de PMORadio :
//! - Catalogue des morceaux (SQLite ou mémoire) derrière le trait [`Catalog`]
//! - Règles d'éligibilité des requêtes d'auditeurs (file pleine, déjà en file, cooldown)
//! - Remplissage pondéré de la file, proportionnel au nombre de requêtes
//! - Dépilement atomique du prochain morceau
//! - Synchronisation avec le répertoire musical et instantané « now playing »
//!
//! # Exemple d'utilisation
//!
//! ```no_run
//! use pmoqueue::{catalog::shared, Scheduler, SqliteCatalog};
//!
//! # #[tokio::main]
//! # async fn main() -> pmoqueue::Result<()> {
//! let scheduler = Scheduler::new(shared(SqliteCatalog::open("radio.db")?));
//! scheduler.reload_library("music").await?;
//!
//! while let Some(track) = scheduler.dequeue_next().await? {
//!     println!("Playing {}", track.display_title());
//! }
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod eligibility;
mod error;
mod humanize;
pub mod library;
mod model;
pub mod now_playing;
pub mod sampling;
pub mod scheduler;

#[cfg(feature = "pmoconfig")]
mod config_ext;

// Réexports publics
pub use catalog::{Catalog, MemoryCatalog, SharedCatalog, SqliteCatalog};
pub use eligibility::{eligibility, queue_state, COOLDOWN_SECS, QUEUE_CEILING};
pub use error::{Error, Result};
pub use humanize::humanize;
pub use library::{read_metadata, ReloadReport};
pub use model::{
    Eligibility, NewTrack, QueueEntry, QueueKind, QueueState, Track, TrackUpdate,
};
pub use now_playing::{NowPlaying, ScheduledTrack};
pub use scheduler::{fill_threshold, Scheduler};

#[cfg(feature = "pmoconfig")]
pub use config_ext::QueueConfigExt;
