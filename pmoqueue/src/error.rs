//! Types d'erreurs pour pmoqueue

/// Erreurs du catalogue et de l'ordonnanceur de file
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Track not found: {0}")]
    TrackNotFound(String),

    #[error("Queue entry not found: {0}")]
    QueueEntryNotFound(i64),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Unusable metadata for {path}: {reason}")]
    Metadata { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Type Result spécialisé pour pmoqueue
pub type Result<T> = std::result::Result<T, Error>;
