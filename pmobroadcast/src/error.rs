//! Types d'erreurs pour pmobroadcast

/// Erreurs des connexions source et des workers de diffusion
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Cannot connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Source refused by server (status {status})")]
    Handshake { status: u16 },

    #[error("Send failed: {0}")]
    Send(#[source] std::io::Error),

    #[error("Metadata update failed: {0}")]
    Metadata(String),

    #[error("Transcoder error: {0}")]
    Transcoder(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker for {0} is gone")]
    WorkerGone(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Type Result spécialisé pour pmobroadcast
pub type Result<T> = std::result::Result<T, Error>;
