//! Extension de pmoconfig pour le catalogue

use crate::catalog::{shared, SharedCatalog, SqliteCatalog};
use crate::Result;

/// Trait d'extension pour pmoconfig::Config
pub trait QueueConfigExt {
    /// Ouvre le catalogue SQLite désigné par `paths.database`
    fn open_catalog(&self) -> Result<SharedCatalog>;
}

impl QueueConfigExt for pmoconfig::Config {
    fn open_catalog(&self) -> Result<SharedCatalog> {
        let path = self.get_database_path()?;
        Ok(shared(SqliteCatalog::open(path)?))
    }
}
