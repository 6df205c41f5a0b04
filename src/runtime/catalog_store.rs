use crate::domain::catalog::{Catalog, CatalogError, CatalogRecord};
use crate::runtime::defaults::builtin_catalog;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// The live catalog. Readers take a snapshot, writers swap in a new one.
#[derive(Debug, Clone, Default)]
pub struct CatalogStore {
    current: Arc<RwLock<Catalog>>,
}

impl CatalogStore {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            current: Arc::new(RwLock::new(catalog)),
        }
    }

    /// Loads from `path` when given, otherwise uses the built-in agents.
    pub async fn load(path: Option<&Path>) -> Result<Self, CatalogError> {
        let catalog = match path {
            Some(path) => {
                let catalog = Catalog::load_from_file(path).await?;
                info!(path = %path.display(), agents = catalog.len(), "Loaded catalog file");
                catalog
            }
            None => builtin_catalog(),
        };
        Ok(Self::new(catalog))
    }

    pub async fn snapshot(&self) -> Catalog {
        self.current.read().await.clone()
    }

    /// Appends a record. Fails without changing anything if the id is taken.
    pub async fn register(&self, record: CatalogRecord) -> Result<CatalogRecord, CatalogError> {
        let mut current = self.current.write().await;
        let next = current.with_record(record.clone())?;
        *current = next;
        info!(agent_id = %record.id, agents = current.len(), "Registered agent");
        Ok(record)
    }
}
