use std::sync::Arc;

use crate::config::AppConfig;
use crate::store::{CredentialStore, MemoryStore, PgStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn CredentialStore>,
}

impl AppState {
    /// Build state from the environment. The store backend is chosen here,
    /// once; handlers only ever see the `CredentialStore` contract.
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let store: Arc<dyn CredentialStore> = match &config.database_url {
            Some(url) => Arc::new(PgStore::connect(url).await?),
            None => {
                tracing::warn!("DATABASE_URL not set; using non-durable in-memory store");
                Arc::new(MemoryStore::new())
            }
        };
        Ok(Self { config, store })
    }

    pub fn with_store(config: AppConfig, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }
}
