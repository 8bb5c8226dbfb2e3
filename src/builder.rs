use std::sync::Arc;

use tokio::runtime::{Builder, Handle, Runtime};
use tracing::info;

use crate::{
    Config, Engine, HookflowError, Result, StoreType,
    store::{DbStore, MemStore, PostgresStore, Store},
};

/// Builds the [`Engine`] and its store backend from a [`Config`].
#[derive(Default)]
pub struct EngineBuilder {
    config: Config,
    handle: Option<Handle>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(
        mut self,
        config: Config,
    ) -> Self {
        self.config = config;
        self
    }

    /// Runtime the postgres backend blocks on. Defaults to the current one.
    pub fn handle(
        mut self,
        handle: Handle,
    ) -> Self {
        self.handle = Some(handle);
        self
    }

    pub fn build(self) -> Result<Engine> {
        let store = Store::new();
        let db: Box<dyn DbStore> = match self.config.store.store_type {
            StoreType::Mem => Box::new(MemStore::new()),
            StoreType::Postgres => {
                let postgres = self.config.store.postgres.as_ref().ok_or_else(|| HookflowError::Config("[store.postgres] is required when store_type is postgres".to_string()))?;
                let handle = match self.handle {
                    Some(handle) => handle,
                    None => Handle::try_current().map_err(|e| HookflowError::Engine(format!("postgres store needs a tokio runtime: {}", e)))?,
                };
                Box::new(PostgresStore::new(&postgres.database_url, handle)?)
            }
        };
        db.init(&store)?;
        info!("store ready: {:?}", self.config.store.store_type);

        Ok(Engine::new(self.config, Arc::new(store)))
    }
}

/// Multi-threaded runtime sized by `async_worker_thread_number`.
pub fn build_runtime(config: &Config) -> Result<Runtime> {
    Builder::new_multi_thread()
        .worker_threads(config.async_worker_thread_number.into())
        .enable_all()
        .build()
        .map_err(|e| HookflowError::Engine(format!("failed to build tokio runtime: {}", e)))
}
