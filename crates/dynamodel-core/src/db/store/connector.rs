use crate::db::store::{MemoryStore, SharedStore, StoreError};
use dynamodel_config::ConnectionConfig;
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, PoisonError},
};

///
/// Connector
///
/// Resolves an effective connection configuration to a store handle.
/// Models with different effective connections get different handles.
///

pub trait Connector: Send + Sync {
    fn connect(&self, config: &ConnectionConfig) -> Result<SharedStore, StoreError>;
}

///
/// MemoryConnector
/// One in-memory store per distinct connection configuration.
///

#[derive(Debug, Default)]
pub struct MemoryConnector {
    stores: Mutex<BTreeMap<ConnectionConfig, Arc<MemoryStore>>>,
    page_size_bytes: Option<usize>,
}

impl MemoryConnector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Page byte budget applied to every store this connector creates.
    #[must_use]
    pub const fn with_page_size(mut self, bytes: usize) -> Self {
        self.page_size_bytes = Some(bytes);
        self
    }

    /// The store serving `config`, created on first use.
    #[must_use]
    pub fn store_for(&self, config: &ConnectionConfig) -> Arc<MemoryStore> {
        let mut stores = self.stores.lock().unwrap_or_else(PoisonError::into_inner);

        let store = stores.entry(config.clone()).or_insert_with(|| {
            let store = match self.page_size_bytes {
                Some(bytes) => MemoryStore::new().with_page_size(bytes),
                None => MemoryStore::new(),
            };
            Arc::new(store)
        });

        Arc::clone(store)
    }

    /// Connections resolved so far.
    #[must_use]
    pub fn connections(&self) -> Vec<ConnectionConfig> {
        let stores = self.stores.lock().unwrap_or_else(PoisonError::into_inner);

        stores.keys().cloned().collect()
    }
}

impl Connector for MemoryConnector {
    fn connect(&self, config: &ConnectionConfig) -> Result<SharedStore, StoreError> {
        let store: SharedStore = self.store_for(config);

        Ok(store)
    }
}

///
/// SharedStoreConnector
/// Resolves every connection to one existing store.
///

#[derive(Clone)]
pub struct SharedStoreConnector {
    store: SharedStore,
}

impl SharedStoreConnector {
    #[must_use]
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }
}

impl Connector for SharedStoreConnector {
    fn connect(&self, _config: &ConnectionConfig) -> Result<SharedStore, StoreError> {
        Ok(Arc::clone(&self.store))
    }
}
