use crate::db::store::{Connector, MemoryConnector, SharedStore, SharedStoreConnector, StoreError};
use dynamodel_config::{ConnectionConfig, Settings};
use std::{fmt, sync::Arc};

///
/// Connection
///
/// Settings plus the connector that turns an effective connection
/// configuration into a store handle. Models are built against one.
///

#[derive(Clone)]
pub struct Connection {
    connector: Arc<dyn Connector>,
    settings: Settings,
}

impl Connection {
    #[must_use]
    pub fn new(connector: Arc<dyn Connector>, settings: Settings) -> Self {
        Self {
            connector,
            settings,
        }
    }

    /// Every model resolves to `store`, whatever its connection.
    #[must_use]
    pub fn with_store(store: SharedStore) -> Self {
        Self::new(
            Arc::new(SharedStoreConnector::new(store)),
            Settings::default(),
        )
    }

    /// In-memory stores, one per effective connection.
    #[must_use]
    pub fn memory(settings: Settings) -> (Self, Arc<MemoryConnector>) {
        let connector = Arc::new(MemoryConnector::new());
        let conn = Self::new(Arc::clone(&connector) as Arc<dyn Connector>, settings);

        (conn, connector)
    }

    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Effective connection of a table: the table's own overrides merged
    /// over the configured defaults for that table name.
    #[must_use]
    pub fn effective(&self, table: &str, overrides: &ConnectionConfig) -> ConnectionConfig {
        overrides.merged_over(&self.settings.connection_for(table))
    }

    pub fn connect(&self, config: &ConnectionConfig) -> Result<SharedStore, StoreError> {
        self.connector.connect(config)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
