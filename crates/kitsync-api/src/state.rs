use std::sync::Arc;

use kitsync_catalog::CatalogCache;

use crate::config::ServerConfig;
use crate::services::KitService;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub kits: KitService,
    pub catalog: CatalogCache,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(kits: KitService, catalog: CatalogCache, config: ServerConfig) -> Self {
        Self {
            kits,
            catalog,
            config: Arc::new(config),
        }
    }
}
