use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use kitsync_api::{build_router, AppState, KitService, ServerConfig};
use kitsync_catalog::{CacheConfig, CatalogCache, CatalogConfig, HttpCatalogSource};
use kitsync_core::{CatalogCacheRepository, EventBus, KitStore, SystemClock};
use kitsync_db::{Database, MemoryStore};

/// Install the global subscriber.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, rotated daily)
///   LOG_ANSI    - "true"/"false" override ANSI colors
///   RUST_LOG    - env filter (default: "kitsync_api=debug,kitsync_catalog=debug,tower_http=debug")
///
/// The returned guard must live as long as the process when file logging is on.
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");
    let json = log_format == "json";

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "kitsync_api=debug,kitsync_catalog=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    let guard = match log_file.as_deref() {
        Some(path) => {
            let path = std::path::Path::new(path);
            let dir = path.parent().unwrap_or(std::path::Path::new("."));
            let name = path
                .file_name()
                .and_then(|f| f.to_str())
                .unwrap_or("kitsync-api.log");
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, name));

            if json {
                registry
                    .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
                    .init();
            } else {
                registry
                    .with(
                        tracing_subscriber::fmt::layer()
                            .with_writer(writer)
                            .with_ansi(log_ansi.unwrap_or(false)),
                    )
                    .init();
            }
            Some(guard)
        }
        None => {
            if json {
                registry.with(tracing_subscriber::fmt::layer().json()).init();
            } else {
                let mut layer = tracing_subscriber::fmt::layer();
                if let Some(ansi) = log_ansi {
                    layer = layer.with_ansi(ansi);
                }
                registry.with(layer).init();
            }
            None
        }
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );
    guard
}

/// Kit store and catalog snapshot store, backed by the same database.
type Stores = (Arc<dyn KitStore>, Arc<dyn CatalogCacheRepository>);

async fn open_stores(config: &ServerConfig) -> anyhow::Result<Stores> {
    match config.database_url.as_deref() {
        Some(url) => {
            let db = Arc::new(Database::connect(url, &config.db_pool).await?);
            db.migrate().await?;
            info!(subsystem = "db", "Connected to Postgres, schema up to date");
            let kits: Arc<dyn KitStore> = db.clone();
            let catalog: Arc<dyn CatalogCacheRepository> = db;
            Ok((kits, catalog))
        }
        None => {
            warn!(
                subsystem = "db",
                "DATABASE_URL not set, using in-memory store (state is lost on restart)"
            );
            let memory = Arc::new(MemoryStore::new());
            let kits: Arc<dyn KitStore> = memory.clone();
            let catalog: Arc<dyn CatalogCacheRepository> = memory;
            Ok((kits, catalog))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = init_logging();

    let config = ServerConfig::from_env()?;
    let (store, catalog_store) = open_stores(&config).await?;

    let kits = KitService::new(store, EventBus::default());
    if config.migrate_on_startup {
        let upgraded = kits.migrate_stored_kits().await?;
        info!(result_count = upgraded, "Startup kit upgrade pass complete");
    }

    let catalog = CatalogCache::new(
        catalog_store,
        Arc::new(HttpCatalogSource::new(CatalogConfig::from_env())),
        Arc::new(SystemClock),
        CacheConfig::from_env(),
    );

    let addr: SocketAddr = config.bind_addr().parse()?;
    let app = build_router(AppState::new(kits, catalog, config));

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
