pub mod app_config;
pub mod credentials;
pub mod database;
pub mod memory;
pub mod pg_store;

use std::sync::Arc;
use tracing::info;

use vaxbook_core::{Authenticator, BookingStore};

pub use app_config::{Config, StoreBackend};
pub use database::DbClient;
pub use memory::InMemoryStore;
pub use pg_store::{PgAuthenticator, PgBookingStore};

/// The two handles the booking engine is built from.
#[derive(Clone)]
pub struct Backends {
    pub store: Arc<dyn BookingStore>,
    pub auth: Arc<dyn Authenticator>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreInitError {
    #[error("Database connection failed: {0}")]
    Connect(#[from] sqlx::Error),
    #[error("Database migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Connect the configured backend, running migrations when asked to.
pub async fn open(config: &Config) -> Result<Backends, StoreInitError> {
    match config.store.backend {
        StoreBackend::Postgres => {
            let db = DbClient::new(&config.database).await?;
            if config.database.run_migrations {
                db.migrate().await?;
            }
            info!("Connected to Postgres store");
            Ok(Backends {
                store: Arc::new(PgBookingStore::new(db.pool.clone())),
                auth: Arc::new(PgAuthenticator::new(db.pool, config.auth.hash_iterations)),
            })
        }
        StoreBackend::Memory => {
            info!("Using in-memory store; nothing will be persisted");
            let store = Arc::new(InMemoryStore::with_hash_iterations(config.auth.hash_iterations));
            Ok(Backends {
                store: store.clone(),
                auth: store,
            })
        }
    }
}
