//! mkp-store
//!
//! Durable keyed storage for [`Customer`] records.
//!
//! Contract every backend honours:
//! - `read` of a missing key is `Ok(None)`, never an error.
//! - `write` is a full-record replace, durable before it returns, idempotent.
//! - `delete` of a missing key is `Ok(())`.
//! - `list_all` order is unspecified.
//! - A failed `write`/`delete` leaves the previous durable state intact.
//!
//! Backends are not responsible for read-modify-write atomicity across calls;
//! callers serialize per account with [`AccountLocks`].

mod json_file;
mod locks;
mod memory;
mod postgres;

pub use json_file::JsonFileStore;
pub use locks::{AccountGuard, AccountLocks};
pub use memory::MemoryStore;
pub use postgres::PgStore;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use mkp_config::{ResolvedSecrets, StoreKind};
use mkp_config::settings::StoreSettings;
use mkp_schemas::Customer;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store io failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("store codec failed: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("store database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("store misconfigured: {0}")]
    Config(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Keyed Customer storage. Keys are `procurement_account_id`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn read(&self, procurement_account_id: &str) -> Result<Option<Customer>, StoreError>;

    /// Replace the record stored under `customer.procurement_account_id`.
    async fn write(&self, customer: &Customer) -> Result<(), StoreError>;

    async fn delete(&self, procurement_account_id: &str) -> Result<(), StoreError>;

    async fn list_all(&self) -> Result<Vec<Customer>, StoreError>;

    /// Short backend label for logs and status output.
    fn kind(&self) -> &'static str;
}

/// Open the backend selected by `/store/kind`.
///
/// The Postgres backend runs embedded migrations before returning.
pub async fn open_from_settings(
    settings: &StoreSettings,
    secrets: &ResolvedSecrets,
) -> Result<Arc<dyn RecordStore>, StoreError> {
    let store: Arc<dyn RecordStore> = match settings.kind {
        StoreKind::Memory => Arc::new(MemoryStore::new()),
        StoreKind::JsonFile => Arc::new(JsonFileStore::open(&settings.path)?),
        StoreKind::Postgres => {
            let url = secrets.database_url.as_deref().ok_or_else(|| {
                StoreError::Config("store.kind=postgres but no database url resolved".to_string())
            })?;
            let store = PgStore::connect(url).await?;
            store.migrate().await?;
            Arc::new(store)
        }
    };
    tracing::info!(kind = store.kind(), "record store opened");
    Ok(store)
}
