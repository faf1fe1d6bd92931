//! `mkp db migrate`.

use anyhow::{bail, Context, Result};
use mkp_config::{ConfigMode, StoreKind};
use mkp_store::PgStore;

use super::prepare;

pub async fn db_migrate(config_paths: Vec<String>) -> Result<()> {
    let p = prepare(&config_paths, ConfigMode::Inspect)?;
    if p.settings.store.kind != StoreKind::Postgres {
        bail!(
            "db migrate requires store.kind=postgres (configured: {})",
            p.settings.store.kind.as_str()
        );
    }
    // resolve_secrets guarantees this for the postgres store.
    let url = p
        .secrets
        .database_url
        .as_deref()
        .context("database url not resolved")?;

    let store = PgStore::connect(url).await?;
    store.migrate().await?;
    println!("migrations_applied=true config_hash={}", p.loaded.config_hash);
    Ok(())
}
