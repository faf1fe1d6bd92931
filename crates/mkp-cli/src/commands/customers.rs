//! `mkp customers list|show`.

use anyhow::{Context, Result};
use mkp_config::ConfigMode;

use super::prepare;

pub async fn customers_list(config_paths: Vec<String>) -> Result<()> {
    let p = prepare(&config_paths, ConfigMode::Inspect)?;
    let store = mkp_store::open_from_settings(&p.settings.store, &p.secrets).await?;

    let customers = store.list_all().await?;
    println!("count={}", customers.len());
    for c in customers {
        let products: Vec<String> = c
            .products
            .values()
            .map(|e| format!("{}:{}", e.product_id, e.plan_id))
            .collect();
        println!(
            "account_id={} internal_account_id={} products=[{}]",
            c.procurement_account_id,
            c.internal_account_id,
            products.join(",")
        );
    }
    Ok(())
}

pub async fn customers_show(config_paths: Vec<String>, account_id: &str) -> Result<()> {
    let p = prepare(&config_paths, ConfigMode::Inspect)?;
    let store = mkp_store::open_from_settings(&p.settings.store, &p.secrets).await?;

    let customer = store
        .read(account_id)
        .await?
        .with_context(|| format!("no customer for account '{account_id}'"))?;
    println!("{}", serde_json::to_string_pretty(&customer)?);
    Ok(())
}
