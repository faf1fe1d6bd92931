//! `mkp account reset`.

use anyhow::Result;
use mkp_config::ConfigMode;
use mkp_procurement::ProcurementClient;

use super::prepare;

pub async fn account_reset(config_paths: Vec<String>, account_id: &str) -> Result<()> {
    let p = prepare(&config_paths, ConfigMode::Reconcile)?;
    let client = ProcurementClient::from_settings(&p.settings.procurement, &p.secrets)?;
    client.reset_account(account_id).await?;
    println!("reset=true account_id={}", account_id);
    Ok(())
}
