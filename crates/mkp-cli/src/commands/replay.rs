//! `mkp replay`: run one message body through the reconciler.
//!
//! Uses the configured record store and the live Procurement API, so a
//! replay has the same effects as a daemon delivery.

use std::sync::Arc;

use anyhow::Result;
use mkp_config::ConfigMode;
use mkp_procurement::{ProcurementApi, ProcurementClient};
use mkp_reconcile::{Disposition, ReconcilePolicy, Reconciler};

use super::{load_payload, prepare};

pub async fn replay(
    config_paths: Vec<String>,
    payload: Option<String>,
    payload_file: Option<String>,
) -> Result<()> {
    let body = load_payload(payload, payload_file)?;
    let p = prepare(&config_paths, ConfigMode::Reconcile)?;

    let store = mkp_store::open_from_settings(&p.settings.store, &p.secrets).await?;
    let procurement: Arc<dyn ProcurementApi> =
        Arc::new(ProcurementClient::from_settings(&p.settings.procurement, &p.secrets)?);
    let policy = ReconcilePolicy::from_settings(&p.settings.reconcile)?;
    let reconciler = Reconciler::new(store, procurement).with_policy(policy);

    let Some(outcome) = reconciler.handle_payload(&body).await? else {
        println!("disposition=ack action=empty_payload");
        return Ok(());
    };

    println!("event_id={}", outcome.event_id.as_deref().unwrap_or(""));
    println!("event_type={}", outcome.event_type);
    println!("subject={} id={}", outcome.subject_kind, outcome.subject_id);
    match &outcome.disposition {
        Disposition::Ack(action) => println!("disposition=ack action={}", action.as_str()),
        Disposition::Defer(reason) => println!("disposition=defer reason={}", reason),
    }
    Ok(())
}
