//! `mkp usage report`: one reporting pass over every stored customer.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use mkp_config::ConfigMode;
use mkp_usage::{FixedUsage, ServiceControlClient, UsageReporter};

use super::prepare;

pub async fn usage_report(config_paths: Vec<String>) -> Result<()> {
    let p = prepare(&config_paths, ConfigMode::UsageReport)?;
    let usage = &p.settings.usage;

    let store = mkp_store::open_from_settings(&p.settings.store, &p.secrets).await?;
    let control = ServiceControlClient::from_settings(usage, &p.secrets)?;
    // Metric names always use the bare service name, even against staging.
    let metric_service = usage
        .service_name
        .clone()
        .context("usage.service_name is not set")?;

    let reporter = UsageReporter::new(
        store,
        Arc::new(control),
        Arc::new(FixedUsage(usage.units_per_report)),
        metric_service,
    );
    let summary = reporter.run_once(Utc::now()).await?;

    println!("reported={}", summary.reported);
    println!("skipped={}", summary.skipped);
    println!("rejected={}", summary.rejected);
    println!("failed={}", summary.failed);
    if summary.failed > 0 {
        anyhow::bail!("{} usage report(s) failed; see log", summary.failed);
    }
    Ok(())
}
