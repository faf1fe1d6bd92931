use std::sync::Arc;

use chrono::{DateTime, Utc};
use mkp_schemas::{Customer, ProductEntitlement};
use mkp_store::{AccountLocks, RecordStore};
use serde::Serialize;
use tracing::{info, warn};

use crate::{metric_name, report_timestamp, ServiceControl, UsageError, UsageOperation, UsageSource};

/// Counts from one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UsageSummary {
    /// Reported and cursor advanced.
    pub reported: usize,
    /// No consumer id, or the entry changed or vanished before the cursor write.
    pub skipped: usize,
    /// Check returned errors; nothing reported.
    pub rejected: usize,
    /// A service-control or store call failed.
    pub failed: usize,
}

pub struct UsageReporter {
    store: Arc<dyn RecordStore>,
    control: Arc<dyn ServiceControl>,
    source: Arc<dyn UsageSource>,
    locks: AccountLocks,
    /// Bare service name used in metric names.
    metric_service_name: String,
}

impl UsageReporter {
    pub fn new(
        store: Arc<dyn RecordStore>,
        control: Arc<dyn ServiceControl>,
        source: Arc<dyn UsageSource>,
        metric_service_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            control,
            source,
            locks: AccountLocks::new(),
            metric_service_name: metric_service_name.into(),
        }
    }

    /// Share locks with a reconciler writing the same store in this process.
    pub fn with_locks(mut self, locks: AccountLocks) -> Self {
        self.locks = locks;
        self
    }

    /// Report one window per usage-reporting product, ending at `now`.
    ///
    /// Per-product failures are counted and logged; only failing to
    /// enumerate the store aborts the run.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<UsageSummary, UsageError> {
        let end_time = report_timestamp(now);
        let mut summary = UsageSummary::default();

        for customer in self.store.list_all().await? {
            for product in customer.products.values() {
                let Some(consumer_id) = product.consumer_id.as_deref().filter(|c| !c.is_empty())
                else {
                    summary.skipped += 1;
                    continue;
                };

                match self
                    .report_product(&customer, product, consumer_id, &end_time)
                    .await
                {
                    Ok(Outcome::Reported) => summary.reported += 1,
                    Ok(Outcome::Rejected) => summary.rejected += 1,
                    Ok(Outcome::Stale) => summary.skipped += 1,
                    Err(e) => {
                        warn!(
                            account_id = %customer.procurement_account_id,
                            product_id = %product.product_id,
                            error = %e,
                            "usage report failed"
                        );
                        summary.failed += 1;
                    }
                }
            }
        }

        info!(
            reported = summary.reported,
            skipped = summary.skipped,
            rejected = summary.rejected,
            failed = summary.failed,
            end_time = %end_time,
            "usage report run complete"
        );
        Ok(summary)
    }

    async fn report_product(
        &self,
        customer: &Customer,
        product: &ProductEntitlement,
        consumer_id: &str,
        end_time: &str,
    ) -> Result<Outcome, UsageError> {
        let start_time = product.usage_window_start();
        let value = self
            .source
            .usage_for(customer, product, start_time, end_time);
        let operation = UsageOperation::new(
            consumer_id,
            start_time,
            end_time,
            metric_name(&self.metric_service_name, &product.plan_id),
            value,
        );

        let check_errors = self.control.check(&operation).await?;
        if !check_errors.is_empty() {
            warn!(
                account_id = %customer.procurement_account_id,
                product_id = %product.product_id,
                check_errors = ?check_errors,
                "usage check rejected operation"
            );
            return Ok(Outcome::Rejected);
        }

        self.control.report(&operation).await?;

        // Re-read under the account lock: a reconciliation may have replaced
        // the record since it was listed.
        let _guard = self.locks.acquire(&customer.procurement_account_id).await;
        let Some(mut current) = self.store.read(&customer.procurement_account_id).await? else {
            return Ok(Outcome::Stale);
        };
        let Some(entry) = current.products.get_mut(&product.product_id) else {
            return Ok(Outcome::Stale);
        };
        if entry.start_time != product.start_time {
            return Ok(Outcome::Stale);
        }
        entry.last_report_time = Some(end_time.to_string());
        self.store.write(&current).await?;

        info!(
            account_id = %customer.procurement_account_id,
            product_id = %product.product_id,
            start_time = %start_time,
            end_time = %end_time,
            value,
            "usage reported"
        );
        Ok(Outcome::Reported)
    }
}

enum Outcome {
    Reported,
    Rejected,
    Stale,
}
