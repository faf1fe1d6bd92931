//! mkp-usage
//!
//! Usage-reporting batch job.
//!
//! For every stored product entry that carries a consumer id, build one
//! usage operation covering `[last_report_time or start_time, now]`, check it
//! with service control, report it, and advance `last_report_time` to the
//! window end. The only writer of `last_report_time`.
//!
//! How much usage to report is pluggable ([`UsageSource`]); the default
//! reports a fixed value.

mod control;
mod job;
mod operation;

pub use control::{ServiceControl, ServiceControlClient};
pub use job::{UsageReporter, UsageSummary};
pub use operation::{
    metric_name, report_timestamp, CheckError, MetricValue, MetricValueSet, UsageOperation,
};

use mkp_schemas::{Customer, ProductEntitlement};
use mkp_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    #[error("service control transport error during {op}: {source}")]
    Transport {
        op: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("service control http error during {op}: status={status} body={body}")]
    Status {
        op: &'static str,
        status: u16,
        body: String,
    },
    #[error("service control response decode failed during {op}: {source}")]
    Decode {
        op: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("service control rejected report: {0}")]
    ReportRejected(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("usage job misconfigured: {0}")]
    Config(String),
}

/// Amount of usage to report for one product over one window.
pub trait UsageSource: Send + Sync {
    fn usage_for(
        &self,
        customer: &Customer,
        product: &ProductEntitlement,
        start_time: &str,
        end_time: &str,
    ) -> i64;
}

/// Reports the same amount for every window.
#[derive(Debug, Clone, Copy)]
pub struct FixedUsage(pub i64);

impl Default for FixedUsage {
    fn default() -> Self {
        FixedUsage(mkp_config::settings::DEFAULT_UNITS_PER_REPORT)
    }
}

impl UsageSource for FixedUsage {
    fn usage_for(&self, _: &Customer, _: &ProductEntitlement, _: &str, _: &str) -> i64 {
        self.0
    }
}
