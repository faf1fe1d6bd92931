use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Local projection of an approved procurement Account.
///
/// Keyed by `procurement_account_id`. `internal_account_id` is assigned once
/// at creation and never regenerated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub procurement_account_id: String,
    pub internal_account_id: String,
    /// product_id -> active entitlement for that product.
    #[serde(default)]
    pub products: BTreeMap<String, ProductEntitlement>,
}

impl Customer {
    pub fn new(
        procurement_account_id: impl Into<String>,
        internal_account_id: impl Into<String>,
    ) -> Self {
        Self {
            procurement_account_id: procurement_account_id.into(),
            internal_account_id: internal_account_id.into(),
            products: BTreeMap::new(),
        }
    }

    pub fn product(&self, product_id: &str) -> Option<&ProductEntitlement> {
        self.products.get(product_id)
    }

    /// Insert or replace the entry for `entry.product_id`. Returns the prior entry.
    pub fn put_product(&mut self, entry: ProductEntitlement) -> Option<ProductEntitlement> {
        self.products.insert(entry.product_id.clone(), entry)
    }

    pub fn remove_product(&mut self, product_id: &str) -> Option<ProductEntitlement> {
        self.products.remove(product_id)
    }
}

/// One active entitlement tracked under a Customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductEntitlement {
    pub product_id: String,
    pub plan_id: String,
    /// Usage-reporting consumer id; absent for entitlements that do not report usage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer_id: Option<String>,
    /// Entitlement activation time. Plan changes never move it.
    pub start_time: String,
    /// Written only by the usage-reporting job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_report_time: Option<String>,
}

impl ProductEntitlement {
    pub fn new(
        product_id: impl Into<String>,
        plan_id: impl Into<String>,
        start_time: impl Into<String>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            plan_id: plan_id.into(),
            consumer_id: None,
            start_time: start_time.into(),
            last_report_time: None,
        }
    }

    /// Attach a consumer id; empty strings are treated as absent.
    pub fn with_consumer_id(mut self, consumer_id: Option<&str>) -> Self {
        self.consumer_id = consumer_id
            .filter(|c| !c.is_empty())
            .map(|c| c.to_string());
        self
    }

    /// Where the next usage window starts.
    pub fn usage_window_start(&self) -> &str {
        match self.last_report_time.as_deref() {
            Some(t) if !t.is_empty() => t,
            _ => &self.start_time,
        }
    }

    pub fn reports_usage(&self) -> bool {
        self.consumer_id.as_deref().is_some_and(|c| !c.is_empty())
    }
}
