use std::collections::BTreeMap;

use async_trait::async_trait;
use mkp_schemas::Customer;
use tokio::sync::RwLock;

use crate::{RecordStore, StoreError};

/// Non-durable store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: RwLock<BTreeMap<String, Customer>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from existing records, keyed by their account id.
    pub fn with_records(records: impl IntoIterator<Item = Customer>) -> Self {
        let table = records
            .into_iter()
            .map(|c| (c.procurement_account_id.clone(), c))
            .collect();
        Self {
            table: RwLock::new(table),
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn read(&self, procurement_account_id: &str) -> Result<Option<Customer>, StoreError> {
        Ok(self.table.read().await.get(procurement_account_id).cloned())
    }

    async fn write(&self, customer: &Customer) -> Result<(), StoreError> {
        self.table
            .write()
            .await
            .insert(customer.procurement_account_id.clone(), customer.clone());
        Ok(())
    }

    async fn delete(&self, procurement_account_id: &str) -> Result<(), StoreError> {
        self.table.write().await.remove(procurement_account_id);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Customer>, StoreError> {
        Ok(self.table.read().await.values().cloned().collect())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}
