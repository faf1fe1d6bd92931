use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use mkp_schemas::Customer;
use mkp_store::{MemoryStore, RecordStore, StoreError};

/// [`MemoryStore`] with switchable write/delete failures and a write counter.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_mutations: AtomicBool,
    writes: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_mutations.store(failing, Ordering::SeqCst);
    }

    /// Successful writes so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(StoreError::Io {
                path: "flaky-store".into(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "injected write failure"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn read(&self, procurement_account_id: &str) -> Result<Option<Customer>, StoreError> {
        self.inner.read(procurement_account_id).await
    }

    async fn write(&self, customer: &Customer) -> Result<(), StoreError> {
        self.check()?;
        self.inner.write(customer).await?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, procurement_account_id: &str) -> Result<(), StoreError> {
        self.check()?;
        self.inner.delete(procurement_account_id).await
    }

    async fn list_all(&self) -> Result<Vec<Customer>, StoreError> {
        self.inner.list_all().await
    }

    fn kind(&self) -> &'static str {
        "flaky"
    }
}
