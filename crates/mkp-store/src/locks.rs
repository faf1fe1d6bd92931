//! Per-account mutual exclusion.
//!
//! Reconciliations that touch the same account id run one at a time;
//! different ids proceed concurrently. Idle entries are pruned on acquire.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
pub struct AccountLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

/// Held for the duration of one read-modify-write on an account.
#[derive(Debug)]
pub struct AccountGuard {
    account_id: String,
    _guard: OwnedMutexGuard<()>,
}

impl AccountGuard {
    pub fn account_id(&self) -> &str {
        &self.account_id
    }
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, account_id: &str) -> AccountGuard {
        let slot = {
            let mut map = self.inner.lock().unwrap_or_else(|p| p.into_inner());
            // Only the map holds an idle slot; anything else means held or awaited.
            map.retain(|_, m| Arc::strong_count(m) > 1);
            map.entry(account_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        let guard = slot.lock_owned().await;
        AccountGuard {
            account_id: account_id.to_string(),
            _guard: guard,
        }
    }

    /// Number of tracked account slots (held, awaited, or not yet pruned).
    pub fn tracked(&self) -> usize {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}
