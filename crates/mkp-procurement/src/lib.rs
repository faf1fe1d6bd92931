//! mkp-procurement
//!
//! Boundary to the marketplace Partner Procurement service.
//!
//! [`ProcurementApi`] is what the reconciler consumes; [`ProcurementClient`]
//! is the REST implementation. Not-found on a fetch is `Ok(None)`, never an
//! error. Approval calls are safe to repeat against already-approved state.

mod client;

pub use client::ProcurementClient;

use async_trait::async_trait;
use mkp_schemas::{Account, Entitlement};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ProcurementError {
    /// Request never produced an HTTP response.
    #[error("procurement transport error during {op}: {source}")]
    Transport {
        op: &'static str,
        #[source]
        source: reqwest::Error,
    },
    /// Non-success status other than a not-found on a fetch.
    #[error("procurement http error during {op}: status={status} body={body}")]
    Status {
        op: &'static str,
        status: u16,
        body: String,
    },
    #[error("procurement response decode failed during {op}: {source}")]
    Decode {
        op: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("procurement client misconfigured: {0}")]
    Config(String),
    /// Id that cannot be addressed as a single resource.
    #[error("procurement {op} refused resource id {id:?}")]
    InvalidResourceId { op: &'static str, id: String },
    /// Raised by test doubles to simulate a remote failure.
    #[error("procurement call {op} failed: {message}")]
    Injected { op: &'static str, message: String },
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// Fetch and approval calls the reconciler makes against the procurement service.
///
/// Ids are bare resource ids (`acct-1`), not full resource names.
#[async_trait]
pub trait ProcurementApi: Send + Sync {
    async fn get_account(&self, account_id: &str) -> Result<Option<Account>, ProcurementError>;

    /// Approve the account's signup approval.
    async fn approve_account(&self, account_id: &str) -> Result<(), ProcurementError>;

    async fn get_entitlement(
        &self,
        entitlement_id: &str,
    ) -> Result<Option<Entitlement>, ProcurementError>;

    async fn approve_entitlement(&self, entitlement_id: &str) -> Result<(), ProcurementError>;

    async fn approve_entitlement_plan_change(
        &self,
        entitlement_id: &str,
        new_plan: &str,
    ) -> Result<(), ProcurementError>;
}
