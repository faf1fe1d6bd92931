//! mkp-schemas
//!
//! Shared data shapes for the procurement reconciler:
//! - `record`: the locally persisted Customer projection (snake_case on disk).
//! - `procurement`: Account / Entitlement resources as served by the
//!   Partner Procurement API (camelCase on the wire).
//! - `message`: the inbound event payload and its closed event-type set.
//!
//! Pure data. No IO.

mod message;
mod procurement;
mod record;

pub use message::*;
pub use procurement::*;
pub use record::*;
