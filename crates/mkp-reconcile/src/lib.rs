//! mkp-reconcile
//!
//! Procurement lifecycle reconciler.
//!
//! For every inbound message:
//! - [`normalize`] decodes the payload into a typed [`Event`] (or `None` for an
//!   empty payload, which the caller acknowledges).
//! - [`Reconciler`] re-reads authoritative Account/Entitlement state from the
//!   procurement service, compares it with the local Customer record, makes at
//!   most one approval call and at most one store write, and returns a
//!   [`Disposition`]: `Ack` (never redeliver) or `Defer` (let the broker
//!   redeliver).
//!
//! Decisions are derived from current authoritative state, never from the
//! event type alone, so duplicated and reordered deliveries converge.

mod engine;
mod error;
mod normalize;
mod policy;
mod types;

pub use engine::Reconciler;
pub use error::{PolicyError, ReconcileError};
pub use normalize::{normalize, DecodeError, Event, Subject};
pub use policy::{CancellationPolicy, ReconcilePolicy, SignupPolicy};
pub use types::*;
