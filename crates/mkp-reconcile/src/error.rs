use mkp_procurement::ProcurementError;
use mkp_store::StoreError;

use crate::DecodeError;

/// Failures that leave a message unacknowledged.
///
/// Not-found, state mismatch, and missing customer are not errors; they are
/// [`crate::Disposition`] values.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// Malformed message. Fatal for that message.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// Store read/write failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Remote fetch or approval call failed.
    #[error(transparent)]
    Procurement(#[from] ProcurementError),
}

impl ReconcileError {
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcileError::Decode(_) => "decode",
            ReconcileError::Store(_) => "store",
            ReconcileError::Procurement(_) => "procurement",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("invalid {field} '{value}'. expected one of: {expected}")]
    Invalid {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
}
