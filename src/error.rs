use thiserror::Error;
use uuid::Uuid;

use crate::api::device::DeviceId;

/// Errors surfaced by the client and its backends.
///
/// The display strings are part of the contract: acceptance scenarios match
/// on them with a case-insensitive substring check, so the wording here must
/// stay stable.
#[derive(Clone, Debug, Error)]
pub enum Error {
    #[error("bluetooth client is not initialized")]
    NotInitialized,

    #[error("invalid UUID {0:?}")]
    InvalidUuid(String),

    #[error("device {0} is not connected")]
    NotConnected(DeviceId),

    #[error("device {0} not found")]
    DeviceNotFound(DeviceId),

    #[error("{0} timeout")]
    ConnectionTimeout(String),

    #[error("characteristic {characteristic} not found on device {device}")]
    CharacteristicNotFound {
        device: DeviceId,
        characteristic: Uuid,
    },

    #[error("write rejected: {0}")]
    WriteRejected(String),

    #[error("device {0} is busy")]
    Busy(DeviceId),

    #[error("Unavailable")]
    Unavailable,

    #[error("Creating bond failed: {0}")]
    BondingFailed(String),
}
