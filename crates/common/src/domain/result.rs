use crate::domain::DeviceState;
use thiserror::Error;
use uuid::Uuid;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Device not found: {0}")]
    DeviceNotFound(Uuid),

    #[error("Device is in use: {0}")]
    DeviceInUse(Uuid),

    #[error("Device {device_id} state changed: expected {expected}, found {actual}")]
    DeviceStateConflict {
        device_id: Uuid,
        expected: DeviceState,
        actual: DeviceState,
    },

    #[error("Invalid device state: {0}")]
    InvalidDeviceState(String),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
