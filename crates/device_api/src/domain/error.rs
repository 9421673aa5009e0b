use common::domain::DomainError;
use thiserror::Error;

/// Coarse category of a service failure, used by transports to pick a status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Invalid,
    Internal,
}

/// Errors returned by the device service
///
/// Repository errors are never surfaced directly. They are kept as `source`
/// so they can be logged, while `message` is safe to show to a client.
#[derive(Debug, Error)]
pub enum DeviceServiceError {
    #[error("{message}")]
    NotFound {
        message: String,
        #[source]
        source: Option<DomainError>,
    },

    #[error("{message}")]
    Invalid { message: String },

    #[error("{message}")]
    Internal {
        message: String,
        #[source]
        source: DomainError,
    },
}

impl DeviceServiceError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            source: None,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>, source: DomainError) -> Self {
        Self::Internal {
            message: message.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Invalid { .. } => ErrorKind::Invalid,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Client facing message
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound { message, .. }
            | Self::Invalid { message }
            | Self::Internal { message, .. } => message,
        }
    }
}

pub type ServiceResult<T> = Result<T, DeviceServiceError>;
