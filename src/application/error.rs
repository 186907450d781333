use thiserror::Error;

use crate::{cache::CacheError, infra::error::InfraError};

/// Failure of a remote fetch (catalog page or image bytes).
///
/// The type is `Clone` so one population failure can be handed to every
/// caller coalesced onto the same cache key. Display strings are the
/// human-readable messages shown in a first-page error state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Invalid URL")]
    InvalidAddress { address: String },
    #[error("No data received")]
    NoData,
    #[error("Failed to decode data")]
    DecodeFailure { reason: String },
    #[error("No internet connection")]
    NoConnectivity,
    #[error("{0}")]
    Other(String),
}

impl FetchError {
    pub fn invalid_address(address: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.into(),
        }
    }

    pub fn decode(reason: impl Into<String>) -> Self {
        Self::DecodeFailure {
            reason: reason.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Stable label for log fields and metric tags.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::InvalidAddress { .. } => "invalid_address",
            FetchError::NoData => "no_data",
            FetchError::DecodeFailure { .. } => "decode_failure",
            FetchError::NoConnectivity => "no_connectivity",
            FetchError::Other(_) => "other",
        }
    }
}

/// Top-level error for the `vitrine` binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("catalog unavailable: {0}")]
    Catalog(String),
    #[error("image resolution failed: {0}")]
    Image(#[from] CacheError<FetchError>),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn catalog(message: impl Into<String>) -> Self {
        Self::Catalog(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Short text for the terminal; the full chain goes to the log.
    pub fn presentation_message(&self) -> &'static str {
        match self {
            AppError::Infra(InfraError::Configuration { .. }) => "Configuration is invalid",
            AppError::Infra(InfraError::Telemetry(_)) => "Logging subsystem could not start",
            AppError::Infra(InfraError::Http(_)) => "HTTP client could not be created",
            AppError::Image(CacheError::Populate(FetchError::NoConnectivity)) => {
                "No internet connection"
            }
            AppError::Image(_) => "Image request failed",
            AppError::Catalog(_) => "Catalog request failed",
            AppError::Unexpected(_) => "Unexpected error occurred",
        }
    }
}
