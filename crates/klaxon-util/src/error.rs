//! Error types for klaxon

use thiserror::Error;

use crate::AlarmId;

/// Core error type for klaxon operations
#[derive(Debug, Error)]
pub enum KlaxonError {
    #[error("Alarm not found: {0}")]
    AlarmNotFound(AlarmId),

    #[error("Alarm {0} is already firing")]
    AlreadyFiring(AlarmId),

    #[error("Alarm {0} is not firing")]
    NotFiring(AlarmId),

    #[error("No alarm is currently firing")]
    NothingFiring,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("IPC error: {0}")]
    IpcError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl KlaxonError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreError(msg.into())
    }

    pub fn ipc(msg: impl Into<String>) -> Self {
        Self::IpcError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True for errors caused by a caller asking for a transition the alarm
    /// cannot make in its current state
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::AlreadyFiring(_) | Self::NotFiring(_) | Self::NothingFiring
        )
    }
}

pub type Result<T> = std::result::Result<T, KlaxonError>;
