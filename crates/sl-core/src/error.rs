//! Error types for sitelimit

use thiserror::Error;

use crate::types::TabId;

/// Storage failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store lock poisoned")]
    Poisoned,
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        StoreError::Poisoned
    }
}

/// Tab operation failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("No tab with id: {0}")]
    TabGone(TabId),

    #[error("Host error: {0}")]
    Other(String),
}

impl HostError {
    /// Classify an error message reported by the browser for `tab_id`.
    pub fn from_message(tab_id: TabId, message: &str) -> Self {
        if message.contains("No tab with id") || message.contains("Invalid tab ID") {
            HostError::TabGone(tab_id)
        } else {
            HostError::Other(message.to_string())
        }
    }

    pub fn is_stale_tab(&self) -> bool {
        matches!(self, HostError::TabGone(_))
    }
}

/// Rejected user input from the rule form.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid site: {0:?} (expected a domain such as 'youtube.com')")]
    InvalidSite(String),

    #[error("Invalid limit: {0:?}")]
    InvalidLimit(String),

    #[error("Limit must not be negative: {0}")]
    NegativeLimit(i64),
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;
