//! Overlay manager errors

use thiserror::Error;

/// Errors from overlay manager operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ManagerError {
    #[error("Overlay already registered: {0}")]
    DuplicateRegistration(String),

    #[error("Unknown message destination: {0}")]
    UnknownDestination(String),

    #[error("Unknown overlay: {0}")]
    UnknownOverlay(String),
}
