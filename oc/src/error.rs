//! Client errors

use overlayhub::Outcome;
use thiserror::Error;

/// Errors surfaced to code running inside an embedded document
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClientError {
    #[error("Parent window is gone")]
    Disconnected,

    #[error("Request was cancelled")]
    Rejected(Outcome),
}
