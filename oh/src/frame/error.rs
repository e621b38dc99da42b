//! Frame coordination errors

use std::time::Duration;

use thiserror::Error;

use crate::manager::ManagerError;
use crate::protocol::Command;

/// Errors raised while coordinating embedded documents
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Protocol violation: envelope has no command")]
    MissingCommand,

    #[error("Protocol violation: {0:?} sent without sender frame-id")]
    MissingSender(Command),

    #[error("Protocol violation: unknown sender frame-id {0}")]
    UnknownSender(String),

    #[error("Protocol violation: {0:?} names no target overlay")]
    MissingTarget(Command),

    #[error("Unknown frame: {0}")]
    UnknownFrame(String),

    #[error("Embedded frame not found: {0}")]
    EmbeddedFrameNotFound(String),

    #[error("Handshake with frame {frame_id} timed out after {waited:?}")]
    HandshakeTimeout { frame_id: String, waited: Duration },

    #[error("Overlay manager for frame {0} is gone")]
    ManagerDropped(String),

    #[error("Frame {0} has no holder overlay")]
    NoHolderOverlay(String),

    #[error("Invalid params for {command:?}: {source}")]
    InvalidParams {
        command: Command,
        #[source]
        source: serde_json::Error,
    },

    #[error("Command {0:?} is not accepted from a child frame")]
    UnexpectedCommand(Command),

    #[error(transparent)]
    Manager(#[from] ManagerError),
}
