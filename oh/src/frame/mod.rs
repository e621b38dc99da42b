//! Frame coordination
//!
//! Tracks the host document and every embedded frame, runs the handshake
//! that hands each embedded client its frame-id, and routes the cross-frame
//! protocol to overlay managers.

mod config;
mod context;
mod coordinator;
mod element;
mod error;

pub use config::CoordinatorConfig;
pub use context::{FrameId, HandshakeState, LoadCallback};
pub use coordinator::{CoordinatorMetrics, FrameCoordinator, Routed};
pub use element::{FrameElement, FrameEvent, ReadyState, Viewport};
pub use error::FrameError;
