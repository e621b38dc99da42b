//! Overlayhub - overlay manager and cross-frame coordinator
//!
//! Overlayhub renders named UI surfaces (dialogs, windows, wait-screens)
//! above a host page and lets documents running inside embedded frames open
//! them, exchange results and drive the wait-screen through a structured
//! message protocol.
//!
//! # Core Concepts
//!
//! - **One open cycle per name**: concurrent opens of one overlay queue FIFO
//! - **Results, not exceptions**: reentrant opens resolve as cancelled
//! - **Handshake first**: a frame is addressable once it has its frame-id
//! - **Deferred close**: waiters resume on the tick after the hide begins
//!
//! # Modules
//!
//! - [`outcome`] - success/cancel outcome and reply correlation tables
//! - [`overlay`] - the `Overlay` trait, capabilities and concrete overlays
//! - [`manager`] - registry, z-order, modality and admission control
//! - [`frame`] - frame registry, handshake and protocol routing
//! - [`protocol`] - envelope wire format and window ports
//! - [`sim`] - in-memory page used by tests and the simulator
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod cli;
pub mod config;
pub mod frame;
pub mod geometry;
pub mod manager;
pub mod outcome;
pub mod overlay;
pub mod protocol;
pub mod scenario;
pub mod sim;
pub mod visual;

// Re-export commonly used types
pub use config::Config;
pub use frame::{
    CoordinatorConfig, CoordinatorMetrics, FrameCoordinator, FrameElement, FrameError, FrameEvent, FrameId,
    HandshakeState, ReadyState, Routed, Viewport,
};
pub use geometry::{CssSize, Point, Rect, Size};
pub use manager::{ManagerConfig, ManagerError, OpenConfig, OverlayManager, ZIndexBands};
pub use outcome::{Outcome, PendingTable};
pub use overlay::{BasicOverlay, IFrameWindow, LoadingOverlay, Overlay, OverlayCore, OverlayOptions, WindowOptions};
pub use protocol::{Command, DispatchConfig, Envelope, WindowInbox, WindowPort};
pub use visual::{ImmediateDriver, Transition, VisualDriver};
