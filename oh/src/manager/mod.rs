//! Overlay manager
//!
//! One [`OverlayManager`] per visual root. It owns registration, z-order,
//! activation, modal stacking and per-name admission of open cycles.

mod admission;
mod config;
mod error;
mod overlay_manager;
mod zorder;

pub use admission::{AdmissionPermit, AdmissionQueue};
pub use config::{ManagerConfig, OpenConfig, ZIndexBands};
pub use error::ManagerError;
pub use overlay_manager::{OverlayManager, PageChangedHandler, StatusSnapshot};
pub use zorder::{Placement, Role, StackEntry, plan_activation, top_visible};
