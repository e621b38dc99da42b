//! Overlays: named, independently open/closable UI surfaces
//!
//! Every overlay variant embeds an [`OverlayCore`] and implements the
//! [`Overlay`] trait. The manager drives activation; the overlay decides when
//! its session closes.
//!
//! - `core`: shared base state (geometry, activation, close-wait session)
//! - `focus`: keyboard focus containment
//! - `resize`: resize handles and header dragging
//! - `loading`: the shared wait-screen
//! - `basic`: generic content surface
//! - `window`: window chrome hosting an embedded frame

mod basic;
mod core;
mod focus;
mod loading;
mod resize;
mod window;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use self::core::{Geometry, OpenReservation, OverlayCore};
pub use basic::{BasicOverlay, ReceivedMessage};
pub use focus::{FocusTarget, FocusTrap};
pub use loading::LoadingOverlay;
pub use resize::{DragTracker, MIN_OVERLAY_SIZE, ResizeHandle, ResizeStep, ResizeTracker};
pub use window::{IFrameWindow, WindowOptions};

use crate::geometry::{CssSize, Size};
use crate::manager::OverlayManager;
use crate::outcome::Outcome;

/// Construction-time behavior switches of an overlay
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OverlayOptions {
    pub size: Option<CssSize>,
    pub fix_position_to_center_of_view_port: bool,
    /// Close with a cancel outcome when the page is clicked outside
    pub auto_close_on_outfocus: bool,
    /// Keeps the overlay below it active while this one is in front
    pub sub_overlay: bool,
    pub force_close_before_reopen: bool,
    pub allow_to_override_already_opened: bool,
}

/// One named UI surface
#[async_trait]
pub trait Overlay: Send + Sync {
    fn core(&self) -> &OverlayCore;

    fn name(&self) -> &str {
        self.core().name()
    }

    /// Present the overlay and wait until it is closed
    ///
    /// Implementations end by awaiting [`OverlayCore::wait_for_close`].
    async fn load(&self, is_modal: bool, params: Value) -> Outcome;

    /// Deliver a `sendMessage`/`broadcastMessage` payload
    async fn on_receive_message(&self, data: Value, sender: Option<String>) -> Outcome;

    fn mount(&self, manager: &Arc<OverlayManager>) {
        self.core().attach(manager);
    }

    fn unmount(&self) {
        self.core().detach();
    }

    fn close(&self, result: Outcome) {
        self.core().close(result);
    }

    fn force_close(&self) {
        self.close(Outcome::cancelled());
    }

    fn activate(&self, is_front: bool) {
        self.core().activate(is_front);
    }

    fn inactivate(&self, with_modal: bool) {
        self.core().inactivate(with_modal);
    }

    fn focus(&self) {
        self.core().focus_self();
    }

    /// Pointer pressed on the overlay's own frame
    fn on_outer_mouse_down(&self) {
        let core = self.core();
        if core.is_inactive_modal_mode() {
            return;
        }
        let Some(manager) = core.manager() else {
            return;
        };
        if core.is_front() {
            manager.cancel_auto_closing_once();
        }
        manager.overlay_mouse_down(core.name());
    }

    /// Pointer moved anywhere on the page, in host viewport coordinates
    fn on_mouse_move(&self, _x: f64, _y: f64, _dx: f64, _dy: f64) {}

    fn on_mouse_up(&self, _x: f64, _y: f64) {}

    fn on_viewport_resize(&self, viewport: Size) {
        if self.core().options().fix_position_to_center_of_view_port {
            self.core().move_to_viewport_center(viewport);
        }
    }

    /// Returns false when the overlay has no caption
    fn set_caption(&self, _caption: &str) -> bool {
        false
    }

    /// The embedded document of this overlay completed its handshake
    fn on_frame_loaded(&self, _title: Option<String>) {}

    /// Point the overlay at a new document; returns false when unsupported
    fn change_source_url(&self, _url: &str) -> bool {
        false
    }
}

/// Compare overlay handles by identity
pub(crate) fn same_overlay(a: &Arc<dyn Overlay>, b: &Arc<dyn Overlay>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
