//! Window overlay hosting an embedded document
//!
//! `IFrameWindow` wraps a frame element in window chrome (caption, close
//! button, drag header, resize handles). It registers its frame with the
//! coordinator on mount and is that frame's holder overlay, so commands sent
//! from inside the frame (close, caption, ok/cancel) land here.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use super::resize::{DragTracker, ResizeHandle, ResizeTracker};
use super::{Overlay, OverlayCore, OverlayOptions};
use crate::frame::{FrameCoordinator, FrameElement, FrameId, HandshakeState, Viewport};
use crate::geometry::Point;
use crate::manager::OverlayManager;
use crate::outcome::Outcome;
use crate::protocol::{Command, Envelope};

/// Options of window overlays
#[derive(Debug, Clone, PartialEq)]
pub struct WindowOptions {
    pub overlay: OverlayOptions,
    pub default_caption: Option<String>,
    pub resizable: bool,
    pub hide_header: bool,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            overlay: OverlayOptions::default(),
            default_caption: None,
            resizable: true,
            hide_header: false,
        }
    }
}

struct Chrome {
    caption: String,
    source_url: String,
    frame_id: Option<FrameId>,
    coordinator: Weak<FrameCoordinator>,
    drag: DragTracker,
    resize: ResizeTracker,
    content_interactive: bool,
}

pub struct IFrameWindow {
    core: OverlayCore,
    weak_self: Weak<IFrameWindow>,
    element: Arc<dyn FrameElement>,
    options: WindowOptions,
    chrome: Mutex<Chrome>,
}

impl IFrameWindow {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        element: Arc<dyn FrameElement>,
        options: WindowOptions,
    ) -> Arc<Self> {
        let name = name.into();
        debug!(%name, "IFrameWindow::new: called");
        let core = OverlayCore::new(name, options.overlay.clone());
        let chrome = Chrome {
            caption: options.default_caption.clone().unwrap_or_default(),
            source_url: url.into(),
            frame_id: None,
            coordinator: Weak::new(),
            drag: DragTracker::default(),
            resize: ResizeTracker::new(options.resizable),
            content_interactive: false,
        };
        Arc::new_cyclic(|weak_self| Self {
            core,
            weak_self: weak_self.clone(),
            element,
            options,
            chrome: Mutex::new(chrome),
        })
    }

    /// Window whose frame element is created by `viewport`
    pub fn in_viewport(
        name: impl Into<String>,
        url: impl Into<String>,
        viewport: &dyn Viewport,
        options: WindowOptions,
    ) -> Arc<Self> {
        Self::new(name, url, viewport.create_frame(), options)
    }

    fn chrome(&self) -> MutexGuard<'_, Chrome> {
        self.chrome.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn element(&self) -> &Arc<dyn FrameElement> {
        &self.element
    }

    pub fn window_options(&self) -> &WindowOptions {
        &self.options
    }

    pub fn caption(&self) -> String {
        self.chrome().caption.clone()
    }

    pub fn source_url(&self) -> String {
        self.chrome().source_url.clone()
    }

    /// Frame-id assigned at mount
    pub fn frame_id(&self) -> Option<FrameId> {
        self.chrome().frame_id.clone()
    }

    /// False while inactive, so pointer input reaches the window chrome
    pub fn is_content_interactive(&self) -> bool {
        self.chrome().content_interactive
    }

    pub fn is_dragging(&self) -> bool {
        self.chrome().drag.is_dragging()
    }

    pub fn is_resizing(&self) -> bool {
        self.chrome().resize.is_resizing()
    }

    fn coordinator(&self) -> Option<Arc<FrameCoordinator>> {
        self.chrome().coordinator.upgrade()
    }

    /// Close button in the header was clicked
    ///
    /// A ready client gets to confirm or veto; otherwise the window closes.
    pub fn on_header_close_button_click(&self) {
        debug!(name = %self.core.name(), "IFrameWindow::on_header_close_button_click: called");
        let ready = match (self.coordinator(), self.frame_id()) {
            (Some(coordinator), Some(frame_id)) => {
                coordinator.handshake_state(&frame_id) == Some(HandshakeState::Ready)
            }
            _ => false,
        };
        let posted = ready
            && self
                .element
                .content_window()
                .map(|window| window.post_message(Envelope::downstream(Command::HeaderCloseButtonClicked)))
                .unwrap_or(false);
        if !posted {
            self.force_close();
        }
    }

    /// Pointer pressed on the header: start dragging
    pub fn on_header_mouse_down(&self) {
        self.chrome().drag.begin();
        if let Some(manager) = self.core.manager() {
            manager.change_contents_selectable(false);
        }
    }

    /// Pointer pressed on a resize handle at (`x`, `y`)
    pub fn begin_resize(&self, handle: ResizeHandle, x: f64, y: f64) -> bool {
        if self.core.is_inactive_modal_mode() {
            return false;
        }
        let position = self.core.position();
        let size = self.core.size_px();
        let started = self.chrome().resize.begin(handle, Point::new(x, y), position, size);
        if started {
            if let Some(manager) = self.core.manager() {
                manager.change_contents_selectable(false);
            }
        }
        started
    }
}

#[async_trait]
impl Overlay for IFrameWindow {
    fn core(&self) -> &OverlayCore {
        &self.core
    }

    fn mount(&self, manager: &Arc<OverlayManager>) {
        debug!(name = %self.core.name(), "IFrameWindow::mount: called");
        self.core.attach(manager);
        self.core.move_to_viewport_center(manager.viewport_size());

        let coordinator = manager.coordinator();
        let previous = self.chrome().frame_id.take();
        if let Some(previous) = previous {
            coordinator.unregister(&previous);
        }

        let holder = self.weak_self.upgrade().map(|window| window as Arc<dyn Overlay>);
        let frame_id = coordinator.register(self.element.clone(), manager, holder, None);
        let mut chrome = self.chrome();
        chrome.frame_id = Some(frame_id);
        chrome.coordinator = Arc::downgrade(&coordinator);
    }

    fn unmount(&self) {
        debug!(name = %self.core.name(), "IFrameWindow::unmount: called");
        let (frame_id, coordinator) = {
            let mut chrome = self.chrome();
            (chrome.frame_id.take(), chrome.coordinator.upgrade())
        };
        if let (Some(frame_id), Some(coordinator)) = (frame_id, coordinator) {
            coordinator.unregister(&frame_id);
        }
        self.core.detach();
    }

    async fn load(&self, _is_modal: bool, params: Value) -> Outcome {
        debug!(name = %self.core.name(), "IFrameWindow::load: called");
        if let (Some(coordinator), Some(frame_id)) = (self.coordinator(), self.frame_id()) {
            if let Err(e) = coordinator.set_load_params(&frame_id, params) {
                tracing::warn!(error = %e, "Load params not delivered");
            }
        }
        let url = {
            let mut chrome = self.chrome();
            chrome.caption = String::new();
            chrome.content_interactive = true;
            chrome.source_url.clone()
        };
        self.element.navigate(&url);
        let closed = self.core.wait_for_close();
        self.core.show_frame();
        closed.await
    }

    fn close(&self, result: Outcome) {
        self.core.close(result);
        self.chrome().content_interactive = false;
        self.element.navigate("about:blank");
    }

    fn activate(&self, is_front: bool) {
        self.core.activate(is_front);
        self.chrome().content_interactive = true;
    }

    fn inactivate(&self, with_modal: bool) {
        self.core.inactivate(with_modal);
        let mut chrome = self.chrome();
        chrome.content_interactive = false;
        if with_modal {
            chrome.resize.end();
        }
    }

    async fn on_receive_message(&self, data: Value, sender: Option<String>) -> Outcome {
        debug!(name = %self.core.name(), ?sender, "IFrameWindow::on_receive_message: called");
        let mut envelope = Envelope::downstream(Command::ReceiveMessage).with_params(data);
        envelope.sender = sender;
        match self.element.content_window() {
            Some(window) if window.post_message(envelope) => Outcome::ok(Value::Null),
            _ => Outcome::cancelled(),
        }
    }

    fn on_mouse_move(&self, x: f64, y: f64, dx: f64, dy: f64) {
        if !self.core.is_mounted() {
            return;
        }
        let (step, dragged) = {
            let chrome = self.chrome();
            (chrome.resize.track(x, y), chrome.drag.track(self.core.position(), dx, dy))
        };
        if let Some(step) = step {
            self.core.change_position(step.position.x, step.position.y);
            self.core.resize_px(step.size);
        }
        if let Some(position) = dragged {
            self.core.change_position(position.x, position.y);
        }
    }

    fn on_mouse_up(&self, _x: f64, _y: f64) {
        let mut chrome = self.chrome();
        chrome.drag.end();
        chrome.resize.end();
    }

    fn set_caption(&self, caption: &str) -> bool {
        self.chrome().caption = caption.to_string();
        true
    }

    fn on_frame_loaded(&self, title: Option<String>) {
        info!(name = %self.core.name(), ?title, "Window frame loaded");
        self.chrome().caption = title.unwrap_or_default();
    }

    fn change_source_url(&self, url: &str) -> bool {
        self.chrome().source_url = url.to_string();
        true
    }
}
