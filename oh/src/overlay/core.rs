//! Shared base state of every overlay
//!
//! [`OverlayCore`] composes the capabilities each overlay variant assembles:
//! geometry, activation flags, focus containment, the frame and
//! modal-inactive transitions, and the close-wait session.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::watch;
use tracing::{debug, info};

use super::OverlayOptions;
use super::focus::{FocusTarget, FocusTrap};
use crate::geometry::{CssSize, Point, Size};
use crate::manager::OverlayManager;
use crate::outcome::Outcome;
use crate::visual::{Transition, VisualDriver};

/// Position, size and stacking of an overlay frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Geometry {
    pub position: Point,
    pub size: Option<CssSize>,
    /// Last resolved pixel size, used for centering
    pub size_px: Size,
    pub z_index: i64,
    center_after_show: bool,
}

struct CoreState {
    manager: Weak<OverlayManager>,
    mounted: bool,
    active: bool,
    inactive_modal_mode: bool,
    front: bool,
    geometry: Geometry,
    focus: FocusTrap,
    close_session: Option<watch::Sender<Option<Outcome>>>,
    opens_in_flight: usize,
    latched_close: Option<Outcome>,
}

struct CoreInner {
    name: String,
    options: OverlayOptions,
    frame: Transition,
    inactive_layer: Transition,
    state: Mutex<CoreState>,
}

/// Cheap-clone handle to an overlay's base state
#[derive(Clone)]
pub struct OverlayCore {
    inner: Arc<CoreInner>,
}

impl OverlayCore {
    /// Core with drivers that complete immediately
    pub fn new(name: impl Into<String>, options: OverlayOptions) -> Self {
        let name = name.into();
        let frame = Transition::immediate(&format!("{name}:frame"));
        let inactive_layer = Transition::immediate(&format!("{name}:inactive-layer"));
        Self::assemble(name, options, frame, inactive_layer)
    }

    /// Core rendered through the given frame and inactive-layer drivers
    pub fn with_drivers(
        name: impl Into<String>,
        options: OverlayOptions,
        frame_driver: Arc<dyn VisualDriver>,
        layer_driver: Arc<dyn VisualDriver>,
    ) -> Self {
        let name = name.into();
        let frame = Transition::new(&format!("{name}:frame"), frame_driver);
        let inactive_layer = Transition::new(&format!("{name}:inactive-layer"), layer_driver);
        Self::assemble(name, options, frame, inactive_layer)
    }

    fn assemble(name: String, options: OverlayOptions, frame: Transition, inactive_layer: Transition) -> Self {
        debug!(%name, "OverlayCore::new: called");
        let geometry = Geometry {
            size: options.size.clone(),
            ..Default::default()
        };
        Self {
            inner: Arc::new(CoreInner {
                name,
                options,
                frame,
                inactive_layer,
                state: Mutex::new(CoreState {
                    manager: Weak::new(),
                    mounted: false,
                    active: false,
                    inactive_modal_mode: false,
                    front: false,
                    geometry,
                    focus: FocusTrap::new(),
                    close_session: None,
                    opens_in_flight: 0,
                    latched_close: None,
                }),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CoreState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn options(&self) -> &OverlayOptions {
        &self.inner.options
    }

    /// Owning manager while mounted
    pub fn manager(&self) -> Option<Arc<OverlayManager>> {
        self.lock().manager.upgrade()
    }

    fn viewport_size(&self) -> Option<Size> {
        self.manager().map(|manager| manager.viewport_size())
    }

    // --- lifecycle ---

    /// Attach to `manager` and resolve the configured size against its viewport
    pub fn attach(&self, manager: &Arc<OverlayManager>) {
        debug!(name = %self.name(), "OverlayCore::attach: called");
        let viewport = manager.viewport_size();
        let mut state = self.lock();
        state.manager = Arc::downgrade(manager);
        state.mounted = true;
        if let Some(size) = state.geometry.size.clone() {
            state.geometry.size_px = size.resolve(viewport);
        }
    }

    pub fn detach(&self) {
        debug!(name = %self.name(), "OverlayCore::detach: called");
        let mut state = self.lock();
        state.mounted = false;
        state.manager = Weak::new();
    }

    pub fn is_mounted(&self) -> bool {
        self.lock().mounted
    }

    // --- activation ---

    pub fn activate(&self, is_front: bool) {
        debug!(name = %self.name(), %is_front, "OverlayCore::activate: called");
        let was_active = {
            let mut state = self.lock();
            let was_active = state.active;
            state.active = true;
            state.inactive_modal_mode = false;
            state.front = is_front;
            was_active
        };
        if !was_active {
            self.inner.inactive_layer.hide();
        }
    }

    pub fn inactivate(&self, with_modal: bool) {
        debug!(name = %self.name(), %with_modal, "OverlayCore::inactivate: called");
        {
            let mut state = self.lock();
            state.active = false;
            state.inactive_modal_mode = with_modal;
            state.front = false;
        }
        if with_modal {
            self.inner.inactive_layer.show();
        }
    }

    pub fn is_active(&self) -> bool {
        self.lock().active
    }

    pub fn is_front(&self) -> bool {
        self.lock().front
    }

    pub fn is_inactive_modal_mode(&self) -> bool {
        self.lock().inactive_modal_mode
    }

    /// True while the translucent blocking layer covers the content
    pub fn is_inactive_layer_visible(&self) -> bool {
        self.inner.inactive_layer.is_visible()
    }

    // --- geometry ---

    pub fn geometry(&self) -> Geometry {
        self.lock().geometry.clone()
    }

    pub fn z_index(&self) -> i64 {
        self.lock().geometry.z_index
    }

    pub fn change_z_index(&self, z_index: i64) {
        self.lock().geometry.z_index = z_index;
    }

    pub fn position(&self) -> Point {
        self.lock().geometry.position
    }

    /// Move the frame; the top edge never leaves the viewport
    pub fn change_position(&self, x: f64, y: f64) {
        self.lock().geometry.position = Point::new(x, y.max(0.0));
    }

    pub fn size_px(&self) -> Size {
        self.lock().geometry.size_px
    }

    pub fn resize(&self, size: CssSize) {
        debug!(name = %self.name(), ?size, "OverlayCore::resize: called");
        let viewport = self.viewport_size();
        let mut state = self.lock();
        if let Some(viewport) = viewport {
            state.geometry.size_px = size.resolve(viewport);
        }
        state.geometry.size = Some(size);
    }

    pub fn resize_px(&self, size: Size) {
        let mut state = self.lock();
        state.geometry.size_px = size;
        state.geometry.size = Some(CssSize::px(size.width, size.height));
    }

    /// Center within `viewport`, or once shown if currently hidden
    pub fn move_to_viewport_center(&self, viewport: Size) {
        debug!(name = %self.name(), "OverlayCore::move_to_viewport_center: called");
        let visible = self.inner.frame.is_visible();
        let mut state = self.lock();
        if !visible {
            state.geometry.center_after_show = true;
            return;
        }
        if let Some(size) = state.geometry.size.clone() {
            state.geometry.size_px = size.resolve(viewport);
        }
        let size = state.geometry.size_px;
        let x = ((viewport.width - size.width) / 2.0).round();
        let y = ((viewport.height - size.height) / 2.0).round().max(0.0);
        state.geometry.position = Point::new(x, y);
    }

    /// Hook run once the show animation finished
    pub fn on_show_after(&self) {
        let pending = std::mem::take(&mut self.lock().geometry.center_after_show);
        if !pending {
            return;
        }
        if let Some(viewport) = self.viewport_size() {
            self.move_to_viewport_center(viewport);
        }
    }

    // --- visibility and the close-wait session ---

    pub fn is_visible(&self) -> bool {
        self.inner.frame.is_visible()
    }

    /// Start the show transition, running `on_show_after` when it completes
    pub fn show_frame(&self) {
        let core = self.clone();
        self.inner.frame.show_then(move || core.on_show_after());
    }

    pub fn hide_frame(&self) {
        self.inner.frame.hide();
    }

    /// Future resolving when the current session is closed
    ///
    /// Concurrent callers share the same session.
    pub fn wait_for_close(&self) -> impl Future<Output = Outcome> + Send + 'static {
        let mut rx = {
            let mut state = self.lock();
            match &state.close_session {
                Some(tx) => tx.subscribe(),
                None => {
                    let (tx, rx) = watch::channel(None);
                    state.close_session = Some(tx);
                    rx
                }
            }
        };
        async move {
            let result = rx.wait_for(Option::is_some).await.map(|value| value.clone());
            result.ok().flatten().unwrap_or_else(Outcome::cancelled)
        }
    }

    pub fn has_open_session(&self) -> bool {
        self.lock().close_session.is_some()
    }

    /// Hide and resolve the outstanding session on the next scheduler turn
    ///
    /// While an open is reserved but not yet loading, the outcome is latched
    /// for that open instead. Otherwise, without a session, this only hides.
    pub fn close(&self, result: Outcome) {
        info!(name = %self.name(), is_ok = result.is_ok, "Closing overlay");
        self.hide_frame();
        let session = {
            let mut state = self.lock();
            let session = state.close_session.take();
            if session.is_none() && state.opens_in_flight > 0 {
                debug!(name = %self.name(), "Close latched for the pending open");
                state.latched_close = Some(result);
                return;
            }
            session
        };
        if let Some(tx) = session {
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                let _ = tx.send(Some(result));
            });
        }
    }

    /// Reserve an open that has not reached `load` yet
    pub fn reserve_open(&self) -> OpenReservation {
        self.lock().opens_in_flight += 1;
        OpenReservation {
            core: self.clone(),
            settled: false,
        }
    }

    pub fn opens_in_flight(&self) -> usize {
        self.lock().opens_in_flight
    }

    // --- focus ---

    pub fn focus_self(&self) {
        self.lock().focus.focus_self();
    }

    /// Focus lands on `target`; returns where it settles
    pub fn focus(&self, target: FocusTarget) -> FocusTarget {
        let mut state = self.lock();
        let active = state.active;
        state.focus.focus(target, active)
    }

    pub fn blur(&self) {
        self.lock().focus.blur();
    }

    pub fn focused(&self) -> Option<FocusTarget> {
        self.lock().focus.current().cloned()
    }
}

/// An open of the overlay that has been requested but is not loading yet
///
/// Dropping it unsettled discards a latched close once no other open is
/// pending.
#[derive(Debug)]
pub struct OpenReservation {
    core: OverlayCore,
    settled: bool,
}

impl OpenReservation {
    /// The open reached `load`; returns a close that arrived before it
    pub fn settle(mut self) -> Option<Outcome> {
        self.settled = true;
        let mut state = self.core.lock();
        state.opens_in_flight = state.opens_in_flight.saturating_sub(1);
        state.latched_close.take()
    }
}

impl Drop for OpenReservation {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = self.core.lock();
        state.opens_in_flight = state.opens_in_flight.saturating_sub(1);
        if state.opens_in_flight == 0 {
            state.latched_close = None;
        }
    }
}

impl std::fmt::Debug for OverlayCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("OverlayCore")
            .field("name", &self.inner.name)
            .field("mounted", &state.mounted)
            .field("active", &state.active)
            .field("front", &state.front)
            .field("z_index", &state.geometry.z_index)
            .finish()
    }
}
