//! OverlayManager - registry and lifecycle of the overlays of one visual root

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};

use futures::FutureExt;
use futures::future::{BoxFuture, join, join_all};
use indexmap::IndexMap;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::admission::AdmissionQueue;
use super::config::{ManagerConfig, OpenConfig};
use super::error::ManagerError;
use super::zorder::{Role, StackEntry, plan_activation, top_visible};
use crate::frame::{FrameCoordinator, FrameId, Viewport};
use crate::geometry::{Point, Size};
use crate::outcome::Outcome;
use crate::overlay::{LoadingOverlay, OpenReservation, Overlay, same_overlay};
use crate::protocol::WaitScreenParams;
use crate::visual::{Transition, VisualDriver};

/// Called with `(url, frame_id, holder_overlay_name)` when a frame navigates
pub type PageChangedHandler = Arc<dyn Fn(&str, &str, Option<&str>) + Send + Sync>;

#[derive(Debug, Default)]
struct OverlayStatus {
    is_visible: bool,
    is_modal: bool,
    unmount_timer: Option<JoinHandle<()>>,
}

/// Point-in-time view of one overlay's status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub is_visible: bool,
    pub is_modal: bool,
    pub pending_unmount: bool,
}

struct ManagerState {
    overlays: IndexMap<String, Arc<dyn Overlay>>,
    status: IndexMap<String, OverlayStatus>,
    configs: IndexMap<String, OpenConfig>,
    permanent: HashSet<String>,
    declared: HashMap<String, Arc<dyn Overlay>>,
    modal_depth: usize,
    active: Option<String>,
    cancel_auto_close_once: bool,
    last_pointer: Option<Point>,
    contents_selectable: bool,
    page_changed: Option<PageChangedHandler>,
}

impl ManagerState {
    fn stack_entries(&self) -> Vec<StackEntry> {
        self.overlays
            .iter()
            .map(|(name, overlay)| {
                let status = self.status.get(name);
                let options = overlay.core().options();
                StackEntry {
                    name: name.clone(),
                    z_index: overlay.core().z_index(),
                    visible: status.is_some_and(|s| s.is_visible),
                    modal: status.is_some_and(|s| s.is_modal),
                    force_foreground: self.configs.get(name).is_some_and(|c| c.force_foreground),
                    auto_close: options.auto_close_on_outfocus,
                    sub_overlay: options.sub_overlay,
                }
            })
            .collect()
    }
}

/// Registry coordinating overlay visibility, z-order and modality
pub struct OverlayManager {
    config: ManagerConfig,
    viewport: Arc<dyn Viewport>,
    coordinator: Arc<FrameCoordinator>,
    modal_background: Transition,
    wait_screen: Arc<LoadingOverlay>,
    admission: AdmissionQueue,
    state: Mutex<ManagerState>,
    weak_self: Weak<OverlayManager>,
    frame_id: OnceLock<FrameId>,
}

impl OverlayManager {
    /// Create a manager for `viewport` and register its document as host
    pub fn new(viewport: Arc<dyn Viewport>, coordinator: Arc<FrameCoordinator>, config: ManagerConfig) -> Arc<Self> {
        Self::with_modal_background(viewport, coordinator, config, Transition::immediate("modal-background"))
    }

    pub fn with_background_driver(
        viewport: Arc<dyn Viewport>,
        coordinator: Arc<FrameCoordinator>,
        config: ManagerConfig,
        driver: Arc<dyn VisualDriver>,
    ) -> Arc<Self> {
        Self::with_modal_background(viewport, coordinator, config, Transition::new("modal-background", driver))
    }

    fn with_modal_background(
        viewport: Arc<dyn Viewport>,
        coordinator: Arc<FrameCoordinator>,
        config: ManagerConfig,
        modal_background: Transition,
    ) -> Arc<Self> {
        debug!("OverlayManager::new: called");
        let manager = Arc::new_cyclic(|weak_self| Self {
            config,
            viewport,
            coordinator: coordinator.clone(),
            modal_background,
            wait_screen: Arc::new(LoadingOverlay::new()),
            admission: AdmissionQueue::new(),
            state: Mutex::new(ManagerState {
                overlays: IndexMap::new(),
                status: IndexMap::new(),
                configs: IndexMap::new(),
                permanent: HashSet::new(),
                declared: HashMap::new(),
                modal_depth: 0,
                active: None,
                cancel_auto_close_once: false,
                last_pointer: None,
                contents_selectable: true,
                page_changed: None,
            }),
            weak_self: weak_self.clone(),
            frame_id: OnceLock::new(),
        });

        let wait_screen: Arc<dyn Overlay> = manager.wait_screen.clone();
        {
            let mut state = manager.lock();
            let name = wait_screen.name().to_string();
            state.permanent.insert(name.clone());
            state.overlays.insert(name.clone(), wait_screen.clone());
            state.status.insert(name.clone(), OverlayStatus::default());
            state.configs.insert(name, OpenConfig::default());
        }
        wait_screen.mount(&manager);

        let frame_id = coordinator.register_host(&manager);
        let _ = manager.frame_id.set(frame_id);
        info!(frame_id = ?manager.frame_id(), "Overlay manager ready");
        manager
    }

    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn viewport(&self) -> &Arc<dyn Viewport> {
        &self.viewport
    }

    pub fn viewport_size(&self) -> Size {
        self.viewport.size()
    }

    pub fn coordinator(&self) -> Arc<FrameCoordinator> {
        self.coordinator.clone()
    }

    /// Frame-id of the document this manager lives in
    pub fn frame_id(&self) -> Option<&str> {
        self.frame_id.get().map(String::as_str)
    }

    pub fn wait_screen(&self) -> &Arc<LoadingOverlay> {
        &self.wait_screen
    }

    // --- registration ---

    /// Register `overlay` and mount it
    ///
    /// Re-registering during the delayed-unmount window cancels the unmount.
    /// A different instance under a live name is rejected.
    pub fn register(&self, overlay: Arc<dyn Overlay>, config: OpenConfig) -> Result<(), ManagerError> {
        let name = overlay.name().to_string();
        debug!(%name, "OverlayManager::register: called");
        let mount = {
            let mut guard = self.lock();
            let state = &mut *guard;
            match state.status.get_mut(&name) {
                None => {
                    state.overlays.insert(name.clone(), overlay.clone());
                    state.status.insert(name.clone(), OverlayStatus::default());
                    state.configs.insert(name.clone(), config);
                    true
                }
                Some(status) => {
                    if let Some(timer) = status.unmount_timer.take() {
                        debug!(%name, "Cancelled pending unmount");
                        timer.abort();
                        status.is_visible = false;
                        status.is_modal = false;
                        state.overlays.insert(name.clone(), overlay.clone());
                        state.configs.insert(name.clone(), config);
                        true
                    } else if state.overlays.get(&name).is_some_and(|existing| same_overlay(existing, &overlay)) {
                        state.configs.insert(name.clone(), config);
                        false
                    } else {
                        return Err(ManagerError::DuplicateRegistration(name));
                    }
                }
            }
        };

        if mount {
            if let Some(me) = self.weak_self.upgrade() {
                overlay.mount(&me);
            }
        }
        Ok(())
    }

    /// Schedule removal of `name` after the unmount delay
    pub fn unregister(&self, name: &str) {
        debug!(%name, "OverlayManager::unregister: called");
        let delay = self.config.unmount_delay();
        let weak = self.weak_self.clone();
        let mut state = self.lock();
        let Some(status) = state.status.get_mut(name) else {
            return;
        };
        if let Some(previous) = status.unmount_timer.take() {
            previous.abort();
        }
        let owned = name.to_string();
        status.unmount_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(manager) = weak.upgrade() {
                manager.finish_unmount(&owned);
            }
        }));
    }

    fn finish_unmount(&self, name: &str) {
        let overlay = {
            let mut state = self.lock();
            if !state.status.get(name).is_some_and(|s| s.unmount_timer.is_some()) {
                return;
            }
            state.status.shift_remove(name);
            state.configs.shift_remove(name);
            state.overlays.shift_remove(name)
        };
        if let Some(overlay) = overlay {
            info!(%name, "Unmounted overlay");
            overlay.unmount();
        }
    }

    /// Register an overlay that is never auto-unmounted
    pub fn mount_permanently(&self, overlay: Arc<dyn Overlay>) -> Result<(), ManagerError> {
        let name = overlay.name().to_string();
        debug!(%name, "OverlayManager::mount_permanently: called");
        self.lock().permanent.insert(name.clone());
        let result = self.register(overlay, OpenConfig::default());
        if result.is_err() {
            self.lock().permanent.remove(&name);
        }
        result
    }

    /// Make an overlay addressable by name without mounting it
    ///
    /// Frames can then open it by name; it is mounted on first open.
    pub fn declare(&self, overlay: Arc<dyn Overlay>) {
        let name = overlay.name().to_string();
        debug!(%name, "OverlayManager::declare: called");
        self.lock().declared.insert(name, overlay);
    }

    /// Registered or declared overlay by name
    pub fn overlay(&self, name: &str) -> Option<Arc<dyn Overlay>> {
        let state = self.lock();
        state.overlays.get(name).or_else(|| state.declared.get(name)).cloned()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.lock().overlays.contains_key(name)
    }

    pub fn is_permanent(&self, name: &str) -> bool {
        self.lock().permanent.contains(name)
    }

    pub fn status(&self, name: &str) -> Option<StatusSnapshot> {
        self.lock().status.get(name).map(|s| StatusSnapshot {
            is_visible: s.is_visible,
            is_modal: s.is_modal,
            pending_unmount: s.unmount_timer.is_some(),
        })
    }

    pub fn open_config(&self, name: &str) -> Option<OpenConfig> {
        self.lock().configs.get(name).cloned()
    }

    // --- open/close ---

    /// Open `overlay`, promoting to a modal open while a modal is active
    ///
    /// The open is reserved on the overlay before the returned future first
    /// runs, so a close issued in between is applied once it shows.
    pub fn open(
        self: &Arc<Self>,
        overlay: Arc<dyn Overlay>,
        config: OpenConfig,
        params: Value,
    ) -> BoxFuture<'static, Result<Outcome, ManagerError>> {
        debug!(name = %overlay.name(), "OverlayManager::open: called");
        let reservation = overlay.core().reserve_open();
        let manager = self.clone();
        async move {
            if manager.modal_depth() == 0 {
                manager.open_cycle(overlay, config, params, reservation).await
            } else {
                manager.modal_cycle(overlay, config, params, reservation).await
            }
        }
        .boxed()
    }

    /// Open `overlay` modally above a dimming background
    ///
    /// An overlay already in the modal stack resolves cancelled immediately.
    pub fn open_as_modal(
        self: &Arc<Self>,
        overlay: Arc<dyn Overlay>,
        config: OpenConfig,
        params: Value,
    ) -> BoxFuture<'static, Result<Outcome, ManagerError>> {
        debug!(name = %overlay.name(), "OverlayManager::open_as_modal: called");
        let reservation = overlay.core().reserve_open();
        let manager = self.clone();
        async move { manager.modal_cycle(overlay, config, params, reservation).await }.boxed()
    }

    async fn modal_cycle(
        &self,
        overlay: Arc<dyn Overlay>,
        config: OpenConfig,
        params: Value,
        reservation: OpenReservation,
    ) -> Result<Outcome, ManagerError> {
        if self.exists_in_modal_stack(&overlay) {
            warn!(name = %overlay.name(), "Overlay already in modal stack, cancelling");
            return Ok(Outcome::cancelled());
        }

        let _modal = ModalMode::begin(self);
        let config = OpenConfig { modal: true, ..config };
        self.open_cycle(overlay, config, params, reservation).await
    }

    async fn open_cycle(
        &self,
        overlay: Arc<dyn Overlay>,
        config: OpenConfig,
        params: Value,
        reservation: OpenReservation,
    ) -> Result<Outcome, ManagerError> {
        let name = overlay.name().to_string();
        let options = overlay.core().options().clone();

        if overlay.core().is_active() && overlay.core().has_open_session() && options.force_close_before_reopen {
            info!(%name, "Force closing before reopen");
            overlay.force_close();
        }

        let permit = if options.allow_to_override_already_opened {
            None
        } else {
            match self.admission.enter(&name).await {
                Ok(permit) => Some(permit),
                Err(e) => {
                    warn!(%name, error = %e, "Admission failed");
                    return Ok(Outcome::cancelled());
                }
            }
        };
        if permit.is_some() && overlay.core().is_active() {
            warn!(%name, "Overlay already open, cancelling reentrant open");
            return Ok(Outcome::cancelled());
        }

        let instant_mount = !self.is_permanent(&name);
        if instant_mount {
            self.register(overlay.clone(), config.clone())?;
        } else {
            self.lock().configs.insert(name.clone(), config.clone());
        }
        if let Some(status) = self.lock().status.get_mut(&name) {
            status.is_modal = config.modal;
        }
        let cycle = OpenCycle {
            manager: self,
            overlay: &overlay,
            instant_mount,
        };
        self.apply_open_config(&overlay, &config);
        self.activate_specific_overlay(&name);

        info!(%name, modal = config.modal, "Opening overlay");
        let result = match reservation.settle() {
            None => overlay.load(config.modal, params).await,
            Some(early) => {
                info!(%name, "Applying close received while opening");
                let replay = async {
                    tokio::task::yield_now().await;
                    overlay.close(early);
                };
                join(overlay.load(config.modal, params), replay).await.0
            }
        };

        drop(cycle);
        drop(permit);
        debug!(%name, is_ok = result.is_ok, "Overlay closed");
        Ok(result)
    }

    fn apply_open_config(&self, overlay: &Arc<dyn Overlay>, config: &OpenConfig) {
        let core = overlay.core();
        if let Some(size) = &config.size {
            core.resize(size.clone());
        }
        if let Some(position) = config.position {
            core.change_position(position.x, position.y);
        }
        if config.popup_in_center_of_view_port {
            core.move_to_viewport_center(self.viewport_size());
        }
    }

    fn exists_in_modal_stack(&self, overlay: &Arc<dyn Overlay>) -> bool {
        let state = self.lock();
        let name = overlay.name();
        state.status.get(name).is_some_and(|s| s.is_visible && s.is_modal)
            && state.overlays.get(name).is_some_and(|o| same_overlay(o, overlay))
    }

    fn begin_modal_mode(&self) {
        let depth = {
            let mut state = self.lock();
            state.modal_depth += 1;
            state.modal_depth
        };
        debug!(%depth, "Modal depth increased");
        self.modal_background.show();
    }

    fn end_modal_mode(&self) {
        let depth = {
            let mut state = self.lock();
            state.modal_depth = state.modal_depth.saturating_sub(1);
            state.modal_depth
        };
        debug!(%depth, "Modal depth decreased");
        if depth == 0 {
            self.modal_background.hide();
        }
    }

    pub fn modal_depth(&self) -> usize {
        self.lock().modal_depth
    }

    pub fn is_modal_background_visible(&self) -> bool {
        self.modal_background.is_visible()
    }

    // --- activation and z-order ---

    /// Bring `name` to the front and restack every visible overlay
    pub fn activate_specific_overlay(&self, name: &str) {
        debug!(%name, "OverlayManager::activate_specific_overlay: called");
        let placements = {
            let mut state = self.lock();
            match state.status.get_mut(name) {
                Some(status) => status.is_visible = true,
                None => return,
            }
            let plan = plan_activation(name, &state.stack_entries(), &self.config.z_index);
            state.active = plan.iter().find(|p| p.role == Role::Front).map(|p| p.name.clone());
            plan.into_iter()
                .filter_map(|placement| {
                    state
                        .overlays
                        .get(&placement.name)
                        .cloned()
                        .map(|overlay| (overlay, placement))
                })
                .collect::<Vec<_>>()
        };

        let mut front = None;
        for (overlay, placement) in placements {
            overlay.core().change_z_index(placement.z_index);
            match placement.role {
                Role::Front => {
                    overlay.activate(true);
                    front = Some(overlay);
                }
                Role::Parent => overlay.activate(false),
                Role::Inactive { modal } => overlay.inactivate(modal),
            }
        }
        if let Some(overlay) = front {
            overlay.focus();
        }
    }

    /// Activate the visible overlay with the highest z-index, if any
    pub fn activate_top_overlay(&self) {
        let top = {
            let state = self.lock();
            top_visible(&state.stack_entries()).map(str::to_string)
        };
        if let Some(name) = top {
            self.activate_specific_overlay(&name);
        }
    }

    /// Name of the front overlay
    pub fn active_overlay(&self) -> Option<String> {
        self.lock().active.clone()
    }

    /// Move keyboard focus back into the front overlay
    pub fn return_focus_to_active_overlay(&self) {
        let active = {
            let state = self.lock();
            state.active.as_ref().and_then(|name| state.overlays.get(name).cloned())
        };
        if let Some(overlay) = active {
            overlay.focus();
        }
    }

    // --- wait-screen ---

    /// Show the shared wait-screen above everything else
    ///
    /// Reserved like [`OverlayManager::open`], so a hide issued right after
    /// still closes it.
    pub fn show_loading_overlay(
        self: &Arc<Self>,
        message: &str,
        show_progress_bar: bool,
        progress_ratio: Option<f64>,
    ) -> BoxFuture<'static, Result<Outcome, ManagerError>> {
        debug!(%message, %show_progress_bar, "OverlayManager::show_loading_overlay: called");
        let params = WaitScreenParams {
            message: Some(message.to_string()),
            show_progress_bar,
            progress_ratio,
        };
        let params = serde_json::to_value(params).unwrap_or(Value::Null);
        let wait_screen: Arc<dyn Overlay> = self.wait_screen.clone();
        let reservation = wait_screen.core().reserve_open();
        let manager = self.clone();
        async move {
            manager
                .open_cycle(wait_screen, OpenConfig::foreground(), params, reservation)
                .await
        }
        .boxed()
    }

    pub fn hide_loading_overlay(&self) {
        debug!("OverlayManager::hide_loading_overlay: called");
        self.wait_screen.close(Outcome::ok(Value::Null));
    }

    // --- messaging ---

    /// Deliver `data` to the overlay named `destination`
    pub fn send_message(
        &self,
        destination: &str,
        data: Value,
        sender: Option<&str>,
    ) -> Result<BoxFuture<'static, Outcome>, ManagerError> {
        debug!(%destination, ?sender, "OverlayManager::send_message: called");
        let overlay = self
            .lock()
            .overlays
            .get(destination)
            .cloned()
            .ok_or_else(|| ManagerError::UnknownDestination(destination.to_string()))?;
        let sender = sender.map(str::to_string);
        Ok(async move { overlay.on_receive_message(data, sender).await }.boxed())
    }

    /// Deliver `data` to every registered overlay except `sender`
    pub fn broadcast_message(&self, data: Value, sender: Option<&str>) -> BoxFuture<'static, Vec<Outcome>> {
        debug!(?sender, "OverlayManager::broadcast_message: called");
        let targets: Vec<Arc<dyn Overlay>> = self
            .lock()
            .overlays
            .iter()
            .filter(|(name, _)| Some(name.as_str()) != sender)
            .map(|(_, overlay)| overlay.clone())
            .collect();
        let sender = sender.map(str::to_string);
        let deliveries: Vec<_> = targets
            .into_iter()
            .map(|overlay| {
                let data = data.clone();
                let sender = sender.clone();
                async move { overlay.on_receive_message(data, sender).await }
            })
            .collect();
        join_all(deliveries).boxed()
    }

    // --- pointer and viewport events ---

    /// Suppress the next page-level auto-close
    pub fn cancel_auto_closing_once(&self) {
        self.lock().cancel_auto_close_once = true;
    }

    /// Pointer pressed on the overlay named `name`
    pub fn overlay_mouse_down(&self, name: &str) {
        debug!(%name, "OverlayManager::overlay_mouse_down: called");
        let visible = self.lock().status.get(name).is_some_and(|s| s.is_visible);
        if visible {
            self.activate_specific_overlay(name);
        }
    }

    /// Pointer pressed anywhere on the page
    ///
    /// Closes every visible auto-close overlay with a cancel outcome unless
    /// suppressed once.
    pub fn handle_page_mouse_down(&self) {
        debug!("OverlayManager::handle_page_mouse_down: called");
        let targets: Vec<Arc<dyn Overlay>> = {
            let mut state = self.lock();
            if state.cancel_auto_close_once {
                state.cancel_auto_close_once = false;
                return;
            }
            state
                .overlays
                .iter()
                .filter(|(name, overlay)| {
                    overlay.core().options().auto_close_on_outfocus
                        && state.status.get(*name).is_some_and(|s| s.is_visible)
                })
                .map(|(_, overlay)| overlay.clone())
                .collect()
        };
        for overlay in targets {
            overlay.close(Outcome::cancelled());
        }
    }

    /// Pointer moved to (`x`, `y`) in host viewport coordinates
    pub fn handle_mouse_move(&self, x: f64, y: f64) {
        let (overlays, dx, dy) = {
            let mut state = self.lock();
            let previous = state.last_pointer.unwrap_or(Point::new(x, y));
            state.last_pointer = Some(Point::new(x, y));
            (
                state.overlays.values().cloned().collect::<Vec<_>>(),
                x - previous.x,
                y - previous.y,
            )
        };
        for overlay in overlays {
            overlay.on_mouse_move(x, y, dx, dy);
        }
    }

    /// Pointer released; ends drags and resizes
    pub fn handle_mouse_up(&self, x: f64, y: f64) {
        let overlays: Vec<_> = {
            let mut state = self.lock();
            state.contents_selectable = true;
            state.overlays.values().cloned().collect()
        };
        for overlay in overlays {
            overlay.on_mouse_up(x, y);
        }
    }

    pub fn change_contents_selectable(&self, selectable: bool) {
        self.lock().contents_selectable = selectable;
    }

    pub fn contents_selectable(&self) -> bool {
        self.lock().contents_selectable
    }

    /// Viewport changed size; centered overlays re-center
    pub fn handle_viewport_resize(&self) {
        let size = self.viewport_size();
        debug!(?size, "OverlayManager::handle_viewport_resize: called");
        let overlays: Vec<_> = self.lock().overlays.values().cloned().collect();
        for overlay in overlays {
            overlay.on_viewport_resize(size);
        }
    }

    // --- frame navigation ---

    pub fn set_frame_page_changed_handler(&self, handler: PageChangedHandler) {
        self.lock().page_changed = Some(handler);
    }

    pub(crate) fn trigger_frame_page_changed(&self, url: &str, frame_id: &str, overlay_name: Option<&str>) {
        debug!(%url, %frame_id, "OverlayManager::trigger_frame_page_changed: called");
        let handler = self.lock().page_changed.clone();
        if let Some(handler) = handler {
            handler(url, frame_id, overlay_name);
        }
    }
}

/// Modal depth held by one modal open; released on drop
struct ModalMode<'a> {
    manager: &'a OverlayManager,
}

impl<'a> ModalMode<'a> {
    fn begin(manager: &'a OverlayManager) -> Self {
        manager.begin_modal_mode();
        Self { manager }
    }
}

impl Drop for ModalMode<'_> {
    fn drop(&mut self) {
        self.manager.end_modal_mode();
    }
}

/// A shown overlay of an open cycle; dropping it retires the overlay
///
/// Runs on completion as well as when the cycle is abandoned mid-load.
struct OpenCycle<'a> {
    manager: &'a OverlayManager,
    overlay: &'a Arc<dyn Overlay>,
    instant_mount: bool,
}

impl Drop for OpenCycle<'_> {
    fn drop(&mut self) {
        let name = self.overlay.name();
        self.overlay.inactivate(false);
        if let Some(status) = self.manager.lock().status.get_mut(name) {
            status.is_visible = false;
            status.is_modal = false;
        }
        self.manager.activate_top_overlay();
        if self.instant_mount {
            self.manager.unregister(name);
        }
    }
}

impl std::fmt::Debug for OverlayManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("OverlayManager")
            .field("frame_id", &self.frame_id.get())
            .field("overlays", &state.overlays.keys().collect::<Vec<_>>())
            .field("modal_depth", &state.modal_depth)
            .field("active", &state.active)
            .finish()
    }
}
