//! FrameCoordinator - registry of every document context on the page
//!
//! One coordinator is constructed by the application root and shared by
//! reference. It assigns frame-ids, runs the handshake with each embedded
//! document, and routes upward protocol messages to the right manager or
//! holder overlay.

mod handshake;
mod router;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub use router::Routed;

use super::config::CoordinatorConfig;
use super::context::{ContextKind, DocumentContext, FrameId, HandshakeState, LoadCallback};
use super::element::{FrameElement, ReadyState};
use super::error::FrameError;
use crate::geometry::{CssSize, Point};
use crate::manager::OverlayManager;
use crate::overlay::{IFrameWindow, Overlay, OverlayOptions, WindowOptions};
use crate::protocol::{Envelope, WindowInbox, WindowPort};

/// Coordinator counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoordinatorMetrics {
    pub registered_contexts: usize,
    pub messages_received: u64,
    pub replies_sent: u64,
    pub protocol_violations: u64,
    pub handshakes_completed: u64,
    pub handshake_timeouts: u64,
}

struct CoordinatorState {
    next_id: u64,
    contexts: IndexMap<FrameId, DocumentContext>,
    host_id: Option<FrameId>,
    window_pool: HashMap<String, Arc<IFrameWindow>>,
    metrics: CoordinatorMetrics,
}

impl CoordinatorState {
    fn allocate_id(&mut self) -> FrameId {
        let id = self.next_id.to_string();
        self.next_id += 1;
        id
    }
}

pub struct FrameCoordinator {
    config: CoordinatorConfig,
    host_window: WindowPort,
    state: Mutex<CoordinatorState>,
    weak_self: Weak<FrameCoordinator>,
}

impl FrameCoordinator {
    /// Create a coordinator and the host window inbox it should listen on
    pub fn new(config: CoordinatorConfig) -> (Arc<Self>, WindowInbox) {
        debug!(?config, "FrameCoordinator::new: called");
        let (host_window, inbox) = WindowPort::channel("host");
        let coordinator = Arc::new_cyclic(|weak_self| Self {
            config,
            host_window,
            state: Mutex::new(CoordinatorState {
                next_id: 1,
                contexts: IndexMap::new(),
                host_id: None,
                window_pool: HashMap::new(),
                metrics: CoordinatorMetrics::default(),
            }),
            weak_self: weak_self.clone(),
        });
        (coordinator, inbox)
    }

    /// Create a coordinator and start its host window listener
    pub fn spawn(config: CoordinatorConfig) -> Arc<Self> {
        let (coordinator, inbox) = Self::new(config);
        coordinator.listen(inbox);
        coordinator
    }

    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Port that posts into the host window, where upward messages arrive
    pub fn host_window(&self) -> WindowPort {
        self.host_window.clone()
    }

    // --- registration ---

    /// Register the top window; later calls return the same frame-id
    pub fn register_host(&self, manager: &Arc<OverlayManager>) -> FrameId {
        let frame_id = {
            let mut state = self.lock();
            if let Some(frame_id) = &state.host_id {
                debug!(%frame_id, "FrameCoordinator::register_host: already registered");
                return frame_id.clone();
            }
            let frame_id = state.allocate_id();
            state
                .contexts
                .insert(frame_id.clone(), DocumentContext::host(self.host_window.clone(), manager));
            state.host_id = Some(frame_id.clone());
            frame_id
        };
        info!(%frame_id, "Registered host context");
        self.host_window
            .post_message(Envelope::dispatch_config(&frame_id, Value::Null));
        frame_id
    }

    /// Register an embedded frame owned by `manager`
    ///
    /// Subscribes to the frame's events first, then starts the handshake at
    /// once if the document is already complete. Later `load` events restart
    /// it after navigation.
    pub fn register(
        &self,
        element: Arc<dyn FrameElement>,
        manager: &Arc<OverlayManager>,
        holder: Option<Arc<dyn Overlay>>,
        on_load: Option<LoadCallback>,
    ) -> FrameId {
        self.insert_frame(element, None, manager, holder, on_load)
    }

    /// Register a frame found inside the already registered frame `parent`
    pub fn register_embedded(
        &self,
        element: Arc<dyn FrameElement>,
        parent: &str,
        manager: &Arc<OverlayManager>,
    ) -> Result<FrameId, FrameError> {
        if !self.contains(parent) {
            return Err(FrameError::UnknownFrame(parent.to_string()));
        }
        Ok(self.insert_frame(element, Some(parent.to_string()), manager, None, None))
    }

    fn insert_frame(
        &self,
        element: Arc<dyn FrameElement>,
        parent: Option<FrameId>,
        manager: &Arc<OverlayManager>,
        holder: Option<Arc<dyn Overlay>>,
        on_load: Option<LoadCallback>,
    ) -> FrameId {
        let events = element.subscribe();
        let already_complete = element.ready_state() == ReadyState::Complete;

        let frame_id = {
            let mut state = self.lock();
            let frame_id = state.allocate_id();
            let mut context = DocumentContext::frame(element, parent.clone(), manager, holder.as_ref(), on_load);
            context.listener = Some(self.spawn_listener(frame_id.clone(), events));
            state.contexts.insert(frame_id.clone(), context);
            frame_id
        };
        info!(
            %frame_id,
            parent = ?parent,
            holder = ?holder.as_ref().map(|h| h.name().to_string()),
            "Registered frame context"
        );

        if already_complete {
            self.start_handshake(&frame_id);
        }
        frame_id
    }

    /// Tear down a context; its frame-id is never reused
    pub fn unregister(&self, frame_id: &str) -> bool {
        debug!(%frame_id, "FrameCoordinator::unregister: called");
        let mut state = self.lock();
        let removed = state.contexts.shift_remove(frame_id).is_some();
        if state.host_id.as_deref() == Some(frame_id) {
            state.host_id = None;
        }
        removed
    }

    /// Parameters delivered with the next `dispatchConfig`
    pub fn set_load_params(&self, frame_id: &str, params: Value) -> Result<(), FrameError> {
        let mut state = self.lock();
        let context = state
            .contexts
            .get_mut(frame_id)
            .ok_or_else(|| FrameError::UnknownFrame(frame_id.to_string()))?;
        context.load_params = params;
        Ok(())
    }

    // --- queries ---

    pub fn contains(&self, frame_id: &str) -> bool {
        self.lock().contexts.contains_key(frame_id)
    }

    pub fn context_count(&self) -> usize {
        self.lock().contexts.len()
    }

    pub fn host_frame_id(&self) -> Option<FrameId> {
        self.lock().host_id.clone()
    }

    pub fn handshake_state(&self, frame_id: &str) -> Option<HandshakeState> {
        self.lock().contexts.get(frame_id).map(|context| context.state)
    }

    pub fn is_client_ready(&self, frame_id: &str) -> bool {
        self.handshake_state(frame_id) == Some(HandshakeState::Ready)
    }

    pub fn parent_of(&self, frame_id: &str) -> Option<FrameId> {
        self.lock()
            .contexts
            .get(frame_id)
            .and_then(|context| context.parent().map(str::to_string))
    }

    pub fn metrics(&self) -> CoordinatorMetrics {
        let state = self.lock();
        CoordinatorMetrics {
            registered_contexts: state.contexts.len(),
            ..state.metrics.clone()
        }
    }

    // --- coordinates ---

    /// Translate a frame-local point into host viewport coordinates
    ///
    /// Sums the bounding-rect origins of the frame and every ancestor frame.
    pub fn translate_to_host(&self, frame_id: &str, point: Point) -> Result<Point, FrameError> {
        let state = self.lock();
        let mut translated = point;
        let mut current = Some(frame_id.to_string());
        let mut hops = 0;

        while let Some(id) = current {
            let context = state
                .contexts
                .get(&id)
                .ok_or_else(|| FrameError::UnknownFrame(id.clone()))?;
            match &context.kind {
                ContextKind::Host { .. } => break,
                ContextKind::Frame { element, parent } => {
                    let origin = element.bounding_rect().origin();
                    translated = translated.offset(origin.x, origin.y);
                    current = parent.clone();
                }
            }
            hops += 1;
            if hops > state.contexts.len() {
                break;
            }
        }
        Ok(translated)
    }

    // --- link windows ---

    /// Pooled window for link target `name`, pointed at `url`
    pub fn window_for_link(&self, name: &str, url: &str, manager: &Arc<OverlayManager>) -> Arc<IFrameWindow> {
        let mut state = self.lock();
        if let Some(window) = state.window_pool.get(name) {
            debug!(%name, %url, "Reusing pooled link window");
            window.change_source_url(url);
            return window.clone();
        }
        let options = WindowOptions {
            overlay: OverlayOptions {
                size: Some(CssSize::new("80%", "80%")),
                fix_position_to_center_of_view_port: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let window = IFrameWindow::in_viewport(name, url, manager.viewport().as_ref(), options);
        state.window_pool.insert(name.to_string(), window.clone());
        window
    }

    pub fn pooled_window_count(&self) -> usize {
        self.lock().window_pool.len()
    }

    /// Start listening for upward messages on the host window inbox
    pub fn listen(&self, mut inbox: WindowInbox) -> JoinHandle<()> {
        let weak = self.weak_self.clone();
        tokio::spawn(async move {
            while let Some(envelope) = inbox.recv().await {
                let Some(coordinator) = weak.upgrade() else {
                    break;
                };
                if let Err(e) = coordinator.handle_message(envelope) {
                    tracing::error!(error = %e, "Dropped protocol message");
                }
            }
            debug!("FrameCoordinator::listen: inbox closed");
        })
    }
}

impl std::fmt::Debug for FrameCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("FrameCoordinator")
            .field("contexts", &state.contexts.keys().collect::<Vec<_>>())
            .field("host_id", &state.host_id)
            .field("next_id", &state.next_id)
            .finish()
    }
}
