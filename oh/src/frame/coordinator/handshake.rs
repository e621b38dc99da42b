//! Frame handshake and per-frame event listeners

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::FrameCoordinator;
use crate::frame::context::{FrameId, HandshakeState};
use crate::frame::element::FrameEvent;
use crate::frame::error::FrameError;
use crate::geometry::Point;
use crate::manager::OverlayManager;
use crate::protocol::Envelope;

const BLANK_PAGE: &str = "about:blank";

impl FrameCoordinator {
    /// Confirm the client inside `frame_id` is ready and dispatch its config
    ///
    /// Waits for a `ClientReady` event while probing `client_loaded()` every
    /// poll interval. On timeout the context returns to `AwaitingLoad` so the
    /// next load retries, and no further probes run.
    pub async fn handshake(&self, frame_id: &str) -> Result<(), FrameError> {
        debug!(%frame_id, "FrameCoordinator::handshake: called");
        let (element, client_ready) = {
            let mut state = self.lock();
            let context = state
                .contexts
                .get_mut(frame_id)
                .ok_or_else(|| FrameError::UnknownFrame(frame_id.to_string()))?;
            let Some(element) = context.element().cloned() else {
                return Ok(());
            };
            if context.state == HandshakeState::Ready {
                return Ok(());
            }
            context.state = HandshakeState::AwaitingClientHandshake;
            (element, context.client_ready.clone())
        };

        let timeout = self.config.handshake_timeout();
        let mut ticker = tokio::time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let probe = async {
            loop {
                tokio::select! {
                    _ = client_ready.notified() => break,
                    _ = ticker.tick() => {
                        if element.client_loaded() {
                            break;
                        }
                    }
                }
            }
        };
        let ready = tokio::time::timeout(timeout, probe).await.is_ok();

        let mut guard = self.lock();
        let state = &mut *guard;
        let context = state
            .contexts
            .get_mut(frame_id)
            .ok_or_else(|| FrameError::UnknownFrame(frame_id.to_string()))?;

        if !ready {
            context.state = HandshakeState::AwaitingLoad;
            state.metrics.handshake_timeouts += 1;
            warn!(%frame_id, ?timeout, "Frame client never reported ready");
            return Err(FrameError::HandshakeTimeout {
                frame_id: frame_id.to_string(),
                waited: timeout,
            });
        }

        context.state = HandshakeState::Ready;
        let envelope = Envelope::dispatch_config(frame_id, context.load_params.clone());
        let window = context.reply_window();
        let on_load = context.on_load.clone();
        let holder = context.holder();
        let manager = context.manager();
        state.metrics.handshakes_completed += 1;
        drop(guard);

        info!(%frame_id, "Frame handshake complete");
        if let Some(window) = window {
            window.post_message(envelope);
        }
        if let Some(on_load) = on_load {
            on_load(frame_id);
        }
        if let Some(holder) = &holder {
            holder.on_frame_loaded(element.title());
        }
        if let (Some(manager), Some(url)) = (manager, element.location()) {
            manager.trigger_frame_page_changed(&url, frame_id, holder.as_ref().map(|h| h.name()));
        }
        Ok(())
    }

    /// Run the handshake in the background unless one is already running
    pub(super) fn start_handshake(&self, frame_id: &str) {
        let Some(coordinator) = self.weak_self.upgrade() else {
            return;
        };
        let mut state = self.lock();
        let Some(context) = state.contexts.get_mut(frame_id) else {
            return;
        };
        if context.state != HandshakeState::AwaitingLoad || context.is_handshaking() {
            debug!(%frame_id, state = ?context.state, "Handshake already under way");
            return;
        }
        let blank = context
            .element()
            .and_then(|element| element.location())
            .is_some_and(|url| url == BLANK_PAGE);
        if blank {
            debug!(%frame_id, "Blank document, no client to handshake with");
            return;
        }
        let id = frame_id.to_string();
        context.handshake = Some(tokio::spawn(async move {
            if let Err(e) = coordinator.handshake(&id).await {
                warn!(error = %e, "Frame handshake failed");
            }
        }));
    }

    pub(super) fn spawn_listener(&self, frame_id: FrameId, mut events: broadcast::Receiver<FrameEvent>) -> JoinHandle<()> {
        let weak = self.weak_self.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let Some(coordinator) = weak.upgrade() else {
                            break;
                        };
                        coordinator.on_frame_event(&frame_id, event);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(%frame_id, %skipped, "Frame event listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    fn on_frame_event(&self, frame_id: &str, event: FrameEvent) {
        debug!(%frame_id, ?event, "FrameCoordinator::on_frame_event: called");
        match event {
            FrameEvent::Load => self.start_handshake(frame_id),
            FrameEvent::PageHide => {
                if let Some(context) = self.lock().contexts.get_mut(frame_id) {
                    context.reset();
                }
            }
            FrameEvent::ClientReady => {
                if let Some(context) = self.lock().contexts.get(frame_id) {
                    context.client_ready.notify_one();
                }
            }
            FrameEvent::MouseMove { x, y } => {
                if let (Some(manager), Ok(point)) = (self.manager_of(frame_id), self.translate_to_host(frame_id, Point::new(x, y))) {
                    manager.handle_mouse_move(point.x, point.y);
                }
            }
            FrameEvent::MouseUp { x, y } => {
                if let (Some(manager), Ok(point)) = (self.manager_of(frame_id), self.translate_to_host(frame_id, Point::new(x, y))) {
                    manager.handle_mouse_up(point.x, point.y);
                }
            }
            FrameEvent::MouseDown { .. } => {
                let (manager, holder) = match self.lock().contexts.get(frame_id) {
                    Some(context) => (context.manager(), context.holder()),
                    None => return,
                };
                if let Some(holder) = holder {
                    holder.on_outer_mouse_down();
                }
                if let Some(manager) = manager {
                    manager.handle_page_mouse_down();
                }
            }
        }
    }

    fn manager_of(&self, frame_id: &str) -> Option<Arc<OverlayManager>> {
        self.lock().contexts.get(frame_id).and_then(|context| context.manager())
    }
}
