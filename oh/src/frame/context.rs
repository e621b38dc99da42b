//! Registered document contexts

use std::sync::{Arc, Weak};

use serde_json::Value;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use super::element::FrameElement;
use crate::manager::OverlayManager;
use crate::overlay::Overlay;
use crate::protocol::WindowPort;

/// Identifier assigned to each registered document context
pub type FrameId = String;

/// Called with the frame-id once a frame's handshake completes
pub type LoadCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Handshake progress of one context
///
/// ```text
/// AwaitingLoad --load / already complete--> AwaitingClientHandshake
/// AwaitingClientHandshake --client ready--> Ready
/// AwaitingClientHandshake --timeout--> AwaitingLoad
/// Ready --pagehide--> AwaitingLoad
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    AwaitingLoad,
    AwaitingClientHandshake,
    Ready,
}

pub(crate) enum ContextKind {
    /// The top window itself
    Host { window: WindowPort },
    /// An embedded frame, possibly nested inside another registered frame
    Frame {
        element: Arc<dyn FrameElement>,
        parent: Option<FrameId>,
    },
}

pub(crate) struct DocumentContext {
    pub kind: ContextKind,
    pub manager: Weak<OverlayManager>,
    pub holder: Option<Weak<dyn Overlay>>,
    pub on_load: Option<LoadCallback>,
    pub load_params: Value,
    pub state: HandshakeState,
    pub client_ready: Arc<Notify>,
    pub listener: Option<JoinHandle<()>>,
    pub handshake: Option<JoinHandle<()>>,
}

impl DocumentContext {
    pub fn host(window: WindowPort, manager: &Arc<OverlayManager>) -> Self {
        Self {
            kind: ContextKind::Host { window },
            manager: Arc::downgrade(manager),
            holder: None,
            on_load: None,
            load_params: Value::Null,
            state: HandshakeState::Ready,
            client_ready: Arc::new(Notify::new()),
            listener: None,
            handshake: None,
        }
    }

    pub fn frame(
        element: Arc<dyn FrameElement>,
        parent: Option<FrameId>,
        manager: &Arc<OverlayManager>,
        holder: Option<&Arc<dyn Overlay>>,
        on_load: Option<LoadCallback>,
    ) -> Self {
        Self {
            kind: ContextKind::Frame { element, parent },
            manager: Arc::downgrade(manager),
            holder: holder.map(Arc::downgrade),
            on_load,
            load_params: Value::Null,
            state: HandshakeState::AwaitingLoad,
            client_ready: Arc::new(Notify::new()),
            listener: None,
            handshake: None,
        }
    }

    pub fn element(&self) -> Option<&Arc<dyn FrameElement>> {
        match &self.kind {
            ContextKind::Frame { element, .. } => Some(element),
            ContextKind::Host { .. } => None,
        }
    }

    pub fn parent(&self) -> Option<&str> {
        match &self.kind {
            ContextKind::Frame { parent, .. } => parent.as_deref(),
            ContextKind::Host { .. } => None,
        }
    }

    /// Window replies to this context are posted into
    pub fn reply_window(&self) -> Option<WindowPort> {
        match &self.kind {
            ContextKind::Host { window } => Some(window.clone()),
            ContextKind::Frame { element, .. } => element.content_window(),
        }
    }

    pub fn manager(&self) -> Option<Arc<OverlayManager>> {
        self.manager.upgrade()
    }

    pub fn holder(&self) -> Option<Arc<dyn Overlay>> {
        self.holder.as_ref().and_then(Weak::upgrade)
    }

    pub fn is_handshaking(&self) -> bool {
        self.handshake.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Back to `AwaitingLoad` after navigation; stale readiness is discarded
    pub fn reset(&mut self) {
        if let Some(task) = self.handshake.take() {
            task.abort();
        }
        if matches!(self.kind, ContextKind::Frame { .. }) {
            self.state = HandshakeState::AwaitingLoad;
        }
        self.client_ready = Arc::new(Notify::new());
    }
}

impl Drop for DocumentContext {
    fn drop(&mut self) {
        if let Some(task) = self.listener.take() {
            task.abort();
        }
        if let Some(task) = self.handshake.take() {
            task.abort();
        }
    }
}
