//! In-memory page for tests and the simulator
//!
//! `SimFrame` stands in for an `<iframe>` element: its content window is a
//! channel whose inbox is handed to whoever plays the embedded document, and
//! its readiness flag is shared with that document's client.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use crate::frame::{FrameElement, FrameEvent, ReadyState, Viewport};
use crate::geometry::{Rect, Size};
use crate::protocol::{WindowInbox, WindowPort};
use crate::visual::VisualDriver;

const EVENT_CAPACITY: usize = 64;

struct SimFrameState {
    ready_state: ReadyState,
    rect: Rect,
    location: Option<String>,
    title: Option<String>,
    inbox: Option<WindowInbox>,
    embedded: HashMap<String, Arc<SimFrame>>,
    navigations: Vec<String>,
}

pub struct SimFrame {
    window: WindowPort,
    events: broadcast::Sender<FrameEvent>,
    client_loaded: Arc<AtomicBool>,
    polls: AtomicUsize,
    state: Mutex<SimFrameState>,
}

impl SimFrame {
    /// Frame still loading its document
    pub fn new(label: &str, rect: Rect) -> Arc<Self> {
        debug!(%label, "SimFrame::new: called");
        let (window, inbox) = WindowPort::channel(label);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            window,
            events,
            client_loaded: Arc::new(AtomicBool::new(false)),
            polls: AtomicUsize::new(0),
            state: Mutex::new(SimFrameState {
                ready_state: ReadyState::Loading,
                rect,
                location: None,
                title: None,
                inbox: Some(inbox),
                embedded: HashMap::new(),
                navigations: Vec::new(),
            }),
        })
    }

    /// Frame whose document already finished loading
    pub fn loaded(label: &str, rect: Rect) -> Arc<Self> {
        let frame = Self::new(label, rect);
        frame.lock().ready_state = ReadyState::Complete;
        frame
    }

    fn lock(&self) -> MutexGuard<'_, SimFrameState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inbox of the embedded document; available once
    pub fn take_inbox(&self) -> Option<WindowInbox> {
        self.lock().inbox.take()
    }

    /// Readiness flag probed by the coordinator and set by the client
    pub fn client_flag(&self) -> Arc<AtomicBool> {
        self.client_loaded.clone()
    }

    pub fn set_client_loaded(&self, loaded: bool) {
        self.client_loaded.store(loaded, Ordering::SeqCst);
    }

    /// Client initialized and says so
    pub fn announce_ready(&self) {
        self.set_client_loaded(true);
        let _ = self.events.send(FrameEvent::ClientReady);
    }

    /// Document finished loading
    pub fn finish_loading(&self) {
        self.lock().ready_state = ReadyState::Complete;
        let _ = self.events.send(FrameEvent::Load);
    }

    /// Raise an arbitrary event, e.g. pointer input inside the frame
    pub fn emit(&self, event: FrameEvent) {
        let _ = self.events.send(event);
    }

    /// Number of readiness probes so far
    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn set_title(&self, title: &str) {
        self.lock().title = Some(title.to_string());
    }

    pub fn set_rect(&self, rect: Rect) {
        self.lock().rect = rect;
    }

    pub fn add_embedded(&self, element_id: &str, frame: Arc<SimFrame>) {
        self.lock().embedded.insert(element_id.to_string(), frame);
    }

    /// Every URL navigated to, oldest first
    pub fn navigations(&self) -> Vec<String> {
        self.lock().navigations.clone()
    }

    pub fn window(&self) -> WindowPort {
        self.window.clone()
    }
}

impl FrameElement for SimFrame {
    fn ready_state(&self) -> ReadyState {
        self.lock().ready_state
    }

    fn content_window(&self) -> Option<WindowPort> {
        Some(self.window.clone())
    }

    fn client_loaded(&self) -> bool {
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.client_loaded.load(Ordering::SeqCst)
    }

    fn bounding_rect(&self) -> Rect {
        self.lock().rect
    }

    fn subscribe(&self) -> broadcast::Receiver<FrameEvent> {
        self.events.subscribe()
    }

    /// Replace the document: `pagehide` for the old one, then `load`
    fn navigate(&self, url: &str) {
        debug!(%url, "SimFrame::navigate: called");
        let had_document = {
            let mut state = self.lock();
            state.navigations.push(url.to_string());
            let had_document = state.location.is_some();
            state.location = Some(url.to_string());
            state.title = None;
            state.ready_state = ReadyState::Complete;
            had_document
        };
        self.set_client_loaded(false);
        if had_document {
            let _ = self.events.send(FrameEvent::PageHide);
        }
        let _ = self.events.send(FrameEvent::Load);
    }

    fn location(&self) -> Option<String> {
        self.lock().location.clone()
    }

    fn title(&self) -> Option<String> {
        self.lock().title.clone()
    }

    fn find_embedded(&self, element_id: &str) -> Option<Arc<dyn FrameElement>> {
        self.lock()
            .embedded
            .get(element_id)
            .cloned()
            .map(|frame| frame as Arc<dyn FrameElement>)
    }
}

/// Viewport of fixed size that records the frames it creates
pub struct SimViewport {
    size: Mutex<Size>,
    created: Mutex<Vec<Arc<SimFrame>>>,
}

impl SimViewport {
    pub fn new(width: f64, height: f64) -> Arc<Self> {
        Arc::new(Self {
            size: Mutex::new(Size::new(width, height)),
            created: Mutex::new(Vec::new()),
        })
    }

    pub fn resize(&self, width: f64, height: f64) {
        *self.size.lock().unwrap_or_else(PoisonError::into_inner) = Size::new(width, height);
    }

    /// Frames handed out by `create_frame`, oldest first
    pub fn created_frames(&self) -> Vec<Arc<SimFrame>> {
        self.created.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Viewport for SimViewport {
    fn size(&self) -> Size {
        *self.size.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn create_frame(&self) -> Arc<dyn FrameElement> {
        let mut created = self.created.lock().unwrap_or_else(PoisonError::into_inner);
        let frame = SimFrame::new(&format!("frame-{}", created.len() + 1), Rect::default());
        created.push(frame.clone());
        frame
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverCall {
    Show,
    Hide,
}

/// Driver that records every call
#[derive(Debug, Default)]
pub struct RecordingDriver {
    calls: Mutex<Vec<DriverCall>>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl VisualDriver for RecordingDriver {
    async fn show(&self) {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(DriverCall::Show);
    }

    async fn hide(&self) {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(DriverCall::Hide);
    }
}
