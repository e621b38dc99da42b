//! Embedded frame elements and the viewport that creates them

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::geometry::{Rect, Size};
use crate::protocol::WindowPort;

/// Document loading state of a frame element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Complete,
}

/// Events observed on a frame element
///
/// Pointer coordinates are local to the frame's own document.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameEvent {
    /// Document finished loading
    Load,
    /// Document is navigating away
    PageHide,
    /// Client counterpart announced it is initialized
    ClientReady,
    MouseMove { x: f64, y: f64 },
    MouseUp { x: f64, y: f64 },
    MouseDown { x: f64, y: f64 },
}

/// One `<iframe>` element as seen from its parent document
pub trait FrameElement: Send + Sync {
    fn ready_state(&self) -> ReadyState;

    /// Window of the embedded document, if one is attached
    fn content_window(&self) -> Option<WindowPort>;

    /// Readiness probe of the embedded client (`isLoaded()`)
    fn client_loaded(&self) -> bool;

    /// Position of the element within its parent document
    fn bounding_rect(&self) -> Rect;

    fn subscribe(&self) -> broadcast::Receiver<FrameEvent>;

    fn navigate(&self, url: &str);

    /// Current location of the embedded document
    fn location(&self) -> Option<String>;

    /// Title of the embedded document
    fn title(&self) -> Option<String>;

    /// Nested iframe inside the embedded document, by element id
    fn find_embedded(&self, _element_id: &str) -> Option<Arc<dyn FrameElement>> {
        None
    }
}

/// Visual root an overlay manager draws into
pub trait Viewport: Send + Sync {
    fn size(&self) -> Size;

    /// Create a detached frame element for window overlays
    fn create_frame(&self) -> Arc<dyn FrameElement>;
}
