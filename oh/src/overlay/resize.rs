//! Pointer-driven resizing and dragging
//!
//! Pointer moves are broadcast to every mounted overlay; these trackers only
//! produce an effect while their own session is in progress.

use tracing::debug;

use crate::geometry::{Point, Size};

/// Smallest frame an interactive resize may produce
pub const MIN_OVERLAY_SIZE: Size = Size {
    width: 100.0,
    height: 100.0,
};

/// Edge or corner grabbed by the pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeHandle {
    TopLeft,
    Top,
    TopRight,
    Left,
    Right,
    BottomLeft,
    Bottom,
    BottomRight,
}

impl ResizeHandle {
    pub const ALL: [ResizeHandle; 8] = [
        ResizeHandle::TopLeft,
        ResizeHandle::Top,
        ResizeHandle::TopRight,
        ResizeHandle::Left,
        ResizeHandle::Right,
        ResizeHandle::BottomLeft,
        ResizeHandle::Bottom,
        ResizeHandle::BottomRight,
    ];

    fn moves_left_edge(self) -> bool {
        matches!(self, Self::TopLeft | Self::Left | Self::BottomLeft)
    }

    fn moves_right_edge(self) -> bool {
        matches!(self, Self::TopRight | Self::Right | Self::BottomRight)
    }

    fn moves_top_edge(self) -> bool {
        matches!(self, Self::TopLeft | Self::Top | Self::TopRight)
    }

    fn moves_bottom_edge(self) -> bool {
        matches!(self, Self::BottomLeft | Self::Bottom | Self::BottomRight)
    }
}

/// New frame placement produced by one pointer move
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeStep {
    pub position: Point,
    pub size: Size,
}

#[derive(Debug, Clone, Copy)]
struct ResizeSession {
    handle: ResizeHandle,
    start_mouse: Point,
    start_position: Point,
    start_size: Size,
}

#[derive(Debug)]
pub struct ResizeTracker {
    enabled: bool,
    session: Option<ResizeSession>,
}

impl Default for ResizeTracker {
    fn default() -> Self {
        Self {
            enabled: true,
            session: None,
        }
    }
}

impl ResizeTracker {
    pub fn new(enabled: bool) -> Self {
        Self { enabled, session: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.session = None;
        }
    }

    pub fn is_resizing(&self) -> bool {
        self.session.is_some()
    }

    /// Pointer pressed on `handle`; returns false when resizing is disabled
    pub fn begin(&mut self, handle: ResizeHandle, mouse: Point, position: Point, size: Size) -> bool {
        debug!(?handle, "ResizeTracker::begin: called");
        if !self.enabled {
            return false;
        }
        self.session = Some(ResizeSession {
            handle,
            start_mouse: mouse,
            start_position: position,
            start_size: size,
        });
        true
    }

    pub fn end(&mut self) {
        self.session = None;
    }

    /// Placement for the pointer at (`x`, `y`), if a resize is in progress
    ///
    /// Shrinking below the minimum pins the size and shifts the moving edge
    /// back so the opposite edge stays put.
    pub fn track(&self, x: f64, y: f64) -> Option<ResizeStep> {
        let session = self.session?;
        let dx = x - session.start_mouse.x;
        let dy = y - session.start_mouse.y;
        let handle = session.handle;

        let mut position = session.start_position;
        let mut size = session.start_size;

        if handle.moves_left_edge() {
            position.x += dx;
            size.width -= dx;
        } else if handle.moves_right_edge() {
            size.width += dx;
        }
        if handle.moves_top_edge() {
            position.y += dy;
            size.height -= dy;
        } else if handle.moves_bottom_edge() {
            size.height += dy;
        }

        if size.width < MIN_OVERLAY_SIZE.width {
            let cutoff = MIN_OVERLAY_SIZE.width - size.width;
            size.width = MIN_OVERLAY_SIZE.width;
            if handle.moves_left_edge() {
                position.x -= cutoff;
            }
        }
        if size.height < MIN_OVERLAY_SIZE.height {
            let cutoff = MIN_OVERLAY_SIZE.height - size.height;
            size.height = MIN_OVERLAY_SIZE.height;
            if handle.moves_top_edge() {
                position.y -= cutoff;
            }
        }

        Some(ResizeStep { position, size })
    }
}

/// Window header drag state
#[derive(Debug, Default)]
pub struct DragTracker {
    dragging: bool,
}

impl DragTracker {
    pub fn begin(&mut self) {
        self.dragging = true;
    }

    pub fn end(&mut self) {
        self.dragging = false;
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Position after a pointer move of (`dx`, `dy`), if dragging
    pub fn track(&self, position: Point, dx: f64, dy: f64) -> Option<Point> {
        self.dragging.then(|| position.offset(dx, dy))
    }
}
