//! Points, sizes and CSS size expressions

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Bounding rectangle of an element relative to its own document
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Width and height as CSS length expressions (`"320px"`, `"50%"`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CssSize {
    pub css_width: String,
    pub css_height: String,
}

impl CssSize {
    pub fn new(width: impl Into<String>, height: impl Into<String>) -> Self {
        Self {
            css_width: width.into(),
            css_height: height.into(),
        }
    }

    pub fn px(width: f64, height: f64) -> Self {
        Self::new(format!("{width}px"), format!("{height}px"))
    }

    /// Resolve to pixels against the containing viewport
    pub fn resolve(&self, viewport: Size) -> Size {
        Size::new(
            resolve_length(&self.css_width, viewport.width),
            resolve_length(&self.css_height, viewport.height),
        )
    }
}

/// Resolve a single CSS length; unparseable expressions resolve to zero
fn resolve_length(expr: &str, container: f64) -> f64 {
    let expr = expr.trim();
    if let Some(percent) = expr.strip_suffix('%') {
        percent.trim().parse::<f64>().map(|p| container * p / 100.0).unwrap_or(0.0)
    } else {
        expr.strip_suffix("px").unwrap_or(expr).trim().parse::<f64>().unwrap_or(0.0)
    }
}
