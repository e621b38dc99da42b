//! Keyboard focus containment
//!
//! An overlay's content is bracketed by sentinels:
//!
//! ```text
//! [head stopper][head detector] ...content... [tail detector][tail stopper]
//! ```
//!
//! Detectors bounce focus to the opposite end so tabbing wraps inside the
//! overlay. Stoppers catch focus entering from outside and restore the last
//! focused content element.

use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusTarget {
    HeadStopper,
    HeadDetector,
    /// A focusable element inside the overlay content, by element id
    Content(String),
    TailDetector,
    TailStopper,
}

#[derive(Debug, Default)]
pub struct FocusTrap {
    current: Option<FocusTarget>,
    last_focused: Option<String>,
    last_focus_is_detector: bool,
}

impl FocusTrap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&FocusTarget> {
        self.current.as_ref()
    }

    pub fn last_focused(&self) -> Option<&str> {
        self.last_focused.as_deref()
    }

    /// Move focus onto the overlay itself
    pub fn focus_self(&mut self) {
        debug!("FocusTrap::focus_self: called");
        self.last_focus_is_detector = false;
        self.current = Some(FocusTarget::HeadDetector);
    }

    /// Focus lands on `target`; returns where focus settles
    ///
    /// An inactive overlay does not redirect focus.
    pub fn focus(&mut self, target: FocusTarget, active: bool) -> FocusTarget {
        debug!(?target, %active, "FocusTrap::focus: called");
        if let Some(FocusTarget::Content(id)) = &self.current {
            if *id != target_id(&target) {
                self.last_focused = Some(id.clone());
            }
        }

        let mut target = target;
        if active {
            // Every redirect lands on a detector or content, which settles
            // within two hops.
            for _ in 0..3 {
                match self.redirect(&target) {
                    Some(next) => target = next,
                    None => break,
                }
            }
        }
        if let FocusTarget::Content(_) = target {
            self.last_focus_is_detector = false;
        }
        self.current = Some(target.clone());
        target
    }

    /// Focus leaves the overlay entirely
    pub fn blur(&mut self) {
        if let Some(FocusTarget::Content(id)) = self.current.take() {
            self.last_focused = Some(id);
        }
        self.last_focus_is_detector = false;
    }

    fn redirect(&mut self, target: &FocusTarget) -> Option<FocusTarget> {
        match target {
            FocusTarget::HeadStopper => Some(
                self.last_focused
                    .clone()
                    .map(FocusTarget::Content)
                    .unwrap_or(FocusTarget::HeadDetector),
            ),
            FocusTarget::TailStopper => Some(
                self.last_focused
                    .clone()
                    .map(FocusTarget::Content)
                    .unwrap_or(FocusTarget::TailDetector),
            ),
            FocusTarget::HeadDetector if !self.last_focus_is_detector => {
                self.last_focus_is_detector = true;
                Some(FocusTarget::TailDetector)
            }
            FocusTarget::TailDetector if !self.last_focus_is_detector => {
                self.last_focus_is_detector = true;
                Some(FocusTarget::HeadDetector)
            }
            _ => None,
        }
    }
}

fn target_id(target: &FocusTarget) -> String {
    match target {
        FocusTarget::Content(id) => id.clone(),
        _ => String::new(),
    }
}
