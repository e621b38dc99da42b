//! Shared wait-screen overlay

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use super::{Overlay, OverlayCore, OverlayOptions};
use crate::geometry::CssSize;
use crate::outcome::Outcome;
use crate::protocol::WaitScreenParams;

#[derive(Debug, Clone, Default, PartialEq)]
struct WaitScreenState {
    message: String,
    show_progress_bar: bool,
    progress: f64,
}

/// Full-viewport wait-screen owned by each manager
pub struct LoadingOverlay {
    core: OverlayCore,
    state: Mutex<WaitScreenState>,
}

impl LoadingOverlay {
    pub const DEFAULT_NAME: &'static str = "_default_wait_screen";

    pub fn new() -> Self {
        Self::with_core(OverlayCore::new(Self::DEFAULT_NAME, Self::options()))
    }

    pub fn with_core(core: OverlayCore) -> Self {
        Self {
            core,
            state: Mutex::new(WaitScreenState::default()),
        }
    }

    pub fn options() -> OverlayOptions {
        OverlayOptions {
            size: Some(CssSize::new("100%", "100%")),
            ..Default::default()
        }
    }

    pub fn message(&self) -> String {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).message.clone()
    }

    pub fn shows_progress_bar(&self) -> bool {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).show_progress_bar
    }

    /// Progress ratio in [0, 1]
    pub fn progress(&self) -> f64 {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).progress
    }

    fn apply(&self, params: WaitScreenParams) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.message = params.message.unwrap_or_default();
        state.show_progress_bar = params.show_progress_bar;
        state.progress = params.progress_ratio.unwrap_or(0.0).clamp(0.0, 1.0);
    }
}

impl Default for LoadingOverlay {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Overlay for LoadingOverlay {
    fn core(&self) -> &OverlayCore {
        &self.core
    }

    async fn load(&self, _is_modal: bool, params: Value) -> Outcome {
        debug!(name = %self.core.name(), "LoadingOverlay::load: called");
        let params = match serde_json::from_value::<WaitScreenParams>(params) {
            Ok(params) => params,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed wait-screen params");
                WaitScreenParams::default()
            }
        };
        self.apply(params);
        let closed = self.core.wait_for_close();
        self.core.show_frame();
        closed.await
    }

    async fn on_receive_message(&self, _data: Value, _sender: Option<String>) -> Outcome {
        Outcome::ok(Value::Null)
    }
}
