//! Generic content surface
//!
//! A `BasicOverlay` has no presentation logic of its own. Host code observes
//! its loads and received messages and decides when to close it.

use std::sync::Mutex;
use std::sync::PoisonError;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use super::{Overlay, OverlayCore, OverlayOptions};
use crate::outcome::Outcome;

/// Payload delivered through `sendMessage` or `broadcastMessage`
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedMessage {
    pub data: Value,
    pub sender: Option<String>,
}

#[derive(Default)]
struct BasicState {
    loads: Vec<Value>,
    modal: bool,
    inbox: Option<mpsc::UnboundedSender<ReceivedMessage>>,
}

pub struct BasicOverlay {
    core: OverlayCore,
    state: Mutex<BasicState>,
}

impl BasicOverlay {
    pub fn new(name: impl Into<String>, options: OverlayOptions) -> Self {
        Self::with_core(OverlayCore::new(name, options))
    }

    pub fn with_core(core: OverlayCore) -> Self {
        Self {
            core,
            state: Mutex::new(BasicState::default()),
        }
    }

    /// Receive every message delivered from now on
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ReceivedMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.lock().unwrap_or_else(PoisonError::into_inner).inbox = Some(tx);
        rx
    }

    /// Params of every load so far, oldest first
    pub fn loads(&self) -> Vec<Value> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).loads.clone()
    }

    pub fn load_count(&self) -> usize {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).loads.len()
    }

    /// Whether the latest load was modal
    pub fn loaded_as_modal(&self) -> bool {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).modal
    }
}

#[async_trait]
impl Overlay for BasicOverlay {
    fn core(&self) -> &OverlayCore {
        &self.core
    }

    async fn load(&self, is_modal: bool, params: Value) -> Outcome {
        debug!(name = %self.core.name(), %is_modal, "BasicOverlay::load: called");
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.loads.push(params);
            state.modal = is_modal;
        }
        let closed = self.core.wait_for_close();
        self.core.show_frame();
        closed.await
    }

    async fn on_receive_message(&self, data: Value, sender: Option<String>) -> Outcome {
        debug!(name = %self.core.name(), ?sender, "BasicOverlay::on_receive_message: called");
        let inbox = self.state.lock().unwrap_or_else(PoisonError::into_inner).inbox.clone();
        match inbox {
            Some(tx) if tx.send(ReceivedMessage { data, sender }).is_ok() => Outcome::ok(Value::Null),
            _ => Outcome::cancelled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_messages_reach_subscriber() {
        let overlay = BasicOverlay::new("panel", OverlayOptions::default());
        let mut rx = overlay.subscribe();

        let outcome = overlay.on_receive_message(json!({"k": 1}), Some("menu".into())).await;
        assert!(outcome.is_ok);

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.data, json!({"k": 1}));
        assert_eq!(msg.sender.as_deref(), Some("menu"));
    }

    #[tokio::test]
    async fn test_message_without_subscriber_is_cancelled() {
        let overlay = BasicOverlay::new("panel", OverlayOptions::default());
        let outcome = overlay.on_receive_message(json!(1), None).await;
        assert!(outcome.is_cancel());
    }
}
