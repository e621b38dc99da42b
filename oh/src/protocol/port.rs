//! Window messaging endpoints

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::messages::Envelope;

/// Receiving side of one document's window messages
pub type WindowInbox = mpsc::UnboundedReceiver<Envelope>;

/// Handle that posts envelopes into one document's inbox
///
/// Delivery is fire-and-forget like `window.postMessage`: a closed document
/// silently drops the message.
#[derive(Clone)]
pub struct WindowPort {
    label: Arc<str>,
    tx: mpsc::UnboundedSender<Envelope>,
}

impl WindowPort {
    /// Create a port and the inbox it delivers into
    pub fn channel(label: impl Into<String>) -> (Self, WindowInbox) {
        let label: String = label.into();
        debug!(%label, "WindowPort::channel: called");
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                label: Arc::from(label),
                tx,
            },
            rx,
        )
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Post an envelope; returns false when the document is gone
    pub fn post_message(&self, envelope: Envelope) -> bool {
        debug!(label = %self.label, command = ?envelope.command, "WindowPort::post_message: called");
        match self.tx.send(envelope) {
            Ok(()) => true,
            Err(_) => {
                warn!(label = %self.label, "Window closed, message dropped");
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// True when both ports deliver into the same inbox
    pub fn same_window(&self, other: &WindowPort) -> bool {
        self.tx.same_channel(&other.tx)
    }
}

impl fmt::Debug for WindowPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowPort")
            .field("label", &self.label)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Command;

    #[tokio::test]
    async fn test_post_message_delivers() {
        let (port, mut inbox) = WindowPort::channel("child");
        assert!(port.post_message(Envelope::downstream(Command::Stop)));

        let env = inbox.recv().await.unwrap();
        assert_eq!(env.command, Some(Command::Stop));
        assert_eq!(port.label(), "child");
    }

    #[tokio::test]
    async fn test_post_message_to_closed_window() {
        let (port, inbox) = WindowPort::channel("gone");
        drop(inbox);
        assert!(port.is_closed());
        assert!(!port.post_message(Envelope::downstream(Command::Stop)));
    }

    #[test]
    fn test_same_window() {
        let (a, _inbox_a) = WindowPort::channel("a");
        let (b, _inbox_b) = WindowPort::channel("b");
        assert!(a.same_window(&a.clone()));
        assert!(!a.same_window(&b));
    }
}
