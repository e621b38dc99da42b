//! Visual drivers and show/hide transitions
//!
//! Rendering is external. A [`VisualDriver`] animates one element; a
//! [`Transition`] tracks the logical visible flag synchronously and runs the
//! driver in the background so callers never wait on an animation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::debug;

/// Opaque show/hide animation of one visual element
#[async_trait]
pub trait VisualDriver: Send + Sync {
    async fn show(&self);
    async fn hide(&self);
}

/// Driver that completes immediately
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateDriver;

#[async_trait]
impl VisualDriver for ImmediateDriver {
    async fn show(&self) {}
    async fn hide(&self) {}
}

/// Visible flag plus the driver that renders it
#[derive(Clone)]
pub struct Transition {
    label: Arc<str>,
    driver: Arc<dyn VisualDriver>,
    visible: Arc<AtomicBool>,
}

impl Transition {
    pub fn new(label: &str, driver: Arc<dyn VisualDriver>) -> Self {
        Self {
            label: Arc::from(label),
            driver,
            visible: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn immediate(label: &str) -> Self {
        Self::new(label, Arc::new(ImmediateDriver))
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    /// Mark visible and start the show animation
    pub fn show(&self) -> JoinHandle<()> {
        self.show_then(|| {})
    }

    /// Mark visible, start the show animation and run `after` once it finishes
    pub fn show_then<F>(&self, after: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        debug!(label = %self.label, "Transition::show: called");
        self.visible.store(true, Ordering::SeqCst);
        let driver = self.driver.clone();
        tokio::spawn(async move {
            driver.show().await;
            after();
        })
    }

    /// Mark hidden and start the hide animation
    pub fn hide(&self) -> JoinHandle<()> {
        debug!(label = %self.label, "Transition::hide: called");
        self.visible.store(false, Ordering::SeqCst);
        let driver = self.driver.clone();
        tokio::spawn(async move {
            driver.hide().await;
        })
    }
}

impl std::fmt::Debug for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transition")
            .field("label", &self.label)
            .field("visible", &self.is_visible())
            .finish()
    }
}
