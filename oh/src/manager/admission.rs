//! Per-name admission control for open cycles
//!
//! At most one open cycle per overlay name runs at a time. Later callers wait
//! in FIFO order and are admitted when the holder's permit is dropped, which
//! also covers callers abandoned mid-cycle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// Proof of admission; dropping it admits the next waiter
#[derive(Debug)]
pub struct AdmissionPermit {
    name: String,
    _permit: OwnedSemaphorePermit,
}

impl AdmissionPermit {
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Default)]
pub struct AdmissionQueue {
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl AdmissionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the turn of `name`
    pub async fn enter(&self, name: &str) -> Result<AdmissionPermit, AcquireError> {
        debug!(%name, "AdmissionQueue::enter: called");
        let gate = {
            let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
            gates.retain(|_, gate| Arc::strong_count(gate) > 1 || gate.available_permits() == 0);
            gates
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Semaphore::new(1)))
                .clone()
        };
        let permit = gate.acquire_owned().await?;
        debug!(%name, "AdmissionQueue::enter: admitted");
        Ok(AdmissionPermit {
            name: name.to_string(),
            _permit: permit,
        })
    }

    /// True while an open cycle for `name` holds its permit
    pub fn is_busy(&self, name: &str) -> bool {
        let gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        gates.get(name).is_some_and(|gate| gate.available_permits() == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_first_caller_enters_immediately() {
        let queue = AdmissionQueue::new();
        let permit = queue.enter("dlg").await.unwrap();
        assert_eq!(permit.name(), "dlg");
        assert!(queue.is_busy("dlg"));
        drop(permit);
        assert!(!queue.is_busy("dlg"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiters_are_admitted_in_order() {
        let queue = Arc::new(AdmissionQueue::new());
        let first = queue.enter("dlg").await.unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        for n in 1..=3 {
            let queue = queue.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let _permit = queue.enter("dlg").await.unwrap();
                tx.send(n).unwrap();
                tokio::time::sleep(Duration::from_millis(10)).await;
            });
            tokio::task::yield_now().await;
        }

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(rx.try_recv().is_err());

        drop(first);
        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(2));
        assert_eq!(rx.recv().await, Some(3));
    }

    #[tokio::test]
    async fn test_names_do_not_block_each_other() {
        let queue = AdmissionQueue::new();
        let _a = queue.enter("a").await.unwrap();
        let b = tokio::time::timeout(Duration::from_millis(50), queue.enter("b")).await;
        assert!(b.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_waiter_does_not_block() {
        let queue = Arc::new(AdmissionQueue::new());
        let first = queue.enter("dlg").await.unwrap();

        let abandoned = {
            let queue = queue.clone();
            tokio::spawn(async move {
                let _permit = queue.enter("dlg").await;
            })
        };
        tokio::task::yield_now().await;
        abandoned.abort();

        drop(first);
        let next = tokio::time::timeout(Duration::from_millis(50), queue.enter("dlg")).await;
        assert!(next.is_ok());
    }
}
