//! Outcome values and per-name correlation tables
//!
//! Every open-type request resolves to an [`Outcome`]: either a success carrying
//! data or a cancellation. Cancellation is not an error; it travels through the
//! same close path as success.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

/// Tagged success/cancel result of one overlay session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub is_ok: bool,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl Outcome {
    /// Successful outcome carrying `data`
    pub fn ok(data: Value) -> Self {
        Self { is_ok: true, data }
    }

    /// Cancelled outcome carrying `data`
    pub fn cancel(data: Value) -> Self {
        Self { is_ok: false, data }
    }

    /// Cancelled outcome without data
    pub fn cancelled() -> Self {
        Self::cancel(Value::Null)
    }

    pub fn is_cancel(&self) -> bool {
        !self.is_ok
    }

    /// Interpret an arbitrary JSON payload as an outcome
    ///
    /// Payloads that are not shaped like an outcome are treated as a bare
    /// success value, so `null` becomes `ok(null)`.
    pub fn from_value(value: Value) -> Self {
        match serde_json::from_value::<Outcome>(value.clone()) {
            Ok(outcome) if value.get("isOk").is_some() => outcome,
            _ => Self::ok(value),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// FIFO table of callers awaiting a reply keyed by name
///
/// `register` hands out a receiver; `resolve` completes the oldest live
/// receiver registered under that name. Receivers that were dropped before
/// resolution are skipped.
#[derive(Debug)]
pub struct PendingTable<T> {
    waiters: HashMap<String, VecDeque<oneshot::Sender<T>>>,
}

impl<T> Default for PendingTable<T> {
    fn default() -> Self {
        Self { waiters: HashMap::new() }
    }
}

impl<T> PendingTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a new waiter under `name`
    pub fn register(&mut self, name: &str) -> oneshot::Receiver<T> {
        debug!(%name, "PendingTable::register: called");
        let (tx, rx) = oneshot::channel();
        self.waiters.entry(name.to_string()).or_default().push_back(tx);
        rx
    }

    /// Deliver `value` to the oldest live waiter under `name`
    ///
    /// Returns false when nobody was waiting.
    pub fn resolve(&mut self, name: &str, value: T) -> bool {
        debug!(%name, "PendingTable::resolve: called");
        let Some(queue) = self.waiters.get_mut(name) else {
            return false;
        };

        let mut value = value;
        let mut delivered = false;
        while let Some(tx) = queue.pop_front() {
            match tx.send(value) {
                Ok(()) => {
                    delivered = true;
                    break;
                }
                Err(returned) => value = returned,
            }
        }

        if queue.is_empty() {
            self.waiters.remove(name);
        }
        delivered
    }

    /// Number of waiters queued under `name`
    pub fn pending(&self, name: &str) -> usize {
        self.waiters.get(name).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    /// Drop every waiter; their receivers observe a closed channel
    pub fn clear(&mut self) {
        self.waiters.clear();
    }
}
