//! # Types
//!
//! Core types shared by the lifecycle reconcilers and the runtime that drives them.

use crate::controller::backoff::FibonacciBackoff;
use crate::error::Result;
use crate::resource::Object;
use crate::store::{ObjectKey, ObjectStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Result of one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassOutcome<S> {
    /// Lifecycle state the resource was left in
    pub state: S,
    /// Run the next pass after this long; `None` waits for the next change
    pub requeue_after: Option<Duration>,
}

impl<S> PassOutcome<S> {
    pub fn requeue(state: S, after: Duration) -> Self {
        Self {
            state,
            requeue_after: Some(after),
        }
    }

    pub fn await_change(state: S) -> Self {
        Self {
            state,
            requeue_after: None,
        }
    }
}

/// A lifecycle component that can be driven by a controller work queue
#[async_trait]
pub trait Reconciler: Send + Sync + 'static {
    /// Kind watched by the work queue
    type Resource: Object;
    type State: Debug + Send;

    /// Name used in spans, metrics and logs
    const CONTROLLER: &'static str;

    /// Run one pass for the object with the given key
    ///
    /// Only retryable failures are returned as errors.
    async fn reconcile(&self, key: &ObjectKey) -> Result<PassOutcome<Self::State>>;
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_secs, max_secs),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Runtime context handed to the controller callbacks
#[derive(Debug)]
pub struct Context<R> {
    pub reconciler: R,
    // Backoff state per resource (identified by object key)
    // Owned by the error policy, reset on the next successful pass
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
    pub backoff_min_secs: u64,
    pub backoff_max_secs: u64,
    pub reconcile_timeout: Duration,
}

impl<R> Context<R> {
    pub fn new(reconciler: R, config: &crate::config::ControllerConfig) -> Self {
        Self {
            reconciler,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
            backoff_min_secs: config.backoff_min_secs,
            backoff_max_secs: config.backoff_max_secs,
            reconcile_timeout: config.reconcile_timeout(),
        }
    }
}

/// Write the status of `obj` only if it differs from `before`
///
/// Conditions keep their transition time when their status is unchanged, so
/// an idle pass compares equal and performs no write.
pub(crate) async fn write_status_if_changed<S, K>(store: &S, obj: &mut K, before: &K) -> Result<()>
where
    S: ObjectStore,
    K: Object,
{
    let current = serde_json::to_value(&*obj)?;
    let previous = serde_json::to_value(before)?;
    if current.get("status") == previous.get("status") {
        return Ok(());
    }
    store.update_status(obj).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_state_reset() {
        let mut state = BackoffState::new(1, 60);
        state.increment_error();
        state.increment_error();
        assert_eq!(state.backoff.next_backoff_seconds(), 1);
        assert_eq!(state.backoff.next_backoff_seconds(), 1);
        assert_eq!(state.backoff.next_backoff_seconds(), 2);
        state.reset();
        assert_eq!(state.error_count, 0);
        assert_eq!(state.backoff.next_backoff_seconds(), 1);
    }

    #[test]
    fn test_pass_outcome_constructors() {
        let outcome = PassOutcome::requeue("waiting", Duration::from_secs(5));
        assert_eq!(outcome.requeue_after, Some(Duration::from_secs(5)));
        assert!(PassOutcome::await_change("done").requeue_after.is_none());
    }
}
