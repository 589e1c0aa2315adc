//! # Error Policy
//!
//! Error handling and backoff logic for the controller watch loops.
//! This module handles reconciliation errors and controller stream errors.

use crate::controller::types::{BackoffState, Context, Reconciler};
use crate::error::Error;
use crate::observability;
use crate::resource::Object;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Per-resource key used for backoff bookkeeping
pub(crate) fn backoff_key<K: Object>(obj: &K) -> String {
    obj.key().to_string()
}

/// Handle reconciliation errors with Fibonacci backoff
///
/// Backoff state is tracked per resource so one failing resource never slows
/// down the retries of another. The state is reset by the next successful pass.
pub fn handle_reconciliation_error<R: Reconciler>(
    obj: Arc<R::Resource>,
    error: &Error,
    ctx: Arc<Context<R>>,
) -> Action {
    let key = backoff_key(obj.as_ref());

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.reconciliation_error",
        controller = R::CONTROLLER,
        resource = %key,
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}: {}", key, error);
    observability::increment_reconciliation_errors(R::CONTROLLER, error.kind());

    let (backoff_seconds, error_count) = match ctx.backoff_states.lock() {
        Ok(mut states) => {
            let state = states
                .entry(key.clone())
                .or_insert_with(|| BackoffState::new(ctx.backoff_min_secs, ctx.backoff_max_secs));
            state.increment_error();
            (state.backoff.next_backoff_seconds(), state.error_count)
        }
        Err(e) => {
            warn!(
                "Failed to lock backoff_states: {}, using maximum backoff",
                e
            );
            (ctx.backoff_max_secs, 0)
        }
    };

    info!(
        "🔄 Retrying {} with Fibonacci backoff: {}s (error count: {})",
        key, backoff_seconds, error_count
    );

    observability::increment_requeues_total(R::CONTROLLER, "error-backoff");
    Action::requeue(Duration::from_secs(backoff_seconds))
}

/// Forget the backoff of a resource after a successful pass
///
/// Returns whether the resource was backing off.
pub(crate) fn reset_backoff<R>(ctx: &Context<R>, key: &str) -> bool {
    match ctx.backoff_states.lock() {
        Ok(mut states) => states.remove(key).is_some_and(|s| s.error_count > 0),
        Err(_) => false,
    }
}

/// Classify a controller stream error and log it
///
/// Returns `true` when the stream should keep running, `false` when it should
/// be dropped and restarted after the configured delay.
pub fn handle_controller_stream_error(controller: &str, error_string: &str) -> bool {
    let error_span = tracing::span!(
        tracing::Level::WARN,
        "controller.watch.error",
        controller = controller,
        error = %error_string
    );
    let _error_guard = error_span.enter();

    // 404 must be checked before 401: a plain-text 404 body surfaces as a serde
    // error whose chain also mentions the failed watch
    let is_not_found = error_string.contains("ObjectNotFound")
        || error_string.contains("404")
        || error_string.contains("not found");
    let is_401 =
        (error_string.contains("401") || error_string.contains("Unauthorized")) && !is_not_found;
    let is_410 = error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Expired");

    if is_401 {
        error!(
            "❌ {} watch authentication failed (401 Unauthorized) - RBAC may have been revoked or token expired",
            controller
        );
        false
    } else if is_410 {
        warn!(
            "{} watch resource version expired (410) - watch will restart",
            controller
        );
        false
    } else if is_not_found {
        warn!(
            "{} resource not found (404) - this may be normal if the resource was deleted or the CRD is missing: {}",
            controller, error_string
        );
        true
    } else {
        error!("{} controller stream error: {}", controller, error_string);
        true
    }
}
