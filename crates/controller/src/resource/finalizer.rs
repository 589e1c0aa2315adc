//! # Finalizer Manager
//!
//! Adds and removes a named finalizer on any [`Object`].
//!
//! Both operations are idempotent and only write when the finalizer set
//! actually changes. A stale resource version surfaces as `Conflict`; the
//! caller retries the whole pass from a fresh read.

use crate::error::{Error, Result};
use crate::resource::Object;
use crate::store::ObjectStore;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
pub struct APIFinalizer<S> {
    store: Arc<S>,
    finalizer: String,
}

impl<S> Clone for APIFinalizer<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            finalizer: self.finalizer.clone(),
        }
    }
}

impl<S: ObjectStore> APIFinalizer<S> {
    pub fn new(store: Arc<S>, finalizer: impl Into<String>) -> Self {
        Self {
            store,
            finalizer: finalizer.into(),
        }
    }

    #[must_use]
    pub fn finalizer(&self) -> &str {
        &self.finalizer
    }

    pub async fn add_finalizer<K: Object>(&self, obj: &mut K) -> Result<()> {
        if obj.has_finalizer(&self.finalizer) {
            return Ok(());
        }
        obj.meta_mut()
            .finalizers
            .get_or_insert_with(Vec::new)
            .push(self.finalizer.clone());

        if let Err(e) = self.store.update(obj).await {
            self.strip(obj);
            return Err(e);
        }
        debug!(object = %obj.key(), finalizer = %self.finalizer, "added finalizer");
        Ok(())
    }

    /// Removing from an object that no longer exists counts as success
    pub async fn remove_finalizer<K: Object>(&self, obj: &mut K) -> Result<()> {
        if !obj.has_finalizer(&self.finalizer) {
            return Ok(());
        }
        self.strip(obj);

        match self.store.update(obj).await {
            Ok(()) | Err(Error::NotFound { .. }) => {
                debug!(object = %obj.key(), finalizer = %self.finalizer, "removed finalizer");
                Ok(())
            }
            Err(e) => {
                obj.meta_mut()
                    .finalizers
                    .get_or_insert_with(Vec::new)
                    .push(self.finalizer.clone());
                Err(e)
            }
        }
    }

    fn strip<K: Object>(&self, obj: &mut K) {
        if let Some(finalizers) = obj.meta_mut().finalizers.as_mut() {
            finalizers.retain(|f| f != &self.finalizer);
        }
    }
}
