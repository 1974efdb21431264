//! Undo log for one pipeline run.
//!
//! Each side effect that must be reverted on failure pushes its inverse.
//! Unwinding runs the inverses newest-first; their own failures are logged
//! and swallowed so the original error is the one reported.

use uuid::Uuid;

use crate::storage::BlobStore;
use crate::store::PhotoStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compensation {
    DeleteBlob { key: String },
    DeletePhoto(Uuid),
    DeleteAsset(Uuid),
}

#[derive(Debug, Default)]
pub struct CompensationStack {
    actions: Vec<Compensation>,
}

impl CompensationStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: Compensation) {
        self.actions.push(action);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Discard the log; the run's effects are now permanent.
    pub fn commit(mut self) {
        self.actions.clear();
    }

    /// Revert every recorded effect in reverse order.
    pub async fn unwind(self, blobs: &dyn BlobStore, store: &dyn PhotoStore) {
        let total = self.actions.len();
        for action in self.actions.into_iter().rev() {
            let result = match &action {
                Compensation::DeleteBlob { key } => {
                    blobs.delete_object(key).await.map_err(|e| e.to_string())
                }
                Compensation::DeletePhoto(id) => {
                    store.delete_photo(*id).await.map_err(|e| e.to_string())
                }
                Compensation::DeleteAsset(id) => {
                    store.delete_asset(*id).await.map_err(|e| e.to_string())
                }
            };
            if let Err(message) = result {
                tracing::error!(?action, "Compensation step failed: {message}");
            }
        }
        tracing::debug!(steps = total, "Compensation unwound");
    }
}
