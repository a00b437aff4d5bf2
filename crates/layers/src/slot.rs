use std::sync::Arc;

use foundation::ObjectId;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::feature::Feature;
use crate::layer::{Layer, LayerKind};
use crate::store::{Edits, FeatureStore, StoreError};

/// A layer constrained to hold at most one feature.
///
/// Every `replace` reads the layer, then deletes whatever is present and adds
/// the new feature in one compound edit. Calls on the same slot are queued in
/// arrival order: a replace does not read until the previous one has written,
/// so a stale read can never resurrect a deleted feature or leave two behind.
pub struct SingleFeatureSlot {
    store: Arc<dyn FeatureStore>,
    turn: Mutex<()>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReplaceOutcome {
    /// The edit ran; carries the id assigned to the new feature, if any.
    Replaced(Option<ObjectId>),
    /// The guard rejected the edit once the slot's turn came up.
    Skipped,
}

impl SingleFeatureSlot {
    pub fn new(store: Arc<dyn FeatureStore>) -> Self {
        Self {
            store,
            turn: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn FeatureStore> {
        &self.store
    }

    /// Replaces the slot content with `feature`, or empties it on `None`.
    pub async fn replace(&self, feature: Option<Feature>) -> Result<Option<ObjectId>, StoreError> {
        let _turn = self.turn.lock().await;
        self.replace_in_turn(feature).await
    }

    /// Like [`replace`](Self::replace), but evaluates `still_current` once the
    /// slot's turn arrives and skips the edit if it returns `false`.
    pub async fn replace_if(
        &self,
        feature: Option<Feature>,
        still_current: impl FnOnce() -> bool + Send,
    ) -> Result<ReplaceOutcome, StoreError> {
        let _turn = self.turn.lock().await;
        if !still_current() {
            debug!(layer = %self.kind(), "discarding stale slot replace");
            return Ok(ReplaceOutcome::Skipped);
        }
        self.replace_in_turn(feature)
            .await
            .map(ReplaceOutcome::Replaced)
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        self.replace(None).await.map(|_| ())
    }

    /// The feature currently held, read in turn with pending replaces.
    pub async fn current(&self) -> Result<Option<Feature>, StoreError> {
        let _turn = self.turn.lock().await;
        Ok(self.store.query().await?.into_iter().next())
    }

    async fn replace_in_turn(&self, feature: Option<Feature>) -> Result<Option<ObjectId>, StoreError> {
        let existing = self.store.query().await?;
        if existing.len() > 1 {
            warn!(
                layer = %self.kind(),
                count = existing.len(),
                "single-feature layer held several features; removing all"
            );
        }

        let edits = Edits {
            add_features: feature.into_iter().collect(),
            delete_features: existing.iter().filter_map(|f| f.object_id).collect(),
        };
        if edits.is_empty() {
            return Ok(None);
        }

        let result = self.store.apply_edits(edits).await?;
        let added = result.add_results.first().copied();
        debug!(
            layer = %self.kind(),
            deleted = result.delete_results.len(),
            added = ?added,
            "slot replaced"
        );
        Ok(added)
    }
}

impl Layer for SingleFeatureSlot {
    fn kind(&self) -> LayerKind {
        self.store.kind()
    }
}
