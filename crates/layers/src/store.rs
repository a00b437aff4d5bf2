//! Feature store boundary for map layers.
//!
//! A store exposes the two calls a layer offers to clients: `query` for the
//! current feature set and `apply_edits` for one compound add/delete edit.
//! `MemoryFeatureStore` is the in-process implementation used by the app and
//! by tests; it can simulate per-call latency to exercise interleavings.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use foundation::ObjectId;
use tokio::sync::RwLock;

use crate::feature::Feature;
use crate::layer::{GeometryType, Layer, LayerKind};

/// Type alias for a boxed future that can be sent between threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One compound edit: deletions and additions applied together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Edits {
    pub add_features: Vec<Feature>,
    pub delete_features: Vec<ObjectId>,
}

impl Edits {
    pub fn is_empty(&self) -> bool {
        self.add_features.is_empty() && self.delete_features.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditResult {
    /// Ids assigned to `add_features`, in order.
    pub add_results: Vec<ObjectId>,
    pub delete_results: Vec<ObjectId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    UnknownFeature { layer: LayerKind, object_id: ObjectId },
    GeometryMismatch { layer: LayerKind, expected: GeometryType, found: GeometryType },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownFeature { layer, object_id } => {
                write!(f, "{layer} layer has no feature {object_id}")
            }
            Self::GeometryMismatch {
                layer,
                expected,
                found,
            } => write!(f, "{layer} layer expects {expected:?} geometry, got {found:?}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Trait for layer feature stores.
///
/// Implementations must be `Send + Sync` for use across async tasks.
/// Methods return boxed futures for dyn-compatibility.
pub trait FeatureStore: Layer + Send + Sync {
    /// Current feature set of the layer.
    fn query(&self) -> BoxFuture<'_, Result<Vec<Feature>, StoreError>>;

    /// Applies deletions then additions as one edit. Either all of it
    /// applies or none of it does.
    fn apply_edits(&self, edits: Edits) -> BoxFuture<'_, Result<EditResult, StoreError>>;
}

/// In-memory layer store.
pub struct MemoryFeatureStore {
    kind: LayerKind,
    next_id: AtomicU64,
    features: RwLock<BTreeMap<ObjectId, Feature>>,
    latency: Option<Duration>,
}

impl MemoryFeatureStore {
    pub fn new(kind: LayerKind) -> Self {
        Self {
            kind,
            next_id: AtomicU64::new(1),
            features: RwLock::new(BTreeMap::new()),
            latency: None,
        }
    }

    /// Delays every call by `latency`, as a remote store would.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub async fn len(&self) -> usize {
        self.features.read().await.len()
    }

    /// Inserts features without going through an edit, bypassing any
    /// single-feature discipline. Used to seed corrupted states.
    pub async fn seed(&self, features: Vec<Feature>) -> Vec<ObjectId> {
        let mut guard = self.features.write().await;
        features
            .into_iter()
            .map(|mut feature| {
                let id = self.allocate_id();
                feature.object_id = Some(id);
                guard.insert(id, feature);
                id
            })
            .collect()
    }

    fn allocate_id(&self) -> ObjectId {
        ObjectId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Layer for MemoryFeatureStore {
    fn kind(&self) -> LayerKind {
        self.kind
    }
}

impl FeatureStore for MemoryFeatureStore {
    fn query(&self) -> BoxFuture<'_, Result<Vec<Feature>, StoreError>> {
        Box::pin(async move {
            self.simulate_latency().await;
            Ok(self.features.read().await.values().cloned().collect())
        })
    }

    fn apply_edits(&self, edits: Edits) -> BoxFuture<'_, Result<EditResult, StoreError>> {
        Box::pin(async move {
            self.simulate_latency().await;
            let mut guard = self.features.write().await;

            let expected = self.kind.geometry_type();
            for feature in &edits.add_features {
                let found = GeometryType::of(&feature.geometry);
                if found != expected {
                    return Err(StoreError::GeometryMismatch {
                        layer: self.kind,
                        expected,
                        found,
                    });
                }
            }
            if let Some(missing) = edits
                .delete_features
                .iter()
                .find(|id| !guard.contains_key(id))
            {
                return Err(StoreError::UnknownFeature {
                    layer: self.kind,
                    object_id: *missing,
                });
            }

            let mut result = EditResult::default();
            for id in edits.delete_features {
                guard.remove(&id);
                result.delete_results.push(id);
            }
            for mut feature in edits.add_features {
                let id = self.allocate_id();
                feature.object_id = Some(id);
                guard.insert(id, feature);
                result.add_results.push(id);
            }
            Ok(result)
        })
    }
}
