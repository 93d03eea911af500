use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use crate::key::AssetKey;

/// Reference-counted, type-erased handle to a loaded asset. The cache owns
/// one clone for as long as the key stays resolved; call sites downcast to
/// the concrete asset type at the API boundary.
pub type SharedAsset = Arc<dyn Any + Send + Sync>;

/// Failure status reported by the provider for a single operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ProviderFailure(pub String);

impl ProviderFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Provider-internal descriptor of where/how to load one addressable asset.
/// Labels resolve to one location per asset registered under them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceLocation {
    /// The key a plain load of this asset would use.
    pub primary_key: AssetKey,
    /// Provider-internal identifier (bundle path, catalog id, ...).
    pub internal_id: String,
}

impl ResourceLocation {
    pub fn new(primary_key: impl Into<AssetKey>, internal_id: impl Into<String>) -> Self {
        Self {
            primary_key: primary_key.into(),
            internal_id: internal_id.into(),
        }
    }
}

/// The engine's addressable-resource backend. Resolves keys and labels to
/// resource locations, loads assets asynchronously, and spawns/releases
/// engine objects. The cache never reaches the engine except through this
/// trait, which keeps the coordinator testable against an in-memory fake.
///
/// Async methods return `Send` futures so the coordinator's own futures can
/// be driven from any task on the runtime.
pub trait AssetProvider: Send + Sync + 'static {
    /// Engine object spawned from a prefab-like asset.
    type Instance: Send + 'static;

    /// Resolve a key or label to every location registered under it.
    /// Empty when nothing matches.
    fn resolve_locations(
        &self,
        key: &AssetKey,
    ) -> impl Future<Output = Vec<ResourceLocation>> + Send;

    /// Load the asset behind `key`.
    fn load(&self, key: &AssetKey) -> impl Future<Output = Result<SharedAsset, ProviderFailure>> + Send;

    /// Spawn an engine object from the asset at `location`.
    fn instantiate(
        &self,
        location: &ResourceLocation,
    ) -> impl Future<Output = Result<Self::Instance, ProviderFailure>> + Send;

    /// Release a loaded asset handle back to the provider.
    fn release(&self, asset: SharedAsset) -> Result<(), ProviderFailure>;

    /// Release a spawned engine object back to the provider.
    fn release_instance(&self, instance: Self::Instance) -> Result<(), ProviderFailure>;
}
