use tracing::warn;

use crate::key::AssetKey;
use crate::provider::AssetProvider;
use crate::server::AssetServer;

/// An engine object spawned from a loaded prefab-like asset. Ownership of
/// the object itself belongs to the host scene graph; releasing the
/// underlying provider handle is this wrapper's job, and it happens exactly
/// once, through [`OwnedInstance::release`] or through `Drop`, whichever
/// fires first. Dropping the wrapper from any path (explicit release, scene
/// unload, plain scope exit) cannot leak the handle.
pub struct OwnedInstance<P: AssetProvider> {
    instance: Option<P::Instance>,
    key: AssetKey,
    server: AssetServer<P>,
}

impl<P: AssetProvider> OwnedInstance<P> {
    pub(crate) fn new(server: AssetServer<P>, key: AssetKey, instance: P::Instance) -> Self {
        Self {
            instance: Some(instance),
            key,
            server,
        }
    }

    /// The key of the asset this instance was spawned from.
    pub fn key(&self) -> &AssetKey {
        &self.key
    }

    /// The spawned engine object. `None` once the instance has been
    /// released.
    pub fn get(&self) -> Option<&P::Instance> {
        self.instance.as_ref()
    }

    /// Release the instance back to the provider now instead of waiting for
    /// the wrapper to drop.
    pub fn release(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(instance) = self.instance.take() {
            if let Err(failure) = self.server.provider().release_instance(instance) {
                warn!("failed to release instance of '{}': {}", self.key, failure);
            }
        }
    }
}

impl<P: AssetProvider> Drop for OwnedInstance<P> {
    fn drop(&mut self) {
        self.release_now();
    }
}
