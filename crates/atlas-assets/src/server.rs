use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::cache::{CacheTables, Completion, LoadResult, Waiter};
use crate::config::{BatchFailurePolicy, CacheConfig};
use crate::error::AssetError;
use crate::instance::OwnedInstance;
use crate::key::{AssetKey, AssetRef};
use crate::provider::{AssetProvider, ResourceLocation, SharedAsset};

/// A non-blocking handle to an in-flight asset load, issued by
/// [`AssetServer::request`]. Call `try_take()` each frame to check for the
/// result without blocking the game loop, or `wait().await` from a task.
pub struct PendingAsset<T> {
    key: AssetKey,
    rx: oneshot::Receiver<LoadResult>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> PendingAsset<T> {
    /// Non-blocking check for the result. `None` while the load is still in
    /// flight.
    pub fn try_take(&mut self) -> Option<Result<Arc<T>, AssetError>> {
        use oneshot::error::TryRecvError;

        match self.rx.try_recv() {
            Ok(result) => Some(result.and_then(|asset| downcast(&self.key, asset))),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(dropped(&self.key))),
        }
    }

    /// Suspend until the load completes.
    pub async fn wait(self) -> Result<Arc<T>, AssetError> {
        let key = self.key;
        match self.rx.await {
            Ok(result) => result.and_then(|asset| downcast(&key, asset)),
            Err(_) => Err(dropped(&key)),
        }
    }

    /// The key this request was issued for.
    pub fn key(&self) -> &AssetKey {
        &self.key
    }
}

/// One item in a best-effort [`AssetServer::release_all`] sweep.
pub enum Releasable<P: AssetProvider> {
    /// A plain loaded asset handle, released through the generic call.
    Asset(SharedAsset),
    /// A spawned instance, released through the instance call.
    Instance(OwnedInstance<P>),
}

/// Central load coordinator for addressable assets. Concurrent requests for
/// the same key share a single provider load, and resolved handles stay
/// cached until they are explicitly released. Labels resolve to whole
/// batches of loads or instantiations.
///
/// Cloning is cheap and every clone shares the same tables. Inject a clone
/// wherever assets are requested; dropping the last clone releases every
/// handle still cached.
pub struct AssetServer<P: AssetProvider> {
    inner: Arc<ServerInner<P>>,
}

impl<P: AssetProvider> Clone for AssetServer<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ServerInner<P: AssetProvider> {
    provider: P,
    config: CacheConfig,
    tables: Mutex<CacheTables>,
}

impl<P: AssetProvider> Drop for ServerInner<P> {
    fn drop(&mut self) {
        let cleared = self.tables.get_mut().clear();
        for asset in cleared.resolved {
            if let Err(failure) = self.provider.release(asset) {
                warn!("release during teardown failed: {}", failure);
            }
        }
    }
}

impl<P: AssetProvider> AssetServer<P> {
    /// Create a server over `provider` with default configuration.
    pub fn new(provider: P) -> Self {
        Self::with_config(provider, CacheConfig::default())
    }

    /// Create a server with explicit configuration.
    pub fn with_config(provider: P, config: CacheConfig) -> Self {
        info!("asset server created");
        Self {
            inner: Arc::new(ServerInner {
                provider,
                config,
                tables: Mutex::new(CacheTables::default()),
            }),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    pub(crate) fn provider(&self) -> &P {
        &self.inner.provider
    }

    /// Whether `key` is resolved in the cache right now.
    pub fn is_cached(&self, key: &AssetKey) -> bool {
        self.inner.tables.lock().cached(key).is_some()
    }

    /// Whether a load for `key` is currently in flight.
    pub fn is_pending(&self, key: &AssetKey) -> bool {
        self.inner.tables.lock().is_pending(key)
    }

    /// Number of resolved entries in the cache table.
    pub fn cached_count(&self) -> usize {
        self.inner.tables.lock().resolved_len()
    }

    /// Number of loads currently in flight.
    pub fn pending_count(&self) -> usize {
        self.inner.tables.lock().pending_len()
    }

    /// Cached-only typed access: the asset behind `key` if it is resolved
    /// and of type `T`. Never touches the provider.
    pub fn get<T>(&self, key: &AssetKey) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let asset = self.inner.tables.lock().cached(key)?;
        asset.downcast::<T>().ok()
    }

    /// Load the asset behind `key`, downcast to `T`.
    ///
    /// A cache hit returns without suspending. If a load for the same key is
    /// already in flight, this caller is queued behind it and no second
    /// provider request is issued. Otherwise a fresh provider load is driven
    /// by this call. Provider failures come back as
    /// [`AssetError::LoadFailed`]; the key is absent again afterwards, so a
    /// retry issues a fresh load.
    pub async fn load<T>(&self, key: impl Into<AssetKey>) -> Result<Arc<T>, AssetError>
    where
        T: Send + Sync + 'static,
    {
        let key = key.into();
        let asset = self.load_untyped(&key).await?;
        downcast(&key, asset)
    }

    /// Load through a typed reference.
    pub async fn load_ref<T>(&self, reference: &AssetRef<T>) -> Result<Arc<T>, AssetError>
    where
        T: Send + Sync + 'static,
    {
        self.load(reference.key().clone()).await
    }

    /// Load without the downcast. All load surfaces funnel through this
    /// dedup/cache path.
    pub async fn load_untyped(&self, key: &AssetKey) -> Result<SharedAsset, AssetError> {
        enum Step {
            Hit(SharedAsset),
            Wait(oneshot::Receiver<LoadResult>),
            Drive(u64),
        }

        let step = {
            let mut tables = self.inner.tables.lock();
            if let Some(asset) = tables.cached(key) {
                Step::Hit(asset)
            } else {
                let (tx, rx) = oneshot::channel();
                match tables.join(key, Waiter::Channel(tx)) {
                    Ok(()) => Step::Wait(rx),
                    Err(_) => Step::Drive(tables.begin(key.clone(), None)),
                }
            }
        };

        match step {
            Step::Hit(asset) => Ok(asset),
            Step::Wait(rx) => match rx.await {
                Ok(result) => result,
                Err(_) => Err(dropped(key)),
            },
            Step::Drive(id) => self.drive_load(key, id).await,
        }
    }

    /// Request `key` from non-async code. Returns a handle polled with
    /// [`PendingAsset::try_take`]. Must be called within a tokio runtime: a
    /// fresh load is driven by a spawned task.
    pub fn request<T>(&self, key: impl Into<AssetKey>) -> PendingAsset<T> {
        let key = key.into();
        let (tx, rx) = oneshot::channel();
        self.enqueue(key.clone(), Waiter::Channel(tx));
        PendingAsset {
            key,
            rx,
            _marker: PhantomData,
        }
    }

    /// Request `key` and run `on_complete` exactly once with the outcome.
    /// The callback runs synchronously when the key is already cached,
    /// otherwise on whichever task completes the shared load.
    pub fn request_with<T, F>(&self, key: impl Into<AssetKey>, on_complete: F)
    where
        T: Send + Sync + 'static,
        F: FnOnce(Result<Arc<T>, AssetError>) + Send + 'static,
    {
        let key = key.into();
        let typed_key = key.clone();
        self.enqueue(
            key,
            Waiter::Callback(Box::new(move |result| {
                on_complete(result.and_then(|asset| downcast(&typed_key, asset)))
            })),
        );
    }

    /// Load every asset registered under `label`, downcast to `T`.
    ///
    /// Returns `None` when the label resolves to no locations. That is
    /// distinct from a label whose loads all failed, which yields `Some` of
    /// an empty list under the default policy. Each location is loaded through the
    /// shared cache path by its primary key; results already present by
    /// reference identity are not appended twice.
    pub async fn load_by_label<T>(&self, label: impl Into<AssetKey>) -> Option<Vec<Arc<T>>>
    where
        T: Send + Sync + 'static,
    {
        let label = label.into();
        let locations = match self.resolve(&label).await {
            Ok(locations) => locations,
            Err(err) => {
                warn!("{}", err);
                return None;
            }
        };

        let mut assets = Vec::new();
        match self.load_locations_into(&locations, &mut assets).await {
            Ok(()) => Some(assets),
            Err(err) => {
                debug!("batch for label '{}' discarded: {}", label, err);
                None
            }
        }
    }

    /// Append every asset under `label` into a caller-owned collection,
    /// skipping assets the collection already holds by reference identity.
    pub async fn load_by_label_into<T>(
        &self,
        label: impl Into<AssetKey>,
        collection: &mut Vec<Arc<T>>,
    ) where
        T: Send + Sync + 'static,
    {
        let label = label.into();
        let locations = self.inner.provider.resolve_locations(&label).await;
        if let Err(err) = self.load_locations_into(&locations, collection).await {
            debug!("batch for label '{}' aborted: {}", label, err);
        }
    }

    /// Resolve a label to its locations, mapping an empty resolution to
    /// [`AssetError::ResolutionFailed`].
    async fn resolve(&self, label: &AssetKey) -> Result<Vec<ResourceLocation>, AssetError> {
        let locations = self.inner.provider.resolve_locations(label).await;
        if locations.is_empty() {
            return Err(AssetError::ResolutionFailed(label.clone()));
        }
        Ok(locations)
    }

    async fn load_locations_into<T>(
        &self,
        locations: &[ResourceLocation],
        collection: &mut Vec<Arc<T>>,
    ) -> Result<(), AssetError>
    where
        T: Send + Sync + 'static,
    {
        for location in locations {
            match self.load::<T>(location.primary_key.clone()).await {
                Ok(asset) => {
                    if collection.iter().any(|existing| Arc::ptr_eq(existing, &asset)) {
                        continue;
                    }
                    collection.push(asset);
                }
                // drive_load already logged the failure
                Err(err) => match self.inner.config.batch_failure {
                    BatchFailurePolicy::SkipAndContinue => continue,
                    BatchFailurePolicy::AbortOnFailure => return Err(err),
                },
            }
        }
        Ok(())
    }

    /// Instantiate every asset registered under `label`, wrapping each
    /// successful spawn for self-release. A failed spawn is logged and
    /// excluded while the rest keep processing (under the default policy).
    /// Returns `None` when the label resolves to no locations.
    pub async fn instantiate_by_label(
        &self,
        label: impl Into<AssetKey>,
    ) -> Option<Vec<OwnedInstance<P>>> {
        let label = label.into();
        let locations = match self.resolve(&label).await {
            Ok(locations) => locations,
            Err(err) => {
                error!("{}", err);
                return None;
            }
        };

        let mut instances = Vec::new();
        for location in &locations {
            match self.inner.provider.instantiate(location).await {
                Ok(instance) => {
                    debug!("instantiated '{}'", location.primary_key);
                    instances.push(OwnedInstance::new(
                        self.clone(),
                        location.primary_key.clone(),
                        instance,
                    ));
                }
                Err(failure) => {
                    let err = AssetError::InstantiationFailed {
                        key: location.primary_key.clone(),
                        reason: failure.to_string(),
                    };
                    warn!("{}", err);
                    match self.inner.config.batch_failure {
                        BatchFailurePolicy::SkipAndContinue => {}
                        BatchFailurePolicy::AbortOnFailure => return None,
                    }
                }
            }
        }
        Some(instances)
    }

    /// Release `key` from the cache and hand its provider handle back.
    /// Unknown keys are a no-op; releasing twice is safe.
    pub fn release(&self, key: &AssetKey) {
        let removed = self.inner.tables.lock().release(key);
        match removed {
            Some(asset) => {
                debug!("released asset '{}'", key);
                if let Err(failure) = self.inner.provider.release(asset) {
                    warn!("provider release of '{}' failed: {}", key, failure);
                }
            }
            None => {
                if self.inner.config.warn_on_unknown_release {
                    warn!("release of unknown key '{}'", key);
                }
            }
        }
    }

    /// Best-effort release of a caller-supplied set. `None` entries are
    /// skipped; provider errors are logged and do not stop the sweep.
    pub fn release_all<I>(&self, objects: I)
    where
        I: IntoIterator<Item = Option<Releasable<P>>>,
    {
        for object in objects {
            match object {
                None => {}
                Some(Releasable::Asset(asset)) => {
                    if let Err(failure) = self.inner.provider.release(asset) {
                        warn!("best-effort release failed: {}", failure);
                    }
                }
                Some(Releasable::Instance(instance)) => instance.release(),
            }
        }
    }

    /// Release every handle currently tracked and empty both tables.
    ///
    /// Loads still in flight cannot be cancelled: their waiters are failed
    /// now, and the driving tasks release whatever the provider hands back
    /// once it completes.
    pub fn clear(&self) {
        let cleared = self.inner.tables.lock().clear();
        let resolved = cleared.resolved.len();
        let pending = cleared.pending.len();

        for asset in cleared.resolved {
            if let Err(failure) = self.inner.provider.release(asset) {
                warn!("release during clear failed: {}", failure);
            }
        }
        for (key, waiters) in cleared.pending {
            for waiter in waiters {
                waiter.notify(Err(superseded(&key)));
            }
        }

        info!("asset cache cleared: {} resolved, {} pending", resolved, pending);
    }

    /// Drive the provider load that owns the pending entry `id`, settle the
    /// tables, and notify everyone queued on the key in registration order.
    async fn drive_load(&self, key: &AssetKey, id: u64) -> Result<SharedAsset, AssetError> {
        let result: LoadResult = match self.inner.provider.load(key).await {
            Ok(asset) => {
                debug!("loaded asset '{}'", key);
                Ok(asset)
            }
            Err(failure) => {
                warn!("failed to load asset '{}': {}", key, failure);
                Err(AssetError::LoadFailed {
                    key: key.clone(),
                    reason: failure.to_string(),
                })
            }
        };

        let completion = self.inner.tables.lock().complete(key, id, &result);
        match completion {
            Completion::Committed(waiters) => {
                for waiter in waiters {
                    waiter.notify(result.clone());
                }
                result
            }
            Completion::Superseded => {
                // The entry was cleared mid-flight. The provider operation
                // could not be cancelled, so release its result instead of
                // caching it.
                if let Ok(asset) = result {
                    if let Err(failure) = self.inner.provider.release(asset) {
                        warn!("release of superseded load '{}' failed: {}", key, failure);
                    }
                }
                Err(superseded(key))
            }
        }
    }

    /// Queue `waiter` on `key`, spawning a driver task when no load is
    /// tracked. Shared by both synchronous-style surfaces.
    fn enqueue(&self, key: AssetKey, waiter: Waiter) {
        enum Step {
            Ready(SharedAsset, Waiter),
            Joined,
            Spawn(u64),
        }

        let step = {
            let mut tables = self.inner.tables.lock();
            if let Some(asset) = tables.cached(&key) {
                Step::Ready(asset, waiter)
            } else {
                match tables.join(&key, waiter) {
                    Ok(()) => Step::Joined,
                    Err(waiter) => Step::Spawn(tables.begin(key.clone(), Some(waiter))),
                }
            }
        };

        match step {
            // Notified outside the lock: the callback may re-enter the server.
            Step::Ready(asset, waiter) => waiter.notify(Ok(asset)),
            Step::Joined => {}
            Step::Spawn(id) => {
                let server = self.clone();
                tokio::spawn(async move {
                    // waiters are notified inside drive_load
                    let _ = server.drive_load(&key, id).await;
                });
            }
        }
    }
}

fn downcast<T>(key: &AssetKey, asset: SharedAsset) -> Result<Arc<T>, AssetError>
where
    T: Send + Sync + 'static,
{
    asset.downcast::<T>().map_err(|_| AssetError::TypeMismatch {
        key: key.clone(),
        expected: std::any::type_name::<T>(),
    })
}

fn dropped(key: &AssetKey) -> AssetError {
    AssetError::LoadFailed {
        key: key.clone(),
        reason: "load coordinator dropped before completion".into(),
    }
}

fn superseded(key: &AssetKey) -> AssetError {
    AssetError::LoadFailed {
        key: key.clone(),
        reason: "asset cache cleared while load was in flight".into(),
    }
}
