use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::oneshot;

use crate::error::AssetError;
use crate::key::AssetKey;
use crate::provider::SharedAsset;

/// The outcome of a load, delivered to every caller queued on the same key.
pub(crate) type LoadResult = Result<SharedAsset, AssetError>;

static NEXT_LOAD_ID: AtomicU64 = AtomicU64::new(1);

/// A caller registered against an in-flight load. Notified exactly once, in
/// registration order, after the provider completion fires.
pub(crate) enum Waiter {
    Channel(oneshot::Sender<LoadResult>),
    Callback(Box<dyn FnOnce(LoadResult) + Send>),
}

impl Waiter {
    pub(crate) fn notify(self, result: LoadResult) {
        match self {
            // A receiver that lost interest does not cancel the load.
            Waiter::Channel(tx) => {
                let _ = tx.send(result);
            }
            Waiter::Callback(callback) => callback(result),
        }
    }
}

/// An in-flight load and the callers queued behind it. The id ties a driving
/// task to the entry it opened, so a load that was cleared mid-flight cannot
/// complete an entry opened later for the same key.
pub(crate) struct PendingLoad {
    id: u64,
    waiters: Vec<Waiter>,
}

/// Outcome of completing a load against the tables.
pub(crate) enum Completion {
    /// The load still owned its pending entry; notify these waiters.
    Committed(Vec<Waiter>),
    /// The entry was cleared (or replaced) while the load was in flight.
    /// The result must not be cached; the driver releases it instead.
    Superseded,
}

/// Everything drained by `clear`, handed back so the coordinator can release
/// handles and fail waiters outside the table lock.
pub(crate) struct ClearedEntries {
    pub(crate) resolved: Vec<SharedAsset>,
    pub(crate) pending: Vec<(AssetKey, Vec<Waiter>)>,
}

/// The cache table and the pending table. A key is in exactly one of three
/// states at any instant: absent, pending, or resolved. Callers hold the
/// coordinator's lock across each lookup-or-insert sequence.
#[derive(Default)]
pub(crate) struct CacheTables {
    resolved: HashMap<AssetKey, SharedAsset>,
    pending: HashMap<AssetKey, PendingLoad>,
}

impl CacheTables {
    /// Cached handle for `key`, if the key is resolved.
    pub(crate) fn cached(&self, key: &AssetKey) -> Option<SharedAsset> {
        self.resolved.get(key).cloned()
    }

    pub(crate) fn is_pending(&self, key: &AssetKey) -> bool {
        self.pending.contains_key(key)
    }

    pub(crate) fn resolved_len(&self) -> usize {
        self.resolved.len()
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Queue `waiter` behind the in-flight load for `key`. Hands the waiter
    /// back when no load is pending, so the caller can open one.
    pub(crate) fn join(&mut self, key: &AssetKey, waiter: Waiter) -> Result<(), Waiter> {
        match self.pending.get_mut(key) {
            Some(load) => {
                load.waiters.push(waiter);
                Ok(())
            }
            None => Err(waiter),
        }
    }

    /// Open a pending entry for `key`, optionally queueing a first waiter.
    /// Returns the load id the driving task must complete with. The caller
    /// must have checked that `key` is absent from both tables.
    pub(crate) fn begin(&mut self, key: AssetKey, first_waiter: Option<Waiter>) -> u64 {
        let id = NEXT_LOAD_ID.fetch_add(1, Ordering::Relaxed);
        let waiters = first_waiter.into_iter().collect();
        self.pending.insert(key, PendingLoad { id, waiters });
        id
    }

    /// Close the pending entry opened with `id`. On success the handle moves
    /// to the cache table; on failure the key simply becomes absent again.
    /// Either way the entry leaves the pending table.
    pub(crate) fn complete(&mut self, key: &AssetKey, id: u64, result: &LoadResult) -> Completion {
        let load = match self.pending.entry(key.clone()) {
            Entry::Occupied(entry) if entry.get().id == id => entry.remove(),
            _ => return Completion::Superseded,
        };

        if let Ok(asset) = result {
            self.resolved.insert(key.clone(), asset.clone());
        }

        Completion::Committed(load.waiters)
    }

    /// Remove `key` from the cache table, returning the handle to release.
    /// Unknown keys (including keys that are merely pending) are a no-op.
    pub(crate) fn release(&mut self, key: &AssetKey) -> Option<SharedAsset> {
        self.resolved.remove(key)
    }

    /// Drain both tables. In-flight loads keep running; their drivers will
    /// see `Completion::Superseded` and release whatever they loaded.
    pub(crate) fn clear(&mut self) -> ClearedEntries {
        ClearedEntries {
            resolved: self.resolved.drain().map(|(_, asset)| asset).collect(),
            pending: self
                .pending
                .drain()
                .map(|(key, load)| (key, load.waiters))
                .collect(),
        }
    }
}
