//! Atlas Assets - Addressable asset loading and caching
//!
//! Game assets (prefabs, textures, audio clips) are identified by string
//! keys or labels and loaded through a provider supplied by the host
//! engine. The core is a reference-counted cache that coalesces concurrent
//! loads: for any key, at most one provider request is in flight, and
//! everyone asking for that key shares its outcome.

mod cache;
mod config;
mod error;
mod instance;
mod key;
mod provider;
mod server;

pub use config::{BatchFailurePolicy, CacheConfig};
pub use error::AssetError;
pub use instance::OwnedInstance;
pub use key::{AssetKey, AssetRef};
pub use provider::{AssetProvider, ProviderFailure, ResourceLocation, SharedAsset};
pub use server::{AssetServer, PendingAsset, Releasable};
